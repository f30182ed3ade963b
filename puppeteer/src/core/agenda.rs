//! Agenda contracts: the immutable agenda definition and its per-conversation belief.
//!
//! An [`AgendaPolicy`] is written against its own concrete belief type. The
//! puppeteer stores beliefs as `Box<dyn AgendaState>` and [`Agenda`] bridges
//! the two by downcasting, so a belief handed to the wrong agenda surfaces as
//! [`ConfigurationError::StateMismatch`] instead of a panic.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::core::action::Action;
use crate::core::extractions::Extractions;
use crate::core::observation::Observation;
use crate::error::{ConfigurationError, PuppeteerError};

/// Inputs to a belief update for one turn.
#[derive(Debug, Clone, Copy)]
pub struct BeliefUpdate<'a> {
    /// Actions the puppeteer emitted on the previous turn.
    pub last_actions: &'a [Action],
    /// Observations made since the previous turn.
    pub observations: &'a [Observation],
    /// Facts accumulated so far in the conversation.
    pub prior: &'a Extractions,
    /// Active agenda names, in configured order.
    pub active: &'a [String],
    /// Kicked-off agenda names, in kickoff order.
    pub kicked_off: &'a [String],
}

/// Upcast helper so beliefs can be recovered as their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Mutable per-conversation belief about where one agenda stands.
pub trait AgendaState: AsAny + Send {
    /// Fold this turn's observations into the belief and return any facts
    /// (and optionally a handoff directive) derived from them.
    fn update(&mut self, request: &BeliefUpdate<'_>) -> anyhow::Result<Extractions>;

    /// Restore the initial belief.
    fn reset(&mut self);

    /// Read-only state name → probability view, for diagnostics.
    fn probabilities(&self) -> BTreeMap<String, f64>;
}

/// Agenda-level decisions, written against the agenda's own belief type.
pub trait AgendaPolicy: Send + Sync + 'static {
    type State: AgendaState + 'static;

    /// Belief a new conversation starts from.
    fn initial_state(&self) -> Self::State;

    /// True if the belief meaningfully advanced on the latest update.
    fn made_progress(&self, state: &Self::State) -> bool;

    /// True if the belief is in a terminal state.
    fn is_done(&self, state: &Self::State) -> bool;

    /// True if the agenda may be started given the belief.
    fn can_kick_off(&self, state: &Self::State) -> bool;

    /// Choose the actions to emit this turn, in order.
    fn pick_actions(
        &self,
        state: &Self::State,
        history: &[Action],
        idle_turns: u32,
        extractions: &Extractions,
    ) -> anyhow::Result<Vec<Action>>;
}

trait ErasedPolicy: Send + Sync {
    fn initial_state(&self) -> Box<dyn AgendaState>;
    fn made_progress(&self, state: &dyn AgendaState) -> Option<bool>;
    fn is_done(&self, state: &dyn AgendaState) -> Option<bool>;
    fn can_kick_off(&self, state: &dyn AgendaState) -> Option<bool>;
    fn pick_actions(
        &self,
        state: &dyn AgendaState,
        history: &[Action],
        idle_turns: u32,
        extractions: &Extractions,
    ) -> Option<anyhow::Result<Vec<Action>>>;
}

struct Typed<P>(P);

impl<P: AgendaPolicy> Typed<P> {
    fn typed<'s>(state: &'s dyn AgendaState) -> Option<&'s P::State> {
        state.as_any().downcast_ref::<P::State>()
    }
}

impl<P: AgendaPolicy> ErasedPolicy for Typed<P> {
    fn initial_state(&self) -> Box<dyn AgendaState> {
        Box::new(self.0.initial_state())
    }

    fn made_progress(&self, state: &dyn AgendaState) -> Option<bool> {
        Self::typed(state).map(|s| self.0.made_progress(s))
    }

    fn is_done(&self, state: &dyn AgendaState) -> Option<bool> {
        Self::typed(state).map(|s| self.0.is_done(s))
    }

    fn can_kick_off(&self, state: &dyn AgendaState) -> Option<bool> {
        Self::typed(state).map(|s| self.0.can_kick_off(s))
    }

    fn pick_actions(
        &self,
        state: &dyn AgendaState,
        history: &[Action],
        idle_turns: u32,
        extractions: &Extractions,
    ) -> Option<anyhow::Result<Vec<Action>>> {
        Self::typed(state).map(|s| self.0.pick_actions(s, history, idle_turns, extractions))
    }
}

/// Immutable agenda definition: a unique name plus its policy.
///
/// Cloning is cheap and shares the policy, so one configured set can back
/// any number of concurrent conversations.
#[derive(Clone)]
pub struct Agenda {
    name: String,
    policy: Arc<dyn ErasedPolicy>,
}

impl Agenda {
    pub fn new<P: AgendaPolicy>(name: impl Into<String>, policy: P) -> Self {
        Self {
            name: name.into(),
            policy: Arc::new(Typed(policy)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> Box<dyn AgendaState> {
        self.policy.initial_state()
    }

    pub fn made_progress(&self, state: &dyn AgendaState) -> Result<bool, PuppeteerError> {
        self.policy
            .made_progress(state)
            .ok_or_else(|| self.mismatch())
    }

    pub fn is_done(&self, state: &dyn AgendaState) -> Result<bool, PuppeteerError> {
        self.policy.is_done(state).ok_or_else(|| self.mismatch())
    }

    pub fn can_kick_off(&self, state: &dyn AgendaState) -> Result<bool, PuppeteerError> {
        self.policy
            .can_kick_off(state)
            .ok_or_else(|| self.mismatch())
    }

    pub fn pick_actions(
        &self,
        state: &dyn AgendaState,
        history: &[Action],
        idle_turns: u32,
        extractions: &Extractions,
    ) -> Result<Vec<Action>, PuppeteerError> {
        self.policy
            .pick_actions(state, history, idle_turns, extractions)
            .ok_or_else(|| self.mismatch())?
            .map_err(|source| PuppeteerError::collaborator(&self.name, "pick_actions", source))
    }

    fn mismatch(&self) -> PuppeteerError {
        ConfigurationError::StateMismatch {
            agenda: self.name.clone(),
        }
        .into()
    }
}

impl fmt::Debug for Agenda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agenda").field("name", &self.name).finish()
    }
}

/// Reject configurations that reuse an agenda name.
pub fn check_unique_names(agendas: &[Agenda]) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for agenda in agendas {
        if !seen.insert(agenda.name()) {
            return Err(ConfigurationError::DuplicateAgenda(agenda.name().to_string()));
        }
    }
    Ok(())
}

/// Per-conversation beliefs, one per configured agenda, keyed by name.
#[derive(Default)]
pub struct AgendaStates {
    states: BTreeMap<String, Box<dyn AgendaState>>,
}

impl AgendaStates {
    /// Fresh initial beliefs for every agenda.
    pub fn for_agendas(agendas: &[Agenda]) -> Self {
        let states = agendas
            .iter()
            .map(|agenda| (agenda.name().to_string(), agenda.initial_state()))
            .collect();
        Self { states }
    }

    pub fn get(&self, name: &str) -> Option<&dyn AgendaState> {
        self.states.get(name).map(Box::as_ref)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn AgendaState + 'static)> {
        self.states.get_mut(name).map(Box::as_mut)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl fmt::Debug for AgendaStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.states
                    .iter()
                    .map(|(name, state)| (name, state.probabilities())),
            )
            .finish()
    }
}
