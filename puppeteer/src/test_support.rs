//! Test-only scripted agendas.
//!
//! A [`ScriptedAgenda`] replays one [`ScriptedTurn`] per message observation,
//! so tests can drive the arbitration policy with exact progress, terminal,
//! kickoff and failure signals without any belief tracking.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::Value;

use crate::core::action::Action;
use crate::core::agenda::{Agenda, AgendaPolicy, AgendaState, BeliefUpdate};
use crate::core::extractions::{Extractions, Handoff};

/// Action with `text` derived from its name.
pub fn action(name: &str) -> Action {
    Action::new(name, format!("{} text", name))
}

/// Signals an agenda reports for one turn.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    progress: bool,
    done: bool,
    kickoff: bool,
    actions: Vec<Action>,
    extractions: Extractions,
    fail_update: Option<String>,
    fail_pick: Option<String>,
}

impl ScriptedTurn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(mut self) -> Self {
        self.progress = true;
        self
    }

    pub fn done(mut self) -> Self {
        self.done = true;
        self
    }

    pub fn kickoff(mut self) -> Self {
        self.kickoff = true;
        self
    }

    pub fn action(mut self, name: &str) -> Self {
        self.actions.push(action(name));
        self
    }

    pub fn fact(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extractions.add(name, value);
        self
    }

    pub fn handoff(mut self, agenda: &str, trigger: &str) -> Self {
        self.extractions.set_handoff(Handoff::kickoff(agenda, trigger));
        self
    }

    pub fn fail_update(mut self, message: &str) -> Self {
        self.fail_update = Some(message.to_string());
        self
    }

    pub fn fail_pick(mut self, message: &str) -> Self {
        self.fail_pick = Some(message.to_string());
        self
    }
}

/// Builder for an agenda that follows a fixed script.
#[derive(Debug, Clone)]
pub struct ScriptedAgenda {
    name: String,
    turns: Vec<ScriptedTurn>,
    kickoff_intent: Option<String>,
}

impl ScriptedAgenda {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            turns: Vec::new(),
            kickoff_intent: None,
        }
    }

    pub fn turn(mut self, turn: ScriptedTurn) -> Self {
        self.turns.push(turn);
        self
    }

    /// Allow kickoff whenever an observation carries `intent`.
    pub fn kickoff_on(mut self, intent: &str) -> Self {
        self.kickoff_intent = Some(intent.to_string());
        self
    }

    pub fn build(self) -> Agenda {
        Agenda::new(
            self.name,
            ScriptedPolicy {
                script: Arc::new(self.turns),
                kickoff_intent: self.kickoff_intent,
            },
        )
    }
}

pub struct ScriptedPolicy {
    script: Arc<Vec<ScriptedTurn>>,
    kickoff_intent: Option<String>,
}

/// Belief that advances one script entry per message observation.
///
/// Intent-only observations never advance the script; they only arm the
/// kickoff intent.
#[derive(Debug, Clone)]
pub struct ScriptedState {
    script: Arc<Vec<ScriptedTurn>>,
    kickoff_intent: Option<String>,
    position: usize,
    current: ScriptedTurn,
    triggered: bool,
    resets: u32,
    seen_actions: Vec<Vec<Action>>,
    seen_active: Vec<Vec<String>>,
}

impl ScriptedState {
    /// Number of `reset` calls.
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// `last_actions` received by each message update, in order.
    pub fn seen_actions(&self) -> &[Vec<Action>] {
        &self.seen_actions
    }

    /// Active agenda names received by each message update, in order.
    pub fn seen_active(&self) -> &[Vec<String>] {
        &self.seen_active
    }
}

impl AgendaState for ScriptedState {
    fn update(&mut self, request: &BeliefUpdate<'_>) -> Result<Extractions> {
        let mut extractions = Extractions::new();
        if request.observations.iter().any(|obs| obs.text().is_some()) {
            self.current = self
                .script
                .get(self.position)
                .cloned()
                .unwrap_or_default();
            self.position += 1;
            self.seen_actions.push(request.last_actions.to_vec());
            self.seen_active.push(request.active.to_vec());
            if let Some(message) = &self.current.fail_update {
                bail!("{}", message);
            }
            extractions = self.current.extractions.clone();
        }
        if let Some(intent) = &self.kickoff_intent {
            if request.observations.iter().any(|obs| obs.has_intent(intent)) {
                self.triggered = true;
            }
        }
        Ok(extractions)
    }

    fn reset(&mut self) {
        self.current = ScriptedTurn::default();
        self.triggered = false;
        self.resets += 1;
    }

    fn probabilities(&self) -> BTreeMap<String, f64> {
        let state = if self.current.done {
            "done"
        } else if self.current.progress {
            "progressing"
        } else {
            "waiting"
        };
        BTreeMap::from([(state.to_string(), 1.0)])
    }
}

impl AgendaPolicy for ScriptedPolicy {
    type State = ScriptedState;

    fn initial_state(&self) -> ScriptedState {
        ScriptedState {
            script: Arc::clone(&self.script),
            kickoff_intent: self.kickoff_intent.clone(),
            position: 0,
            current: ScriptedTurn::default(),
            triggered: false,
            resets: 0,
            seen_actions: Vec::new(),
            seen_active: Vec::new(),
        }
    }

    fn made_progress(&self, state: &ScriptedState) -> bool {
        state.current.progress
    }

    fn is_done(&self, state: &ScriptedState) -> bool {
        state.current.done
    }

    fn can_kick_off(&self, state: &ScriptedState) -> bool {
        state.current.kickoff || state.triggered
    }

    fn pick_actions(
        &self,
        state: &ScriptedState,
        _history: &[Action],
        _idle_turns: u32,
        _extractions: &Extractions,
    ) -> Result<Vec<Action>> {
        if let Some(message) = &state.current.fail_pick {
            bail!("{}", message);
        }
        Ok(state.current.actions.clone())
    }
}
