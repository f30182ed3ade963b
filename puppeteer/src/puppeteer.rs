//! Turn controller for a single conversation.

use std::fmt;

use tracing::{debug, info, instrument};

use crate::core::action::Action;
use crate::core::agenda::{Agenda, AgendaStates, BeliefUpdate, check_unique_names};
use crate::core::extractions::{Extractions, Handoff};
use crate::core::observation::Observation;
use crate::core::policy::{DefaultPuppeteerPolicy, PuppeteerPolicy};
use crate::core::turn_log::{LogSection, TurnLog};
use crate::error::{ConfigurationError, PuppeteerError};
use crate::io::config::PuppeteerConfig;
use crate::io::turn_record::TurnRecord;

/// Diagnostic view of one active agenda.
#[derive(Debug, Clone, PartialEq)]
pub struct AgendaSnapshot {
    pub name: String,
    /// Most likely belief state, if the belief reports any.
    pub state: Option<String>,
    pub probability: f64,
    pub idle_turns: Option<u32>,
}

impl fmt::Display for AgendaSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idle = self
            .idle_turns
            .map_or_else(|| "NA".to_string(), |idle| idle.to_string());
        write!(
            f,
            "{}: {} ({:.3}), turns without progress: {}",
            self.name,
            self.state.as_deref().unwrap_or("unknown"),
            self.probability,
            idle
        )
    }
}

/// Agenda-driven dialog controller for one conversation.
///
/// Each call to [`Puppeteer::react`] runs one turn:
///
/// 1. Update every configured agenda's belief from the observations.
/// 2. If the merged facts carry a handoff, replay its trigger to the target.
/// 3. Activate agendas whose kickoff precondition now holds.
/// 4. Let the policy pick actions, and remember them for the next update.
///
/// Actions are only selected here; performing them is up to the caller.
pub struct Puppeteer<P: PuppeteerPolicy = DefaultPuppeteerPolicy> {
    agendas: Vec<Agenda>,
    states: AgendaStates,
    policy: P,
    last_actions: Vec<Action>,
    log: TurnLog,
    turn: u32,
}

impl Puppeteer<DefaultPuppeteerPolicy> {
    /// Puppeteer with the default policy and default thresholds.
    pub fn new(agendas: Vec<Agenda>) -> Result<Self, PuppeteerError> {
        Self::from_config(agendas, &PuppeteerConfig::default())
    }

    /// Puppeteer with the default policy tuned by `config`.
    pub fn from_config(
        agendas: Vec<Agenda>,
        config: &PuppeteerConfig,
    ) -> Result<Self, PuppeteerError> {
        config
            .validate()
            .map_err(|err| ConfigurationError::InvalidConfig(format!("{:#}", err)))?;
        let policy = DefaultPuppeteerPolicy::new(agendas.clone())?
            .with_fallback_threshold(config.idle_turns_before_fallback)?;
        Self::with_policy(agendas, policy)
    }
}

impl<P: PuppeteerPolicy> Puppeteer<P> {
    /// Puppeteer driven by a custom policy built over the same `agendas`.
    pub fn with_policy(agendas: Vec<Agenda>, policy: P) -> Result<Self, PuppeteerError> {
        check_unique_names(&agendas)?;
        let states = AgendaStates::for_agendas(&agendas);
        Ok(Self {
            agendas,
            states,
            policy,
            last_actions: Vec::new(),
            log: TurnLog::new(),
            turn: 0,
        })
    }

    /// Run one turn.
    ///
    /// `prior` holds facts gathered over the whole conversation, possibly
    /// including ones other modules derived this turn. Returns the actions to
    /// take, in order, and the facts derived by the agendas this turn.
    ///
    /// On error nothing is committed to the arbitration bookkeeping and the
    /// previous turn's actions stay in place, so the turn may be retried.
    #[instrument(skip_all, fields(turn = self.turn + 1))]
    pub fn react(
        &mut self,
        observations: &[Observation],
        prior: &Extractions,
    ) -> Result<(Vec<Action>, Extractions), PuppeteerError> {
        self.log.clear();
        self.log_inputs(observations, prior);

        self.log.begin("Update phase");
        let active = self.policy.ledger().active_names();
        let kicked_off = self.policy.ledger().kicked_off_names().to_vec();

        let mut extractions = Extractions::new();
        for agenda in &self.agendas {
            let state = self.states.get_mut(agenda.name()).ok_or_else(|| {
                ConfigurationError::MissingState {
                    agenda: agenda.name().to_string(),
                }
            })?;
            let request = BeliefUpdate {
                last_actions: &self.last_actions,
                observations,
                prior,
                active: &active,
                kicked_off: &kicked_off,
            };
            let facts = state
                .update(&request)
                .map_err(|source| PuppeteerError::collaborator(agenda.name(), "update", source))?;
            extractions.merge(facts);
        }

        if let Handoff::Kickoff { agenda, trigger } = extractions.handoff().clone() {
            self.log.add(format!("Handoff to {} on trigger '{}'.", agenda, trigger));
            info!(agenda = %agenda, trigger = %trigger, "replaying handoff trigger");
            let state = self.states.get_mut(&agenda).ok_or_else(|| {
                ConfigurationError::UnknownKickoffTarget {
                    agenda: agenda.clone(),
                }
            })?;
            let replay = [Observation::intent(trigger.clone())];
            let request = BeliefUpdate {
                last_actions: &self.last_actions,
                observations: &replay,
                prior,
                active: &active,
                kicked_off: &kicked_off,
            };
            let facts = state
                .update(&request)
                .map_err(|source| PuppeteerError::collaborator(&agenda, "update", source))?;
            extractions.merge(facts);
            // The replay cannot redirect the handoff it answers.
            extractions.set_handoff(Handoff::Kickoff { agenda, trigger });
        }

        for agenda in &self.agendas {
            let name = agenda.name();
            let eligible = self
                .policy
                .ledger()
                .record(name)
                .is_some_and(|record| !record.active && !record.finished);
            if !eligible {
                continue;
            }
            let state = self
                .states
                .get(name)
                .ok_or_else(|| ConfigurationError::MissingState {
                    agenda: name.to_string(),
                })?;
            if agenda.can_kick_off(state)? && self.policy.activate(name) {
                self.log.add(format!("{} can kick off and is now active.", name));
                debug!(agenda = %name, "agenda activated");
            }
        }
        self.log.end();

        self.log.begin("Act phase");
        let outcome = self.policy.act(&mut self.states, &extractions);
        self.log.extend(self.policy.log());
        self.log.end();
        let actions = outcome?;

        self.last_actions = actions.clone();
        self.turn += 1;
        self.log_outputs(&actions, &extractions);
        debug!(actions = actions.len(), "turn complete");

        Ok((actions, extractions))
    }

    /// Rendered decision log of the latest `react` call.
    pub fn log(&self) -> String {
        self.log.render()
    }

    /// Structured form of [`Puppeteer::log`].
    pub fn log_record(&self) -> LogSection {
        self.log.record()
    }

    /// Snapshot of the latest turn for [`write_turn_record`](crate::io::turn_record::write_turn_record).
    pub fn turn_record(
        &self,
        conversation_id: &str,
        observations: &[Observation],
        extractions: &Extractions,
    ) -> TurnRecord {
        TurnRecord {
            conversation_id: conversation_id.to_string(),
            turn: self.turn,
            observations: observations.to_vec(),
            actions: self.last_actions.clone(),
            extractions: extractions.clone(),
            agendas: self.policy.ledger().records().to_vec(),
            log: self.log.record(),
        }
    }

    /// Completed turns.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn last_actions(&self) -> &[Action] {
        &self.last_actions
    }

    pub fn agendas(&self) -> &[Agenda] {
        &self.agendas
    }

    pub fn states(&self) -> &AgendaStates {
        &self.states
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Active agenda names in configured order.
    pub fn active_agenda_names(&self) -> Vec<String> {
        self.policy.ledger().active_names()
    }

    /// Most likely belief state and idle count for each active agenda.
    pub fn active_states(&self) -> Vec<AgendaSnapshot> {
        self.active_agenda_names()
            .into_iter()
            .map(|name| {
                let best = self.states.get(&name).and_then(|state| {
                    state
                        .probabilities()
                        .into_iter()
                        .max_by(|a, b| a.1.total_cmp(&b.1))
                });
                let idle_turns = self.policy.ledger().idle_turns(&name);
                AgendaSnapshot {
                    name,
                    probability: best.as_ref().map_or(0.0, |(_, p)| *p),
                    state: best.map(|(state, _)| state),
                    idle_turns,
                }
            })
            .collect()
    }

    fn log_inputs(&mut self, observations: &[Observation], prior: &Extractions) {
        self.log.begin("Inputs");
        self.log.begin("Observations");
        for observation in observations {
            self.log.add(observation.to_string());
        }
        self.log.end();
        self.log.begin("Extractions");
        for (name, value) in prior.iter() {
            self.log.add(format!("{}: '{}'", name, value));
        }
        self.log.end();
        self.log.end();
    }

    fn log_outputs(&mut self, actions: &[Action], extractions: &Extractions) {
        self.log.begin("Outputs");
        self.log.begin("Actions");
        for action in actions {
            self.log.add(action.to_string());
        }
        self.log.end();
        self.log.begin("Extractions");
        for (name, value) in extractions.iter() {
            self.log.add(format!("{}: '{}'", name, value));
        }
        self.log.end();
        self.log.end();
    }
}

impl<P: PuppeteerPolicy> fmt::Debug for Puppeteer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Puppeteer")
            .field("agendas", &self.agendas)
            .field("turn", &self.turn)
            .field("last_actions", &self.last_actions)
            .finish_non_exhaustive()
    }
}
