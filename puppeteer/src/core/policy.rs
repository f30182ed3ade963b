//! Inter-agenda arbitration.
//!
//! A [`PuppeteerPolicy`] decides which agendas run and in what order their
//! actions are emitted. Agenda-level choices (which of an agenda's own
//! actions to take) stay with each agenda's policy.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::core::action::Action;
use crate::core::agenda::{Agenda, AgendaState, AgendaStates, check_unique_names};
use crate::core::extractions::{Extractions, Handoff};
use crate::core::ledger::Ledger;
use crate::core::turn_log::TurnLog;
use crate::error::{ConfigurationError, PuppeteerError};

/// Running agendas idle for this many turns let a sibling start.
pub const DEFAULT_IDLE_TURNS_BEFORE_FALLBACK: u32 = 2;

/// Contract between the turn controller and an arbitration policy.
///
/// A policy instance belongs to exactly one conversation and may hold
/// conversation-specific state.
pub trait PuppeteerPolicy: Send {
    /// Pick zero or more actions for this turn, in order.
    ///
    /// Called once per turn, after every belief has been updated.
    fn act(
        &mut self,
        states: &mut AgendaStates,
        extractions: &Extractions,
    ) -> Result<Vec<Action>, PuppeteerError>;

    /// Mark an agenda eligible to start. Must be idempotent; returns true
    /// only on a fresh activation.
    fn activate(&mut self, name: &str) -> bool;

    /// Bookkeeping for every configured agenda.
    fn ledger(&self) -> &Ledger;

    /// Decision log of the latest `act`.
    fn log(&self) -> &TurnLog;
}

/// Default arbitration state machine.
///
/// Per agenda: new → active → kicked off → finished. Each turn it kicks off
/// the first startable agenda when nothing runs, honors handoff directives,
/// tracks idle turns, starts a sibling when every running agenda stalls,
/// collects actions in kickoff order and tears down agendas that finished.
///
/// `act` is atomic: it works on a copy of the ledger and commits only after
/// every agenda call succeeded.
#[derive(Debug)]
pub struct DefaultPuppeteerPolicy {
    agendas: Vec<Agenda>,
    ledger: Ledger,
    idle_turns_before_fallback: u32,
    log: TurnLog,
}

impl DefaultPuppeteerPolicy {
    pub fn new(agendas: Vec<Agenda>) -> Result<Self, ConfigurationError> {
        check_unique_names(&agendas)?;
        let ledger = Ledger::new(agendas.iter().map(Agenda::name));
        Ok(Self {
            agendas,
            ledger,
            idle_turns_before_fallback: DEFAULT_IDLE_TURNS_BEFORE_FALLBACK,
            log: TurnLog::new(),
        })
    }

    /// Zero is rejected: every running agenda would count as stalled on the
    /// turn it starts.
    pub fn with_fallback_threshold(mut self, idle_turns: u32) -> Result<Self, ConfigurationError> {
        if idle_turns == 0 {
            return Err(ConfigurationError::InvalidConfig(
                "idle_turns_before_fallback must be > 0".to_string(),
            ));
        }
        self.idle_turns_before_fallback = idle_turns;
        Ok(self)
    }

    pub fn idle_turns_before_fallback(&self) -> u32 {
        self.idle_turns_before_fallback
    }

    fn agenda(&self, name: &str) -> Result<&Agenda, ConfigurationError> {
        self.agendas
            .iter()
            .find(|agenda| agenda.name() == name)
            .ok_or_else(|| ConfigurationError::UnknownKickoffTarget {
                agenda: name.to_string(),
            })
    }

    fn arbitrate(
        &self,
        ledger: &mut Ledger,
        log: &mut TurnLog,
        states: &AgendaStates,
        extractions: &Extractions,
    ) -> Result<(Vec<Action>, Vec<String>), PuppeteerError> {
        let mut progressed: HashSet<String> = HashSet::new();

        log.begin("Kicked-off agendas");

        if !ledger.has_kicked_off() {
            if let Some(name) = ledger.first_startable().map(str::to_string) {
                log.add(format!("We will kick off {} for the first time.", name));
                info!(agenda = %name, "kicking off first agenda");
                ledger.kick_off(&name);
                progressed.insert(name);
            }
        }

        if let Handoff::Kickoff { agenda, trigger } = extractions.handoff() {
            self.agenda(agenda)?;
            if !ledger.is_active(agenda) {
                warn!(agenda = %agenda, trigger = %trigger, "handoff target is not active");
                return Err(ConfigurationError::InactiveKickoffTarget {
                    agenda: agenda.clone(),
                }
                .into());
            }
            if ledger.kick_off(agenda) {
                log.add(format!("We will kick off {} on handoff trigger '{}'.", agenda, trigger));
                info!(agenda = %agenda, trigger = %trigger, "kicking off agenda on handoff");
            } else {
                log.add(format!("Handoff to {}, which is already running.", agenda));
            }
            progressed.insert(agenda.clone());
        }

        for name in ledger.kicked_off_names().to_vec() {
            let made_progress = if progressed.contains(&name) {
                true
            } else {
                let agenda = self.agenda(&name)?;
                agenda.made_progress(belief(states, &name)?)?
            };
            ledger.record_progress(&name, made_progress);
            if made_progress {
                progressed.insert(name.clone());
                log.add(format!("We have made progress with {}.", name));
            } else {
                log.add(format!("We have not made progress with {}.", name));
            }
            debug!(agenda = %name, made_progress, idle_turns = ?ledger.idle_turns(&name), "progress checked");
        }

        let threshold = self.idle_turns_before_fallback;
        if ledger.has_kicked_off() && ledger.all_running_idle(threshold) {
            log.add(format!(
                "Each of kicked-off agendas has been idle for {} consecutive turns or more.",
                threshold
            ));
            if let Some(name) = ledger.first_startable().map(str::to_string) {
                log.add(format!("We will kick off {} for the first time.", name));
                warn!(agenda = %name, "all running agendas stalled, starting sibling");
                ledger.kick_off(&name);
                progressed.insert(name);
            } else {
                log.add("No other active agenda to kick off.");
            }
        }

        log.end();

        log.begin("Active agendas");
        for record in ledger.records().iter().filter(|record| record.active) {
            log.begin(record.name.clone());
            log.add(format!(
                "Turns without progress: {}",
                record
                    .idle_turns
                    .map_or_else(|| "NA".to_string(), |idle| idle.to_string())
            ));
            log.add(format!("Times used: {}", record.times_used));
            let history: Vec<&str> = record.history.iter().map(|a| a.name.as_str()).collect();
            log.add(format!("Action history: [{}]", history.join(", ")));
            log.end();
        }
        log.end();

        let mut actions = Vec::new();
        let mut finished = Vec::new();

        for name in ledger.kicked_off_names().to_vec() {
            let agenda = self.agenda(&name)?;
            let state = belief(states, &name)?;
            // Only a turn with demonstrated progress may finish an agenda.
            let done = progressed.contains(&name) && agenda.is_done(state)?;
            let idle_turns = ledger.idle_turns(&name).unwrap_or(0);

            log.begin(format!("Picking actions for {}.", name));
            let picked =
                agenda.pick_actions(state, ledger.history(&name), idle_turns, extractions)?;
            for action in &picked {
                log.add(action.to_string());
            }
            log.end();

            ledger.append_history(&name, &picked);
            actions.extend(picked);

            if done {
                log.add(format!("{} is in a terminal state, so it will be stopped.", name));
                finished.push(name);
            }
        }

        for name in &finished {
            info!(agenda = %name, "agenda finished");
            ledger.finish(name);
        }

        Ok((actions, finished))
    }
}

impl PuppeteerPolicy for DefaultPuppeteerPolicy {
    fn act(
        &mut self,
        states: &mut AgendaStates,
        extractions: &Extractions,
    ) -> Result<Vec<Action>, PuppeteerError> {
        self.log.clear();

        if !self.ledger.has_active() {
            self.log.add("No active agenda, will do nothing.");
            debug!("no active agenda");
            return Ok(Vec::new());
        }

        let mut ledger = self.ledger.clone();
        let mut log = TurnLog::new();
        let outcome = self.arbitrate(&mut ledger, &mut log, states, extractions);
        if let Err(err) = &outcome {
            log.add(format!("Turn aborted: {}", err));
        }
        self.log = log;

        let (actions, finished) = outcome?;
        for name in &finished {
            if let Some(state) = states.get_mut(name) {
                state.reset();
            }
        }
        self.ledger = ledger;
        Ok(actions)
    }

    fn activate(&mut self, name: &str) -> bool {
        self.ledger.activate(name)
    }

    fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn log(&self) -> &TurnLog {
        &self.log
    }
}

fn belief<'s>(
    states: &'s AgendaStates,
    name: &str,
) -> Result<&'s dyn AgendaState, ConfigurationError> {
    states
        .get(name)
        .ok_or_else(|| ConfigurationError::MissingState {
            agenda: name.to_string(),
        })
}
