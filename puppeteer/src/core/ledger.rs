//! Per-agenda bookkeeping owned by the arbitration policy.
//!
//! One [`AgendaRecord`] per configured agenda, stored in configured order.
//! The set of records is fixed when the ledger is built; transitions only
//! flip fields on existing records.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::action::Action;

/// Lifecycle bookkeeping for one agenda.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaRecord {
    pub name: String,
    /// Eligible to run.
    pub active: bool,
    /// Currently running.
    pub kicked_off: bool,
    /// Torn down; never revisited in this conversation.
    pub finished: bool,
    /// Consecutive turns without progress. `None` until kicked off and again
    /// after finishing.
    pub idle_turns: Option<u32>,
    /// Number of kickoffs.
    pub times_used: u32,
    /// Actions emitted by this agenda, in order.
    pub history: Vec<Action>,
}

impl AgendaRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: false,
            kicked_off: false,
            finished: false,
            idle_turns: None,
            times_used: 0,
            history: Vec::new(),
        }
    }

    /// Active, never started.
    pub fn is_startable(&self) -> bool {
        self.active && !self.kicked_off && self.times_used == 0
    }
}

/// Ordered bookkeeping for every configured agenda plus the kickoff order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    records: Vec<AgendaRecord>,
    kickoff_order: Vec<String>,
}

impl Ledger {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            records: names
                .into_iter()
                .map(|name| AgendaRecord::new(name.as_ref()))
                .collect(),
            kickoff_order: Vec::new(),
        }
    }

    /// Records in configured order.
    pub fn records(&self) -> &[AgendaRecord] {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&AgendaRecord> {
        self.records.iter().find(|record| record.name == name)
    }

    fn record_mut(&mut self, name: &str) -> Option<&mut AgendaRecord> {
        self.records.iter_mut().find(|record| record.name == name)
    }

    /// Active agenda names in configured order.
    pub fn active_names(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.active)
            .map(|record| record.name.clone())
            .collect()
    }

    /// Kicked-off agenda names in kickoff order.
    pub fn kicked_off_names(&self) -> &[String] {
        &self.kickoff_order
    }

    pub fn has_active(&self) -> bool {
        self.records.iter().any(|record| record.active)
    }

    pub fn has_kicked_off(&self) -> bool {
        !self.kickoff_order.is_empty()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.record(name).is_some_and(|record| record.active)
    }

    /// Mark `name` eligible to run.
    ///
    /// Returns true only when the agenda was newly activated. Unknown,
    /// already-active and finished agendas are left alone, so repeating the
    /// call is harmless.
    pub fn activate(&mut self, name: &str) -> bool {
        match self.record_mut(name) {
            Some(record) if !record.active && !record.finished => {
                record.active = true;
                true
            }
            _ => false,
        }
    }

    /// First startable agenda in configured order.
    pub fn first_startable(&self) -> Option<&str> {
        self.records
            .iter()
            .find(|record| record.is_startable())
            .map(|record| record.name.as_str())
    }

    /// Start `name`: counts a use, zeroes its idle counter and appends it to
    /// the kickoff order.
    ///
    /// Returns false (and changes nothing) if the agenda is unknown, inactive
    /// or already running.
    pub fn kick_off(&mut self, name: &str) -> bool {
        let Some(record) = self.record_mut(name) else {
            return false;
        };
        if !record.active || record.kicked_off {
            return false;
        }
        record.kicked_off = true;
        record.times_used += 1;
        record.idle_turns = Some(0);
        self.kickoff_order.push(name.to_string());
        true
    }

    /// Zero the idle counter on progress, otherwise bump it by one.
    pub fn record_progress(&mut self, name: &str, progressed: bool) {
        if let Some(record) = self.record_mut(name) {
            record.idle_turns = if progressed {
                Some(0)
            } else {
                Some(record.idle_turns.map_or(1, |idle| idle + 1))
            };
        }
    }

    /// True if every running agenda has been idle for at least `threshold` turns.
    pub fn all_running_idle(&self, threshold: u32) -> bool {
        self.kickoff_order.iter().all(|name| {
            self.record(name)
                .and_then(|record| record.idle_turns)
                .is_some_and(|idle| idle >= threshold)
        })
    }

    pub fn idle_turns(&self, name: &str) -> Option<u32> {
        self.record(name).and_then(|record| record.idle_turns)
    }

    pub fn history(&self, name: &str) -> &[Action] {
        self.record(name)
            .map(|record| record.history.as_slice())
            .unwrap_or_default()
    }

    pub fn append_history(&mut self, name: &str, actions: &[Action]) {
        if let Some(record) = self.record_mut(name) {
            record.history.extend_from_slice(actions);
        }
    }

    /// Tear `name` down for good.
    pub fn finish(&mut self, name: &str) {
        if let Some(record) = self.record_mut(name) {
            record.active = false;
            record.kicked_off = false;
            record.finished = true;
            record.idle_turns = None;
        }
        self.kickoff_order.retain(|kicked| kicked != name);
    }
}

/// Check ledger invariants:
/// - No duplicate agenda names
/// - Running agendas are active, counted and have an idle counter
/// - Only running agendas have an idle counter
/// - Used agendas are either running or finished
/// - Finished agendas are neither active nor running
/// - Kickoff order lists exactly the running agendas, once each
pub fn validate_ledger(ledger: &Ledger) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for record in ledger.records() {
        let name = &record.name;
        if !seen.insert(name.as_str()) {
            errors.push(format!("duplicate agenda '{}'", name));
        }
        if record.kicked_off && !record.active {
            errors.push(format!("{}: kicked off but not active", name));
        }
        if record.kicked_off && record.times_used == 0 {
            errors.push(format!("{}: kicked off with times_used 0", name));
        }
        if record.kicked_off != record.idle_turns.is_some() {
            errors.push(format!(
                "{}: idle_turns {:?} inconsistent with kicked_off {}",
                name, record.idle_turns, record.kicked_off
            ));
        }
        if record.times_used > 0 && !record.kicked_off && !record.finished {
            errors.push(format!("{}: used but neither running nor finished", name));
        }
        if record.finished && (record.active || record.kicked_off) {
            errors.push(format!("{}: finished but still live", name));
        }
    }

    let mut order_seen = HashSet::new();
    for name in ledger.kicked_off_names() {
        if !order_seen.insert(name.as_str()) {
            errors.push(format!("kickoff order repeats '{}'", name));
        }
        if !ledger.record(name).is_some_and(|record| record.kicked_off) {
            errors.push(format!("kickoff order lists '{}' which is not running", name));
        }
    }
    let running = ledger
        .records()
        .iter()
        .filter(|record| record.kicked_off)
        .count();
    if running != order_seen.len() {
        errors.push(format!(
            "kickoff order has {} entries for {} running agendas",
            order_seen.len(),
            running
        ));
    }

    errors
}
