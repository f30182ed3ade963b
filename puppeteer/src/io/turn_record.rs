//! Per-turn JSON records under `<record_dir>/<conversation_id>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::action::Action;
use crate::core::extractions::Extractions;
use crate::core::ledger::AgendaRecord;
use crate::core::observation::Observation;
use crate::core::turn_log::LogSection;

/// Everything needed to explain one turn after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub conversation_id: String,
    /// Turn number (1-indexed).
    pub turn: u32,
    pub observations: Vec<Observation>,
    pub actions: Vec<Action>,
    pub extractions: Extractions,
    /// Bookkeeping after the turn, in configured order.
    pub agendas: Vec<AgendaRecord>,
    pub log: LogSection,
}

pub fn turn_record_path(dir: &Path, conversation_id: &str, turn: u32) -> PathBuf {
    dir.join(conversation_id).join(format!("{}.json", turn))
}

/// Write `record` as pretty JSON and return its path.
pub fn write_turn_record(dir: &Path, record: &TurnRecord) -> Result<PathBuf> {
    let path = turn_record_path(dir, &record.conversation_id, record.turn);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create turn record dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(record).context("serialize turn record")?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

pub fn read_turn_record(path: &Path) -> Result<TurnRecord> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
