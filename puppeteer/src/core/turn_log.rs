//! Human-readable decision log for the latest turn.
//!
//! Separate from `tracing`: this log is product output returned to callers
//! (and optionally written as a turn record), rebuilt from scratch every turn.

use serde::{Deserialize, Serialize};

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntry {
    Line(String),
    Section(LogSection),
}

/// A titled group of log entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSection {
    pub title: String,
    pub entries: Vec<LogEntry>,
}

impl LogSection {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        for entry in &self.entries {
            match entry {
                LogEntry::Line(line) => {
                    out.push_str(&INDENT.repeat(depth));
                    out.push_str(line);
                    out.push('\n');
                }
                LogEntry::Section(section) => {
                    out.push_str(&INDENT.repeat(depth));
                    out.push_str(&section.title);
                    out.push('\n');
                    section.render_into(depth + 1, out);
                }
            }
        }
    }
}

/// Nested log built with `begin` / `add` / `end`.
#[derive(Debug, Clone, Default)]
pub struct TurnLog {
    root: LogSection,
    open: Vec<LogSection>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.root.entries.clear();
        self.open.clear();
    }

    /// Open a nested section; entries go into it until the matching `end`.
    pub fn begin(&mut self, title: impl Into<String>) {
        self.open.push(LogSection::new(title));
    }

    pub fn add(&mut self, line: impl Into<String>) {
        self.current().entries.push(LogEntry::Line(line.into()));
    }

    /// Close the innermost open section. Extra calls are ignored.
    pub fn end(&mut self) {
        if let Some(section) = self.open.pop() {
            self.current().entries.push(LogEntry::Section(section));
        }
    }

    /// Copy every top-level entry of `other` into the current section.
    pub fn extend(&mut self, other: &TurnLog) {
        let entries = other.record().entries;
        self.current().entries.extend(entries);
    }

    /// Snapshot with all open sections closed.
    pub fn record(&self) -> LogSection {
        let mut closed = self.clone();
        while !closed.open.is_empty() {
            closed.end();
        }
        closed.root
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.record().render_into(0, &mut out);
        out
    }

    fn current(&mut self) -> &mut LogSection {
        self.open.last_mut().unwrap_or(&mut self.root)
    }
}
