//! Named facts shared across agendas within one conversation.
//!
//! Facts are a plain name → JSON value map. The cross-agenda handoff
//! directive is carried next to the map rather than under a reserved key, so
//! a fact named `kickoff` is just a fact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request from one agenda to start another one this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Handoff {
    #[default]
    NoOp,
    /// Force-kick `agenda`, replaying `trigger` as an intent to its belief.
    Kickoff { agenda: String, trigger: String },
}

impl Handoff {
    pub fn kickoff(agenda: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self::Kickoff {
            agenda: agenda.into(),
            trigger: trigger.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }
}

/// Merge-able bag of named facts plus the handoff directive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extractions {
    facts: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Handoff::is_noop")]
    handoff: Handoff,
}

impl Extractions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.facts.get(name)
    }

    /// Insert or overwrite a fact.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.facts.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`Extractions::add`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(name, value);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.facts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.facts.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.handoff.is_noop()
    }

    pub fn handoff(&self) -> &Handoff {
        &self.handoff
    }

    pub fn set_handoff(&mut self, handoff: Handoff) {
        self.handoff = handoff;
    }

    /// Builder-style variant of [`Extractions::set_handoff`].
    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.handoff = handoff;
        self
    }

    /// Fold `other` into `self`.
    ///
    /// Facts: union of keys, `other` wins on collisions. Handoff: a
    /// `Kickoff` in `other` replaces ours; `NoOp` never clears one.
    pub fn merge(&mut self, other: Extractions) {
        self.facts.extend(other.facts);
        if !other.handoff.is_noop() {
            self.handoff = other.handoff;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_last_writer_wins_per_key() {
        let mut merged = Extractions::new().with("city", "Oslo").with("zip", "0150");
        merged.merge(Extractions::new().with("city", "Bergen"));

        assert_eq!(merged.get("city"), Some(&json!("Bergen")));
        assert_eq!(merged.get("zip"), Some(&json!("0150")));
        assert_eq!(merged.names().collect::<Vec<_>>(), vec!["city", "zip"]);
    }

    #[test]
    fn noop_handoff_does_not_clear_pending_kickoff() {
        let mut merged =
            Extractions::new().with_handoff(Handoff::kickoff("get_payment", "payment"));
        merged.merge(Extractions::new().with("amount", 12));

        assert_eq!(merged.handoff(), &Handoff::kickoff("get_payment", "payment"));
    }

    #[test]
    fn kickoff_is_not_a_fact() {
        let extractions =
            Extractions::new().with_handoff(Handoff::kickoff("get_payment", "payment"));
        assert!(!extractions.has("kickoff"));
        assert!(!extractions.is_empty());
    }

    #[test]
    fn serializes_without_noop_handoff() {
        let extractions = Extractions::new().with("name", "Mr X");
        let value = serde_json::to_value(&extractions).expect("serialize");
        assert_eq!(value, json!({ "facts": { "name": "Mr X" } }));
    }
}
