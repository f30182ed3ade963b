//! Observations fed to agenda beliefs each turn.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Something the other party did, as seen by the puppeteer.
///
/// Intent classification happens upstream; observations only carry the
/// resulting intent names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Observation {
    /// An incoming message together with any intents detected in it.
    Message {
        text: String,
        intents: BTreeSet<String>,
    },
    /// Intents without message text (e.g. a synthesized handoff trigger).
    Intent { intents: BTreeSet<String> },
}

impl Observation {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message {
            text: text.into(),
            intents: BTreeSet::new(),
        }
    }

    pub fn intent(name: impl Into<String>) -> Self {
        let mut intents = BTreeSet::new();
        intents.insert(name.into());
        Self::Intent { intents }
    }

    /// Builder-style variant of [`Observation::add_intent`].
    pub fn with_intent(mut self, name: impl Into<String>) -> Self {
        self.add_intent(name);
        self
    }

    pub fn add_intent(&mut self, name: impl Into<String>) {
        self.intents_mut().insert(name.into());
    }

    pub fn has_intent(&self, name: &str) -> bool {
        self.intents().contains(name)
    }

    pub fn intents(&self) -> &BTreeSet<String> {
        match self {
            Self::Message { intents, .. } | Self::Intent { intents } => intents,
        }
    }

    /// Message text, if this observation carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message { text, .. } => Some(text),
            Self::Intent { .. } => None,
        }
    }

    fn intents_mut(&mut self) -> &mut BTreeSet<String> {
        match self {
            Self::Message { intents, .. } | Self::Intent { intents } => intents,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let intents: Vec<&str> = self.intents().iter().map(String::as_str).collect();
        match self {
            Self::Message { text, .. } => {
                write!(f, "message '{}' intents [{}]", text, intents.join(", "))
            }
            Self::Intent { .. } => write!(f, "intents [{}]", intents.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_and_intent_observations_share_intent_lookup() {
        let message = Observation::message("where is my parcel").with_intent("shipment");
        let intent = Observation::intent("shipment");

        assert!(message.has_intent("shipment"));
        assert!(intent.has_intent("shipment"));
        assert!(!intent.has_intent("payment"));
        assert_eq!(message.text(), Some("where is my parcel"));
        assert_eq!(intent.text(), None);
    }

    #[test]
    fn display_lists_intents_in_sorted_order() {
        let obs = Observation::intent("b").with_intent("a");
        assert_eq!(obs.to_string(), "intents [a, b]");
    }
}
