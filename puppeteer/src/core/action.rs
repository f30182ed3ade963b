//! Conversational actions emitted by agendas.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One emittable conversational act.
///
/// `text` may carry uppercase placeholder tokens. Resolving them against
/// later extractions is the caller's job; the core passes text through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub text: String,
}

impl Action {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.text)
    }
}
