//! Error taxonomy for a puppeteer turn.
//!
//! Both kinds abort the turn and reach the caller untouched. "Nothing to run"
//! and "no actions" are normal results, never errors.

use thiserror::Error;

/// The configured agenda set cannot support what was asked of it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("duplicate agenda name '{0}'")]
    DuplicateAgenda(String),
    #[error("kickoff target '{agenda}' is not a configured agenda")]
    UnknownKickoffTarget { agenda: String },
    #[error("kickoff target '{agenda}' is not active (unreachable handoff)")]
    InactiveKickoffTarget { agenda: String },
    #[error("no belief state for agenda '{agenda}'")]
    MissingState { agenda: String },
    #[error("belief state handed to agenda '{agenda}' has the wrong type")]
    StateMismatch { agenda: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum PuppeteerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A belief update or action selection failed inside an agenda.
    #[error("agenda '{agenda}' failed during {operation}")]
    Collaborator {
        agenda: String,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl PuppeteerError {
    pub fn collaborator(agenda: &str, operation: &'static str, source: anyhow::Error) -> Self {
        Self::Collaborator {
            agenda: agenda.to_string(),
            operation,
            source,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
