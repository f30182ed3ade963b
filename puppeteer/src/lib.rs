//! Turn-by-turn arbitration between dialogue agendas.
//!
//! A conversation is driven by several independent agendas, each a small
//! dialogue policy owning one narrow goal. This crate decides, every turn,
//! which agendas may start, when a stalled agenda yields to a sibling, how
//! one agenda hands control to another, and in what order their actions are
//! emitted. The layout keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (contracts, bookkeeping, the
//!   arbitration policy). No I/O.
//! - **[`io`]**: Configuration and turn-record files for embedding
//!   applications.
//!
//! [`puppeteer`] coordinates belief updates, activation and arbitration for
//! one conversation.

pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod puppeteer;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::action::Action;
pub use crate::core::agenda::{Agenda, AgendaPolicy, AgendaState, AgendaStates, BeliefUpdate};
pub use crate::core::extractions::{Extractions, Handoff};
pub use crate::core::observation::Observation;
pub use crate::core::policy::{DefaultPuppeteerPolicy, PuppeteerPolicy};
pub use crate::error::{ConfigurationError, PuppeteerError};
pub use crate::puppeteer::Puppeteer;
