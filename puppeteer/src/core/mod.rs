//! Deterministic arbitration logic and the contracts it runs against.
//!
//! Core modules are free of I/O. Given deterministic agendas they produce
//! the same bookkeeping and actions on every run.

pub mod action;
pub mod agenda;
pub mod extractions;
pub mod ledger;
pub mod observation;
pub mod policy;
pub mod turn_log;
