//! File-backed helpers for applications embedding a puppeteer.
//!
//! Nothing in [`crate::core`] calls into this module; callers load config
//! and write turn records around `react`.

pub mod config;
pub mod turn_record;
