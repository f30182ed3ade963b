//! Puppeteer configuration stored as TOML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::policy::DEFAULT_IDLE_TURNS_BEFORE_FALLBACK;

/// Puppeteer configuration (TOML).
///
/// Missing fields default to the arbitration defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PuppeteerConfig {
    /// Turns every running agenda must be idle before a sibling is started.
    pub idle_turns_before_fallback: u32,

    /// Directory callers pass to `write_turn_record`. Read by nothing else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_dir: Option<PathBuf>,
}

impl Default for PuppeteerConfig {
    fn default() -> Self {
        Self {
            idle_turns_before_fallback: DEFAULT_IDLE_TURNS_BEFORE_FALLBACK,
            record_dir: None,
        }
    }
}

impl PuppeteerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.idle_turns_before_fallback == 0 {
            return Err(anyhow!("idle_turns_before_fallback must be > 0"));
        }
        if let Some(dir) = &self.record_dir {
            if dir.as_os_str().is_empty() {
                return Err(anyhow!("record_dir must not be empty when set"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PuppeteerConfig::default()`.
pub fn load_config(path: &Path) -> Result<PuppeteerConfig> {
    if !path.exists() {
        let cfg = PuppeteerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PuppeteerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PuppeteerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
