//! Terminal-side collaborators and input parsing

use crate::simulator::SimProfile;
use anyhow::{bail, Context};
use async_trait::async_trait;
use fieldops_fanout::{DirectoryError, FanoutConfig, OperatorSession, SessionError, UserDirectory};
use fieldops_types::{DirectorySnapshot, RecipientStatus, TargetingRule};
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;

/// Operator session printing to stdout
///
/// Progress renders are collapsed to one line each unless `verbose`; the
/// last render is kept so the caller can print the final report.
#[derive(Debug, Default)]
pub struct ConsoleSession {
    verbose: bool,
    last: Mutex<Option<String>>,
    renders: Mutex<usize>,
}

impl ConsoleSession {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Text of the most recent render
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.last.lock().clone()
    }

    #[must_use]
    pub fn renders(&self) -> usize {
        *self.renders.lock()
    }
}

#[async_trait]
impl OperatorSession for ConsoleSession {
    async fn show(&self, text: &str) -> Result<(), SessionError> {
        *self.renders.lock() += 1;
        if self.verbose {
            println!("{text}\n");
        } else if let Some(line) = text.lines().find(|l| l.contains("Progress:")) {
            println!("{}", line.trim());
        }
        *self.last.lock() = Some(text.to_string());
        Ok(())
    }
}

/// Directory loaded once from a JSON array of recipients
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    snapshot: DirectorySnapshot,
}

impl JsonDirectory {
    /// Wrap an in-memory snapshot
    #[must_use]
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        Self { snapshot }
    }

    /// Read a directory file
    ///
    /// # Errors
    /// Fails if the file is unreadable or not a JSON array of recipients.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading directory {}", path.display()))?;
        let snapshot: DirectorySnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing directory {}", path.display()))?;
        tracing::info!(recipients = snapshot.len(), path = %path.display(), "directory loaded");
        Ok(Self { snapshot })
    }

    #[must_use]
    pub fn snapshot(&self) -> &DirectorySnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl UserDirectory for JsonDirectory {
    async fn all_recipients(&self) -> Result<DirectorySnapshot, DirectoryError> {
        Ok(self.snapshot.clone())
    }
}

/// Settings file: engine limits plus the simulated provider's failure model
///
/// ```toml
/// [fanout]
/// sends_per_second = 20
///
/// [simulator]
/// blocked_rate = 0.05
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub fanout: FanoutConfig,
    pub simulator: SimProfile,
}

impl CliConfig {
    /// Parse and validate a settings file's contents
    ///
    /// # Errors
    /// Fails on malformed TOML or invalid engine limits.
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(source).context("parsing settings")?;
        config.fanout.validate().context("validating [fanout]")?;
        Ok(config)
    }

    /// Read a settings file
    ///
    /// # Errors
    /// Fails if the file is unreadable or invalid.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}

/// Parse a `--target` value: `all`, a status name, or `region:<name>`
///
/// # Errors
/// Fails on an unknown status or an empty region name.
pub fn parse_target(value: &str) -> anyhow::Result<TargetingRule> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("all") {
        return Ok(TargetingRule::All);
    }
    if let Some(region) = value.strip_prefix("region:") {
        let region = region.trim();
        if region.is_empty() {
            bail!("region target needs a name, e.g. region:North");
        }
        return Ok(TargetingRule::ByRegion(region.to_string()));
    }
    let status: RecipientStatus = value
        .parse()
        .with_context(|| format!("unknown target '{value}' (all, active, pending, blocked, region:<name>)"))?;
    Ok(TargetingRule::ByStatus(status))
}
