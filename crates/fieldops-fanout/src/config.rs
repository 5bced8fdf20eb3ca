//! Fanout configuration

use crate::aggregator::MAX_LEDGER_LINES;
use crate::error::ConfigError;
use fieldops_types::AnnouncementFrame;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Allowed length of the operator preview
pub const PREVIEW_CHARS: RangeInclusive<usize> = 150..=200;

/// Engine configuration
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// sends_per_second = 25
/// max_in_flight = 10
///
/// [frame]
/// header = "📢 NOTICE\n\n"
/// footer = ""
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Provider throughput ceiling (minimum spacing is `1 / sends_per_second`)
    pub sends_per_second: u32,
    /// Permit pool size: sends allowed in flight at once
    pub max_in_flight: usize,
    /// Render progress after this many processed recipients
    pub progress_every: usize,
    /// Failure lines kept verbatim in the report (at most 10)
    pub ledger_cap: usize,
    /// Characters of content shown in the operator preview (150 to 200)
    pub preview_chars: usize,
    /// Characters of provider error text kept for unclassified failures
    pub error_excerpt_chars: usize,
    /// Header and footer wrapped around announcements
    pub frame: AnnouncementFrame,
}

impl FanoutConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed TOML or zero-valued limits.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would stall the engine or break report bounds
    ///
    /// # Errors
    /// Returns [`ConfigError::Zero`] or [`ConfigError::OutOfRange`] naming
    /// the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sends_per_second == 0 {
            return Err(ConfigError::Zero {
                field: "sends_per_second",
            });
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Zero {
                field: "max_in_flight",
            });
        }
        if self.progress_every == 0 {
            return Err(ConfigError::Zero {
                field: "progress_every",
            });
        }
        if self.ledger_cap > MAX_LEDGER_LINES {
            return Err(ConfigError::OutOfRange {
                field: "ledger_cap",
                min: 0,
                max: MAX_LEDGER_LINES,
                value: self.ledger_cap,
            });
        }
        if !PREVIEW_CHARS.contains(&self.preview_chars) {
            return Err(ConfigError::OutOfRange {
                field: "preview_chars",
                min: *PREVIEW_CHARS.start(),
                max: *PREVIEW_CHARS.end(),
                value: self.preview_chars,
            });
        }
        Ok(())
    }

    /// Minimum spacing between two permit grants
    #[inline]
    #[must_use]
    pub fn min_spacing(&self) -> Duration {
        Duration::from_secs(1) / self.sends_per_second.max(1)
    }

    /// With throughput ceiling
    #[inline]
    #[must_use]
    pub fn with_sends_per_second(mut self, rate: u32) -> Self {
        self.sends_per_second = rate;
        self
    }

    /// With permit pool size
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// With progress cadence
    #[inline]
    #[must_use]
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    /// With announcement frame
    #[inline]
    #[must_use]
    pub fn with_frame(mut self, frame: AnnouncementFrame) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            sends_per_second: 20,
            max_in_flight: 30,
            progress_every: 10,
            ledger_cap: 10,
            preview_chars: 150,
            error_excerpt_chars: 50,
            frame: AnnouncementFrame::default(),
        }
    }
}
