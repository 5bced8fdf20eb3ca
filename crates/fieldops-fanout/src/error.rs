//! Error types for the fanout engine
//!
//! Only pre-dispatch conditions surface as errors:
//! - Empty audience after resolution
//! - Invalid payload
//! - Directory or configuration failures
//!
//! Per-recipient failures never abort a job; they become
//! [`DeliveryOutcome`](fieldops_types::DeliveryOutcome) records instead.

use crate::provider::DirectoryError;
use fieldops_types::{PayloadError, TargetingRule};

/// Main fanout error type
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    /// Targeting rule resolved to nobody
    #[error("no recipients match {rule}")]
    EmptyAudience { rule: TargetingRule },

    /// Payload failed validation
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    /// User directory could not be read
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl FanoutError {
    /// Reportable to the administrator as a normal outcome rather than a fault
    #[inline]
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::EmptyAudience { .. } | Self::InvalidPayload(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A rate, pool size or cadence was zero
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    /// A bounded setting was outside its allowed range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: usize,
        max: usize,
        value: usize,
    },

    /// TOML could not be parsed
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Rate gate errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The permit pool was closed
    #[error("rate gate closed")]
    Closed,
}
