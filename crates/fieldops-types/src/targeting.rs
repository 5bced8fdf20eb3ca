//! Targeting rules

use crate::recipient::{Recipient, RecipientStatus};
use serde::{Deserialize, Serialize};

/// Which recipients a broadcast reaches
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TargetingRule {
    /// Every recipient in the directory
    All,
    /// Recipients with exactly this status
    ByStatus(RecipientStatus),
    /// Recipients whose region equals this value (case-sensitive)
    ByRegion(String),
}

impl TargetingRule {
    /// Whether a recipient satisfies the rule
    ///
    /// Recipients with no region never match `ByRegion`.
    #[must_use]
    pub fn matches(&self, recipient: &Recipient) -> bool {
        match self {
            Self::All => true,
            Self::ByStatus(status) => recipient.status == *status,
            Self::ByRegion(region) => recipient.region.as_deref() == Some(region.as_str()),
        }
    }

    /// Short description shown in progress and report messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::All => "All technicians".to_string(),
            Self::ByStatus(status) => format!("Status: {status}"),
            Self::ByRegion(region) => format!("Region: {region}"),
        }
    }
}

impl std::fmt::Display for TargetingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
