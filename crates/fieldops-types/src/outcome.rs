//! Per-recipient delivery outcomes

use crate::recipient::{Recipient, RecipientId};
use serde::{Deserialize, Serialize};

/// Why a delivery failed for good
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// Recipient never opened a chat with the bot
    NeverStarted,
    /// Recipient blocked the bot
    Blocked,
    /// Anything else, with a short provider excerpt
    Other(String),
}

impl FailureReason {
    /// Text used in the failure ledger
    #[must_use]
    pub fn describe(&self) -> &str {
        match self {
            Self::NeverStarted => "Never started the bot",
            Self::Blocked => "Blocked the bot",
            Self::Other(message) => message,
        }
    }
}

/// Delivery result for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryResult {
    /// Delivered on the first attempt
    Delivered,
    /// Delivered on the single retry after a provider-requested pause
    DeliveredAfterBackoff,
    /// Not delivered
    Failed(FailureReason),
}

impl DeliveryResult {
    /// Whether the message reached the recipient
    #[inline]
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Outcome of the optional pin side effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinStatus {
    /// Job did not ask for pinning, or the message was not delivered
    #[default]
    NotRequested,
    /// Message pinned
    Pinned,
    /// Pin attempt failed; delivery is unaffected
    PinFailed,
}

/// What happened to one recipient during one job
///
/// Created once by the dispatch loop and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    recipient: RecipientId,
    label: String,
    result: DeliveryResult,
    pin: PinStatus,
}

impl DeliveryOutcome {
    /// Record an outcome for a recipient
    #[must_use]
    pub fn new(recipient: &Recipient, result: DeliveryResult, pin: PinStatus) -> Self {
        let pin = if result.is_delivered() {
            pin
        } else {
            PinStatus::NotRequested
        };
        Self {
            recipient: recipient.id.clone(),
            label: recipient.label(),
            result,
            pin,
        }
    }

    /// Failed outcome
    #[inline]
    #[must_use]
    pub fn failed(recipient: &Recipient, reason: FailureReason) -> Self {
        Self::new(recipient, DeliveryResult::Failed(reason), PinStatus::NotRequested)
    }

    /// Recipient id
    #[inline]
    #[must_use]
    pub fn recipient(&self) -> &RecipientId {
        &self.recipient
    }

    /// Recipient display label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Delivery result
    #[inline]
    #[must_use]
    pub fn result(&self) -> &DeliveryResult {
        &self.result
    }

    /// Pin result
    #[inline]
    #[must_use]
    pub fn pin(&self) -> PinStatus {
        self.pin
    }

    /// Ledger line for failed deliveries
    #[must_use]
    pub fn failure_line(&self) -> Option<String> {
        match &self.result {
            DeliveryResult::Failed(reason) => Some(format!("{}: {}", self.label, reason.describe())),
            _ => None,
        }
    }
}
