//! External collaborators
//!
//! The engine reaches the outside world only through these traits:
//! - [`UserDirectory`]: read-only source of recipients
//! - [`Sender`]: the messaging provider client
//! - [`OperatorSession`]: the administrator's chat, used as an output sink

use async_trait::async_trait;
use fieldops_types::{DeliveryOptions, DirectorySnapshot, Payload, PollPayload, Recipient, RecipientId};
use std::time::Duration;

/// Provider-side handle of a delivered message, needed for pinning
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryHandle {
    /// Chat the message landed in
    pub recipient: RecipientId,
    /// Provider message id
    pub message_id: i64,
}

impl DeliveryHandle {
    /// Create a handle
    #[inline]
    #[must_use]
    pub fn new(recipient: RecipientId, message_id: i64) -> Self {
        Self {
            recipient,
            message_id,
        }
    }
}

/// Errors raised by one provider call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Provider asked the caller to pause before retrying
    #[error("flood control exceeded, retry after {}s", .retry_after.as_secs_f64())]
    Backpressure { retry_after: Duration },

    /// Delivery refused; the text is the provider's description
    #[error("{0}")]
    Delivery(String),
}

impl SendError {
    /// Backpressure signal with the given wait
    #[inline]
    #[must_use]
    pub fn backpressure(retry_after: Duration) -> Self {
        Self::Backpressure { retry_after }
    }

    /// Whether the provider asked for a pause
    #[inline]
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::Backpressure { .. })
    }
}

/// User directory errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Store unreachable or returned an error
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Operator session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Edit rejected, typically because the message changed too recently
    #[error("render rejected: {0}")]
    Rejected(String),
}

/// Read-only access to the user directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Snapshot of every known recipient
    async fn all_recipients(&self) -> Result<DirectorySnapshot, DirectoryError>;
}

/// Messaging provider client
///
/// Each call is one delivery attempt. Implementations must not retry on
/// their own; the dispatch loop owns the retry policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sender: Send + Sync {
    /// Deliver a text or media payload
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &Payload,
        options: DeliveryOptions,
    ) -> Result<DeliveryHandle, SendError>;

    /// Deliver a poll
    async fn send_poll(
        &self,
        recipient: &Recipient,
        poll: &PollPayload,
        options: DeliveryOptions,
    ) -> Result<DeliveryHandle, SendError>;

    /// Pin a delivered message
    async fn pin(&self, handle: &DeliveryHandle) -> Result<(), SendError>;
}

/// The administrator's chat
///
/// `show` replaces the content of the single status message the engine
/// owns for the job (progress updates, then the final report).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OperatorSession: Send + Sync {
    /// Replace the status message text
    async fn show(&self, text: &str) -> Result<(), SessionError>;
}
