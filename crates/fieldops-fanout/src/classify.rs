//! Failure classification
//!
//! Maps provider error text onto the failure taxonomy. The provider only
//! reports free text, so classification is substring based and
//! case-insensitive.

use fieldops_types::FailureReason;

const BLOCKED_MARKERS: &[&str] = &["bot was blocked", "user is deactivated"];
const NEVER_STARTED_MARKERS: &[&str] = &["chat not found", "bot can't initiate conversation"];

/// Classify a hard delivery failure
///
/// Unrecognized text becomes [`FailureReason::Other`] with at most
/// `excerpt_chars` characters of the original message.
#[must_use]
pub fn classify(message: &str, excerpt_chars: usize) -> FailureReason {
    let lowered = message.to_lowercase();
    if BLOCKED_MARKERS.iter().any(|m| lowered.contains(m)) {
        FailureReason::Blocked
    } else if NEVER_STARTED_MARKERS.iter().any(|m| lowered.contains(m)) {
        FailureReason::NeverStarted
    } else {
        FailureReason::Other(excerpt(message, excerpt_chars))
    }
}

/// First `max_chars` characters of a message
#[must_use]
pub fn excerpt(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}
