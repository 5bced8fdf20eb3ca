//! Error types for fieldops values
//!
//! Provides the validation errors raised while building values:
//! - Payload shape and poll constraint violations
//! - Unknown recipient status strings

use crate::job::{MAX_POLL_OPTIONS, MIN_POLL_OPTIONS};

/// Payload validation errors
///
/// Always raised before dispatch starts; never mid-fanout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Nothing to send
    #[error("no content supplied")]
    NoContent,

    /// More than one of text, attachment, poll
    #[error("expected exactly one payload shape, got {count}")]
    MultipleShapes { count: usize },

    /// More than one attachment in a single job
    #[error("expected at most one attachment, got {0}")]
    MultipleAttachments(usize),

    /// Text body is blank
    #[error("text body is empty")]
    EmptyText,

    /// Caption given without an attachment to carry it
    #[error("caption supplied without an attachment")]
    CaptionWithoutAttachment,

    /// Attachment reference is blank
    #[error("attachment reference is empty")]
    EmptyAttachment,

    /// Poll question is blank
    #[error("poll question is empty")]
    EmptyQuestion,

    /// Poll option count outside the allowed range
    #[error(
        "poll needs between {} and {} options, got {count}",
        MIN_POLL_OPTIONS,
        MAX_POLL_OPTIONS
    )]
    OptionCount { count: usize },

    /// A poll option is blank
    #[error("poll option {index} is empty")]
    EmptyOption { index: usize },

    /// Quiz without a correct answer
    #[error("quiz poll requires a correct option index")]
    QuizMissingCorrectIndex,

    /// Quiz answer does not point at an option
    #[error("correct option index {index} out of range for {options} options")]
    CorrectIndexOutOfRange { index: usize, options: usize },
}

/// Unknown recipient status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown recipient status: {0}")]
pub struct ParseStatusError(pub String);
