//! Send jobs and payloads
//!
//! A [`SendJob`] is the immutable unit handed to the dispatch loop. It can
//! only be built through [`SendJob::new`], which rejects payloads that break
//! the shape or poll constraints, so a job that exists is always dispatchable.

use crate::error::PayloadError;
use serde::{Deserialize, Serialize};

/// Fewest options a poll may carry
pub const MIN_POLL_OPTIONS: usize = 2;
/// Most options a poll may carry
pub const MAX_POLL_OPTIONS: usize = 10;

/// Attachment kinds the provider can relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Photo,
    /// Video clip
    Video,
    /// Arbitrary file
    Document,
    /// Music / audio file
    Audio,
    /// Recorded voice note
    Voice,
}

impl MediaKind {
    /// Label shown to the operator
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Photo => "Photo",
            Self::Video => "Video",
            Self::Document => "Document",
            Self::Audio => "Audio",
            Self::Voice => "Voice note",
        }
    }

    /// Whether captions of this kind get the announcement frame
    #[inline]
    #[must_use]
    pub fn framed(&self) -> bool {
        !matches!(self, Self::Voice)
    }
}

/// Provider-side reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRef(pub String);

impl AttachmentRef {
    /// Create an attachment reference
    #[inline]
    #[must_use]
    pub fn new(file_id: impl Into<String>) -> Self {
        Self(file_id.into())
    }

    /// Borrow the raw reference
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Poll definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPayload {
    /// Question text
    pub question: String,
    /// Answer options, in display order
    pub options: Vec<String>,
    /// Hide voter identities
    #[serde(default = "default_true")]
    pub anonymous: bool,
    /// Allow more than one answer
    #[serde(default)]
    pub multi_answer: bool,
    /// Quiz mode: exactly one correct answer
    #[serde(default)]
    pub quiz: bool,
    /// Index of the correct option (quiz only)
    #[serde(default)]
    pub correct_index: Option<usize>,
    /// Shown after answering (quiz only)
    #[serde(default)]
    pub explanation: Option<String>,
}

fn default_true() -> bool {
    true
}

impl PollPayload {
    /// Create a regular anonymous poll
    #[must_use]
    pub fn new<I, S>(question: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            anonymous: true,
            multi_answer: false,
            quiz: false,
            correct_index: None,
            explanation: None,
        }
    }

    /// Turn into a quiz with the given correct option
    #[inline]
    #[must_use]
    pub fn as_quiz(mut self, correct_index: Option<usize>) -> Self {
        self.quiz = true;
        self.correct_index = correct_index;
        self
    }

    /// With multiple answers allowed
    #[inline]
    #[must_use]
    pub fn with_multi_answer(mut self, multi_answer: bool) -> Self {
        self.multi_answer = multi_answer;
        self
    }

    /// With explanation
    #[inline]
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// With voter identities visible
    #[inline]
    #[must_use]
    pub fn public(mut self) -> Self {
        self.anonymous = false;
        self
    }

    /// Check poll constraints and normalize quiz-only fields
    ///
    /// Quizzes never allow multiple answers; regular polls carry no correct
    /// index or explanation.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn normalize(mut self) -> Result<Self, PayloadError> {
        if self.question.trim().is_empty() {
            return Err(PayloadError::EmptyQuestion);
        }

        let count = self.options.len();
        if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&count) {
            return Err(PayloadError::OptionCount { count });
        }
        if let Some(index) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(PayloadError::EmptyOption { index });
        }

        if self.quiz {
            let index = self
                .correct_index
                .ok_or(PayloadError::QuizMissingCorrectIndex)?;
            if index >= count {
                return Err(PayloadError::CorrectIndexOutOfRange {
                    index,
                    options: count,
                });
            }
            self.multi_answer = false;
        } else {
            self.correct_index = None;
            self.explanation = None;
        }

        Ok(self)
    }
}

/// Content of a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Plain text announcement
    Text {
        /// Body
        text: String,
    },
    /// Single attachment with optional caption
    Media {
        /// Attachment kind
        kind: MediaKind,
        /// Provider file reference
        attachment: AttachmentRef,
        /// Caption, if any
        caption: Option<String>,
    },
    /// Poll or quiz
    Poll(PollPayload),
}

impl Payload {
    /// Label shown to the operator
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Text { .. } => "Text",
            Self::Media { kind, .. } => kind.label(),
            Self::Poll(poll) if poll.quiz => "Quiz",
            Self::Poll(_) => "Poll",
        }
    }

    /// Poll definition, for poll jobs
    #[inline]
    #[must_use]
    pub fn as_poll(&self) -> Option<&PollPayload> {
        match self {
            Self::Poll(poll) => Some(poll),
            _ => None,
        }
    }

    /// Text or caption as delivered, wrapped in the announcement frame
    ///
    /// Text bodies and non-empty captions are framed; an empty caption
    /// becomes the bare header. Voice notes keep their caption unframed.
    /// Polls carry no body.
    #[must_use]
    pub fn framed_body(&self, frame: &AnnouncementFrame) -> Option<String> {
        match self {
            Self::Text { text } => Some(frame.wrap(text)),
            Self::Media { kind, caption, .. } => {
                let caption = caption.as_deref().unwrap_or_default();
                if !kind.framed() {
                    return (!caption.is_empty()).then(|| caption.to_string());
                }
                if caption.is_empty() {
                    Some(frame.header.trim().to_string())
                } else {
                    Some(frame.wrap(caption))
                }
            }
            Self::Poll(_) => None,
        }
    }

    fn validate(self) -> Result<Self, PayloadError> {
        match self {
            Self::Text { text } if text.trim().is_empty() => Err(PayloadError::EmptyText),
            Self::Media { attachment, .. } if attachment.as_str().trim().is_empty() => {
                Err(PayloadError::EmptyAttachment)
            }
            Self::Poll(poll) => poll.normalize().map(Self::Poll),
            other => Ok(other),
        }
    }
}

/// Header and footer wrapped around outgoing announcements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementFrame {
    /// Prepended to every framed body
    pub header: String,
    /// Appended to every framed body
    pub footer: String,
}

impl AnnouncementFrame {
    /// Wrap a body
    #[must_use]
    pub fn wrap(&self, body: &str) -> String {
        format!("{}{}{}", self.header, body, self.footer)
    }
}

impl Default for AnnouncementFrame {
    fn default() -> Self {
        Self {
            header: "📢 *ANNOUNCEMENT FROM ADMINISTRATION*\n━━━━━━━━━━━━━━━━━━━━\n\n".to_string(),
            footer: "\n\n━━━━━━━━━━━━━━━━━━━━".to_string(),
        }
    }
}

/// Per-job delivery flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    /// Deliver without a notification sound
    #[serde(default)]
    pub silent: bool,
    /// Pin the delivered message in the recipient's chat
    #[serde(default)]
    pub pin_after_send: bool,
}

impl DeliveryOptions {
    /// Silent delivery
    #[inline]
    #[must_use]
    pub fn silent() -> Self {
        Self {
            silent: true,
            pin_after_send: false,
        }
    }

    /// Pin after delivery
    #[inline]
    #[must_use]
    pub fn pinned() -> Self {
        Self {
            silent: false,
            pin_after_send: true,
        }
    }
}

/// Immutable broadcast job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendJob {
    payload: Payload,
    options: DeliveryOptions,
}

impl SendJob {
    /// Validate a payload and seal it into a job
    ///
    /// # Errors
    /// Returns [`PayloadError`] when the payload is blank or a poll breaks
    /// its constraints.
    pub fn new(payload: Payload, options: DeliveryOptions) -> Result<Self, PayloadError> {
        Ok(Self {
            payload: payload.validate()?,
            options,
        })
    }

    /// Payload
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Delivery options
    #[inline]
    #[must_use]
    pub fn options(&self) -> DeliveryOptions {
        self.options
    }

    /// Copy of this job as it goes out on the wire, body wrapped in `frame`
    #[must_use]
    pub fn framed(&self, frame: &AnnouncementFrame) -> Self {
        let body = self.payload.framed_body(frame);
        let payload = match &self.payload {
            Payload::Text { .. } => Payload::Text {
                text: body.unwrap_or_default(),
            },
            Payload::Media {
                kind, attachment, ..
            } => Payload::Media {
                kind: *kind,
                attachment: attachment.clone(),
                caption: body,
            },
            Payload::Poll(poll) => Payload::Poll(poll.clone()),
        };
        Self {
            payload,
            options: self.options,
        }
    }

    /// Operator-facing preview, at most `max_chars` characters plus `...`
    ///
    /// The stored payload is left untouched.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let source = match &self.payload {
            Payload::Text { text } => text.as_str(),
            Payload::Media { caption, .. } => caption
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or("(no caption)"),
            Payload::Poll(poll) => poll.question.as_str(),
        };

        if source.chars().count() > max_chars {
            let mut preview: String = source.chars().take(max_chars).collect();
            preview.push_str("...");
            preview
        } else {
            source.to_string()
        }
    }
}
