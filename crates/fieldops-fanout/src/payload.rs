//! Payload builder
//!
//! Takes what the administrator typed or attached and turns it into a
//! validated [`SendJob`]. All checks happen here, before any recipient is
//! contacted.

use fieldops_types::{
    AttachmentRef, DeliveryOptions, MediaKind, Payload, PayloadError, PollPayload, SendJob,
};

/// One attachment as received from the operator's message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttachment {
    pub kind: MediaKind,
    pub file_id: String,
}

impl RawAttachment {
    /// Create a raw attachment
    #[inline]
    #[must_use]
    pub fn new(kind: MediaKind, file_id: impl Into<String>) -> Self {
        Self {
            kind,
            file_id: file_id.into(),
        }
    }
}

/// Unvalidated content captured from the operator
///
/// Exactly one of `text`, `attachments` (with one entry) or `poll` must be
/// supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawContent {
    pub text: Option<String>,
    pub caption: Option<String>,
    pub attachments: Vec<RawAttachment>,
    pub poll: Option<PollPayload>,
}

impl RawContent {
    /// Plain text content
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Single attachment with optional caption
    #[must_use]
    pub fn media(kind: MediaKind, file_id: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            caption,
            attachments: vec![RawAttachment::new(kind, file_id)],
            ..Self::default()
        }
    }

    /// Poll content
    #[must_use]
    pub fn poll(poll: PollPayload) -> Self {
        Self {
            poll: Some(poll),
            ..Self::default()
        }
    }
}

/// Validates raw content into send jobs
#[derive(Debug, Clone, Copy)]
pub struct PayloadBuilder {
    preview_chars: usize,
}

impl PayloadBuilder {
    /// Create a builder whose previews keep `preview_chars` characters
    #[inline]
    #[must_use]
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// Validate and seal raw content
    ///
    /// Text is trimmed; blank captions are dropped.
    ///
    /// # Errors
    /// Returns [`PayloadError`] if zero or several payload shapes are
    /// present, or if the chosen shape breaks its own constraints.
    pub fn build(&self, raw: RawContent, options: DeliveryOptions) -> Result<SendJob, PayloadError> {
        let has_text = raw.text.is_some();
        let has_media = !raw.attachments.is_empty();
        let has_poll = raw.poll.is_some();
        let count = usize::from(has_text) + usize::from(has_media) + usize::from(has_poll);

        if count == 0 {
            return Err(PayloadError::NoContent);
        }
        if count > 1 {
            return Err(PayloadError::MultipleShapes { count });
        }
        if raw.attachments.len() > 1 {
            return Err(PayloadError::MultipleAttachments(raw.attachments.len()));
        }

        let caption = raw
            .caption
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if caption.is_some() && !has_media {
            return Err(PayloadError::CaptionWithoutAttachment);
        }

        let payload = if let Some(text) = raw.text {
            Payload::Text {
                text: text.trim().to_string(),
            }
        } else if let Some(poll) = raw.poll {
            Payload::Poll(poll)
        } else {
            let RawAttachment { kind, file_id } = raw
                .attachments
                .into_iter()
                .next()
                .ok_or(PayloadError::NoContent)?;
            Payload::Media {
                kind,
                attachment: AttachmentRef::new(file_id),
                caption,
            }
        };

        let job = SendJob::new(payload, options)?;
        tracing::debug!(kind = job.payload().kind_label(), "send job built");
        Ok(job)
    }

    /// Operator preview of a job's content
    #[inline]
    #[must_use]
    pub fn preview(&self, job: &SendJob) -> String {
        job.preview(self.preview_chars)
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(150)
    }
}
