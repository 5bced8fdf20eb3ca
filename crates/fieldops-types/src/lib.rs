//! fieldops Types
//!
//! Value types shared by the broadcast fanout engine:
//! - [`Recipient`] and [`DirectorySnapshot`]: read-only view of the user directory
//! - [`TargetingRule`]: which recipients a broadcast reaches
//! - [`SendJob`] and [`Payload`]: the immutable content of one broadcast
//! - [`DeliveryOutcome`]: one record per recipient per job
//! - [`DeliveryReport`]: terminal artifact rendered to the administrator
//!
//! # Example
//!
//! ```rust
//! use fieldops_types::{DirectorySnapshot, Recipient, RecipientStatus, TargetingRule};
//!
//! let snapshot: DirectorySnapshot = vec![
//!     Recipient::new("1001", "Ana Lima").with_region("North"),
//!     Recipient::new("1002", "Rui Costa").with_status(RecipientStatus::Pending),
//! ]
//! .into_iter()
//! .collect();
//!
//! let rule = TargetingRule::ByRegion("North".to_string());
//! assert_eq!(snapshot.iter().filter(|r| rule.matches(r)).count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod job;
pub mod outcome;
pub mod recipient;
pub mod report;
pub mod targeting;

pub use error::{ParseStatusError, PayloadError};
pub use job::{
    AnnouncementFrame, AttachmentRef, DeliveryOptions, MediaKind, Payload, PollPayload, SendJob,
    MAX_POLL_OPTIONS, MIN_POLL_OPTIONS,
};
pub use outcome::{DeliveryOutcome, DeliveryResult, FailureReason, PinStatus};
pub use recipient::{DirectorySnapshot, Recipient, RecipientId, RecipientStatus};
pub use report::DeliveryReport;
pub use targeting::TargetingRule;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
