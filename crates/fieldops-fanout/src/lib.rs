//! fieldops Fanout - rate-limited broadcast engine
//!
//! Delivers one administrator announcement or poll to many technicians:
//! - Resolves a [`TargetingRule`](fieldops_types::TargetingRule) into an [`Audience`]
//! - Validates raw content into an immutable [`SendJob`](fieldops_types::SendJob)
//! - Drives one delivery per recipient through the [`RateGate`]
//! - Honors provider backpressure with a single retry
//! - Renders live progress and a final report to the operator
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldops_fanout::{Broadcaster, FanoutConfig, RawContent};
//! use fieldops_types::{DeliveryOptions, TargetingRule};
//!
//! # async fn example(directory: std::sync::Arc<dyn fieldops_fanout::UserDirectory>,
//! #                  sender: std::sync::Arc<dyn fieldops_fanout::Sender>,
//! #                  session: std::sync::Arc<dyn fieldops_fanout::OperatorSession>)
//! #     -> Result<(), fieldops_fanout::FanoutError> {
//! let broadcaster = Broadcaster::new(FanoutConfig::default(), directory, sender);
//!
//! let draft = broadcaster.draft(RawContent::text("Team meeting at 8am"), DeliveryOptions::default())?;
//! let report = draft.confirm(TargetingRule::All, session).await?;
//! println!("delivered {} of {}", report.delivered, report.total);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregator;
pub mod audience;
pub mod broadcast;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod payload;
pub mod progress;
pub mod provider;
pub mod rate_gate;

pub use aggregator::{ResultAggregator, MAX_LEDGER_LINES};
pub use audience::{resolve, summarize, Audience, AudienceSummary, RegionBreakdown};
pub use broadcast::{render_empty_audience, BroadcastDraft, Broadcaster};
pub use classify::{classify, excerpt};
pub use config::{FanoutConfig, PREVIEW_CHARS};
pub use dispatch::Dispatcher;
pub use error::{ConfigError, FanoutError, GateError};
pub use payload::{PayloadBuilder, RawAttachment, RawContent};
pub use progress::{render_progress, ProgressReporter, RENDER_TIMEOUT};
pub use provider::{
    DeliveryHandle, DirectoryError, OperatorSession, SendError, Sender, SessionError,
    UserDirectory,
};
pub use rate_gate::{GateStats, RateGate, RatePermit};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running a broadcast
    pub use crate::{
        Audience, BroadcastDraft, Broadcaster, FanoutConfig, FanoutError, OperatorSession,
        RawContent, Sender, UserDirectory,
    };
    pub use fieldops_types::{DeliveryOptions, DeliveryReport, SendJob, TargetingRule};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
