//! Live progress reporting
//!
//! Best-effort: a failed or stalled render is logged and dropped, never
//! propagated into the dispatch loop.

use crate::provider::OperatorSession;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

const BAR_CELLS: usize = 20;

/// Longest a single render may take before it is abandoned
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Renders progress into the operator's status message
#[derive(Clone)]
pub struct ProgressReporter {
    session: Arc<dyn OperatorSession>,
    target: String,
    total: usize,
    timeout: Duration,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("target", &self.target)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    /// Create a reporter for a job of `total` recipients
    #[must_use]
    pub fn new(session: Arc<dyn OperatorSession>, target: impl Into<String>, total: usize) -> Self {
        Self {
            session,
            target: target.into(),
            total,
            timeout: RENDER_TIMEOUT,
        }
    }

    /// With a per-render time limit
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Show the initial "starting" message
    pub async fn start(&self) {
        self.show(&render_progress(&self.target, self.total, 0, 0, 0)).await;
    }

    /// Show current counts
    ///
    /// Rendering the same counts twice is harmless.
    pub async fn report(&self, sent: usize, failed: usize, processed: usize) {
        self.show(&render_progress(&self.target, self.total, sent, failed, processed))
            .await;
    }

    /// Show arbitrary text in the status message, absorbing failures
    ///
    /// Returns `false` if the render failed or timed out.
    pub async fn show(&self, text: &str) -> bool {
        match tokio::time::timeout(self.timeout, self.session.show(text)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "progress render skipped");
                false
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "progress render timed out"
                );
                false
            }
        }
    }
}

/// Render the progress message
#[must_use]
pub fn render_progress(
    target: &str,
    total: usize,
    sent: usize,
    failed: usize,
    processed: usize,
) -> String {
    let percent = if total == 0 {
        0
    } else {
        processed.min(total) * 100 / total
    };
    let filled = percent / (100 / BAR_CELLS);

    let mut out = String::new();
    out.push_str("━━━━━━━━━━━━━━━━━━━━\n📤 *SENDING BROADCAST*\n━━━━━━━━━━━━━━━━━━━━\n\n");
    let _ = writeln!(out, "🎯 Target: {target}");
    let _ = writeln!(out, "👥 Total: {total} technicians\n");

    if processed == 0 {
        out.push_str("⏳ Starting...\n");
        let _ = write!(out, "📊 Progress: 0/{total} (0%)");
        return out;
    }

    let _ = writeln!(out, "📊 Progress: {processed}/{total} ({percent}%)");
    let _ = writeln!(out, "{}{}\n", "█".repeat(filled), "░".repeat(BAR_CELLS - filled));
    let _ = writeln!(out, "✅ Sent: {sent}");
    let _ = write!(out, "❌ Failed: {failed}");
    out
}
