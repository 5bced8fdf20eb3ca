//! Final delivery report

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Terminal artifact of one broadcast job
///
/// `delivered + failed == total` holds for every finalized report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Targeting description
    pub target: String,
    /// Recipients in the resolved audience
    pub total: usize,
    /// Delivered, with or without backoff
    pub delivered: usize,
    /// Subset of `delivered` that needed the retry after backoff
    pub delivered_after_backoff: usize,
    /// Not delivered
    pub failed: usize,
    /// Subset of `failed` that never opened a chat with the bot
    pub never_started: usize,
    /// Messages pinned
    pub pinned: usize,
    /// Pin attempts that failed
    pub pin_failed: usize,
    /// First failure lines, verbatim
    pub failure_lines: Vec<String>,
    /// Failures not listed in `failure_lines`
    pub overflow: usize,
    /// Job asked for pinning
    pub pin_requested: bool,
    /// Job was sent silently
    pub silent: bool,
}

impl DeliveryReport {
    /// Whole-percent success rate
    #[must_use]
    pub fn success_rate(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.delivered * 100 / self.total
        }
    }

    /// Tallies add up
    #[inline]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.delivered + self.failed == self.total
            && self.failure_lines.len() + self.overflow == self.failed
    }

    /// Render the report for the administrator's chat
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("━━━━━━━━━━━━━━━━━━━━\n✅ *BROADCAST COMPLETE*\n━━━━━━━━━━━━━━━━━━━━\n\n");
        let _ = writeln!(out, "🎯 *Target:* {}\n", self.target);
        out.push_str("📊 *Statistics:*\n");
        let _ = writeln!(out, "✅ Delivered: {}", self.delivered);
        let _ = writeln!(out, "❌ Failed: {}", self.failed);
        let _ = writeln!(out, "👥 Total targeted: {}", self.total);
        let _ = writeln!(out, "📈 Success rate: {}%", self.success_rate());

        if self.delivered_after_backoff > 0 {
            let _ = writeln!(out, "⏳ Delivered after backoff: {}", self.delivered_after_backoff);
        }
        if self.pin_requested {
            if self.pin_failed > 0 {
                let _ = writeln!(out, "📌 Pinned: {} ({} failed)", self.pinned, self.pin_failed);
            } else {
                let _ = writeln!(out, "📌 Pinned: {}", self.pinned);
            }
        }
        if self.silent {
            out.push_str("🔕 Mode: silent\n");
        }

        if self.never_started > 0 {
            out.push_str("\n⚠️ *Attention:*\n");
            let _ = writeln!(
                out,
                "📱 {} recipient(s) never started a chat with the bot.",
                self.never_started
            );
            out.push_str("💡 _Ask them to send /start to the bot first._\n");
        }

        if !self.failure_lines.is_empty() {
            if self.overflow == 0 {
                out.push_str("\n❌ *Failures:*\n");
            } else {
                let _ = writeln!(out, "\n❌ *First {} failures:*", self.failure_lines.len());
            }
            for line in &self.failure_lines {
                let _ = writeln!(out, "  • {line}");
            }
            if self.overflow > 0 {
                let _ = write!(out, "\n_...and {} more failures_", self.overflow);
            }
        }

        out
    }
}
