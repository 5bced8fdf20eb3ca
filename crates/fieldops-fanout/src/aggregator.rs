//! Result aggregation
//!
//! Folds per-recipient outcomes into the final [`DeliveryReport`]. Tallies
//! are commutative, so outcomes may arrive in any order.

use fieldops_types::{
    DeliveryOptions, DeliveryOutcome, DeliveryReport, DeliveryResult, FailureReason, PinStatus,
};

/// Accumulates outcomes for one job
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    report: DeliveryReport,
    ledger_cap: usize,
    recorded: usize,
}

/// Upper bound on verbatim failure lines in a report
pub const MAX_LEDGER_LINES: usize = 10;

impl ResultAggregator {
    /// Create an aggregator for an audience of `total` recipients
    ///
    /// `ledger_cap` is clamped to [`MAX_LEDGER_LINES`].
    #[must_use]
    pub fn new(total: usize, ledger_cap: usize) -> Self {
        Self {
            report: DeliveryReport {
                total,
                ..DeliveryReport::default()
            },
            ledger_cap: ledger_cap.min(MAX_LEDGER_LINES),
            recorded: 0,
        }
    }

    /// With the targeting description shown in the report
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.report.target = target.into();
        self
    }

    /// With the job's delivery flags
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: DeliveryOptions) -> Self {
        self.report.silent = options.silent;
        self.report.pin_requested = options.pin_after_send;
        self
    }

    /// Take ownership of one outcome
    pub fn record(&mut self, outcome: DeliveryOutcome) {
        self.recorded += 1;

        match outcome.result() {
            DeliveryResult::Delivered => self.report.delivered += 1,
            DeliveryResult::DeliveredAfterBackoff => {
                self.report.delivered += 1;
                self.report.delivered_after_backoff += 1;
            }
            DeliveryResult::Failed(reason) => {
                self.report.failed += 1;
                if *reason == FailureReason::NeverStarted {
                    self.report.never_started += 1;
                }
                if self.report.failure_lines.len() < self.ledger_cap {
                    if let Some(line) = outcome.failure_line() {
                        self.report.failure_lines.push(line);
                    }
                } else {
                    self.report.overflow += 1;
                }
            }
        }

        match outcome.pin() {
            PinStatus::Pinned => self.report.pinned += 1,
            PinStatus::PinFailed => self.report.pin_failed += 1,
            PinStatus::NotRequested => {}
        }
    }

    /// Delivered so far
    #[inline]
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.report.delivered
    }

    /// Failed so far
    #[inline]
    #[must_use]
    pub fn failed(&self) -> usize {
        self.report.failed
    }

    /// Outcomes recorded so far
    #[inline]
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Produce the final report
    ///
    /// Pure: only reads the tallies gathered by [`record`](Self::record).
    #[must_use]
    pub fn finalize(self) -> DeliveryReport {
        debug_assert_eq!(self.recorded, self.report.total, "outcome count mismatch");
        self.report
    }
}
