//! Dispatch loop
//!
//! Drives one delivery per recipient. Per recipient:
//!
//! ```text
//! Pending ──send ok──────────────────────────▶ Sent (Delivered)
//! Pending ──backpressure──▶ Backoff ──retry ok▶ Sent (DeliveredAfterBackoff)
//!                           Backoff ──retry err▶ Failed(Other)
//! Pending ──hard error───────────────────────▶ Failed(Blocked | NeverStarted | Other)
//! ```
//!
//! Per-recipient failures are recorded and never abort the job. Once
//! started, the loop always runs to the end of the audience.

use crate::aggregator::ResultAggregator;
use crate::audience::Audience;
use crate::classify::{classify, excerpt};
use crate::config::FanoutConfig;
use crate::error::GateError;
use crate::progress::ProgressReporter;
use crate::provider::{SendError, Sender};
use crate::rate_gate::RateGate;
use fieldops_types::{
    DeliveryOutcome, DeliveryReport, DeliveryResult, FailureReason, Payload, PinStatus, Recipient,
    SendJob,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

/// Counts published to the progress renderer
#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    sent: usize,
    failed: usize,
    processed: usize,
}

/// Runs send jobs against a provider
pub struct Dispatcher {
    config: FanoutConfig,
    sender: Arc<dyn Sender>,
    gate: Arc<RateGate>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with its own rate gate
    #[must_use]
    pub fn new(config: FanoutConfig, sender: Arc<dyn Sender>) -> Self {
        let gate = Arc::new(RateGate::per_second(
            config.max_in_flight,
            config.sends_per_second,
        ));
        Self::with_gate(config, sender, gate)
    }

    /// Create a dispatcher sharing an existing rate gate
    #[must_use]
    pub fn with_gate(config: FanoutConfig, sender: Arc<dyn Sender>, gate: Arc<RateGate>) -> Self {
        Self {
            config,
            sender,
            gate,
        }
    }

    /// Rate gate used by this dispatcher
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    /// Deliver a job to every recipient of an audience
    ///
    /// Up to `max_in_flight` deliveries run concurrently; the rate gate
    /// bounds both concurrency and spacing. Progress is published every
    /// `progress_every` processed recipients and after the last one.
    ///
    /// Renders run beside the deliveries, never in front of them: counts
    /// published while a render is pending are coalesced into the next one.
    /// The call returns once the last published counts have been rendered.
    pub async fn run(
        &self,
        job: &SendJob,
        audience: &Audience,
        progress: &ProgressReporter,
    ) -> DeliveryReport {
        let total = audience.len();
        let every = self.config.progress_every.max(1);
        let (counts, mut latest) = watch::channel(Counts::default());

        tracing::info!(
            recipients = total,
            kind = job.payload().kind_label(),
            rule = %audience.rule(),
            "dispatch started"
        );

        let deliveries = async move {
            let mut aggregator = ResultAggregator::new(total, self.config.ledger_cap)
                .with_target(audience.rule().describe())
                .with_options(job.options());
            let mut outcomes = stream::iter(audience.iter())
                .map(|recipient| self.deliver(job, recipient))
                .buffer_unordered(self.config.max_in_flight.max(1));

            while let Some(outcome) = outcomes.next().await {
                aggregator.record(outcome);
                let processed = aggregator.recorded();
                if processed % every == 0 || processed == total {
                    counts.send_replace(Counts {
                        sent: aggregator.delivered(),
                        failed: aggregator.failed(),
                        processed,
                    });
                }
            }
            drop(counts);
            aggregator.finalize()
        };

        let renders = async move {
            progress.start().await;
            while latest.changed().await.is_ok() {
                let Counts {
                    sent,
                    failed,
                    processed,
                } = *latest.borrow_and_update();
                progress.report(sent, failed, processed).await;
            }
        };

        let (report, ()) = tokio::join!(deliveries, renders);
        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            never_started = report.never_started,
            "dispatch finished"
        );
        report
    }

    /// Deliver a job to one recipient
    pub async fn deliver(&self, job: &SendJob, recipient: &Recipient) -> DeliveryOutcome {
        let outcome = match self.attempt(job, recipient).await {
            Ok(pin) => DeliveryOutcome::new(recipient, DeliveryResult::Delivered, pin),
            Err(AttemptError::Send(SendError::Backpressure { retry_after })) => {
                tracing::warn!(
                    recipient = %recipient.id,
                    retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    "provider backpressure, pausing before single retry"
                );
                tokio::time::sleep(retry_after).await;

                match self.attempt(job, recipient).await {
                    Ok(pin) => {
                        DeliveryOutcome::new(recipient, DeliveryResult::DeliveredAfterBackoff, pin)
                    }
                    Err(e) => DeliveryOutcome::failed(
                        recipient,
                        FailureReason::Other(excerpt(&e.to_string(), self.config.error_excerpt_chars)),
                    ),
                }
            }
            Err(AttemptError::Send(SendError::Delivery(message))) => DeliveryOutcome::failed(
                recipient,
                classify(&message, self.config.error_excerpt_chars),
            ),
            Err(AttemptError::Gate(e)) => {
                tracing::error!(recipient = %recipient.id, error = %e, "no permit, provider not contacted");
                DeliveryOutcome::failed(recipient, FailureReason::Other(e.to_string()))
            }
        };

        tracing::debug!(recipient = %recipient.id, result = ?outcome.result(), "recipient processed");
        outcome
    }

    /// One gated provider call, plus the pin side effect on success
    ///
    /// The permit is held for the send and the pin and released on every
    /// path when it goes out of scope.
    async fn attempt(&self, job: &SendJob, recipient: &Recipient) -> Result<PinStatus, AttemptError> {
        let permit = self.gate.acquire().await?;

        let options = job.options();
        let handle = match job.payload() {
            Payload::Poll(poll) => self.sender.send_poll(recipient, poll, options).await?,
            payload => self.sender.send(recipient, payload, options).await?,
        };

        let pin = if options.pin_after_send {
            match self.sender.pin(&handle).await {
                Ok(()) => PinStatus::Pinned,
                Err(e) => {
                    tracing::warn!(recipient = %recipient.id, error = %e, "pin failed");
                    PinStatus::PinFailed
                }
            }
        } else {
            PinStatus::NotRequested
        };

        permit.release();
        Ok(pin)
    }
}

/// Why one attempt produced no delivery
///
/// A gate refusal never reaches the provider, so it is neither retried nor
/// classified.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Send(#[from] SendError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audience::resolve;
    use crate::provider::{
        DeliveryHandle, MockOperatorSession, MockSender, OperatorSession, SessionError,
    };
    use fieldops_types::{
        DeliveryOptions, DirectorySnapshot, PollPayload, RecipientStatus, TargetingRule,
    };
    use std::time::Duration;
    use tokio::time::Instant;

    fn quiet_session() -> Arc<MockOperatorSession> {
        let mut session = MockOperatorSession::new();
        session.expect_show().returning(|_| Ok(()));
        Arc::new(session)
    }

    fn handle(recipient: &Recipient) -> DeliveryHandle {
        DeliveryHandle::new(recipient.id.clone(), 1)
    }

    fn text_job(options: DeliveryOptions) -> SendJob {
        SendJob::new(
            Payload::Text {
                text: "Meeting at 8".to_string(),
            },
            options,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_recipient_scenario() {
        let snapshot: DirectorySnapshot = vec![
            Recipient::new("a", "Ana"),
            Recipient::new("b", "Bia"),
            Recipient::new("c", "Caio").with_status(RecipientStatus::Blocked),
        ]
        .into_iter()
        .collect();
        let audience = resolve(&TargetingRule::ByStatus(RecipientStatus::Active), &snapshot).unwrap();

        let mut sender = MockSender::new();
        sender.expect_send().times(2).returning(|recipient, _, _| {
            if recipient.id.as_str() == "a" {
                Ok(handle(recipient))
            } else {
                Err(SendError::Delivery("Forbidden: bot was blocked by the user".to_string()))
            }
        });

        let dispatcher = Dispatcher::new(FanoutConfig::default(), Arc::new(sender));
        let progress = ProgressReporter::new(quiet_session(), "Status: active", audience.len());
        let report = dispatcher.run(&text_job(DeliveryOptions::default()), &audience, &progress).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.never_started, 0);
        assert_eq!(report.failure_lines, vec!["Bia: Blocked the bot".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn backpressure_then_success() {
        let mut sender = MockSender::new();
        let mut seq = mockall::Sequence::new();
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(SendError::backpressure(Duration::from_secs(2))));
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|recipient, _, _| Ok(handle(recipient)));

        let dispatcher = Dispatcher::new(FanoutConfig::default(), Arc::new(sender));
        let start = Instant::now();
        let outcome = dispatcher
            .deliver(&text_job(DeliveryOptions::default()), &Recipient::new("1", "Ana"))
            .await;

        assert_eq!(outcome.result(), &DeliveryResult::DeliveredAfterBackoff);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn second_failure_is_terminal() {
        let mut sender = MockSender::new();
        let mut seq = mockall::Sequence::new();
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(SendError::backpressure(Duration::from_secs(1))));
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(SendError::backpressure(Duration::from_secs(30))));

        let dispatcher = Dispatcher::new(FanoutConfig::default(), Arc::new(sender));
        let start = Instant::now();
        let outcome = dispatcher
            .deliver(&text_job(DeliveryOptions::default()), &Recipient::new("1", "Ana"))
            .await;

        match outcome.result() {
            DeliveryResult::Failed(FailureReason::Other(msg)) => {
                assert!(msg.starts_with("flood control exceeded"));
            }
            other => panic!("expected Failed(Other), got {other:?}"),
        }
        // The second signal is not honored with another pause.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn pin_failure_does_not_change_delivery() {
        let mut sender = MockSender::new();
        sender.expect_send().returning(|recipient, _, _| Ok(handle(recipient)));
        sender
            .expect_pin()
            .times(1)
            .returning(|_| Err(SendError::Delivery("not enough rights".to_string())));

        let dispatcher = Dispatcher::new(FanoutConfig::default(), Arc::new(sender));
        let outcome = dispatcher
            .deliver(&text_job(DeliveryOptions::pinned()), &Recipient::new("1", "Ana"))
            .await;

        assert_eq!(outcome.result(), &DeliveryResult::Delivered);
        assert_eq!(outcome.pin(), PinStatus::PinFailed);
        assert_eq!(dispatcher.gate().stats().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_jobs_use_send_poll_and_retry_uniformly() {
        let mut sender = MockSender::new();
        sender.expect_send().never();
        let mut seq = mockall::Sequence::new();
        sender
            .expect_send_poll()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(SendError::backpressure(Duration::from_millis(500))));
        sender
            .expect_send_poll()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, poll: &PollPayload, _| poll.options.len() == 3)
            .returning(|recipient, _, _| Ok(handle(recipient)));

        let job = SendJob::new(
            Payload::Poll(PollPayload::new("Shift?", ["Morning", "Afternoon", "Night"])),
            DeliveryOptions::default(),
        )
        .unwrap();
        let dispatcher = Dispatcher::new(FanoutConfig::default(), Arc::new(sender));
        let outcome = dispatcher.deliver(&job, &Recipient::new("1", "Ana")).await;

        assert_eq!(outcome.result(), &DeliveryResult::DeliveredAfterBackoff);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_every_ten_and_last() {
        let snapshot: DirectorySnapshot = (0..25)
            .map(|i| Recipient::new(i.to_string(), format!("Tech {i}")))
            .collect();
        let audience = resolve(&TargetingRule::All, &snapshot).unwrap();

        let mut sender = MockSender::new();
        sender.expect_send().returning(|recipient, _, _| Ok(handle(recipient)));

        // start, 10, 20, 25
        let mut session = MockOperatorSession::new();
        session.expect_show().times(4).returning(|_| Ok(()));

        let dispatcher = Dispatcher::new(
            FanoutConfig::default().with_sends_per_second(1000),
            Arc::new(sender),
        );
        let progress = ProgressReporter::new(Arc::new(session), "All technicians", audience.len());
        let report = dispatcher.run(&text_job(DeliveryOptions::default()), &audience, &progress).await;

        assert_eq!(report.delivered, 25);
        assert!(report.is_consistent());
    }

    #[tokio::test(start_paused = true)]
    async fn hard_failure_after_backoff_is_other() {
        let snapshot: DirectorySnapshot = std::iter::once(Recipient::new("1", "Ana")).collect();
        let audience = resolve(&TargetingRule::All, &snapshot).unwrap();

        let mut sender = MockSender::new();
        let mut seq = mockall::Sequence::new();
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(SendError::backpressure(Duration::from_secs(1))));
        sender
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Err(SendError::Delivery("Forbidden: bot was blocked by the user".to_string()))
            });

        let dispatcher = Dispatcher::new(FanoutConfig::default(), Arc::new(sender));
        let job = text_job(DeliveryOptions::default());
        let outcome = dispatcher.deliver(&job, &audience.recipients()[0]).await;
        match outcome.result() {
            DeliveryResult::Failed(FailureReason::Other(msg)) => {
                assert_eq!(msg, "Forbidden: bot was blocked by the user");
            }
            other => panic!("expected Failed(Other), got {other:?}"),
        }

        let mut aggregator = ResultAggregator::new(1, 10);
        aggregator.record(outcome);
        let report = aggregator.finalize();
        assert_eq!(report.failed, 1);
        assert_eq!(report.never_started, 0);
        assert_eq!(report.failure_lines, vec!["Ana: Forbidden: bot was blocked by the user".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_gate_fails_without_provider_call() {
        let mut sender = MockSender::new();
        sender.expect_send().never();

        let dispatcher = Dispatcher::new(FanoutConfig::default(), Arc::new(sender));
        dispatcher.gate().close();
        let outcome = dispatcher
            .deliver(&text_job(DeliveryOptions::default()), &Recipient::new("1", "Ana"))
            .await;

        assert_eq!(
            outcome.result(),
            &DeliveryResult::Failed(FailureReason::Other("rate gate closed".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_renders_do_not_hold_back_sends() {
        struct SlowSession;

        #[async_trait::async_trait]
        impl OperatorSession for SlowSession {
            async fn show(&self, _text: &str) -> Result<(), SessionError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }

        let snapshot: DirectorySnapshot = (0..40)
            .map(|i| Recipient::new(i.to_string(), format!("Tech {i}")))
            .collect();
        let audience = resolve(&TargetingRule::All, &snapshot).unwrap();

        let started = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&started);
        let mut sender = MockSender::new();
        sender.expect_send().times(40).returning(move |recipient, _, _| {
            log.lock().unwrap().push(Instant::now());
            Ok(handle(recipient))
        });

        let dispatcher = Dispatcher::new(
            FanoutConfig::default().with_sends_per_second(1000),
            Arc::new(sender),
        );
        let progress = ProgressReporter::new(Arc::new(SlowSession), "All technicians", audience.len());
        let begin = Instant::now();
        let report = dispatcher.run(&text_job(DeliveryOptions::default()), &audience, &progress).await;

        assert_eq!(report.delivered, 40);
        let last_send = *started.lock().unwrap().iter().max().unwrap();
        assert!(last_send - begin < Duration::from_secs(1));
        // start render, then one coalesced render of the final counts
        assert!(begin.elapsed() < Duration::from_secs(11));
    }
}
