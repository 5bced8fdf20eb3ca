//! End-to-end broadcast tests against scripted collaborators
//!
//! Run with: cargo test --package fieldops-fanout --test broadcast_tests

use fieldops_fanout::prelude::*;
use fieldops_fanout::{FanoutError, RawContent};
use fieldops_test_utils::{
    active_team, team_with_statuses, RecordingSession, Reply, ScriptedSender, StaticDirectory,
};
use fieldops_types::{MediaKind, Payload, PollPayload, RecipientStatus};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    directory: Arc<StaticDirectory>,
    sender: Arc<ScriptedSender>,
    session: Arc<RecordingSession>,
    broadcaster: Broadcaster,
}

fn harness(config: FanoutConfig, snapshot: fieldops_types::DirectorySnapshot, sender: ScriptedSender) -> Harness {
    let directory = Arc::new(StaticDirectory::new(snapshot));
    let sender = Arc::new(sender);
    let broadcaster = Broadcaster::new(config, directory.clone(), sender.clone());
    Harness {
        directory,
        sender,
        session: Arc::new(RecordingSession::new()),
        broadcaster,
    }
}

impl Harness {
    async fn send(&self, raw: RawContent, options: DeliveryOptions, rule: TargetingRule) -> Result<DeliveryReport, FanoutError> {
        let draft = self.broadcaster.draft(raw, options)?;
        draft.confirm(rule, self.session.clone()).await
    }
}

#[tokio::test(start_paused = true)]
async fn active_only_skips_blocked_and_classifies_failure() {
    let snapshot = team_with_statuses(&[
        RecipientStatus::Active,
        RecipientStatus::Active,
        RecipientStatus::Blocked,
    ]);
    let sender = ScriptedSender::new().script("1", [Reply::Fail("Forbidden: bot was blocked by the user".to_string())]);
    let h = harness(FanoutConfig::default(), snapshot, sender);

    let report = h
        .send(
            RawContent::text("Truck inspection today"),
            DeliveryOptions::default(),
            TargetingRule::ByStatus(RecipientStatus::Active),
        )
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.never_started, 0);
    assert!(h.sender.calls_to("2").is_empty());
    assert_eq!(report.failure_lines, vec!["Tech 1: Blocked the bot".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn backpressure_waits_provider_duration_once() {
    let sender = ScriptedSender::new().script("0", [Reply::Backpressure(Duration::from_secs(2)), Reply::Ok]);
    let h = harness(FanoutConfig::default(), active_team(1), sender);

    let report = h
        .send(RawContent::text("hello"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(report.delivered_after_backoff, 1);

    let calls = h.sender.calls_to("0");
    assert_eq!(calls.len(), 2);
    let gap = calls[1].at - calls[0].at;
    assert!(gap >= Duration::from_secs(2));
    assert!(gap < Duration::from_millis(2100), "extra client backoff added: {gap:?}");
    assert!(h.session.last().unwrap().contains("Delivered after backoff: 1"));
}

#[tokio::test(start_paused = true)]
async fn thirty_seven_failures_are_capped_in_ledger() {
    let mut sender = ScriptedSender::new();
    for i in 3..40 {
        sender = sender.script(&i.to_string(), [Reply::Fail("Bad Request: message text is empty".to_string())]);
    }
    let h = harness(FanoutConfig::default(), active_team(40), sender);

    let report = h
        .send(RawContent::text("hi"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap();

    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, 37);
    assert_eq!(report.failure_lines.len(), 10);
    assert_eq!(report.overflow, 27);

    let rendered = h.session.last().unwrap();
    assert!(rendered.contains("First 10 failures"));
    assert!(rendered.contains("...and 27 more failures"));
}

#[tokio::test]
async fn empty_audience_contacts_nobody() {
    let h = harness(FanoutConfig::default(), active_team(3), ScriptedSender::new());

    let err = h
        .send(
            RawContent::text("hello"),
            DeliveryOptions::default(),
            TargetingRule::ByStatus(RecipientStatus::Pending),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FanoutError::EmptyAudience { .. }));
    assert!(h.sender.calls().is_empty());
    assert_eq!(h.session.shown().len(), 1);
    assert!(h.session.shown()[0].contains("No technicians found"));
}

#[tokio::test]
async fn quiz_without_answer_contacts_nobody() {
    let h = harness(FanoutConfig::default(), active_team(3), ScriptedSender::new());

    let raw = RawContent::poll(PollPayload::new("Max bend radius?", ["10x", "20x"]).as_quiz(None));
    let err = h.send(raw, DeliveryOptions::default(), TargetingRule::All).await.unwrap_err();

    assert!(matches!(err, FanoutError::InvalidPayload(_)));
    assert!(h.sender.calls().is_empty());
    assert_eq!(h.directory.reads(), 0);
    assert!(h.session.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn in_flight_never_exceeds_pool() {
    let config = FanoutConfig::default()
        .with_max_in_flight(4)
        .with_sends_per_second(1000);
    let sender = ScriptedSender::new().with_latency(Duration::from_millis(500));
    let h = harness(config, active_team(20), sender);

    let report = h
        .send(RawContent::text("hi"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap();

    assert_eq!(report.delivered, 20);
    assert!(h.sender.peak_in_flight() <= 4);
    assert!(h.sender.peak_in_flight() > 1);
}

#[tokio::test(start_paused = true)]
async fn sends_respect_minimum_spacing() {
    let h = harness(FanoutConfig::default(), active_team(6), ScriptedSender::new());

    h.send(RawContent::text("hi"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap();

    let mut times: Vec<_> = h.sender.calls().into_iter().map(|c| c.at).collect();
    times.sort();
    assert_eq!(times.len(), 6);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(50));
    }
}

#[tokio::test(start_paused = true)]
async fn pin_failure_is_independent_of_delivery() {
    let sender = ScriptedSender::new().fail_pin("1");
    let h = harness(FanoutConfig::default(), active_team(3), sender);

    let report = h
        .send(RawContent::text("Pinned notice"), DeliveryOptions::pinned(), TargetingRule::All)
        .await
        .unwrap();

    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.pinned, 2);
    assert_eq!(report.pin_failed, 1);
    assert_eq!(h.sender.pins().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn polls_go_through_send_poll_without_framing() {
    let h = harness(FanoutConfig::default(), active_team(2), ScriptedSender::new());
    let poll = PollPayload::new("Which shift?", ["Morning", "Night"]);

    let report = h
        .send(RawContent::poll(poll.clone()), DeliveryOptions::silent(), TargetingRule::All)
        .await
        .unwrap();

    assert_eq!(report.delivered, 2);
    assert!(report.silent);
    for call in h.sender.calls() {
        assert_eq!(call.payload, None);
        assert_eq!(call.poll.as_ref(), Some(&poll));
        assert!(call.options.silent);
    }
}

#[tokio::test(start_paused = true)]
async fn media_captions_are_framed() {
    let h = harness(FanoutConfig::default(), active_team(1), ScriptedSender::new());

    h.send(
        RawContent::media(MediaKind::Photo, "AgADBAAD", Some("New splice layout".to_string())),
        DeliveryOptions::default(),
        TargetingRule::All,
    )
    .await
    .unwrap();

    let calls = h.sender.calls();
    match calls[0].payload.as_ref() {
        Some(Payload::Media { caption: Some(caption), .. }) => {
            assert!(caption.starts_with("📢 *ANNOUNCEMENT FROM ADMINISTRATION*"));
            assert!(caption.contains("New splice layout"));
        }
        other => panic!("expected framed media, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn progress_cadence_and_final_report() {
    let config = FanoutConfig::default().with_sends_per_second(1000);
    let h = harness(config, active_team(25), ScriptedSender::new());

    h.send(RawContent::text("hi"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap();

    let shown = h.session.shown();
    // start, 10, 20, 25, final report
    assert_eq!(shown.len(), 5);
    assert!(shown[0].contains("Starting"));
    assert!(shown[1].contains("Progress: 10/25"));
    assert!(shown[3].contains("Progress: 25/25 (100%)"));
    assert!(shown[4].contains("BROADCAST COMPLETE"));
}

#[tokio::test(start_paused = true)]
async fn never_started_gets_actionable_hint() {
    let sender = ScriptedSender::new()
        .script("0", [Reply::Fail("Bad Request: chat not found".to_string())])
        .script("1", [Reply::Fail("Forbidden: bot can't initiate conversation with a user".to_string())]);
    let h = harness(FanoutConfig::default(), active_team(3), sender);

    let report = h
        .send(RawContent::text("hi"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap();

    assert_eq!(report.never_started, 2);
    assert!(h.session.last().unwrap().contains("/start"));
}

#[tokio::test(start_paused = true)]
async fn rejected_renders_do_not_fail_the_job() {
    let directory = Arc::new(StaticDirectory::new(active_team(4)));
    let sender = Arc::new(ScriptedSender::new());
    let broadcaster = Broadcaster::new(FanoutConfig::default(), directory, sender.clone());

    let report = broadcaster
        .draft(RawContent::text("hi"), DeliveryOptions::default())
        .unwrap()
        .confirm(TargetingRule::All, Arc::new(RecordingSession::rejecting()))
        .await
        .unwrap();

    assert_eq!(report.delivered, 4);
    assert_eq!(sender.calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn hard_failure_on_retry_is_not_reclassified() {
    let sender = ScriptedSender::new().script(
        "0",
        [
            Reply::Backpressure(Duration::from_secs(1)),
            Reply::Fail("Forbidden: bot was blocked by the user".to_string()),
        ],
    );
    let h = harness(FanoutConfig::default(), active_team(1), sender);

    let report = h
        .send(RawContent::text("hi"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap();

    assert_eq!(h.sender.calls_to("0").len(), 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.never_started, 0);
    assert_eq!(report.delivered_after_backoff, 0);
    assert_eq!(
        report.failure_lines,
        vec!["Tech 0: Forbidden: bot was blocked by the user".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_operator_session_does_not_delay_delivery() {
    let config = FanoutConfig::default().with_sends_per_second(1000);
    let sender = ScriptedSender::new().with_latency(Duration::from_millis(100));
    let directory = Arc::new(StaticDirectory::new(active_team(40)));
    let sender = Arc::new(sender);
    let broadcaster = Broadcaster::new(config, directory, sender.clone());
    let session = Arc::new(RecordingSession::new().with_delay(Duration::from_secs(5)));

    let begin = tokio::time::Instant::now();
    let report = broadcaster
        .draft(RawContent::text("hi"), DeliveryOptions::default())
        .unwrap()
        .confirm(TargetingRule::All, session.clone())
        .await
        .unwrap();

    assert_eq!(report.delivered, 40);
    let last_send = sender.calls().iter().map(|c| c.at).max().unwrap();
    assert!(last_send - begin < Duration::from_secs(1));

    let shown = session.shown();
    assert!(shown[0].contains("Starting"));
    assert!(shown.iter().any(|text| text.contains("Progress: 40/40 (100%)")));
    assert!(shown.last().unwrap().contains("BROADCAST COMPLETE"));
}

#[tokio::test]
async fn oversized_config_bounds_are_rejected() {
    assert!(FanoutConfig::from_toml_str("ledger_cap = 50").is_err());
    assert!(FanoutConfig::from_toml_str("preview_chars = 5000").is_err());

    let mut config = FanoutConfig::default();
    config.ledger_cap = 50;
    let h = harness(config, active_team(3), ScriptedSender::new());
    let err = h
        .send(RawContent::text("hi"), DeliveryOptions::default(), TargetingRule::All)
        .await
        .unwrap_err();
    assert!(matches!(err, FanoutError::Config(_)));
    assert!(h.sender.calls().is_empty());
}
