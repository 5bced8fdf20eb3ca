//! Broadcast orchestration
//!
//! The administrator flow, end to end:
//!
//! ```text
//! draft(raw) ──▶ BroadcastDraft ──cancel──▶ (nobody contacted)
//!                     │
//!                     └──confirm(rule)──▶ resolve ──▶ dispatch ──▶ report
//! ```
//!
//! Nothing touches a recipient before `confirm`.

use crate::audience::{resolve, summarize, AudienceSummary};
use crate::config::FanoutConfig;
use crate::dispatch::Dispatcher;
use crate::error::FanoutError;
use crate::payload::{PayloadBuilder, RawContent};
use crate::progress::ProgressReporter;
use crate::provider::{OperatorSession, Sender, UserDirectory};
use fieldops_types::{DeliveryOptions, DeliveryReport, SendJob, TargetingRule};
use std::fmt::Write as _;
use std::sync::Arc;

/// Entry point for administrator broadcasts
#[derive(Clone)]
pub struct Broadcaster {
    config: FanoutConfig,
    directory: Arc<dyn UserDirectory>,
    sender: Arc<dyn Sender>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    /// Create a broadcaster
    #[must_use]
    pub fn new(
        config: FanoutConfig,
        directory: Arc<dyn UserDirectory>,
        sender: Arc<dyn Sender>,
    ) -> Self {
        Self {
            config,
            directory,
            sender,
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    /// Directory overview for the confirmation screen
    ///
    /// # Errors
    /// Returns [`FanoutError::Directory`] if the directory cannot be read.
    pub async fn summary(&self) -> Result<AudienceSummary, FanoutError> {
        let snapshot = self.directory.all_recipients().await?;
        Ok(summarize(&snapshot))
    }

    /// Validate operator content into a draft awaiting confirmation
    ///
    /// # Errors
    /// Returns [`FanoutError::InvalidPayload`] if the content is rejected,
    /// or [`FanoutError::Config`] if the configuration is invalid.
    pub fn draft(
        &self,
        raw: RawContent,
        options: DeliveryOptions,
    ) -> Result<BroadcastDraft, FanoutError> {
        self.config.validate()?;
        let builder = PayloadBuilder::new(self.config.preview_chars);
        let job = builder.build(raw, options)?;
        Ok(BroadcastDraft {
            preview: builder.preview(&job),
            job,
            broadcaster: self.clone(),
        })
    }

    /// Resolve, dispatch and report an already-built job
    ///
    /// The final report (or the empty-audience notice) is always rendered
    /// to `session`. Render failures and stalls are logged and do not fail
    /// the job.
    ///
    /// # Errors
    /// Returns [`FanoutError::EmptyAudience`] if the rule matches nobody,
    /// and [`FanoutError::Directory`] if the directory cannot be read.
    pub async fn execute(
        &self,
        job: &SendJob,
        rule: TargetingRule,
        session: Arc<dyn OperatorSession>,
    ) -> Result<DeliveryReport, FanoutError> {
        let snapshot = self.directory.all_recipients().await?;
        let audience = match resolve(&rule, &snapshot) {
            Ok(audience) => audience,
            Err(e @ FanoutError::EmptyAudience { .. }) => {
                tracing::info!(rule = %rule, "no recipients matched, nothing sent");
                let notice = ProgressReporter::new(session, rule.describe(), 0);
                if !notice.show(&render_empty_audience(&rule)).await {
                    tracing::debug!("empty-audience notice not shown");
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let progress = ProgressReporter::new(session, rule.describe(), audience.len());
        let wire = job.framed(&self.config.frame);
        let dispatcher = Dispatcher::new(self.config.clone(), Arc::clone(&self.sender));
        let report = dispatcher.run(&wire, &audience, &progress).await;

        if !progress.show(&report.render()).await {
            tracing::warn!("final report not shown");
        }
        Ok(report)
    }
}

/// A validated job waiting for the administrator's decision
#[derive(Debug)]
#[must_use = "a draft does nothing until confirmed or cancelled"]
pub struct BroadcastDraft {
    job: SendJob,
    preview: String,
    broadcaster: Broadcaster,
}

impl BroadcastDraft {
    /// The sealed job
    #[inline]
    #[must_use]
    pub fn job(&self) -> &SendJob {
        &self.job
    }

    /// Content preview
    #[inline]
    #[must_use]
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Confirmation screen text: content type, directory counts and preview
    #[must_use]
    pub fn confirmation_text(&self, summary: &AudienceSummary) -> String {
        let mut out = String::new();
        out.push_str("━━━━━━━━━━━━━━━━━━━━\n📢 *BROADCAST*\n━━━━━━━━━━━━━━━━━━━━\n\n");
        let _ = writeln!(out, "📋 *Type:* {}", self.job.payload().kind_label());
        let _ = writeln!(out, "📊 *Total recipients:* {}\n", summary.total);
        out.push_str("👥 *By status:*\n");
        let _ = writeln!(out, "  ✅ Active: {}", summary.active);
        let _ = writeln!(out, "  ⏳ Pending: {}", summary.pending);
        let _ = writeln!(out, "  ⛔ Blocked: {}\n", summary.blocked);
        out.push_str("📍 *Top 3 regions:*\n");
        for (rank, (region, count)) in summary.top_regions.iter().enumerate() {
            let _ = writeln!(out, "  {}. {region}: {count}", rank + 1);
        }
        let _ = write!(out, "\n*Preview:*\n_{}_", self.preview);
        out
    }

    /// Region picker lines, `"North (3/5)"` as active/total
    #[must_use]
    pub fn region_choices(summary: &AudienceSummary) -> Vec<String> {
        summary
            .regions
            .iter()
            .map(|r| format!("{} ({}/{})", r.region, r.active, r.total))
            .collect()
    }

    /// Drop the draft without contacting anyone
    pub fn cancel(self) {
        tracing::info!(kind = self.job.payload().kind_label(), "broadcast cancelled");
    }

    /// Send the draft to everyone matching `rule`
    ///
    /// # Errors
    /// See [`Broadcaster::execute`].
    pub async fn confirm(
        self,
        rule: TargetingRule,
        session: Arc<dyn OperatorSession>,
    ) -> Result<DeliveryReport, FanoutError> {
        tracing::info!(kind = self.job.payload().kind_label(), rule = %rule, "broadcast confirmed");
        self.broadcaster.execute(&self.job, rule, session).await
    }
}

/// Notice shown when a targeting rule matches nobody
#[must_use]
pub fn render_empty_audience(rule: &TargetingRule) -> String {
    format!("❌ No technicians found for this target.\n🎯 Target: {}", rule.describe())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        DeliveryHandle, DirectoryError, MockOperatorSession, MockSender, MockUserDirectory,
        SendError,
    };
    use fieldops_types::{
        DirectorySnapshot, Payload, PollPayload, Recipient, RecipientStatus,
    };
    use std::sync::Mutex;

    fn directory(snapshot: DirectorySnapshot) -> Arc<MockUserDirectory> {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_all_recipients()
            .returning(move || Ok(snapshot.clone()));
        Arc::new(directory)
    }

    fn team() -> DirectorySnapshot {
        vec![
            Recipient::new("1", "Ana").with_region("North"),
            Recipient::new("2", "Bia").with_region("North"),
            Recipient::new("3", "Caio")
                .with_region("South")
                .with_status(RecipientStatus::Pending),
        ]
        .into_iter()
        .collect()
    }

    fn recording_session() -> (Arc<MockOperatorSession>, Arc<Mutex<Vec<String>>>) {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&shown);
        let mut session = MockOperatorSession::new();
        session.expect_show().returning(move |text| {
            log.lock().unwrap().push(text.to_string());
            Ok(())
        });
        (Arc::new(session), shown)
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_frames_text_and_reports() {
        let mut sender = MockSender::new();
        sender
            .expect_send()
            .times(3)
            .withf(|_, payload: &Payload, _| match payload {
                Payload::Text { text } => text.starts_with("📢") && text.contains("Meeting at 8"),
                _ => false,
            })
            .returning(|recipient, _, _| Ok(DeliveryHandle::new(recipient.id.clone(), 7)));

        let broadcaster = Broadcaster::new(FanoutConfig::default(), directory(team()), Arc::new(sender));
        let draft = broadcaster
            .draft(RawContent::text("Meeting at 8"), DeliveryOptions::default())
            .unwrap();
        assert_eq!(draft.preview(), "Meeting at 8");

        let (session, shown) = recording_session();
        let report = draft.confirm(TargetingRule::All, session).await.unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.target, "All technicians");

        let shown = shown.lock().unwrap();
        assert!(shown.first().unwrap().contains("Starting"));
        assert!(shown.last().unwrap().contains("BROADCAST COMPLETE"));
    }

    #[tokio::test]
    async fn empty_audience_sends_nothing() {
        let mut sender = MockSender::new();
        sender.expect_send().never();
        sender.expect_send_poll().never();

        let broadcaster = Broadcaster::new(FanoutConfig::default(), directory(team()), Arc::new(sender));
        let draft = broadcaster
            .draft(RawContent::text("hello"), DeliveryOptions::default())
            .unwrap();

        let (session, shown) = recording_session();
        let err = draft
            .confirm(TargetingRule::ByRegion("West".to_string()), session)
            .await
            .unwrap_err();

        assert!(matches!(err, FanoutError::EmptyAudience { .. }));
        let shown = shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].contains("Region: West"));
    }

    #[test]
    fn invalid_quiz_never_becomes_a_draft() {
        let mut directory = MockUserDirectory::new();
        directory.expect_all_recipients().never();
        let mut sender = MockSender::new();
        sender.expect_send_poll().never();

        let broadcaster = Broadcaster::new(FanoutConfig::default(), Arc::new(directory), Arc::new(sender));
        let raw = RawContent::poll(PollPayload::new("Best splice?", ["Fusion", "Mechanical"]).as_quiz(None));
        let err = broadcaster.draft(raw, DeliveryOptions::default()).unwrap_err();

        assert!(err.is_reportable());
        assert!(matches!(err, FanoutError::InvalidPayload(_)));
    }

    #[test]
    fn cancel_contacts_nobody() {
        let mut directory = MockUserDirectory::new();
        directory.expect_all_recipients().never();
        let mut sender = MockSender::new();
        sender.expect_send().never();

        let broadcaster = Broadcaster::new(FanoutConfig::default(), Arc::new(directory), Arc::new(sender));
        broadcaster
            .draft(RawContent::text("never mind"), DeliveryOptions::default())
            .unwrap()
            .cancel();
    }

    #[tokio::test]
    async fn directory_failure_surfaces() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_all_recipients()
            .returning(|| Err(DirectoryError::Unavailable("store offline".to_string())));

        let broadcaster = Broadcaster::new(
            FanoutConfig::default(),
            Arc::new(directory),
            Arc::new(MockSender::new()),
        );
        let err = broadcaster.summary().await.unwrap_err();
        assert!(matches!(err, FanoutError::Directory(_)));
        assert!(!err.is_reportable());
    }

    #[tokio::test]
    async fn confirmation_screen_lists_counts() {
        let broadcaster = Broadcaster::new(
            FanoutConfig::default(),
            directory(team()),
            Arc::new(MockSender::new()),
        );
        let summary = broadcaster.summary().await.unwrap();
        let draft = broadcaster
            .draft(RawContent::text("Safety check"), DeliveryOptions::default())
            .unwrap();

        let text = draft.confirmation_text(&summary);
        assert!(text.contains("*Type:* Text"));
        assert!(text.contains("Active: 2"));
        assert!(text.contains("Pending: 1"));
        assert!(text.contains("1. North: 2"));
        assert!(text.contains("_Safety check_"));
        assert_eq!(
            BroadcastDraft::region_choices(&summary),
            vec!["North (2/2)".to_string(), "South (0/1)".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn report_render_failure_keeps_report() {
        let mut sender = MockSender::new();
        sender
            .expect_send()
            .returning(|_, _, _| Err(SendError::Delivery("Bad Request: chat not found".to_string())));

        let mut session = MockOperatorSession::new();
        session
            .expect_show()
            .returning(|_| Err(crate::provider::SessionError::Rejected("too old".to_string())));

        let broadcaster = Broadcaster::new(FanoutConfig::default(), directory(team()), Arc::new(sender));
        let job = broadcaster
            .draft(RawContent::text("hi"), DeliveryOptions::default())
            .unwrap();
        let report = job
            .confirm(TargetingRule::ByStatus(RecipientStatus::Active), Arc::new(session))
            .await
            .unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.never_started, 2);
    }
}
