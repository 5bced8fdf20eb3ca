//! Simulated broadcast runs

use crate::console::{CliConfig, ConsoleSession, JsonDirectory};
use crate::simulator::{SimStats, SimulatedSender};
use fieldops_fanout::{Broadcaster, FanoutError, RawContent};
use fieldops_types::{DeliveryOptions, DeliveryReport, DirectorySnapshot, TargetingRule};
use serde::Serialize;
use std::sync::Arc;

/// Everything needed for one simulated broadcast
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub directory: DirectorySnapshot,
    pub config: CliConfig,
    pub seed: u64,
    pub content: RawContent,
    pub options: DeliveryOptions,
    pub rule: TargetingRule,
    pub verbose: bool,
}

/// Result of a simulated broadcast
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    /// `None` when the target matched nobody
    pub report: Option<DeliveryReport>,
    pub provider: SimStats,
    /// Last message shown to the operator
    pub transcript_tail: Option<String>,
}

impl SimulationOutcome {
    /// Whether the run produced a consistent report
    ///
    /// An empty audience counts as unsuccessful so scripts can tell that
    /// nothing was sent.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.report.as_ref().is_some_and(DeliveryReport::is_consistent)
    }
}

/// Run one broadcast against the simulated provider
///
/// An empty audience is a normal outcome, not an error.
///
/// # Errors
/// Fails if the content is rejected or the configuration is invalid.
pub async fn simulate(request: SimulationRequest) -> anyhow::Result<SimulationOutcome> {
    let SimulationRequest {
        directory,
        config,
        seed,
        content,
        options,
        rule,
        verbose,
    } = request;

    let sender = Arc::new(SimulatedSender::new(config.simulator.clone(), seed));
    let session = Arc::new(ConsoleSession::new(verbose));
    let broadcaster = Broadcaster::new(
        config.fanout,
        Arc::new(JsonDirectory::new(directory)),
        sender.clone(),
    );

    let draft = broadcaster.draft(content, options)?;
    tracing::info!(kind = draft.job().payload().kind_label(), rule = %rule, seed, "simulation starting");

    let report = match draft.confirm(rule, session.clone()).await {
        Ok(report) => Some(report),
        Err(FanoutError::EmptyAudience { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(SimulationOutcome {
        report,
        provider: sender.stats(),
        transcript_tail: session.last(),
    })
}
