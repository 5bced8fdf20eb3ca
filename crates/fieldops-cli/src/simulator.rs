//! Simulated messaging provider
//!
//! Replays a broadcast against a seeded random model of the provider so the
//! engine can be exercised without network access. Same seed, same
//! transcript of provider decisions.

use async_trait::async_trait;
use fieldops_fanout::{DeliveryHandle, SendError, Sender};
use fieldops_types::{
    DeliveryOptions, DirectorySnapshot, Payload, PollPayload, Recipient, RecipientStatus,
};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

const REGIONS: [&str; 5] = ["North", "South", "East", "West", "Central"];

/// Failure model of the simulated provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimProfile {
    /// Probability a recipient has blocked the bot
    pub blocked_rate: f64,
    /// Probability a recipient never opened a chat with the bot
    pub never_started_rate: f64,
    /// Probability a call is answered with flood control
    pub backpressure_rate: f64,
    /// Wait requested by flood control
    pub retry_after_ms: u64,
    /// Probability a pin is refused
    pub pin_failure_rate: f64,
    /// Simulated round-trip time
    pub latency_ms: u64,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            blocked_rate: 0.03,
            never_started_rate: 0.05,
            backpressure_rate: 0.02,
            retry_after_ms: 1_000,
            pin_failure_rate: 0.01,
            latency_ms: 20,
        }
    }
}

impl SimProfile {
    /// Provider that accepts everything instantly
    #[must_use]
    pub fn flawless() -> Self {
        Self {
            blocked_rate: 0.0,
            never_started_rate: 0.0,
            backpressure_rate: 0.0,
            retry_after_ms: 0,
            pin_failure_rate: 0.0,
            latency_ms: 0,
        }
    }
}

/// Call statistics of a simulated run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub sends: u64,
    pub polls: u64,
    pub pins: u64,
    pub backpressure: u64,
    pub refused: u64,
}

/// Seeded in-process stand-in for the messaging provider
#[derive(Debug)]
pub struct SimulatedSender {
    profile: SimProfile,
    rng: Mutex<StdRng>,
    stats: Mutex<SimStats>,
    next_message: AtomicI64,
}

impl SimulatedSender {
    /// Create a simulated provider
    #[must_use]
    pub fn new(profile: SimProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            stats: Mutex::new(SimStats::default()),
            next_message: AtomicI64::new(1),
        }
    }

    /// Calls made so far
    #[must_use]
    pub fn stats(&self) -> SimStats {
        *self.stats.lock()
    }

    fn roll(&self, probability: f64) -> bool {
        probability > 0.0 && self.rng.lock().gen_bool(probability.clamp(0.0, 1.0))
    }

    async fn deliver(&self, recipient: &Recipient) -> Result<DeliveryHandle, SendError> {
        if self.profile.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.profile.latency_ms)).await;
        }

        if self.roll(self.profile.backpressure_rate) {
            self.stats.lock().backpressure += 1;
            return Err(SendError::backpressure(Duration::from_millis(
                self.profile.retry_after_ms,
            )));
        }

        let refusal = if self.roll(self.profile.blocked_rate) {
            Some("Forbidden: bot was blocked by the user")
        } else if self.roll(self.profile.never_started_rate) {
            Some("Bad Request: chat not found")
        } else {
            None
        };
        if let Some(message) = refusal {
            self.stats.lock().refused += 1;
            return Err(SendError::Delivery(message.to_string()));
        }

        let message_id = self.next_message.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(recipient = %recipient.id, message_id, "simulated delivery");
        Ok(DeliveryHandle::new(recipient.id.clone(), message_id))
    }
}

#[async_trait]
impl Sender for SimulatedSender {
    async fn send(
        &self,
        recipient: &Recipient,
        _payload: &Payload,
        _options: DeliveryOptions,
    ) -> Result<DeliveryHandle, SendError> {
        self.stats.lock().sends += 1;
        self.deliver(recipient).await
    }

    async fn send_poll(
        &self,
        recipient: &Recipient,
        _poll: &PollPayload,
        _options: DeliveryOptions,
    ) -> Result<DeliveryHandle, SendError> {
        self.stats.lock().polls += 1;
        self.deliver(recipient).await
    }

    async fn pin(&self, _handle: &DeliveryHandle) -> Result<(), SendError> {
        self.stats.lock().pins += 1;
        if self.roll(self.profile.pin_failure_rate) {
            return Err(SendError::Delivery(
                "Bad Request: not enough rights to manage pinned messages".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generate a directory of `count` technicians
///
/// Roughly 80% active, 15% pending and 5% blocked; one in ten has no region.
#[must_use]
pub fn synthetic_directory(count: usize, seed: u64) -> DirectorySnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let status = match rng.gen_range(0..100) {
                0..=79 => RecipientStatus::Active,
                80..=94 => RecipientStatus::Pending,
                _ => RecipientStatus::Blocked,
            };
            let recipient = Recipient::new(format!("{}", 100_000 + i), format!("Technician {i:04}"))
                .with_status(status);
            if rng.gen_ratio(1, 10) {
                recipient
            } else {
                recipient.with_region(REGIONS[rng.gen_range(0..REGIONS.len())])
            }
        })
        .collect()
}
