//! Rate gate for outbound sends
//!
//! Combines the two limits the messaging provider imposes:
//! - a permit pool bounding how many sends are in flight at once
//! - a minimum spacing between consecutive permit grants
//!
//! The last-grant instant and the permit count are the only shared mutable
//! state in the engine. Permits are returned on drop, so every exit path of
//! a send (success, error, panic unwinding) releases its permit.

use crate::error::GateError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Gate statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    /// Permit pool size
    pub capacity: usize,
    /// Permits currently held
    pub in_flight: usize,
    /// Permits granted since creation
    pub total_granted: u64,
}

/// Permit to perform one send
///
/// Dropping the permit returns it to the pool.
#[derive(Debug)]
#[must_use = "dropping a permit releases it immediately"]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RatePermit {
    /// Return the permit to the pool
    #[inline]
    pub fn release(self) {
        drop(self);
    }
}

/// Throughput limiter shared by all in-flight sends of a job
#[derive(Debug)]
pub struct RateGate {
    /// Permit pool
    permits: Arc<Semaphore>,
    /// Pool size
    capacity: usize,
    /// Minimum gap between grants
    spacing: Duration,
    /// When the last permit was granted; held across the spacing wait so
    /// grants are serialized
    last_grant: Mutex<Option<Instant>>,
    /// Statistics
    granted: AtomicU64,
}

impl RateGate {
    /// Create a gate with `capacity` permits and `spacing` between grants
    #[must_use]
    pub fn new(capacity: usize, spacing: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            spacing,
            last_grant: Mutex::new(None),
            granted: AtomicU64::new(0),
        }
    }

    /// Create a gate from a sends-per-second ceiling
    #[must_use]
    pub fn per_second(capacity: usize, sends_per_second: u32) -> Self {
        Self::new(capacity, Duration::from_secs(1) / sends_per_second.max(1))
    }

    /// Acquire a permit
    ///
    /// Waits until a permit is free and at least `spacing` has passed since
    /// the previous grant.
    ///
    /// # Errors
    /// Returns [`GateError::Closed`] if the pool was closed.
    pub async fn acquire(&self) -> Result<RatePermit, GateError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| GateError::Closed)?;

        let mut last_grant = self.last_grant.lock().await;
        if let Some(previous) = *last_grant {
            tokio::time::sleep_until(previous + self.spacing).await;
        }
        *last_grant = Some(Instant::now());
        drop(last_grant);

        self.granted.fetch_add(1, Ordering::Relaxed);
        Ok(RatePermit { _permit: permit })
    }

    /// Return a permit to the pool
    #[inline]
    pub fn release(&self, permit: RatePermit) {
        permit.release();
    }

    /// Stop granting permits; pending and future acquires fail
    ///
    /// Deliveries still queued on a closed gate are recorded as failed
    /// without contacting the provider.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Minimum gap between grants
    #[inline]
    #[must_use]
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Get gate statistics
    #[must_use]
    pub fn stats(&self) -> GateStats {
        GateStats {
            capacity: self.capacity,
            in_flight: self.capacity - self.permits.available_permits(),
            total_granted: self.granted.load(Ordering::Relaxed),
        }
    }
}
