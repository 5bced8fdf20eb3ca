//! Testing utilities for the fieldops workspace
//!
//! Scripted fakes for the fanout collaborator traits, plus directory fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use fieldops_fanout::{
    DeliveryHandle, DirectoryError, OperatorSession, SendError, Sender, SessionError,
    UserDirectory,
};
use fieldops_types::{
    DeliveryOptions, DirectorySnapshot, Payload, PollPayload, Recipient, RecipientId,
    RecipientStatus,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Scripted reply to one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Backpressure(Duration),
    Fail(String),
}

/// One call seen by [`ScriptedSender`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentCall {
    pub recipient: RecipientId,
    pub at: Instant,
    /// `None` for polls
    pub payload: Option<Payload>,
    pub poll: Option<PollPayload>,
    pub options: DeliveryOptions,
}

/// Sender whose replies are scripted per recipient
///
/// Unscripted calls succeed. Tracks concurrent calls so tests can check
/// the in-flight ceiling.
#[derive(Debug, Default)]
pub struct ScriptedSender {
    scripts: Mutex<HashMap<RecipientId, VecDeque<Reply>>>,
    pin_failures: Mutex<HashSet<RecipientId>>,
    calls: Mutex<Vec<SentCall>>,
    pins: Mutex<Vec<RecipientId>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    next_id: AtomicI64,
}

impl ScriptedSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each call takes `latency` before replying
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue replies for one recipient, consumed in order
    pub fn script(self, recipient: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .entry(RecipientId::from(recipient))
            .or_default()
            .extend(replies);
        self
    }

    /// Make pinning fail for one recipient
    pub fn fail_pin(self, recipient: &str) -> Self {
        self.pin_failures.lock().insert(RecipientId::from(recipient));
        self
    }

    pub fn calls(&self) -> Vec<SentCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, recipient: &str) -> Vec<SentCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.recipient.as_str() == recipient)
            .cloned()
            .collect()
    }

    pub fn pins(&self) -> Vec<RecipientId> {
        self.pins.lock().clone()
    }

    /// Highest number of calls observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn reply(&self, call: SentCall) -> Result<DeliveryHandle, SendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let recipient = call.recipient.clone();
        self.calls.lock().push(call);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self
            .scripts
            .lock()
            .get_mut(&recipient)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Reply::Ok);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            Reply::Ok => Ok(DeliveryHandle::new(
                recipient,
                self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            )),
            Reply::Backpressure(wait) => Err(SendError::backpressure(wait)),
            Reply::Fail(message) => Err(SendError::Delivery(message)),
        }
    }
}

#[async_trait]
impl Sender for ScriptedSender {
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &Payload,
        options: DeliveryOptions,
    ) -> Result<DeliveryHandle, SendError> {
        self.reply(SentCall {
            recipient: recipient.id.clone(),
            at: Instant::now(),
            payload: Some(payload.clone()),
            poll: None,
            options,
        })
        .await
    }

    async fn send_poll(
        &self,
        recipient: &Recipient,
        poll: &PollPayload,
        options: DeliveryOptions,
    ) -> Result<DeliveryHandle, SendError> {
        self.reply(SentCall {
            recipient: recipient.id.clone(),
            at: Instant::now(),
            payload: None,
            poll: Some(poll.clone()),
            options,
        })
        .await
    }

    async fn pin(&self, handle: &DeliveryHandle) -> Result<(), SendError> {
        self.pins.lock().push(handle.recipient.clone());
        if self.pin_failures.lock().contains(&handle.recipient) {
            return Err(SendError::Delivery("Bad Request: not enough rights to pin".to_string()));
        }
        Ok(())
    }
}

/// Operator session that keeps every rendered message
#[derive(Debug, Default)]
pub struct RecordingSession {
    shown: Mutex<Vec<String>>,
    reject: bool,
    delay: Duration,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose renders all fail
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// Each render takes `delay` before it is recorded
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.shown.lock().last().cloned()
    }
}

#[async_trait]
impl OperatorSession for RecordingSession {
    async fn show(&self, text: &str) -> Result<(), SessionError> {
        if self.reject {
            return Err(SessionError::Rejected("message is not modified".to_string()));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.shown.lock().push(text.to_string());
        Ok(())
    }
}

/// Directory serving a fixed snapshot
#[derive(Debug, Default)]
pub struct StaticDirectory {
    snapshot: DirectorySnapshot,
    reads: AtomicUsize,
}

impl StaticDirectory {
    pub fn new(snapshot: DirectorySnapshot) -> Self {
        Self {
            snapshot,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn all_recipients(&self) -> Result<DirectorySnapshot, DirectoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }
}

/// Active technician with a generated name
pub fn technician(id: &str) -> Recipient {
    Recipient::new(id, format!("Tech {id}"))
}

/// Snapshot of `count` active technicians with ids `0..count`
pub fn active_team(count: usize) -> DirectorySnapshot {
    (0..count).map(|i| technician(&i.to_string())).collect()
}

/// Snapshot with the given statuses, ids `"0"`, `"1"`, ...
pub fn team_with_statuses(statuses: &[RecipientStatus]) -> DirectorySnapshot {
    statuses
        .iter()
        .enumerate()
        .map(|(i, status)| technician(&i.to_string()).with_status(*status))
        .collect()
}

