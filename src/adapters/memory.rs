//! In-process adapters for tests and dry runs.

use crate::domain::task::ErrorRecord;
use crate::ports::delivery::InboundMessage;
use crate::ports::errors::ErrorSink;
use crate::ports::idempotency::{IdempotencyStore, MarkOutcome};
use crate::ports::publisher::MessagePublisher;
use crate::ports::BoxError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct LedgerState {
    successes: Vec<(i64, DateTime<Utc>)>,
    errors: Vec<ErrorRecord>,
}

/// Success and error ledgers held in memory.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pretend a previous run already converted `video_id`.
    pub fn seed_success(&self, video_id: i64) {
        self.state().successes.push((video_id, Utc::now()));
    }

    pub fn success_count(&self, video_id: i64) -> usize {
        self.state()
            .successes
            .iter()
            .filter(|(id, _)| *id == video_id)
            .count()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.state().errors.clone()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryLedger {
    async fn is_processed(&self, video_id: i64) -> Result<bool, BoxError> {
        Ok(self.success_count(video_id) > 0)
    }

    async fn mark_processed(&self, video_id: i64) -> Result<MarkOutcome, BoxError> {
        let mut state = self.state();
        if state.successes.iter().any(|(id, _)| *id == video_id) {
            return Ok(MarkOutcome::AlreadyRecorded);
        }
        state.successes.push((video_id, Utc::now()));
        Ok(MarkOutcome::Recorded)
    }
}

#[async_trait]
impl ErrorSink for MemoryLedger {
    async fn append(&self, record: &ErrorRecord) -> Result<(), BoxError> {
        self.state().errors.push(record.clone());
        Ok(())
    }
}

/// Collects published payloads.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    messages: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), BoxError> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(payload);
        Ok(())
    }
}

/// A delivery that remembers how it was settled.
pub struct MemoryDelivery {
    body: Vec<u8>,
    attempt: u32,
    acks: AtomicUsize,
    rejections: Mutex<Vec<bool>>,
}

impl MemoryDelivery {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            attempt: 1,
            acks: AtomicUsize::new(0),
            rejections: Mutex::new(Vec::new()),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn acks(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }

    /// The `requeue` flag of every reject, in order.
    pub fn rejections(&self) -> Vec<bool> {
        self.rejections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl InboundMessage for MemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn ack(&self) -> Result<(), BoxError> {
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BoxError> {
        self.rejections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(requeue);
        Ok(())
    }
}
