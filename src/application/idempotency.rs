//! Per-video completion state.

use crate::error::{PipelineError, PipelineResult};
use crate::ports::idempotency::{IdempotencyStore, MarkOutcome};
use tracing::error;

pub struct IdempotencyGuard<S> {
    store: S,
}

impl<S: IdempotencyStore> IdempotencyGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fails open: a store error is logged and reported as "not processed" so
    /// retries are never blocked.
    pub async fn is_processed(&self, video_id: i64) -> bool {
        match self.store.is_processed(video_id).await {
            Ok(processed) => processed,
            Err(e) => {
                error!(video_id, error = %e, "Error checking if video is processed");
                false
            }
        }
    }

    pub async fn mark_processed(&self, video_id: i64) -> PipelineResult<MarkOutcome> {
        self.store.mark_processed(video_id).await.map_err(|e| {
            error!(video_id, error = %e, "Error marking video as processed");
            PipelineError::MarkProcessed(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryLedger;
    use crate::error::Stage;
    use crate::ports::idempotency::MockIdempotencyStore;

    #[tokio::test]
    async fn test_processed_only_after_mark() {
        let guard = IdempotencyGuard::new(MemoryLedger::new());

        assert!(!guard.is_processed(5).await);
        assert_eq!(guard.mark_processed(5).await.unwrap(), MarkOutcome::Recorded);
        assert!(guard.is_processed(5).await);
        assert!(!guard.is_processed(6).await);
    }

    #[tokio::test]
    async fn test_second_mark_reports_existing_record() {
        let ledger = MemoryLedger::new();
        let guard = IdempotencyGuard::new(ledger.clone());

        guard.mark_processed(5).await.unwrap();
        assert_eq!(
            guard.mark_processed(5).await.unwrap(),
            MarkOutcome::AlreadyRecorded
        );
        assert_eq!(ledger.success_count(5), 1);
    }

    #[tokio::test]
    async fn test_store_error_fails_open() {
        let mut store = MockIdempotencyStore::new();
        store
            .expect_is_processed()
            .returning(|_| Err("connection refused".into()));

        let guard = IdempotencyGuard::new(store);

        assert!(!guard.is_processed(1).await);
    }

    #[tokio::test]
    async fn test_mark_error_is_a_stage_failure() {
        let mut store = MockIdempotencyStore::new();
        store
            .expect_mark_processed()
            .returning(|_| Err("disk full".into()));

        let err = IdempotencyGuard::new(store).mark_processed(1).await.unwrap_err();

        assert_eq!(err.stage(), Stage::MarkSuccess);
        assert!(err.to_string().contains("disk full"));
    }
}
