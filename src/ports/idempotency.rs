use super::BoxError;
use async_trait::async_trait;

/// Result of an atomic insert-if-absent of a success record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// This call wrote the first success record.
    Recorded,
    /// A success record already existed, nothing was written.
    AlreadyRecorded,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// True iff a success record exists for the video.
    async fn is_processed(&self, video_id: i64) -> Result<bool, BoxError>;

    /// Insert a success record unless one already exists.
    /// The store is the only arbiter of which caller recorded first.
    async fn mark_processed(&self, video_id: i64) -> Result<MarkOutcome, BoxError>;
}
