//! Ledger queries.

use super::pool::PgLedger;
use super::SUCCESS_STATUS;
use crate::domain::task::ErrorRecord;
use crate::ports::errors::ErrorSink;
use crate::ports::idempotency::{IdempotencyStore, MarkOutcome};
use crate::ports::BoxError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;

const IS_PROCESSED: &str =
    "SELECT EXISTS (SELECT 1 FROM processed_videos WHERE video_id = $1 AND status = $2)";

// Serializes writers of the same video for the rest of the transaction. The key
// is hashed under a namespace so it never collides with other advisory locks
// in the database; hash collisions between videos only cost extra waiting.
const LOCK_VIDEO: &str =
    "SELECT pg_advisory_xact_lock(hashtextextended('dashcast.processed_videos', $1))";

const INSERT_IF_ABSENT: &str = "INSERT INTO processed_videos (video_id, status, processed_at) \
     SELECT $1, $2, $3 \
     WHERE NOT EXISTS (SELECT 1 FROM processed_videos WHERE video_id = $1 AND status = $2)";

const INSERT_ERROR: &str =
    "INSERT INTO process_errors_log (error_details, created_at) VALUES ($1, $2)";

#[async_trait]
impl IdempotencyStore for PgLedger {
    async fn is_processed(&self, video_id: i64) -> Result<bool, BoxError> {
        let processed: bool = sqlx::query_scalar(IS_PROCESSED)
            .bind(video_id)
            .bind(SUCCESS_STATUS)
            .fetch_one(&self.pool)
            .await?;
        Ok(processed)
    }

    async fn mark_processed(&self, video_id: i64) -> Result<MarkOutcome, BoxError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(LOCK_VIDEO)
            .bind(video_id)
            .execute(&mut *tx)
            .await?;
        let inserted = sqlx::query(INSERT_IF_ABSENT)
            .bind(video_id)
            .bind(SUCCESS_STATUS)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(if inserted == 1 {
            MarkOutcome::Recorded
        } else {
            MarkOutcome::AlreadyRecorded
        })
    }
}

#[async_trait]
impl ErrorSink for PgLedger {
    async fn append(&self, record: &ErrorRecord) -> Result<(), BoxError> {
        sqlx::query(INSERT_ERROR)
            .bind(Json(record))
            .bind(record.time)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
