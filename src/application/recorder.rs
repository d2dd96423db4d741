//! Failure ledger and completion announcements.

use crate::domain::task::{ErrorRecord, Task};
use crate::error::{PipelineError, PipelineResult};
use crate::ports::errors::ErrorSink;
use crate::ports::publisher::MessagePublisher;
use tracing::{error, info};

/// Best-effort writer of the error ledger.
pub struct ErrorRecorder<E> {
    sink: E,
}

impl<E: ErrorSink> ErrorRecorder<E> {
    pub fn new(sink: E) -> Self {
        Self { sink }
    }

    /// Log the failure and append it to the ledger. A ledger write failure is
    /// logged and otherwise ignored.
    pub async fn record(&self, video_id: i64, err: &PipelineError) {
        let record = ErrorRecord::from_failure(video_id, err);
        let serialized = serde_json::to_string(&record).unwrap_or_default();
        error!(
            video_id,
            stage = %record.stage,
            error_details = %serialized,
            "Processing error"
        );

        if let Err(e) = self.sink.append(&record).await {
            error!(video_id, error = %e, error_details = %serialized, "Error registering error");
        }
    }
}

pub struct ConfirmationPublisher<P> {
    publisher: P,
}

impl<P: MessagePublisher> ConfirmationPublisher<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    /// Announce `{video_id, path}` for a completed task.
    pub async fn confirm(&self, task: &Task) -> PipelineResult<()> {
        let payload = serde_json::to_vec(&task.confirmation())
            .map_err(|e| PipelineError::Publish(e.into()))?;
        self.publisher
            .publish(payload)
            .await
            .map_err(PipelineError::Publish)?;
        info!(video_id = task.video_id, "Confirmation published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryLedger, MemoryPublisher};
    use crate::error::Stage;
    use crate::ports::errors::MockErrorSink;
    use crate::ports::publisher::MockMessagePublisher;
    use std::path::PathBuf;

    fn task() -> Task {
        Task {
            video_id: 42,
            path: PathBuf::from("/data/42"),
            chunks: None,
        }
    }

    #[tokio::test]
    async fn test_record_appends_structured_row() {
        let ledger = MemoryLedger::new();
        let recorder = ErrorRecorder::new(ledger.clone());

        recorder
            .record(3, &PipelineError::NoChunks(PathBuf::from("/data/3")))
            .await;

        let errors = ledger.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].video_id, 3);
        assert_eq!(errors[0].stage, Stage::Merge);
    }

    #[tokio::test]
    async fn test_record_swallows_sink_failure() {
        let mut sink = MockErrorSink::new();
        sink.expect_append()
            .times(1)
            .returning(|_| Err("relation does not exist".into()));

        ErrorRecorder::new(sink)
            .record(
                1,
                &PipelineError::InvalidTask {
                    video_id: 1,
                    reason: "path is empty".into(),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_confirm_publishes_task_shape() {
        let publisher = MemoryPublisher::new();

        ConfirmationPublisher::new(publisher.clone())
            .confirm(&task())
            .await
            .unwrap();

        let sent = publisher.messages();
        assert_eq!(sent.len(), 1);
        let json: serde_json::Value = serde_json::from_slice(&sent[0]).unwrap();
        assert_eq!(json, serde_json::json!({"video_id": 42, "path": "/data/42"}));
    }

    #[tokio::test]
    async fn test_confirm_failure_maps_to_publish_stage() {
        let mut publisher = MockMessagePublisher::new();
        publisher
            .expect_publish()
            .returning(|_| Err("channel closed".into()));

        let err = ConfirmationPublisher::new(publisher)
            .confirm(&task())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Publish);
    }
}
