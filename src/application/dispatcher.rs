//! Drives one inbound message through the conversion pipeline.

use super::idempotency::IdempotencyGuard;
use super::locks::VideoLocks;
use super::recorder::{ConfirmationPublisher, ErrorRecorder};
use super::retry::{RetryPolicy, Settlement};
use crate::domain::chunks;
use crate::domain::dash::Transcoder;
use crate::domain::task::Task;
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::ports::delivery::InboundMessage;
use crate::ports::encoder::Encoder;
use crate::ports::errors::ErrorSink;
use crate::ports::idempotency::{IdempotencyStore, MarkOutcome};
use crate::ports::publisher::MessagePublisher;
use tracing::{error, info, info_span, warn, Instrument};

/// How a message was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Converted, recorded and acknowledged. `confirmed` is false when the
    /// confirmation could not be published.
    Completed { video_id: i64, confirmed: bool },
    /// Success was already on record; acknowledged without work.
    AlreadyProcessed { video_id: i64 },
    /// Converted, but a concurrent delivery recorded success first.
    Raced { video_id: i64 },
    Failed {
        video_id: i64,
        stage: Stage,
        settlement: Settlement,
    },
}

pub struct Dispatcher<S, E, P, N> {
    guard: IdempotencyGuard<S>,
    recorder: ErrorRecorder<E>,
    confirmations: ConfirmationPublisher<P>,
    transcoder: Transcoder<N>,
    retry: RetryPolicy,
    locks: VideoLocks,
}

impl<S, E, P, N> Dispatcher<S, E, P, N>
where
    S: IdempotencyStore,
    E: ErrorSink,
    P: MessagePublisher,
    N: Encoder,
{
    pub fn new(store: S, errors: E, publisher: P, transcoder: Transcoder<N>) -> Self {
        Self {
            guard: IdempotencyGuard::new(store),
            recorder: ErrorRecorder::new(errors),
            confirmations: ConfirmationPublisher::new(publisher),
            transcoder,
            retry: RetryPolicy::default(),
            locks: VideoLocks::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Process one message and settle it exactly once.
    pub async fn handle<M: InboundMessage + ?Sized>(&self, message: &M) -> Outcome {
        let attempt = message.attempt();
        let task = match Task::decode(message.body()) {
            Ok(task) => task,
            Err(e) => {
                let video_id = e.video_id().unwrap_or(0);
                return self.fail(message, video_id, attempt, e).await;
            }
        };

        let span = info_span!("task", video_id = task.video_id, attempt);
        self.dispatch(message, task, attempt).instrument(span).await
    }

    async fn dispatch<M: InboundMessage + ?Sized>(
        &self,
        message: &M,
        task: Task,
        attempt: u32,
    ) -> Outcome {
        let video_id = task.video_id;

        let (_lock, contended) = self.locks.acquire(video_id).await;
        if contended {
            warn!("Concurrent delivery for the same video waited for the first to finish");
        }

        if self.guard.is_processed(video_id).await {
            warn!("Video already processed");
            self.ack(message, video_id).await;
            return Outcome::AlreadyProcessed { video_id };
        }

        if let Err(e) = self.process_video(&task).await {
            return self.fail(message, video_id, attempt, e).await;
        }

        let marked = match self.guard.mark_processed(video_id).await {
            Ok(marked) => marked,
            Err(e) => return self.fail(message, video_id, attempt, e).await,
        };

        self.ack(message, video_id).await;

        if marked == MarkOutcome::AlreadyRecorded {
            warn!(
                "Success was already recorded by a concurrent delivery; the video was converted twice"
            );
            return Outcome::Raced { video_id };
        }
        info!("Video processing completed");

        let confirmed = match self.confirmations.confirm(&task).await {
            Ok(()) => true,
            Err(e) => {
                self.recorder.record(video_id, &e).await;
                false
            }
        };
        Outcome::Completed {
            video_id,
            confirmed,
        }
    }

    async fn process_video(&self, task: &Task) -> PipelineResult<()> {
        info!(path = %task.path.display(), "Merging chunks");
        let merged = chunks::merge(&task.path, task.chunks.as_deref()).await?;

        self.transcoder.transcode(&task.path, &merged).await?;
        Ok(())
    }

    async fn ack<M: InboundMessage + ?Sized>(&self, message: &M, video_id: i64) {
        if let Err(e) = message.ack().await {
            // the broker will redeliver; the idempotency check absorbs it
            error!(video_id, error = %e, "Failed to acknowledge message");
        }
    }

    async fn fail<M: InboundMessage + ?Sized>(
        &self,
        message: &M,
        video_id: i64,
        attempt: u32,
        err: PipelineError,
    ) -> Outcome {
        self.recorder.record(video_id, &err).await;

        let settlement = self.retry.settle(attempt, &err);
        let requeue = settlement == Settlement::Requeued;
        if let Err(e) = message.reject(requeue).await {
            error!(video_id, error = %e, "Failed to reject message");
        }
        if settlement == Settlement::DeadLettered {
            warn!(
                video_id,
                attempt,
                max_attempts = self.retry.max_attempts(),
                "Message dead-lettered"
            );
        }

        Outcome::Failed {
            video_id,
            stage: err.stage(),
            settlement,
        }
    }
}
