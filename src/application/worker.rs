//! Bounded pool of dispatch workers fed by a task channel.

use super::dispatcher::Dispatcher;
use crate::ports::delivery::InboundMessage;
use crate::ports::encoder::Encoder;
use crate::ports::errors::ErrorSink;
use crate::ports::idempotency::IdempotencyStore;
use crate::ports::publisher::MessagePublisher;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of concurrent dispatch workers
pub const WORKERS_COUNT: usize = 4;

/// Default number of deliveries buffered ahead of the workers
pub const QUEUE_CAPACITY: usize = 16;

/// Fixed-size pool of dispatch workers.
pub struct WorkerPool<M> {
    sender: mpsc::Sender<M>,
    handles: Vec<JoinHandle<()>>,
}

impl<M> WorkerPool<M>
where
    M: InboundMessage + 'static,
{
    /// Spawn `workers` tasks that share one bounded channel of `capacity`.
    pub fn start<S, E, P, N>(
        dispatcher: Arc<Dispatcher<S, E, P, N>>,
        workers: usize,
        capacity: usize,
    ) -> Self
    where
        S: IdempotencyStore + 'static,
        E: ErrorSink + 'static,
        P: MessagePublisher + 'static,
        N: Encoder + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    worker_loop(id, receiver, dispatcher).await;
                })
            })
            .collect();

        Self { sender, handles }
    }

    /// Queue a message, waiting while the channel is full.
    pub async fn submit(&self, message: M) -> Result<(), M> {
        self.sender.send(message).await.map_err(|e| e.0)
    }

    /// Feed `deliveries` into the pool until the stream ends or `shutdown` fires.
    pub async fn run<St>(&self, deliveries: St, shutdown: CancellationToken)
    where
        St: Stream<Item = M>,
    {
        futures::pin_mut!(deliveries);
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no longer consuming");
                    break;
                }
                next = deliveries.next() => next,
            };
            match next {
                Some(message) => {
                    if self.submit(message).await.is_err() {
                        warn!("Worker pool closed, dropping delivery");
                        break;
                    }
                }
                None => {
                    warn!("Delivery stream ended");
                    break;
                }
            }
        }
    }

    /// Close the channel and wait for in-flight dispatches to finish.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task panicked");
            }
        }
    }
}

async fn worker_loop<M, S, E, P, N>(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<M>>>,
    dispatcher: Arc<Dispatcher<S, E, P, N>>,
) where
    M: InboundMessage,
    S: IdempotencyStore,
    E: ErrorSink,
    P: MessagePublisher,
    N: Encoder,
{
    debug!(worker_id, "Worker started");
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(message) = next else {
            break;
        };
        let outcome = dispatcher.handle(&message).await;
        debug!(worker_id, ?outcome, "Message settled");
    }
    debug!(worker_id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDelivery, MemoryLedger, MemoryPublisher};
    use crate::domain::dash::Transcoder;
    use crate::ports::encoder::{EncoderOutput, MockEncoder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_never_exceeds_worker_count() {
        let root = tempdir().unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut encoder = MockEncoder::new();
        {
            let running = running.clone();
            let peak = peak.clone();
            encoder.expect_encode_dash().returning(move |_, manifest| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                std::fs::write(manifest, "<MPD/>").unwrap();
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(EncoderOutput {
                    success: true,
                    status: "exit status: 0".to_string(),
                    log: String::new(),
                })
            });
        }

        let ledger = MemoryLedger::new();
        let publisher = MemoryPublisher::new();
        let dispatcher = Arc::new(Dispatcher::new(
            ledger.clone(),
            ledger.clone(),
            publisher.clone(),
            Transcoder::new(encoder),
        ));
        let pool = WorkerPool::start(dispatcher, 2, 1);

        let mut messages = Vec::new();
        for video_id in 0..6i64 {
            let dir = root.path().join(video_id.to_string());
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("0.chunk"), "data").unwrap();
            let body = serde_json::json!({"video_id": video_id, "path": dir});
            messages.push(MemoryDelivery::new(body.to_string().into_bytes()));
        }

        pool.run(futures::stream::iter(messages), CancellationToken::new())
            .await;
        pool.shutdown().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(publisher.messages().len(), 6);
        for video_id in 0..6 {
            assert_eq!(ledger.success_count(video_id), 1);
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_consuming() {
        let ledger = MemoryLedger::new();
        let mut encoder = MockEncoder::new();
        encoder.expect_encode_dash().never();
        let dispatcher = Arc::new(Dispatcher::new(
            ledger.clone(),
            ledger.clone(),
            MemoryPublisher::new(),
            Transcoder::new(encoder),
        ));
        let pool = WorkerPool::<MemoryDelivery>::start(dispatcher, 1, 1);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        pool.run(futures::stream::pending(), shutdown).await;
        pool.shutdown().await;

        assert!(ledger.errors().is_empty());
    }
}
