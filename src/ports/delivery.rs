use super::BoxError;
use async_trait::async_trait;

/// One message received from the work queue, settled exactly once.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    fn body(&self) -> &[u8];

    /// 1 for the first delivery, incremented on every redelivery.
    fn attempt(&self) -> u32;

    async fn ack(&self) -> Result<(), BoxError>;

    /// Negative acknowledgment. `requeue = false` hands the message to the
    /// queue's dead-letter route.
    async fn reject(&self, requeue: bool) -> Result<(), BoxError>;
}
