use super::BoxError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a JSON payload to the configured confirmation destination.
    async fn publish(&self, payload: Vec<u8>) -> Result<(), BoxError>;
}
