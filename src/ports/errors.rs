use super::BoxError;
use crate::domain::task::ErrorRecord;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ErrorSink: Send + Sync {
    /// Append one failure to the error ledger.
    async fn append(&self, record: &ErrorRecord) -> Result<(), BoxError>;
}
