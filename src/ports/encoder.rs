use async_trait::async_trait;
use std::io;
use std::path::Path;

/// Exit state and captured stdout+stderr of one encoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOutput {
    pub success: bool,
    pub status: String,
    pub log: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode `input` into a DASH manifest at `manifest` (segments land next to it).
    /// `Err` means the process could not be run at all.
    async fn encode_dash(&self, input: &Path, manifest: &Path) -> io::Result<EncoderOutput>;
}
