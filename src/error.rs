//! Pipeline error types.

use crate::ports::BoxError;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Pipeline stage a failure is attributed to in the error ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Decode,
    Merge,
    DirectoryCreate,
    Transcode,
    Cleanup,
    MarkSuccess,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Merge => "merge",
            Stage::DirectoryCreate => "directory-create",
            Stage::Transcode => "transcode",
            Stage::Cleanup => "cleanup",
            Stage::MarkSuccess => "mark-success",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to unmarshal task: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid task for video {video_id}: {reason}")]
    InvalidTask { video_id: i64, reason: String },

    #[error("no chunk files found in {}", .0.display())]
    NoChunks(PathBuf),

    #[error("failed to list chunks in {}: {source}", path.display())]
    ListChunks { path: PathBuf, source: io::Error },

    #[error("failed to create output file {}: {source}", path.display())]
    CreateOutput { path: PathBuf, source: io::Error },

    #[error("failed to open chunk {}: {source}", path.display())]
    OpenChunk { path: PathBuf, source: io::Error },

    #[error("failed to write chunk {} to output: {source}", path.display())]
    CopyChunk { path: PathBuf, source: io::Error },

    #[error("failed to create mpeg-dash directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to spawn encoder: {0}")]
    EncoderSpawn(io::Error),

    #[error("encoder exited with {status}: {output}")]
    EncoderFailed { status: String, output: String },

    #[error("encoder timed out after {0:?}")]
    EncoderTimeout(Duration),

    #[error("failed to remove merged file {}: {source}", path.display())]
    Cleanup { path: PathBuf, source: io::Error },

    #[error("failed to mark video as processed: {0}")]
    MarkProcessed(BoxError),

    #[error("failed to publish confirmation message: {0}")]
    Publish(BoxError),
}

impl PipelineError {
    /// Stage the failure is recorded under.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Decode(_) | PipelineError::InvalidTask { .. } => Stage::Decode,
            PipelineError::NoChunks(_)
            | PipelineError::ListChunks { .. }
            | PipelineError::CreateOutput { .. }
            | PipelineError::OpenChunk { .. }
            | PipelineError::CopyChunk { .. } => Stage::Merge,
            PipelineError::CreateDir { .. } => Stage::DirectoryCreate,
            PipelineError::EncoderSpawn(_)
            | PipelineError::EncoderFailed { .. }
            | PipelineError::EncoderTimeout(_) => Stage::Transcode,
            PipelineError::Cleanup { .. } => Stage::Cleanup,
            PipelineError::MarkProcessed(_) => Stage::MarkSuccess,
            PipelineError::Publish(_) => Stage::Publish,
        }
    }

    /// Short operator-facing summary stored next to the full details.
    pub fn summary(&self) -> &'static str {
        match self.stage() {
            Stage::Decode => "failed to unmarshal task",
            Stage::Merge => "failed to merge chunks",
            Stage::DirectoryCreate => "failed to create mpeg-dash directory",
            Stage::Transcode => "failed to convert video to mpeg-dash",
            Stage::Cleanup => "failed to remove merged file",
            Stage::MarkSuccess => "failed to mark video as processed",
            Stage::Publish => "failed to publish confirmation message",
        }
    }

    /// Video the failure belongs to, when the task got far enough to name one.
    pub fn video_id(&self) -> Option<i64> {
        match self {
            PipelineError::InvalidTask { video_id, .. } => Some(*video_id),
            _ => None,
        }
    }

    /// Errors that will fail the same way on every redelivery.
    pub fn is_permanent(&self) -> bool {
        matches!(self.stage(), Stage::Decode)
    }
}
