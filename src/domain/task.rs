use crate::error::{PipelineError, PipelineResult, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Conversion request decoded from one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub video_id: i64,
    /// Directory holding the chunk files; output is written here too.
    pub path: PathBuf,
    /// Chunk file names in merge order. When absent the directory is scanned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
}

impl Task {
    /// Decode and validate a message body.
    pub fn decode(body: &[u8]) -> PipelineResult<Self> {
        let task: Task = serde_json::from_slice(body)?;
        task.validate()?;
        Ok(task)
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(self.invalid("path is empty".to_string()));
        }
        if let Some(chunks) = &self.chunks {
            for name in chunks {
                if !is_bare_file_name(name) {
                    return Err(self.invalid(format!(
                        "chunk {:?} is not a plain file name",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> PipelineError {
        PipelineError::InvalidTask {
            video_id: self.video_id,
            reason,
        }
    }

    pub fn confirmation(&self) -> Confirmation {
        Confirmation {
            video_id: self.video_id,
            path: self.path.clone(),
        }
    }
}

fn is_bare_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Completion event, same shape as the inbound task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub video_id: i64,
    pub path: PathBuf,
}

/// Row body of the error ledger (`process_errors_log.error_details`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// 0 when the message could not be decoded.
    pub video_id: i64,
    pub stage: Stage,
    pub error: String,
    pub details: String,
    pub time: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn from_failure(video_id: i64, err: &PipelineError) -> Self {
        Self {
            video_id,
            stage: err.stage(),
            error: err.summary().to_string(),
            details: err.to_string(),
            time: Utc::now(),
        }
    }
}
