//! MPEG-DASH packaging of a merged upload.

use crate::error::{PipelineError, PipelineResult};
use crate::ports::encoder::Encoder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DASH_DIR_NAME: &str = "mpeg-dash";
pub const MANIFEST_FILE_NAME: &str = "output.mpd";

pub fn dash_dir(video_dir: &Path) -> PathBuf {
    video_dir.join(DASH_DIR_NAME)
}

pub fn manifest_path(video_dir: &Path) -> PathBuf {
    dash_dir(video_dir).join(MANIFEST_FILE_NAME)
}

/// Runs the encoder against a merged file and removes the input afterwards.
pub struct Transcoder<E> {
    encoder: E,
    timeout: Option<Duration>,
}

impl<E: Encoder> Transcoder<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            timeout: None,
        }
    }

    /// Give up on encoder runs that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Produce `<video_dir>/mpeg-dash/output.mpd` from `merged`.
    ///
    /// The merged file is deleted only after the encoder succeeded; failing to
    /// delete it is still a pipeline failure.
    pub async fn transcode(&self, video_dir: &Path, merged: &Path) -> PipelineResult<PathBuf> {
        let out_dir = dash_dir(video_dir);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|source| PipelineError::CreateDir {
                path: out_dir.clone(),
                source,
            })?;

        let manifest = manifest_path(video_dir);
        info!(input = %merged.display(), manifest = %manifest.display(), "Converting video to mpeg-dash");

        let run = self.encoder.encode_dash(merged, &manifest);
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| PipelineError::EncoderTimeout(limit))?,
            None => run.await,
        }
        .map_err(PipelineError::EncoderSpawn)?;

        if !output.success {
            return Err(PipelineError::EncoderFailed {
                status: output.status,
                output: output.log,
            });
        }
        debug!(log = %output.log, "Encoder finished");

        tokio::fs::remove_file(merged)
            .await
            .map_err(|source| PipelineError::Cleanup {
                path: merged.to_path_buf(),
                source,
            })?;

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::ports::encoder::{EncoderOutput, MockEncoder};
    use async_trait::async_trait;
    use std::io;
    use tempfile::tempdir;

    fn ok_output() -> EncoderOutput {
        EncoderOutput {
            success: true,
            status: "exit status: 0".to_string(),
            log: String::new(),
        }
    }

    #[tokio::test]
    async fn test_transcode_removes_merged_file_on_success() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("merged.mp4");
        std::fs::write(&merged, "video").unwrap();

        let mut encoder = MockEncoder::new();
        encoder
            .expect_encode_dash()
            .withf(|input, manifest| {
                input.ends_with("merged.mp4") && manifest.ends_with("mpeg-dash/output.mpd")
            })
            .times(1)
            .returning(|_, _| Ok(ok_output()));

        let manifest = Transcoder::new(encoder)
            .transcode(dir.path(), &merged)
            .await
            .unwrap();

        assert_eq!(manifest, dir.path().join("mpeg-dash").join("output.mpd"));
        assert!(dir.path().join("mpeg-dash").is_dir());
        assert!(!merged.exists());
    }

    #[tokio::test]
    async fn test_transcode_failure_keeps_merged_file_and_attaches_output() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("merged.mp4");
        std::fs::write(&merged, "video").unwrap();

        let mut encoder = MockEncoder::new();
        encoder.expect_encode_dash().returning(|_, _| {
            Ok(EncoderOutput {
                success: false,
                status: "exit status: 1".to_string(),
                log: "moov atom not found".to_string(),
            })
        });

        let err = Transcoder::new(encoder)
            .transcode(dir.path(), &merged)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Transcode);
        assert!(err.to_string().contains("moov atom not found"));
        assert!(merged.exists());
    }

    #[tokio::test]
    async fn test_transcode_spawn_error() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("merged.mp4");
        std::fs::write(&merged, "video").unwrap();

        let mut encoder = MockEncoder::new();
        encoder
            .expect_encode_dash()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::NotFound, "ffmpeg not found")));

        let err = Transcoder::new(encoder)
            .transcode(dir.path(), &merged)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EncoderSpawn(_)));
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_reported_after_successful_encode() {
        let dir = tempdir().unwrap();
        // merged file was never written, so removal fails
        let merged = dir.path().join("merged.mp4");

        let mut encoder = MockEncoder::new();
        encoder
            .expect_encode_dash()
            .returning(|_, _| Ok(ok_output()));

        let err = Transcoder::new(encoder)
            .transcode(dir.path(), &merged)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Cleanup);
    }

    #[tokio::test]
    async fn test_directory_create_failure() {
        let dir = tempdir().unwrap();
        // a regular file where the output directory should go
        std::fs::write(dir.path().join(DASH_DIR_NAME), "").unwrap();
        let merged = dir.path().join("merged.mp4");
        std::fs::write(&merged, "video").unwrap();

        let mut encoder = MockEncoder::new();
        encoder.expect_encode_dash().never();

        let err = Transcoder::new(encoder)
            .transcode(dir.path(), &merged)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::DirectoryCreate);
    }

    struct StalledEncoder;

    #[async_trait]
    impl Encoder for StalledEncoder {
        async fn encode_dash(&self, _: &Path, _: &Path) -> io::Result<EncoderOutput> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ok_output())
        }
    }

    #[tokio::test]
    async fn test_encoder_timeout_keeps_sub_second_precision() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("merged.mp4");
        std::fs::write(&merged, "video").unwrap();

        let err = Transcoder::new(StalledEncoder)
            .with_timeout(Some(Duration::from_millis(50)))
            .transcode(dir.path(), &merged)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EncoderTimeout(d) if d == Duration::from_millis(50)));
        assert_eq!(err.stage(), Stage::Transcode);
        assert!(err.to_string().contains("50ms"));
        assert!(merged.exists());
    }
}
