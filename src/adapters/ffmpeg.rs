use crate::ports::encoder::{Encoder, EncoderOutput};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Runs the `ffmpeg` binary to package a file as MPEG-DASH.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, input: &Path, manifest: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-nostdin")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-f")
            .arg("dash")
            .arg(manifest)
            .kill_on_drop(true);
        command
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode_dash(&self, input: &Path, manifest: &Path) -> io::Result<EncoderOutput> {
        let output = self.command(input, manifest).output().await?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(EncoderOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let encoder = FfmpegEncoder::new("/usr/bin/ffmpeg");
        let command = encoder.command(
            Path::new("/data/42/merged.mp4"),
            Path::new("/data/42/mpeg-dash/output.mpd"),
        );
        let std = command.as_std();

        assert_eq!(std.get_program(), "/usr/bin/ffmpeg");
        let args: Vec<_> = std.get_args().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            [
                "-nostdin",
                "-y",
                "-i",
                "/data/42/merged.mp4",
                "-f",
                "dash",
                "/data/42/mpeg-dash/output.mpd"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg-binary");
        let result = encoder
            .encode_dash(Path::new("in.mp4"), Path::new("out.mpd"))
            .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        // `false` ignores its arguments and exits with status 1
        let encoder = FfmpegEncoder::new("false");
        let output = encoder
            .encode_dash(Path::new("in.mp4"), Path::new("out.mpd"))
            .await
            .unwrap();
        assert!(!output.success);
        assert!(output.status.contains('1'));
    }
}
