//! Chunk discovery, ordering and concatenation.

use crate::error::{PipelineError, PipelineResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

pub const CHUNK_EXTENSION: &str = "chunk";
pub const MERGED_FILE_NAME: &str = "merged.mp4";

static ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// First run of digits in the file name. `None` sorts before every ordinal.
pub fn ordinal(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    ORDINAL.find(name)?.as_str().parse().ok()
}

/// Sort chunk paths by ordinal; unparseable names first, ties by name.
pub fn sort_chunks(chunks: &mut [PathBuf]) {
    chunks.sort_by(|a, b| {
        ordinal(a)
            .cmp(&ordinal(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
}

/// All `*.chunk` regular files directly under `dir`, in merge order.
pub async fn discover_chunks(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let list_err = |source| PipelineError::ListChunks {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir).await.map_err(list_err)?;
    let mut chunks = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(CHUNK_EXTENSION) {
            continue;
        }
        if entry.file_type().await.map_err(list_err)?.is_file() {
            chunks.push(path);
        }
    }

    sort_chunks(&mut chunks);
    Ok(chunks)
}

/// Concatenate the video's chunks into `<dir>/merged.mp4`.
///
/// `explicit` is the caller-supplied chunk order; without it the directory is
/// scanned. Nothing is created when there are no chunks. A failure midway
/// leaves the partial merged file behind.
pub async fn merge(dir: &Path, explicit: Option<&[String]>) -> PipelineResult<PathBuf> {
    let chunks = match explicit {
        Some(names) => names.iter().map(|name| dir.join(name)).collect(),
        None => discover_chunks(dir).await?,
    };
    if chunks.is_empty() {
        return Err(PipelineError::NoChunks(dir.to_path_buf()));
    }

    let output_path = dir.join(MERGED_FILE_NAME);
    let output = File::create(&output_path)
        .await
        .map_err(|source| PipelineError::CreateOutput {
            path: output_path.clone(),
            source,
        })?;
    let mut writer = BufWriter::new(output);

    for chunk in &chunks {
        let mut input = File::open(chunk)
            .await
            .map_err(|source| PipelineError::OpenChunk {
                path: chunk.clone(),
                source,
            })?;
        let copied = tokio::io::copy(&mut input, &mut writer)
            .await
            .map_err(|source| PipelineError::CopyChunk {
                path: chunk.clone(),
                source,
            })?;
        debug!(chunk = %chunk.display(), bytes = copied, "Chunk appended");
    }

    writer
        .flush()
        .await
        .map_err(|source| PipelineError::CopyChunk {
            path: output_path.clone(),
            source,
        })?;

    Ok(output_path)
}
