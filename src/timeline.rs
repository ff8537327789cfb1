//! Reassembly of per-chunk artifacts into one timeline.

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{KataribeError, Result};
use crate::subtitle::Cue;

/// Byte-concatenate audio chunks in the given order into `output`.
///
/// The output is written through a single handle that is flushed only after
/// the last input has been copied.
pub async fn concat_audio(inputs: &[PathBuf], output: &Path) -> Result<u64> {
    if inputs.is_empty() {
        return Err(KataribeError::Input("no audio chunks to combine".to_string()));
    }

    let mut out = File::create(output).await?;
    let mut total = 0u64;

    for input in inputs {
        let mut source = File::open(input)
            .await
            .map_err(|e| KataribeError::FileNotFound(format!("{}: {}", input.display(), e)))?;
        total += tokio::io::copy(&mut source, &mut out).await?;
    }

    out.flush().await?;
    out.sync_all().await?;

    info!("Combined {} audio chunks into {} ({} bytes)", inputs.len(), output.display(), total);
    Ok(total)
}

/// Merge chunk-local cue tracks into one track.
///
/// Each track is paired with its chunk's duration; cues of chunk `k` are
/// shifted by the summed durations of chunks `0..k`, and ordinals restart at 1.
pub fn offset_cues(tracks: &[(Vec<Cue>, f64)]) -> Vec<Cue> {
    let mut merged = Vec::with_capacity(tracks.iter().map(|(cues, _)| cues.len()).sum());
    let mut offset = 0.0;

    for (cues, duration) in tracks {
        for cue in cues {
            merged.push(Cue {
                index: merged.len() + 1,
                start: cue.start + offset,
                end: cue.end + offset,
                text: cue.text.clone(),
            });
        }
        offset += duration.max(0.0);
    }

    merged
}
