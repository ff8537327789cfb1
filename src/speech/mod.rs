// Speech services
//
// Synthesis turns chunk text into audio files, transcription turns audio
// back into time-coded words.

pub mod elevenlabs;

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

pub use elevenlabs::ElevenLabsClient;

use crate::alignment::WordToken;
use crate::error::{KataribeError, Result};

/// Text-to-speech capability
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into an audio file at `dest`, returning the bytes written
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<u64>;
}

/// Speech-to-text capability with word-level timestamps
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<WordToken>>;
}

/// Persist transcribed words next to the chunk so cues can be rebuilt later
pub async fn write_words<P: AsRef<Path>>(words: &[WordToken], path: P) -> Result<()> {
    let path = path.as_ref();
    debug!("Saving {} words to {}", words.len(), path.display());
    tokio::fs::write(path, serde_json::to_vec_pretty(words)?).await?;
    Ok(())
}

pub async fn read_words<P: AsRef<Path>>(path: P) -> Result<Vec<WordToken>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KataribeError::FileNotFound(path.display().to_string()));
    }
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}
