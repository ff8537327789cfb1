// Media processing
//
// Thin abstraction over ffmpeg/ffprobe for the assembly stages:
// - Processor: per-chunk rendering, concatenation and probing
// - Commands: command builders shared by the processor

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Render a still-image video carrying the chunk audio and burned-in subtitles
    async fn render_chunk_video(&self, background: &Path, audio: &Path, subtitles: &Path, output: &Path) -> Result<()>;

    /// Concatenate videos in the given order without re-encoding
    async fn concat_videos(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, media: &Path) -> Result<f64>;

    /// Check if ffmpeg and ffprobe can be executed
    async fn check_availability(&self) -> Result<()>;

    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
