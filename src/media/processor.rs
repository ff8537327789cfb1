use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{MediaCommandBuilder, MediaProcessorTrait};
use crate::config::MediaConfig;
use crate::error::{KataribeError, Result};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn render_chunk_video(&self, background: &Path, audio: &Path, subtitles: &Path, output: &Path) -> Result<()> {
        for input in [background, audio, subtitles] {
            if !input.exists() {
                return Err(KataribeError::FileNotFound(input.display().to_string()));
            }
        }

        info!(
            "Rendering {} from {} with subtitles {}",
            output.display(),
            audio.display(),
            subtitles.display()
        );

        let command = self
            .command_builder
            .render_chunk(background, audio, subtitles, output, &self.config);
        command.execute().await?;

        debug!("Rendered {}", output.display());
        Ok(())
    }

    async fn concat_videos(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(KataribeError::Input("no videos to concatenate".to_string()));
        }

        let list_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // removed when dropped, after ffmpeg has finished with it
        let list_file = tempfile::Builder::new()
            .prefix("concat-")
            .suffix(".txt")
            .tempfile_in(list_dir)?;
        tokio::fs::write(list_file.path(), concat_list_content(inputs, list_dir)).await?;

        info!("Concatenating {} videos into {}", inputs.len(), output.display());
        let command = self.command_builder.concat(list_file.path(), output);
        command.execute().await?;

        info!("Video concatenation completed");
        Ok(())
    }

    async fn probe_duration(&self, media: &Path) -> Result<f64> {
        if !media.exists() {
            return Err(KataribeError::FileNotFound(media.display().to_string()));
        }
        let stdout = self.command_builder.probe_duration(media).execute_with_output().await?;
        parse_duration(&stdout)
            .ok_or_else(|| KataribeError::Media(format!("Could not read duration of {}: {:?}", media.display(), stdout.trim())))
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder.version_check().execute().await.map_err(|e| {
            KataribeError::Media(format!("{} is not available: {}", self.config.binary_path, e))
        })?;
        self.command_builder.probe_version_check().execute().await.map_err(|e| {
            KataribeError::Media(format!("{} is not available: {}", self.config.probe_path, e))
        })?;

        info!("Media processor is available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let stdout = self.command_builder.version_check().execute_with_output().await?;
        // first line carries the version
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}

/// Concat demuxer list; entries are relative to the list file's directory when possible
pub fn concat_list_content(inputs: &[PathBuf], list_dir: &Path) -> String {
    inputs
        .iter()
        .map(|input| {
            let entry = pathdiff::diff_paths(input, list_dir)
                .filter(|relative| !relative.as_os_str().is_empty())
                .unwrap_or_else(|| input.clone());
            format!("file '{}'\n", entry.to_string_lossy().replace('\'', "'\\''"))
        })
        .collect()
}

fn parse_duration(output: &str) -> Option<f64> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}
