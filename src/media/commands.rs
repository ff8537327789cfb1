use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::config::MediaConfig;
use crate::error::{KataribeError, Result};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Copy all streams
    pub fn copy_streams(self) -> Self {
        self.arg("-c").arg("copy")
    }

    pub fn frame_rate(self, fps: u32) -> Self {
        self.arg("-r").arg(fps.to_string())
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        self.execute_with_output().await.map(|_| ())
    }

    /// Execute the command and return its standard output
    pub async fn execute_with_output(&self) -> Result<String> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| KataribeError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KataribeError::Media(format!("{} failed: {}", self.description, stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builder for the commands the pipeline runs
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
        }
    }

    /// Still-image video with the chunk audio and burned-in subtitles
    pub fn render_chunk<P: AsRef<Path>>(
        &self,
        background: P,
        audio: P,
        subtitles: P,
        output: P,
        config: &MediaConfig,
    ) -> MediaCommand {
        let mut filter = format!("subtitles={}", escape_filter_path(subtitles.as_ref()));
        if let Some(style) = config.subtitle_style.as_deref().filter(|s| !s.trim().is_empty()) {
            filter.push_str(&format!(":force_style='{}'", style.replace('\'', "")));
        }

        MediaCommand::new(&self.binary_path, "Chunk video rendering")
            .overwrite()
            .arg("-loop")
            .arg("1")
            .input(background)
            .input(audio)
            .video_codec("libx264")
            .arg("-tune")
            .arg("stillimage")
            .audio_codec("aac")
            .audio_bitrate(config.audio_bitrate.clone())
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-shortest")
            .frame_rate(config.frame_rate)
            .video_filter(filter)
            .args(config.video_options.iter().cloned())
            .output(output)
    }

    /// Concat demuxer with stream copy
    pub fn concat<P: AsRef<Path>>(&self, list_file: P, output: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Video concatenation")
            .overwrite()
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .input(list_file)
            .copy_streams()
            .output(output)
    }

    /// Container duration in seconds, printed as a bare number
    pub fn probe_duration<P: AsRef<Path>>(&self, media: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Duration probe")
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .output(media)
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }

    pub fn probe_version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Probe version check").arg("-version")
    }
}

/// Escape a path for use as a filter option value
pub fn escape_filter_path(path: &Path) -> String {
    let mut escaped = String::new();
    for ch in path.to_string_lossy().chars() {
        match ch {
            '\\' => escaped.push('/'),
            ':' | '\'' | ',' | '[' | ']' | ';' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
