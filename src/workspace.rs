use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{KataribeError, Result};

/// Per-chunk artifact kinds, each with a fixed `output-<n>` filename pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Audio,
    Subtitle,
    CorrectedSubtitle,
    Video,
    Words,
}

impl ArtifactKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Audio => ".mp3",
            Self::Subtitle => ".srt",
            Self::CorrectedSubtitle => "-corrected.srt",
            Self::Video => ".mp4",
            Self::Words => ".words.json",
        }
    }

    fn pattern(&self) -> Result<Regex> {
        Regex::new(&format!(r"^output-(\d+){}$", regex::escape(self.suffix())))
            .map_err(|e| KataribeError::Config(format!("invalid artifact pattern: {}", e)))
    }
}

/// A chunk file discovered in the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkArtifact {
    pub ordinal: usize,
    pub path: PathBuf,
}

/// The directory every stage reads from and writes to
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join("report.md")
    }

    pub fn speech_path(&self) -> PathBuf {
        self.dir.join("speech.txt")
    }

    pub fn blog_path(&self) -> PathBuf {
        self.dir.join("blog.md")
    }

    pub fn chunk_path(&self, kind: ArtifactKind, ordinal: usize) -> PathBuf {
        self.dir.join(format!("output-{}{}", ordinal, kind.suffix()))
    }

    pub fn final_audio_path(&self) -> PathBuf {
        self.dir.join("output-final.mp3")
    }

    pub fn final_video_path(&self) -> PathBuf {
        self.dir.join("output-final.mp4")
    }

    pub fn final_subtitle_path(&self) -> PathBuf {
        self.dir.join("output-final.srt")
    }

    /// Download target of video generation jobs
    pub fn generated_video_path(&self) -> PathBuf {
        self.dir.join("video.mp4")
    }

    /// Download target of music generation jobs
    pub fn music_path(&self) -> PathBuf {
        self.dir.join("music.mp3")
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Chunk files of one kind, sorted by numeric ordinal (`output-10` after `output-2`)
    pub fn chunk_artifacts(&self, kind: ArtifactKind) -> Result<Vec<ChunkArtifact>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let pattern = kind.pattern()?;
        let mut artifacts = Vec::new();

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Some(ordinal) = pattern
                .captures(&name)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<usize>().ok())
            else {
                continue;
            };
            artifacts.push(ChunkArtifact {
                ordinal,
                path: entry.into_path(),
            });
        }

        artifacts.sort_by_key(|a| a.ordinal);
        debug!("Found {} {:?} artifacts in {}", artifacts.len(), kind, self.dir.display());
        Ok(artifacts)
    }

    /// Corrected subtitles when present, else plain ones, else none
    pub fn preferred_subtitle(&self, ordinal: usize) -> Option<PathBuf> {
        [ArtifactKind::CorrectedSubtitle, ArtifactKind::Subtitle]
            .into_iter()
            .map(|kind| self.chunk_path(kind, ordinal))
            .find(|path| path.is_file())
    }

    /// Delete every chunk file of one kind, returning how many were removed
    pub async fn remove_chunks(&self, kind: ArtifactKind) -> Result<usize> {
        let artifacts = self.chunk_artifacts(kind)?;
        for artifact in &artifacts {
            tokio::fs::remove_file(&artifact.path).await?;
        }
        if !artifacts.is_empty() {
            info!("Removed {} stale {:?} chunk(s)", artifacts.len(), kind);
        }
        Ok(artifacts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    fn workspace_with(files: &[&str]) -> (TempDir, Workspace) {
        let temp = TempDir::new().unwrap();
        for name in files {
            temp.child(name).write_str("x").unwrap();
        }
        let workspace = Workspace::new(temp.path());
        (temp, workspace)
    }

    #[test]
    fn orders_chunks_numerically() {
        let (_temp, workspace) = workspace_with(&[
            "output-10.mp3",
            "output-2.mp3",
            "output-0.mp3",
            "output-final.mp3",
            "output-1.srt",
            "notes.mp3",
        ]);

        let ordinals: Vec<usize> = workspace
            .chunk_artifacts(ArtifactKind::Audio)
            .unwrap()
            .iter()
            .map(|a| a.ordinal)
            .collect();
        assert_eq!(ordinals, vec![0, 2, 10]);
    }

    #[test]
    fn plain_and_corrected_subtitles_are_distinct() {
        let (_temp, workspace) = workspace_with(&["output-0.srt", "output-0-corrected.srt", "output-1.srt"]);

        assert_eq!(workspace.chunk_artifacts(ArtifactKind::Subtitle).unwrap().len(), 2);
        assert_eq!(workspace.chunk_artifacts(ArtifactKind::CorrectedSubtitle).unwrap().len(), 1);
    }

    #[test]
    fn prefers_corrected_subtitle() {
        let (_temp, workspace) = workspace_with(&["output-0.srt", "output-0-corrected.srt", "output-1.srt"]);

        assert_eq!(
            workspace.preferred_subtitle(0),
            Some(workspace.chunk_path(ArtifactKind::CorrectedSubtitle, 0))
        );
        assert_eq!(workspace.preferred_subtitle(1), Some(workspace.chunk_path(ArtifactKind::Subtitle, 1)));
        assert_eq!(workspace.preferred_subtitle(2), None);
    }

    #[test]
    fn missing_directory_has_no_chunks() {
        let workspace = Workspace::new("/nonexistent/kataribe/out");
        assert!(workspace.chunk_artifacts(ArtifactKind::Video).unwrap().is_empty());
    }

    #[tokio::test]
    async fn removes_stale_chunks_of_one_kind() {
        let (temp, workspace) = workspace_with(&["output-0.mp3", "output-1.mp3", "output-0.srt"]);

        assert_eq!(workspace.remove_chunks(ArtifactKind::Audio).await.unwrap(), 2);
        assert!(!temp.child("output-0.mp3").path().exists());
        assert!(temp.child("output-0.srt").path().exists());
    }
}
