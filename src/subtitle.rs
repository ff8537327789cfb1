use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::error::{KataribeError, Result};

/// One subtitle entry with a time range and text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// 1-based ordinal within its track
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Render cues as SubRip text
pub fn render_srt(cues: &[Cue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_time(cue.start),
            format_srt_time(cue.end),
            cue.text.trim()
        ));
    }

    srt_content
}

/// Write cues to an SRT file
pub async fn write_srt<P: AsRef<Path>>(cues: &[Cue], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing {} cues to {}", cues.len(), output_path.display());

    fs::write(output_path, render_srt(cues)).await?;
    Ok(())
}

/// Read cues from an SRT file
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KataribeError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path).await?;
    parse_srt(&content)
}

/// Parse SubRip text. Multi-line cue text is joined with '\n'.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in content.split("\n\n") {
        let mut lines = block.lines().skip_while(|line| line.trim().is_empty());
        let Some(index_line) = lines.next() else {
            continue;
        };

        let index = index_line
            .trim()
            .parse::<usize>()
            .map_err(|_| KataribeError::Subtitle(format!("Invalid cue number: {:?}", index_line)))?;

        let timing_line = lines
            .next()
            .ok_or_else(|| KataribeError::Subtitle(format!("Cue {} has no timing line", index)))?;
        let (start, end) = timing_line
            .split_once("-->")
            .ok_or_else(|| KataribeError::Subtitle(format!("Invalid timing line: {:?}", timing_line)))?;

        let text = lines.collect::<Vec<_>>().join("\n");

        cues.push(Cue {
            index,
            start: parse_srt_time(start.trim())?,
            end: parse_srt_time(end.trim())?,
            text: text.trim().to_string(),
        });
    }

    Ok(cues)
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Parse HH:MM:SS,mmm (a '.' separator is accepted as well) into seconds
pub fn parse_srt_time(value: &str) -> Result<f64> {
    let invalid = || KataribeError::Subtitle(format!("Invalid SRT timestamp: {:?}", value));

    let (clock, millis) = value.split_once([',', '.']).ok_or_else(invalid)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let secs: u64 = parts[2].parse().map_err(|_| invalid())?;
    let millis: u64 = millis.parse().map_err(|_| invalid())?;

    let total_milliseconds = (hours * 3600 + minutes * 60 + secs) * 1000 + millis;
    Ok(total_milliseconds as f64 / 1000.0)
}
