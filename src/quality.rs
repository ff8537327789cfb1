use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{KataribeError, Result};
use crate::subtitle::Cue;

/// Metrics computed over a cue track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackQuality {
    pub cue_count: usize,
    /// Longest cue text in characters
    pub max_cue_chars: usize,
    /// Share of cues whose text repeats an earlier cue
    pub repetitive_cues: f64,
    pub longest_cue_seconds: f64,
}

impl TrackQuality {
    pub fn measure(cues: &[Cue]) -> Self {
        let mut text_counts: HashMap<&str, usize> = HashMap::new();
        for cue in cues {
            let text = cue.text.trim();
            if !text.is_empty() {
                *text_counts.entry(text).or_insert(0) += 1;
            }
        }

        // Only count duplicates
        let repeated: usize = text_counts.values().filter(|&&n| n > 1).map(|&n| n - 1).sum();
        let repetitive_cues = if cues.is_empty() {
            0.0
        } else {
            repeated as f64 / cues.len() as f64
        };

        Self {
            cue_count: cues.len(),
            max_cue_chars: cues.iter().map(|c| c.text.chars().count()).max().unwrap_or(0),
            repetitive_cues,
            longest_cue_seconds: cues.iter().map(|c| c.end - c.start).fold(0.0, f64::max),
        }
    }
}

/// Structural checks for produced and corrected cue tracks
#[derive(Debug, Clone)]
pub struct QualityValidator {
    repetitive_threshold: f64,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl QualityValidator {
    pub fn new(repetitive_threshold: f64) -> Self {
        Self { repetitive_threshold }
    }

    /// Ordinals run 1..=n, every cue has `end >= start`, and starts never decrease
    pub fn validate_track(&self, cues: &[Cue]) -> Result<TrackQuality> {
        for (i, cue) in cues.iter().enumerate() {
            if cue.index != i + 1 {
                return Err(KataribeError::Quality(format!(
                    "cue at position {} has ordinal {}",
                    i + 1,
                    cue.index
                )));
            }
            if !(cue.end >= cue.start) || cue.start < 0.0 {
                return Err(KataribeError::Quality(format!(
                    "cue {} has invalid range {:.3} --> {:.3}",
                    cue.index, cue.start, cue.end
                )));
            }
            if cue.text.trim().is_empty() {
                return Err(KataribeError::Quality(format!("cue {} has no text", cue.index)));
            }
        }

        if let Some(pair) = cues.windows(2).find(|w| w[1].start < w[0].start) {
            return Err(KataribeError::Quality(format!(
                "cue {} starts before cue {}",
                pair[1].index, pair[0].index
            )));
        }

        let quality = TrackQuality::measure(cues);
        if quality.repetitive_cues > self.repetitive_threshold {
            return Err(KataribeError::Quality(format!(
                "Too many repetitive cues: {:.2} > {:.2}",
                quality.repetitive_cues, self.repetitive_threshold
            )));
        }

        Ok(quality)
    }

    /// A corrected track must keep every ordinal and timestamp of its source
    pub fn validate_correction(&self, source: &[Cue], corrected: &[Cue]) -> Result<TrackQuality> {
        if source.len() != corrected.len() {
            return Err(KataribeError::Quality(format!(
                "corrected track has {} cues, source has {}",
                corrected.len(),
                source.len()
            )));
        }

        if let Some((old, _)) = source
            .iter()
            .zip(corrected)
            .find(|(old, new)| old.index != new.index || old.start != new.start || old.end != new.end)
        {
            return Err(KataribeError::Quality(format!("correction changed the timing of cue {}", old.index)));
        }

        self.validate_track(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(index: usize, start: f64, end: f64, text: &str) -> Cue {
        Cue {
            index,
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_track() {
        let cues = vec![cue(1, 0.0, 1.0, "一"), cue(2, 1.0, 2.5, "二"), cue(3, 2.5, 2.5, "三")];
        let quality = QualityValidator::default().validate_track(&cues).unwrap();

        assert_eq!(quality.cue_count, 3);
        assert_eq!(quality.max_cue_chars, 1);
        assert_eq!(quality.longest_cue_seconds, 1.5);
    }

    #[test]
    fn rejects_structural_problems() {
        let validator = QualityValidator::default();

        assert!(validator.validate_track(&[cue(2, 0.0, 1.0, "a")]).is_err());
        assert!(validator.validate_track(&[cue(1, 2.0, 1.0, "a")]).is_err());
        assert!(validator.validate_track(&[cue(1, 2.0, 3.0, "a"), cue(2, 1.0, 3.0, "b")]).is_err());
        assert!(validator.validate_track(&[cue(1, 0.0, 1.0, " ")]).is_err());
    }

    #[test]
    fn rejects_repetitive_tracks() {
        let cues: Vec<Cue> = (1..=4).map(|i| cue(i, i as f64, i as f64 + 1.0, "同じ")).collect();
        let result = QualityValidator::new(0.5).validate_track(&cues);
        assert!(matches!(result, Err(KataribeError::Quality(_))));
    }

    #[test]
    fn correction_must_keep_timing() {
        let validator = QualityValidator::default();
        let source = vec![cue(1, 0.0, 1.0, "きょう"), cue(2, 1.0, 2.0, "あした")];

        let fixed = vec![cue(1, 0.0, 1.0, "今日"), cue(2, 1.0, 2.0, "明日")];
        assert!(validator.validate_correction(&source, &fixed).is_ok());

        let shifted = vec![cue(1, 0.0, 1.0, "今日"), cue(2, 1.1, 2.0, "明日")];
        assert!(validator.validate_correction(&source, &shifted).is_err());
        assert!(validator.validate_correction(&source, &fixed[..1]).is_err());
    }
}
