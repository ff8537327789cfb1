use serde::{Deserialize, Serialize};

/// A time-coded unit of transcribed speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordToken {
    pub text: String,
    /// Start time in seconds, absent for some punctuation-only artifacts
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

impl WordToken {
    pub fn new<S: Into<String>>(text: S, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn untimed<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            start: None,
            end: None,
        }
    }
}

/// Resolved start/end for one word
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordTiming {
    pub start: f64,
    pub end: f64,
}

/// Fill in missing or invalid word times.
///
/// A missing start inherits the previous word's end, a missing end collapses to
/// the start. Starts never go backwards and ends never precede starts, so every
/// derived duration is finite and non-negative.
pub fn resolve_timings(words: &[WordToken]) -> Vec<WordTiming> {
    let mut timings = Vec::with_capacity(words.len());
    let mut last_start = 0.0_f64;
    let mut last_end = 0.0_f64;

    for word in words {
        let start = finite(word.start).unwrap_or(last_end).max(last_start).max(0.0);
        let end = finite(word.end).unwrap_or(start).max(start);

        timings.push(WordTiming { start, end });
        last_start = start;
        last_end = end;
    }

    timings
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Character offset to word index lookup over the concatenated word texts.
///
/// Offsets count Unicode scalar values, the same unit the segmenter walks in.
#[derive(Debug, Clone, Default)]
pub struct CharWordMap {
    entries: Vec<usize>,
}

impl CharWordMap {
    pub fn build(words: &[WordToken]) -> Self {
        let total: usize = words.iter().map(|w| w.text.chars().count()).sum();
        let mut entries = Vec::with_capacity(total);

        for (index, word) in words.iter().enumerate() {
            entries.extend(std::iter::repeat_n(index, word.text.chars().count()));
        }

        Self { entries }
    }

    /// Word owning the character at `offset`; offsets past the end clamp to the last entry
    pub fn word_at(&self, offset: usize) -> Option<usize> {
        let last = self.entries.len().checked_sub(1)?;
        Some(self.entries[offset.min(last)])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[usize] {
        &self.entries
    }
}
