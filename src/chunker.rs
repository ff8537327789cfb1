//! Sentence-bounded text chunking for speech synthesis requests.

use crate::error::{KataribeError, Result};

/// Characters that end a sentence, full-width and half-width forms.
pub const SENTENCE_TERMINALS: [char; 8] = ['。', '．', '！', '？', '｡', '.', '!', '?'];

pub fn is_sentence_terminal(ch: char) -> bool {
    SENTENCE_TERMINALS.contains(&ch)
}

/// Split text into sentences, keeping each terminal run attached to its sentence.
///
/// A half-width `.` between two ASCII digits is part of a number, not a terminal.
/// Concatenating the result reproduces `text` exactly.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut sentence_start = 0;

    for (pos, &(byte_idx, ch)) in chars.iter().enumerate() {
        if !is_terminal_at(&chars, pos) {
            continue;
        }
        // keep "！？" and "..." together
        if chars.get(pos + 1).is_some_and(|_| is_terminal_at(&chars, pos + 1)) {
            continue;
        }
        let end = byte_idx + ch.len_utf8();
        sentences.push(&text[sentence_start..end]);
        sentence_start = end;
    }

    if sentence_start < text.len() {
        sentences.push(&text[sentence_start..]);
    }

    sentences
}

fn is_terminal_at(chars: &[(usize, char)], pos: usize) -> bool {
    let ch = chars[pos].1;
    if !is_sentence_terminal(ch) {
        return false;
    }
    if ch == '.' {
        let prev_digit = pos > 0 && chars[pos - 1].1.is_ascii_digit();
        let next_digit = chars.get(pos + 1).is_some_and(|&(_, c)| c.is_ascii_digit());
        if prev_digit && next_digit {
            return false;
        }
    }
    true
}

/// Group sentences into chunks of at most `max_chars` characters.
///
/// A sentence longer than `max_chars` is never split; it becomes a chunk of its own.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Result<Vec<String>> {
    if max_chars == 0 {
        return Err(KataribeError::Input("maximum chunk size must be positive".to_string()));
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current.push_str(sentence);
        current_len += sentence_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    Ok(chunks)
}
