pub mod policy;
pub mod tokenizer;

pub use policy::{ClausePolicy, IpadicClausePolicy};
pub use tokenizer::{
    LexicalToken, MecabTokenizer, MorphTokenizer, PartOfSpeech, ScriptTokenizer, TokenizerFactory,
};

use std::sync::Arc;
use tracing::debug;

use crate::alignment::{CharWordMap, WordTiming, WordToken, resolve_timings};
use crate::chunker::is_sentence_terminal;
use crate::config::SubtitleConfig;
use crate::error::{KataribeError, Result};
use crate::subtitle::Cue;

/// Layout limits for generated cues
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterOptions {
    /// A space is inserted at the next clause boundary once a line run exceeds this
    pub max_line_chars: usize,
    /// Close a cue before a clause that would push it past this many seconds
    pub max_cue_duration: Option<f64>,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            max_line_chars: 10,
            max_cue_duration: None,
        }
    }
}

impl From<&SubtitleConfig> for SegmenterOptions {
    fn from(config: &SubtitleConfig) -> Self {
        Self {
            max_line_chars: config.max_line_chars,
            max_cue_duration: config.max_cue_duration,
        }
    }
}

/// Clause-aware cue segmentation over word-level transcription output.
///
/// Cues end at sentence terminals; within a cue, clause boundaries are the
/// only places a space may be inserted. Cue times come from the words that
/// own the cue's first and last visible characters.
pub struct CueSegmenter {
    tokenizer: Arc<dyn MorphTokenizer>,
    policy: Arc<dyn ClausePolicy>,
    options: SegmenterOptions,
}

impl CueSegmenter {
    pub fn new(tokenizer: Arc<dyn MorphTokenizer>, policy: Arc<dyn ClausePolicy>, options: SegmenterOptions) -> Self {
        Self {
            tokenizer,
            policy,
            options,
        }
    }

    pub fn from_config(config: &SubtitleConfig) -> Self {
        Self::new(
            TokenizerFactory::create(config),
            Arc::new(IpadicClausePolicy),
            SegmenterOptions::from(config),
        )
    }

    pub fn tokenizer_name(&self) -> &'static str {
        self.tokenizer.name()
    }

    pub fn segment(&self, words: &[WordToken]) -> Result<Vec<Cue>> {
        let text: String = words.iter().map(|w| w.text.as_str()).collect();
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let map = CharWordMap::build(words);
        let timings = resolve_timings(words);
        let tokens = self.tokenizer.tokenize(&text)?;

        let covered: String = tokens.iter().map(|t| t.surface.as_str()).collect();
        if covered != text {
            return Err(KataribeError::Tokenizer(format!(
                "{} tokens do not cover the transcript ({} of {} characters)",
                self.tokenizer.name(),
                covered.chars().count(),
                map.len()
            )));
        }

        let mut builder = CueBuilder::new(&map, &timings, &self.options);
        let mut offset = 0;

        for (i, token) in tokens.iter().enumerate() {
            let previous = i.checked_sub(1).map(|p| &tokens[p]);
            if builder.has_open_clause() && self.policy.starts_clause(previous, token) {
                builder.close_clause();
            }

            builder.push_token(token, offset);
            offset += token.char_len();

            if ends_sentence(&tokens, i) {
                builder.close_clause();
                builder.close_cue();
            }
        }

        builder.close_clause();
        builder.close_cue();

        let cues = builder.finish();
        debug!(
            "Segmented {} words into {} cues with {} tokenizer",
            words.len(),
            cues.len(),
            self.tokenizer.name()
        );
        Ok(cues)
    }
}

fn ends_sentence(tokens: &[LexicalToken], i: usize) -> bool {
    let Some(last) = tokens[i].surface.trim_end().chars().last() else {
        return false;
    };
    if !is_sentence_terminal(last) {
        return false;
    }
    if last == '.' {
        let prev_digit = i
            .checked_sub(1)
            .and_then(|p| tokens[p].surface.chars().last())
            .is_some_and(|c| c.is_ascii_digit());
        let next_digit = tokens
            .get(i + 1)
            .and_then(|t| t.surface.chars().next())
            .is_some_and(|c| c.is_ascii_digit());
        if tokens[i].surface == "." && prev_digit && next_digit {
            return false;
        }
    }
    true
}

#[derive(Debug, Clone, Copy)]
struct Span {
    first: usize,
    last: usize,
}

impl Span {
    fn extend(span: &mut Option<Span>, offset: usize) {
        match span {
            Some(s) => s.last = offset,
            None => *span = Some(Span { first: offset, last: offset }),
        }
    }

    fn merge(self, other: Span) -> Span {
        Span {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        }
    }
}

struct CueBuilder<'a> {
    map: &'a CharWordMap,
    timings: &'a [WordTiming],
    options: &'a SegmenterOptions,
    cues: Vec<Cue>,
    cue_text: String,
    cue_span: Option<Span>,
    clause_text: String,
    clause_span: Option<Span>,
    chars_since_space: usize,
    space_pending: bool,
}

impl<'a> CueBuilder<'a> {
    fn new(map: &'a CharWordMap, timings: &'a [WordTiming], options: &'a SegmenterOptions) -> Self {
        Self {
            map,
            timings,
            options,
            cues: Vec::new(),
            cue_text: String::new(),
            cue_span: None,
            clause_text: String::new(),
            clause_span: None,
            chars_since_space: 0,
            space_pending: false,
        }
    }

    fn has_open_clause(&self) -> bool {
        !self.clause_text.is_empty()
    }

    fn push_token(&mut self, token: &LexicalToken, offset: usize) {
        self.clause_text.push_str(&token.surface);
        for (i, ch) in token.surface.chars().enumerate() {
            if !ch.is_whitespace() {
                Span::extend(&mut self.clause_span, offset + i);
            }
        }
    }

    fn close_clause(&mut self) {
        let clause = std::mem::take(&mut self.clause_text);
        // whitespace-only clauses carry nothing visible
        let Some(span) = self.clause_span.take() else {
            return;
        };

        if let (Some(limit), Some(cue_span)) = (self.options.max_cue_duration, self.cue_span) {
            if self.end_time(span.last) - self.start_time(cue_span.first) > limit {
                self.close_cue();
            }
        }

        let clause = if self.cue_text.is_empty() {
            clause.trim_start()
        } else {
            clause.as_str()
        };

        if self.space_pending && !self.cue_text.ends_with(char::is_whitespace) {
            self.cue_text.push(' ');
            self.chars_since_space = 0;
        }
        self.space_pending = false;

        self.cue_text.push_str(clause);
        self.chars_since_space += clause.chars().filter(|c| !c.is_whitespace()).count();
        if self.chars_since_space > self.options.max_line_chars {
            self.space_pending = true;
        }

        self.cue_span = Some(match self.cue_span {
            Some(existing) => existing.merge(span),
            None => span,
        });
    }

    fn close_cue(&mut self) {
        let text = std::mem::take(&mut self.cue_text);
        self.chars_since_space = 0;
        self.space_pending = false;

        let Some(span) = self.cue_span.take() else {
            return;
        };

        let start = self.start_time(span.first);
        let end = self.end_time(span.last).max(start);
        self.cues.push(Cue {
            index: self.cues.len() + 1,
            start,
            end,
            text: text.trim().to_string(),
        });
    }

    fn start_time(&self, offset: usize) -> f64 {
        self.map
            .word_at(offset)
            .and_then(|w| self.timings.get(w))
            .map(|t| t.start)
            .unwrap_or(0.0)
    }

    fn end_time(&self, offset: usize) -> f64 {
        self.map
            .word_at(offset)
            .and_then(|w| self.timings.get(w))
            .map(|t| t.end)
            .unwrap_or(0.0)
    }

    fn finish(self) -> Vec<Cue> {
        self.cues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "これはテストです。とても長い文章かもしれません。";

    fn words_per_char(text: &str, step: f64) -> Vec<WordToken> {
        text.chars()
            .enumerate()
            .map(|(i, c)| WordToken::new(c.to_string(), i as f64 * step, (i + 1) as f64 * step))
            .collect()
    }

    fn script_segmenter(options: SegmenterOptions) -> CueSegmenter {
        CueSegmenter::new(Arc::new(ScriptTokenizer), Arc::new(IpadicClausePolicy), options)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Returns a fixed token list regardless of input
    struct FixedTokenizer(Vec<LexicalToken>);

    impl MorphTokenizer for FixedTokenizer {
        fn tokenize(&self, _text: &str) -> Result<Vec<LexicalToken>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn cues_end_at_sentence_terminals() {
        let segmenter = script_segmenter(SegmenterOptions::default());
        let cues = segmenter.segment(&words_per_char(SCRIPT, 0.1)).unwrap();

        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "これはテストです。");
        assert_eq!(cues[1].text, "とても長い文章かもしれません。");
        assert!(approx(cues[0].start, 0.0));
        assert!(approx(cues[0].end, 0.9));
        assert!(approx(cues[1].start, 0.9));
        assert!(approx(cues[1].end, 2.4));
        assert_eq!(cues.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn long_runs_get_a_space_at_clause_boundary() {
        let segmenter = script_segmenter(SegmenterOptions {
            max_line_chars: 4,
            max_cue_duration: None,
        });
        let cues = segmenter.segment(&words_per_char(SCRIPT, 0.1)).unwrap();

        assert_eq!(cues[0].text, "これはテストです。");
        assert_eq!(cues[1].text, "とても長い 文章かもしれません。");
    }

    #[test]
    fn cues_are_ordered_and_cover_the_transcript() {
        let text = "今日の市場は大きく動きました。日経平均は3.5%上昇！\
                    専門家は「慎重な見方」を示しています。最後の文";
        let segmenter = script_segmenter(SegmenterOptions {
            max_line_chars: 6,
            max_cue_duration: None,
        });
        let cues = segmenter.segment(&words_per_char(text, 0.2)).unwrap();

        assert_eq!(cues.len(), 4);
        for (i, cue) in cues.iter().enumerate() {
            assert_eq!(cue.index, i + 1);
            assert!(cue.end >= cue.start);
            assert!(!cue.text.trim().is_empty());
        }
        assert!(cues.windows(2).all(|w| w[0].start <= w[1].start));

        let joined: String = cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(strip_ws(&joined), strip_ws(text));
        assert_eq!(cues[3].text, "最後の文");
    }

    #[test]
    fn decimal_point_does_not_end_a_cue() {
        let segmenter = script_segmenter(SegmenterOptions::default());
        let cues = segmenter.segment(&words_per_char("上昇率は3.5です。", 0.1)).unwrap();
        assert_eq!(cues.len(), 1);
    }

    #[test]
    fn duration_cap_closes_cue_at_clause_boundary() {
        let words = vec![
            WordToken::new("市場", 0.0, 1.0),
            WordToken::new("は", 1.0, 1.5),
            WordToken::new("大きく", 1.5, 3.0),
            WordToken::new("動いた", 3.0, 6.0),
            WordToken::new("。", 6.0, 6.2),
        ];
        let tokens = vec![
            LexicalToken::new("市場", PartOfSpeech::Noun, "一般"),
            LexicalToken::new("は", PartOfSpeech::Particle, "係助詞"),
            LexicalToken::new("大きく", PartOfSpeech::Adjective, "自立"),
            LexicalToken::new("動い", PartOfSpeech::Verb, "自立"),
            LexicalToken::new("た", PartOfSpeech::AuxiliaryVerb, "*"),
            LexicalToken::new("。", PartOfSpeech::Symbol, "句点"),
        ];
        let segmenter = CueSegmenter::new(
            Arc::new(FixedTokenizer(tokens)),
            Arc::new(IpadicClausePolicy),
            SegmenterOptions {
                max_line_chars: 100,
                max_cue_duration: Some(4.0),
            },
        );

        let cues = segmenter.segment(&words).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "市場は大きく");
        assert!(approx(cues[0].end, 3.0));
        assert_eq!(cues[1].text, "動いた。");
        assert!(approx(cues[1].start, 3.0));
        assert!(approx(cues[1].end, 6.2));
    }

    #[test]
    fn untimed_words_inherit_neighbouring_times() {
        let words = vec![
            WordToken::new("はい", 1.0, 1.4),
            WordToken::untimed("。"),
            WordToken::new("次", 2.0, 2.3),
            WordToken::untimed("。"),
        ];
        let cues = script_segmenter(SegmenterOptions::default()).segment(&words).unwrap();

        assert_eq!(cues.len(), 2);
        assert!(approx(cues[0].start, 1.0));
        assert!(approx(cues[0].end, 1.4));
        assert!(approx(cues[1].end, 2.3));
    }

    #[test]
    fn empty_or_blank_input_yields_no_cues() {
        let segmenter = script_segmenter(SegmenterOptions::default());
        assert!(segmenter.segment(&[]).unwrap().is_empty());
        assert!(segmenter.segment(&[WordToken::new("  ", 0.0, 1.0)]).unwrap().is_empty());
    }

    #[test]
    fn tokenizer_must_cover_transcript() {
        let segmenter = CueSegmenter::new(
            Arc::new(FixedTokenizer(vec![LexicalToken::new("別", PartOfSpeech::Noun, "一般")])),
            Arc::new(IpadicClausePolicy),
            SegmenterOptions::default(),
        );
        let result = segmenter.segment(&words_per_char("本文です。", 0.1));
        assert!(matches!(result, Err(KataribeError::Tokenizer(_))));
    }
}
