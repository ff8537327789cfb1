use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{SubtitleConfig, TokenizerKind};
use crate::error::{KataribeError, Result};

/// Part-of-speech categories, named after the IPADIC top-level tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Conjunction,
    Prefix,
    Interjection,
    Adnominal,
    Particle,
    AuxiliaryVerb,
    Symbol,
    Filler,
    Other,
}

impl PartOfSpeech {
    pub fn from_ipadic(tag: &str) -> Self {
        match tag {
            "名詞" => Self::Noun,
            "動詞" => Self::Verb,
            "形容詞" => Self::Adjective,
            "副詞" => Self::Adverb,
            "接続詞" => Self::Conjunction,
            "接頭詞" => Self::Prefix,
            "感動詞" => Self::Interjection,
            "連体詞" => Self::Adnominal,
            "助詞" => Self::Particle,
            "助動詞" => Self::AuxiliaryVerb,
            "記号" => Self::Symbol,
            "フィラー" => Self::Filler,
            _ => Self::Other,
        }
    }
}

/// Detail tag for numerals
pub const DETAIL_NUMERAL: &str = "数";
/// Detail tag for whitespace re-inserted during alignment
pub const DETAIL_SPACE: &str = "空白";
pub const DETAIL_PERIOD: &str = "句点";
pub const DETAIL_COMMA: &str = "読点";
pub const DETAIL_OPEN_BRACKET: &str = "括弧開";
pub const DETAIL_CLOSE_BRACKET: &str = "括弧閉";

/// A morphologically tagged unit of text
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalToken {
    pub surface: String,
    pub pos: PartOfSpeech,
    pub detail: String,
}

impl LexicalToken {
    pub fn new<S: Into<String>, D: Into<String>>(surface: S, pos: PartOfSpeech, detail: D) -> Self {
        Self {
            surface: surface.into(),
            pos,
            detail: detail.into(),
        }
    }

    pub fn is_numeral(&self) -> bool {
        self.pos == PartOfSpeech::Noun && self.detail == DETAIL_NUMERAL
    }

    pub fn char_len(&self) -> usize {
        self.surface.chars().count()
    }
}

/// Morphological analysis capability: segment text into tagged tokens.
///
/// Implementations must return tokens whose surfaces concatenate to `text`.
pub trait MorphTokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<LexicalToken>>;

    fn name(&self) -> &'static str;
}

/// Factory for the process-wide tokenizer
pub struct TokenizerFactory;

impl TokenizerFactory {
    pub fn create(config: &SubtitleConfig) -> Arc<dyn MorphTokenizer> {
        match config.tokenizer {
            TokenizerKind::Mecab => Arc::new(MecabTokenizer::new(&config.mecab_path, config.mecab_args.clone())),
            TokenizerKind::Script => Arc::new(ScriptTokenizer),
        }
    }
}

/// Re-insert characters an analyzer skipped so surfaces cover `text` exactly.
///
/// Only whitespace may be skipped; anything else means the analyzer output does
/// not describe this text.
pub fn align_to_source(text: &str, tokens: Vec<LexicalToken>) -> Result<Vec<LexicalToken>> {
    let mut aligned = Vec::with_capacity(tokens.len());
    let mut cursor = 0;

    for token in tokens {
        if token.surface.is_empty() {
            continue;
        }

        let rest = &text[cursor..];
        let found = rest.find(&token.surface).ok_or_else(|| {
            KataribeError::Tokenizer(format!("token {:?} not found after byte {}", token.surface, cursor))
        })?;

        let skipped = &rest[..found];
        if !skipped.chars().all(char::is_whitespace) {
            return Err(KataribeError::Tokenizer(format!(
                "analyzer dropped text {:?} before token {:?}",
                skipped, token.surface
            )));
        }
        if !skipped.is_empty() {
            aligned.push(LexicalToken::new(skipped, PartOfSpeech::Symbol, DETAIL_SPACE));
        }

        cursor += found + token.surface.len();
        aligned.push(token);
    }

    let tail = &text[cursor..];
    if !tail.is_empty() {
        if !tail.chars().all(char::is_whitespace) {
            return Err(KataribeError::Tokenizer(format!("analyzer dropped trailing text {:?}", tail)));
        }
        aligned.push(LexicalToken::new(tail, PartOfSpeech::Symbol, DETAIL_SPACE));
    }

    Ok(aligned)
}

/// Tokenizer backed by an external MeCab process
pub struct MecabTokenizer {
    binary_path: String,
    args: Vec<String>,
}

impl MecabTokenizer {
    pub fn new<S: Into<String>>(binary_path: S, args: Vec<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            args,
        }
    }

    /// Check if the mecab binary can be executed
    pub fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .map_err(|e| KataribeError::Tokenizer(format!("mecab not found: {}", e)))?;

        if output.status.success() {
            info!("MeCab is available: {}", String::from_utf8_lossy(&output.stdout).trim());
            Ok(())
        } else {
            Err(KataribeError::Tokenizer("mecab version check failed".to_string()))
        }
    }
}

impl MorphTokenizer for MecabTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<LexicalToken>> {
        debug!("Running {} on {} characters", self.binary_path, text.chars().count());

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KataribeError::Tokenizer(format!("Failed to execute mecab: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| KataribeError::Tokenizer("mecab stdin unavailable".to_string()))?;
        let mut input = text.to_string();
        if !input.ends_with('\n') {
            input.push('\n');
        }
        // mecab streams output per line, so feed stdin from another thread
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| KataribeError::Tokenizer(format!("mecab did not finish: {}", e)))?;
        writer
            .join()
            .map_err(|_| KataribeError::Tokenizer("mecab input writer panicked".to_string()))?
            .map_err(|e| KataribeError::Tokenizer(format!("Failed to write to mecab: {}", e)))?;

        if !output.status.success() {
            return Err(KataribeError::Tokenizer(format!(
                "mecab failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        align_to_source(text, parse_mecab_output(&stdout))
    }

    fn name(&self) -> &'static str {
        "mecab"
    }
}

/// Parse MeCab default output: `surface\tPOS,detail,...` lines terminated by `EOS`
pub fn parse_mecab_output(output: &str) -> Vec<LexicalToken> {
    output
        .lines()
        .filter(|line| !line.is_empty() && *line != "EOS")
        .filter_map(|line| {
            let (surface, features) = line.split_once('\t')?;
            let mut fields = features.split(',');
            let pos = PartOfSpeech::from_ipadic(fields.next().unwrap_or_default());
            let detail = fields.next().unwrap_or("*");
            Some(LexicalToken::new(surface, pos, detail))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Kanji,
    Hiragana,
    Katakana,
    Latin,
    Digit,
    Space,
    Punct,
}

fn classify(ch: char) -> CharClass {
    match ch {
        c if c.is_whitespace() => CharClass::Space,
        '0'..='9' | '０'..='９' => CharClass::Digit,
        'a'..='z' | 'A'..='Z' | 'ａ'..='ｚ' | 'Ａ'..='Ｚ' => CharClass::Latin,
        '\u{3041}'..='\u{309F}' => CharClass::Hiragana,
        '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' | '\u{FF66}'..='\u{FF9F}' => CharClass::Katakana,
        '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '々' | '〆' => CharClass::Kanji,
        c if c.is_alphabetic() => CharClass::Latin,
        _ => CharClass::Punct,
    }
}

fn punct_detail(ch: char) -> &'static str {
    match ch {
        '。' | '．' | '｡' | '.' | '!' | '！' | '?' | '？' => DETAIL_PERIOD,
        '、' | '，' | ',' | '､' => DETAIL_COMMA,
        '「' | '『' | '（' | '(' | '【' | '［' | '[' | '〈' | '《' | '“' => DETAIL_OPEN_BRACKET,
        '」' | '』' | '）' | ')' | '】' | '］' | ']' | '〉' | '》' | '”' => DETAIL_CLOSE_BRACKET,
        _ => "一般",
    }
}

/// Writing-system segmentation for environments without a dictionary.
///
/// Runs of kanji, katakana and latin letters become nouns, digit runs become
/// numerals (keeping `3.5` and `1,000` whole), hiragana runs are treated as
/// dependent material attached to the preceding word.
pub struct ScriptTokenizer;

impl MorphTokenizer for ScriptTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<LexicalToken>> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let class = classify(chars[i]);
            let start = i;
            i += 1;

            if class == CharClass::Punct {
                let surface: String = chars[start..i].iter().collect();
                tokens.push(LexicalToken::new(surface, PartOfSpeech::Symbol, punct_detail(chars[start])));
                continue;
            }

            while i < chars.len() {
                let next = classify(chars[i]);
                let number_separator = class == CharClass::Digit
                    && matches!(chars[i], '.' | ',' | '．' | '，')
                    && chars.get(i + 1).is_some_and(|&c| classify(c) == CharClass::Digit);
                let long_vowel = class == CharClass::Hiragana && chars[i] == 'ー';
                if next == class || number_separator || long_vowel {
                    i += 1;
                } else {
                    break;
                }
            }

            let surface: String = chars[start..i].iter().collect();
            let (pos, detail) = match class {
                CharClass::Digit => (PartOfSpeech::Noun, DETAIL_NUMERAL),
                CharClass::Kanji | CharClass::Katakana | CharClass::Latin => (PartOfSpeech::Noun, "一般"),
                CharClass::Hiragana => (PartOfSpeech::Particle, "*"),
                CharClass::Space => (PartOfSpeech::Symbol, DETAIL_SPACE),
                CharClass::Punct => unreachable!("punctuation handled above"),
            };
            tokens.push(LexicalToken::new(surface, pos, detail));
        }

        Ok(tokens)
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surfaces(tokens: &[LexicalToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.surface.as_str()).collect()
    }

    #[test]
    fn parses_mecab_lines() {
        let output = "今日\t名詞,副詞可能,*,*,*,*,今日,キョウ,キョー\n\
                      は\t助詞,係助詞,*,*,*,*,は,ハ,ワ\n\
                      3\t名詞,数,*,*,*,*,*\n\
                      EOS\n";
        let tokens = parse_mecab_output(output);

        assert_eq!(surfaces(&tokens), vec!["今日", "は", "3"]);
        assert_eq!(tokens[0].pos, PartOfSpeech::Noun);
        assert_eq!(tokens[1].pos, PartOfSpeech::Particle);
        assert!(tokens[2].is_numeral());
    }

    #[test]
    fn alignment_restores_skipped_whitespace() {
        let text = "Hello  世界\n";
        let tokens = vec![
            LexicalToken::new("Hello", PartOfSpeech::Noun, "一般"),
            LexicalToken::new("世界", PartOfSpeech::Noun, "一般"),
        ];

        let aligned = align_to_source(text, tokens).unwrap();
        assert_eq!(surfaces(&aligned), vec!["Hello", "  ", "世界", "\n"]);
        assert_eq!(aligned[1].detail, DETAIL_SPACE);
        assert_eq!(aligned.iter().map(|t| t.surface.as_str()).collect::<String>(), text);
    }

    #[test]
    fn alignment_rejects_dropped_text() {
        let tokens = vec![LexicalToken::new("世界", PartOfSpeech::Noun, "一般")];
        assert!(matches!(align_to_source("こんにちは世界", tokens), Err(KataribeError::Tokenizer(_))));
    }

    #[test]
    fn script_tokenizer_segments_by_writing_system() {
        let tokens = ScriptTokenizer.tokenize("日経平均は3.5%上昇、ニュースです。").unwrap();

        assert_eq!(
            surfaces(&tokens),
            vec!["日経平均", "は", "3.5", "%", "上昇", "、", "ニュース", "です", "。"]
        );
        assert!(tokens[2].is_numeral());
        assert_eq!(tokens[5].detail, DETAIL_COMMA);
        assert_eq!(tokens[8].detail, DETAIL_PERIOD);
    }

    #[test]
    fn script_tokenizer_covers_input() {
        let text = "「ＡＩ」の時代、1,000人が  参加！ Really?";
        let tokens = ScriptTokenizer.tokenize(text).unwrap();
        assert_eq!(tokens.iter().map(|t| t.surface.as_str()).collect::<String>(), text);
    }
}
