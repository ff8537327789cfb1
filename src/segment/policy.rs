use super::tokenizer::{
    DETAIL_COMMA, DETAIL_PERIOD, DETAIL_SPACE, LexicalToken, PartOfSpeech,
};

/// Decides where clauses begin in a tagged token stream
pub trait ClausePolicy: Send + Sync {
    fn starts_clause(&self, previous: Option<&LexicalToken>, current: &LexicalToken) -> bool;
}

/// Clause boundaries for IPADIC-style tags.
///
/// A clause starts at an independent word unless it fuses with the token
/// before it (numerals with following numerals or symbols, and symbols such
/// as `$` or `「` with what follows them).
#[derive(Debug, Default, Clone, Copy)]
pub struct IpadicClausePolicy;

impl IpadicClausePolicy {
    pub fn is_independent(token: &LexicalToken) -> bool {
        match token.pos {
            PartOfSpeech::Noun => !matches!(token.detail.as_str(), "接尾" | "非自立"),
            PartOfSpeech::Verb
            | PartOfSpeech::Adjective
            | PartOfSpeech::Adverb
            | PartOfSpeech::Conjunction
            | PartOfSpeech::Prefix
            | PartOfSpeech::Interjection
            | PartOfSpeech::Adnominal => true,
            _ => false,
        }
    }

    fn is_fusing_symbol(token: &LexicalToken) -> bool {
        token.pos == PartOfSpeech::Symbol
            && !matches!(token.detail.as_str(), DETAIL_PERIOD | DETAIL_COMMA | DETAIL_SPACE)
    }

    pub fn fuses(previous: &LexicalToken, current: &LexicalToken) -> bool {
        let numeral_run = previous.is_numeral() && (current.is_numeral() || current.pos == PartOfSpeech::Symbol);
        let symbol_run = Self::is_fusing_symbol(previous)
            && (current.pos == PartOfSpeech::Noun || current.pos == PartOfSpeech::Symbol);
        numeral_run || symbol_run
    }
}

impl ClausePolicy for IpadicClausePolicy {
    fn starts_clause(&self, previous: Option<&LexicalToken>, current: &LexicalToken) -> bool {
        if !Self::is_independent(current) {
            return false;
        }
        !previous.is_some_and(|prev| Self::fuses(prev, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noun(s: &str) -> LexicalToken {
        LexicalToken::new(s, PartOfSpeech::Noun, "一般")
    }

    fn numeral(s: &str) -> LexicalToken {
        LexicalToken::new(s, PartOfSpeech::Noun, "数")
    }

    fn symbol(s: &str, detail: &str) -> LexicalToken {
        LexicalToken::new(s, PartOfSpeech::Symbol, detail)
    }

    #[test]
    fn independent_words_start_clauses() {
        let policy = IpadicClausePolicy;
        let particle = LexicalToken::new("は", PartOfSpeech::Particle, "係助詞");
        let verb = LexicalToken::new("走る", PartOfSpeech::Verb, "自立");

        assert!(policy.starts_clause(Some(&particle), &noun("市場")));
        assert!(policy.starts_clause(Some(&particle), &verb));
        assert!(!policy.starts_clause(Some(&noun("市場")), &particle));
        assert!(policy.starts_clause(None, &noun("市場")));
    }

    #[test]
    fn suffix_nouns_attach_to_previous_word() {
        let policy = IpadicClausePolicy;
        let suffix = LexicalToken::new("さん", PartOfSpeech::Noun, "接尾");
        let dependent = LexicalToken::new("こと", PartOfSpeech::Noun, "非自立");

        assert!(!policy.starts_clause(Some(&noun("田中")), &suffix));
        assert!(!policy.starts_clause(Some(&noun("する")), &dependent));
    }

    #[test]
    fn numerals_and_symbols_fuse() {
        let policy = IpadicClausePolicy;

        assert!(!policy.starts_clause(Some(&numeral("3")), &numeral("5")));
        assert!(!policy.starts_clause(Some(&symbol("$", "一般")), &numeral("100")));
        assert!(!policy.starts_clause(Some(&symbol("「", "括弧開")), &noun("AI")));
        assert!(policy.starts_clause(Some(&symbol("、", DETAIL_COMMA)), &noun("AI")));
        assert!(policy.starts_clause(Some(&symbol(" ", DETAIL_SPACE)), &noun("AI")));
    }
}
