//! Regex grammar for the default raw tokenizer.

use std::sync::LazyLock;

use regex::Regex;

use super::{LexemeClass, RawLexeme, RawTokenizer};
use crate::error::{LingoError, LingoResult};

// Alternation order is priority order: the regex engine is leftmost-first.
static GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?P<url>(?:https?|ftp)://[^\s<>"]+|www\.[^\s<>"]+)"#,
        r"|(?P<email>[\w.+-]+@[\w-]+(?:\.[\w-]+)+)",
        r"|(?P<acronym>(?:\p{L}\.){2,})",
        r"|(?P<hyphterm>\p{L}[\p{L}\p{N}]*(?:-[\p{L}\p{N}]+)+)",
        r"|(?P<term>\p{L}[\p{L}\p{N}_]*(?:'\p{L}+)?)",
        r"|(?P<numeric>\p{N}+(?:[.,]\p{N}+)*)",
        r"|(?P<sentence>[.!?]+)",
        r"|(?P<punct>[\p{P}\p{S}])",
    ))
    .expect("lexer grammar is a valid regex")
});

const GROUPS: [(&str, LexemeClass); 8] = [
    ("url", LexemeClass::Url),
    ("email", LexemeClass::Email),
    ("acronym", LexemeClass::Acronym),
    ("hyphterm", LexemeClass::HyphenatedTerm),
    ("term", LexemeClass::Term),
    ("numeric", LexemeClass::Numeric),
    ("sentence", LexemeClass::SentenceMarker),
    ("punct", LexemeClass::Punctuation),
];

/// Default [`RawTokenizer`]: words, hyphenated words, acronyms, numbers, URLs,
/// e-mail addresses and punctuation. Whitespace and unmatched characters are skipped.
///
/// The input buffer is kept across restarts, so rebinding does not reallocate
/// once it has grown to the typical document size.
#[derive(Debug, Default)]
pub struct RegexLexer {
    text: String,
    position: usize,
}

impl RegexLexer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RawTokenizer for RegexLexer {
    fn restart(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.position = 0;
    }

    fn next_raw_token(&mut self) -> LingoResult<Option<RawLexeme<'_>>> {
        if self.position >= self.text.len() {
            return Ok(None);
        }

        let Some(caps) = GRAMMAR.captures_at(&self.text, self.position) else {
            self.position = self.text.len();
            return Ok(None);
        };

        let whole = caps.get(0).map(|m| m.range()).unwrap_or(self.position..self.position);
        let class = GROUPS
            .iter()
            .find(|(name, _)| caps.name(name).is_some())
            .map(|(_, class)| *class);

        let Some(class) = class else {
            return Err(LingoError::UnrecognizedLexeme {
                offset: whole.start,
                text: self.text[whole].to_string(),
            });
        };

        self.position = whole.end.max(self.position + 1);
        Ok(Some(RawLexeme {
            class,
            text: &self.text[whole],
        }))
    }
}
