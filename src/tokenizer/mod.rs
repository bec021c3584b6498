//! Streaming tokenizer backed by the token pool.
//!
//! A [`RawTokenizer`] produces `(lexeme class, text)` pairs from a character
//! source. [`WordTokenizer`] maps each lexeme class onto the closed set of token
//! kinds and stores the result in pooled [`Token`] slots, so tokenizing many
//! documents with one instance does not allocate per token.

mod lexer;

pub use lexer::RegexLexer;

use crate::error::{LingoError, LingoResult};
use crate::pool::{PoolConfig, TokenHandle, TokenPool};

/// Kind tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenKind {
    #[default]
    Term,
    Punctuation,
    Numeric,
    Symbol,
}

/// A typed token. Lives in a [`TokenPool`] slot and is overwritten on reuse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Token {
    text: String,
    kind: TokenKind,
    sentence_delimiter: bool,
}

impl Token {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// True for punctuation that ends a sentence.
    pub fn is_sentence_delimiter(&self) -> bool {
        self.sentence_delimiter
    }

    /// Overwrites this token in place, keeping the text buffer.
    pub(crate) fn assign(&mut self, text: &str, kind: TokenKind, sentence_delimiter: bool) {
        self.text.clear();
        self.text.push_str(text);
        self.kind = kind;
        self.sentence_delimiter = sentence_delimiter;
    }
}

/// Lexeme classes emitted by a raw tokenizer grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexemeClass {
    Url,
    Email,
    Term,
    HyphenatedTerm,
    Acronym,
    SentenceMarker,
    Punctuation,
    Numeric,
}

impl LexemeClass {
    /// Fixed mapping from lexeme class to token kind and sentence-delimiter flag.
    pub fn token_type(self) -> (TokenKind, bool) {
        match self {
            LexemeClass::Url | LexemeClass::Email => (TokenKind::Symbol, false),
            LexemeClass::Term | LexemeClass::HyphenatedTerm | LexemeClass::Acronym => {
                (TokenKind::Term, false)
            }
            LexemeClass::SentenceMarker => (TokenKind::Punctuation, true),
            LexemeClass::Punctuation => (TokenKind::Punctuation, false),
            LexemeClass::Numeric => (TokenKind::Numeric, false),
        }
    }
}

/// One lexeme from a raw tokenizer, borrowing the tokenizer's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLexeme<'a> {
    pub class: LexemeClass,
    pub text: &'a str,
}

/// Grammar-driven lexer feeding a [`WordTokenizer`].
pub trait RawTokenizer: Send + Sync {
    /// Rebinds the lexer to a new input.
    fn restart(&mut self, text: &str);

    /// Next lexeme, or `None` at the end of input.
    fn next_raw_token(&mut self) -> LingoResult<Option<RawLexeme<'_>>>;
}

/// Reusable tokenizer producing pooled, typed tokens.
///
/// Construct once and reuse: [`restart_tokenization_on`](Self::restart_tokenization_on)
/// rebinds the input without touching the pool, and [`reuse`](Self::reuse)
/// recycles every token issued so far.
pub struct WordTokenizer<R: RawTokenizer = RegexLexer> {
    raw: R,
    pool: TokenPool,
    started: bool,
}

impl WordTokenizer<RegexLexer> {
    pub fn new() -> Self {
        Self::with_parts(RegexLexer::new(), TokenPool::default())
    }

    pub fn with_pool_config(config: PoolConfig) -> Self {
        Self::with_parts(RegexLexer::new(), TokenPool::new(config))
    }
}

impl Default for WordTokenizer<RegexLexer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawTokenizer> WordTokenizer<R> {
    pub fn with_parts(raw: R, pool: TokenPool) -> Self {
        Self {
            raw,
            pool,
            started: false,
        }
    }

    /// Restarts tokenization on another input. Previously issued tokens stay valid
    /// until an explicit [`reuse`](Self::reuse).
    pub fn restart_tokenization_on(&mut self, text: &str) {
        self.raw.restart(text);
        self.started = true;
    }

    /// Fills `buffer[start_at..]` with handles to the next tokens and returns how
    /// many were written. Returns 0 once the input is exhausted. A `start_at`
    /// that leaves no room in `buffer` is an error.
    pub fn next_tokens(
        &mut self,
        buffer: &mut [TokenHandle],
        start_at: usize,
    ) -> LingoResult<usize> {
        if !self.started {
            return Err(LingoError::processing(
                "tokenizer",
                "tokenization has not been started on any input",
            ));
        }
        if start_at >= buffer.len() {
            return Err(LingoError::processing(
                "tokenizer",
                format!("start offset {start_at} outside buffer of {}", buffer.len()),
            ));
        }

        let mut count = 0;
        let mut slot = start_at;
        while slot < buffer.len() {
            let Some(lexeme) = self.raw.next_raw_token()? else {
                break;
            };
            let (kind, sentence_delimiter) = lexeme.class.token_type();
            buffer[slot] = self
                .pool
                .acquire_assigned(lexeme.text, kind, sentence_delimiter);
            count += 1;
            slot += 1;
        }
        Ok(count)
    }

    /// Resolves a handle issued by this tokenizer.
    pub fn token(&self, handle: TokenHandle) -> LingoResult<&Token> {
        self.pool.get(handle)
    }

    /// Invalidates every token issued by this tokenizer.
    pub fn reuse(&mut self) {
        self.pool.reuse();
    }

    pub fn pool(&self) -> &TokenPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(tokenizer: &mut WordTokenizer, text: &str) -> Vec<(String, TokenKind, bool)> {
        tokenizer.restart_tokenization_on(text);
        let mut buffer = [TokenHandle::default(); 4];
        let mut out = Vec::new();
        loop {
            let n = tokenizer.next_tokens(&mut buffer, 0).unwrap();
            if n == 0 {
                break;
            }
            for h in &buffer[..n] {
                let t = tokenizer.token(*h).unwrap();
                out.push((t.text().to_string(), t.kind(), t.is_sentence_delimiter()));
            }
        }
        out
    }

    #[test]
    fn classifies_lexemes() {
        let mut t = WordTokenizer::new();
        let tokens = collect(
            &mut t,
            "Visit https://rust-lang.org or mail dev@rust.org, now! 42 state-of-the-art U.S.A.",
        );
        let kinds: Vec<_> = tokens.iter().map(|(s, k, d)| (s.as_str(), *k, *d)).collect();
        assert_eq!(
            kinds,
            vec![
                ("Visit", TokenKind::Term, false),
                ("https://rust-lang.org", TokenKind::Symbol, false),
                ("or", TokenKind::Term, false),
                ("mail", TokenKind::Term, false),
                ("dev@rust.org", TokenKind::Symbol, false),
                (",", TokenKind::Punctuation, false),
                ("now", TokenKind::Term, false),
                ("!", TokenKind::Punctuation, true),
                ("42", TokenKind::Numeric, false),
                ("state-of-the-art", TokenKind::Term, false),
                ("U.S.A.", TokenKind::Term, false),
            ]
        );
    }

    #[test]
    fn fills_from_start_offset_bounded_by_buffer() {
        let mut t = WordTokenizer::new();
        t.restart_tokenization_on("one two three four");
        let mut buffer = [TokenHandle::default(); 3];
        let n = t.next_tokens(&mut buffer, 1).unwrap();
        assert_eq!(n, 2);
        assert_eq!(t.token(buffer[1]).unwrap().text(), "one");
        assert_eq!(t.token(buffer[2]).unwrap().text(), "two");
        assert!(t.token(buffer[0]).is_err());

        let n = t.next_tokens(&mut buffer, 0).unwrap();
        assert_eq!(n, 2);
        assert_eq!(t.token(buffer[1]).unwrap().text(), "four");
        assert_eq!(t.next_tokens(&mut buffer, 0).unwrap(), 0);
    }

    #[test]
    fn start_offset_past_buffer_is_rejected() {
        let mut t = WordTokenizer::new();
        t.restart_tokenization_on("words remain");
        let mut buffer = [TokenHandle::default(); 2];
        assert!(matches!(
            t.next_tokens(&mut buffer, 2),
            Err(LingoError::Processing { .. })
        ));
        assert!(t.next_tokens(&mut Vec::<TokenHandle>::new(), 0).is_err());
        assert_eq!(t.next_tokens(&mut buffer, 0).unwrap(), 2);
    }

    #[test]
    fn reuse_invalidates_issued_tokens() {
        let mut t = WordTokenizer::new();
        t.restart_tokenization_on("alpha beta");
        let mut buffer = [TokenHandle::default(); 2];
        t.next_tokens(&mut buffer, 0).unwrap();
        t.reuse();
        for h in buffer {
            assert!(matches!(
                t.token(h),
                Err(LingoError::PoolContractViolation { .. })
            ));
        }
    }

    #[test]
    fn restart_keeps_previous_tokens_valid() {
        let mut t = WordTokenizer::new();
        t.restart_tokenization_on("first");
        let mut buffer = [TokenHandle::default(); 1];
        t.next_tokens(&mut buffer, 0).unwrap();
        let first = buffer[0];
        t.restart_tokenization_on("second");
        t.next_tokens(&mut buffer, 0).unwrap();
        assert_eq!(t.token(first).unwrap().text(), "first");
        assert_eq!(t.token(buffer[0]).unwrap().text(), "second");
    }

    #[test]
    fn requires_input_before_tokenizing() {
        let mut t = WordTokenizer::new();
        let mut buffer = [TokenHandle::default(); 1];
        assert!(t.next_tokens(&mut buffer, 0).is_err());
    }

    #[test]
    fn many_documents_reuse_the_pool() {
        let mut t = WordTokenizer::with_pool_config(PoolConfig {
            hard_size: 8,
            soft_increment: 8,
        });
        for _ in 0..50 {
            collect(&mut t, "the same short snippet repeated");
            t.reuse();
        }
        assert_eq!(t.pool().growths(), 0);
    }

    #[test]
    fn lexeme_mapping_is_fixed() {
        assert_eq!(LexemeClass::Url.token_type(), (TokenKind::Symbol, false));
        assert_eq!(LexemeClass::Acronym.token_type(), (TokenKind::Term, false));
        assert_eq!(
            LexemeClass::SentenceMarker.token_type(),
            (TokenKind::Punctuation, true)
        );
        assert_eq!(LexemeClass::Numeric.token_type(), (TokenKind::Numeric, false));
    }
}
