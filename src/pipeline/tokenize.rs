use crate::attributes::{AttributeSpec, Binder, BindingDirection, BindingPhase};
use crate::context::{ClusteringContext, ContextToken, DocumentTokens};
use crate::error::LingoResult;
use crate::language::StopWords;
use crate::pool::{PoolConfig, TokenHandle};
use crate::tokenizer::{TokenKind, WordTokenizer};
use crate::types::Document;

use super::{Capability, CapabilitySet, DocumentStage, ProcessingComponent};

pub const POOL_HARD_SIZE: &str = "tokenizer.pool_hard_size";
pub const POOL_INCREMENT: &str = "tokenizer.pool_increment";
pub const TOKEN_COUNT: &str = "tokenizer.token_count";

const BATCH: usize = 64;

/// Tokenizes title and summary of every document into the clustering context.
///
/// Terms are lowercased and interned, every other token becomes a phrase break.
/// Stop words come from the document's detected language, or from every
/// built-in language when it is untagged.
/// The tokenizer and its pool are kept across documents and requests; the pool
/// is recycled after each document.
pub struct TokenizerStage {
    tokenizer: WordTokenizer,
    base_pool_config: PoolConfig,
    pool_config: PoolConfig,
    buffer: Vec<TokenHandle>,
    text: String,
    lowercase: String,
    token_count: usize,
}

impl TokenizerStage {
    pub fn new() -> Self {
        Self::with_pool_config(PoolConfig::default())
    }

    pub fn with_pool_config(pool_config: PoolConfig) -> Self {
        Self {
            tokenizer: WordTokenizer::with_pool_config(pool_config),
            base_pool_config: pool_config,
            pool_config,
            buffer: vec![TokenHandle::default(); BATCH],
            text: String::new(),
            lowercase: String::new(),
            token_count: 0,
        }
    }

    pub fn tokenizer(&self) -> &WordTokenizer {
        &self.tokenizer
    }
}

impl Default for TokenizerStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingComponent for TokenizerStage {
    fn name(&self) -> &str {
        "tokenizer"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::ConsumesRawDocuments,
            Capability::ProducesTokenizedDocuments,
        ])
    }

    fn required_predecessor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ProducesRawDocuments])
    }

    fn required_successor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ConsumesTokenizedDocuments])
    }

    fn attribute_specs(&self) -> Vec<AttributeSpec> {
        vec![
            AttributeSpec::init_input(POOL_HARD_SIZE),
            AttributeSpec::init_input(POOL_INCREMENT),
            AttributeSpec::processing_output(TOKEN_COUNT).required(),
        ]
    }

    fn bind_attributes(&mut self, binder: &mut Binder<'_>) -> LingoResult<()> {
        if binder.is(BindingPhase::Init, BindingDirection::Input) {
            binder.input_into(POOL_HARD_SIZE, &mut self.pool_config.hard_size)?;
            binder.input_into(POOL_INCREMENT, &mut self.pool_config.soft_increment)?;
        } else if binder.is(BindingPhase::Processing, BindingDirection::Output) {
            binder.output(TOKEN_COUNT, &self.token_count)?;
        }
        Ok(())
    }

    fn init(&mut self) -> LingoResult<()> {
        if self.tokenizer.pool().config() != self.pool_config {
            self.tokenizer = WordTokenizer::with_pool_config(self.pool_config);
        }
        Ok(())
    }

    fn flush_resources(&mut self) {
        self.tokenizer.reuse();
        self.pool_config = self.base_pool_config;
        self.token_count = 0;
    }
}

impl DocumentStage for TokenizerStage {
    fn add_document(
        &mut self,
        document: &mut Document,
        context: &mut ClusteringContext,
    ) -> LingoResult<()> {
        self.text.clear();
        if let Some(title) = document.title() {
            self.text.push_str(title);
        }
        if let Some(summary) = document.summary() {
            if !self.text.is_empty() {
                self.text.push_str(". ");
            }
            self.text.push_str(summary);
        }

        let language = document.language();
        let stop_words = StopWords::for_tag(language.as_ref());
        let mut tokens = Vec::new();
        self.tokenizer.restart_tokenization_on(&self.text);
        loop {
            let count = self.tokenizer.next_tokens(&mut self.buffer, 0)?;
            if count == 0 {
                break;
            }
            for handle in &self.buffer[..count] {
                let token = self.tokenizer.token(*handle)?;
                let entry = match token.kind() {
                    TokenKind::Term => {
                        self.lowercase.clear();
                        self.lowercase.extend(token.text().chars().flat_map(char::to_lowercase));
                        let is_stop = stop_words.contains(&self.lowercase);
                        ContextToken::Term(context.vocabulary_mut().intern(&self.lowercase, is_stop))
                    }
                    _ => ContextToken::Break {
                        sentence_end: token.is_sentence_delimiter(),
                    },
                };
                tokens.push(entry);
            }
        }
        self.tokenizer.reuse();

        self.token_count += tokens.len();
        context.push_document(DocumentTokens {
            id: document.id(),
            language,
            tokens,
        });
        Ok(())
    }
}
