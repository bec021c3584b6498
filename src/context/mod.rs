//! Per-request clustering state.
//!
//! The tokenizer stage fills a [`ClusteringContext`] with one interned token
//! stream per document. The clusterer then derives the suffix array, the phrase
//! candidates and the term-document matrix from it, and stores them back so that
//! every later step reads from the same context. A context lives for exactly one
//! request and is dropped when the pipeline finishes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::lingo::{PhraseCandidate, SuffixArray, TermDocumentMatrix};
use crate::types::{DocumentId, LanguageTag};

/// Index of a distinct lowercased term in the [`Vocabulary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub u32);

impl TermId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned terms, numbered in first-occurrence order.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    ids: HashMap<String, TermId>,
    terms: Vec<String>,
    stop_words: Vec<bool>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a term that is already lowercased.
    ///
    /// A term stays a stop word only while every occurrence is flagged as one.
    pub fn intern(&mut self, term: &str, is_stop_word: bool) -> TermId {
        if let Some(&id) = self.ids.get(term) {
            self.stop_words[id.index()] &= is_stop_word;
            return id;
        }
        let id = TermId(self.terms.len() as u32);
        self.ids.insert(term.to_string(), id);
        self.terms.push(term.to_string());
        self.stop_words.push(is_stop_word);
        id
    }

    pub fn id(&self, term: &str) -> Option<TermId> {
        self.ids.get(term).copied()
    }

    /// Text of an interned term. Panics on an id from another vocabulary.
    pub fn term(&self, id: TermId) -> &str {
        &self.terms[id.index()]
    }

    pub fn is_stop_word(&self, id: TermId) -> bool {
        self.stop_words[id.index()]
    }

    /// Terms joined by single spaces.
    pub fn phrase_text(&self, terms: &[TermId]) -> String {
        terms
            .iter()
            .map(|t| self.term(*t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// One position of a document's token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextToken {
    Term(TermId),
    /// Non-term token. Phrases never span a break.
    Break { sentence_end: bool },
}

impl ContextToken {
    pub fn term(self) -> Option<TermId> {
        match self {
            ContextToken::Term(id) => Some(id),
            ContextToken::Break { .. } => None,
        }
    }
}

/// Token stream of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTokens {
    pub id: DocumentId,
    pub language: Option<LanguageTag>,
    pub tokens: Vec<ContextToken>,
}

impl DocumentTokens {
    pub fn terms(&self) -> impl Iterator<Item = TermId> + '_ {
        self.tokens.iter().filter_map(|t| t.term())
    }
}

#[derive(Debug, Default)]
pub struct ClusteringContext {
    vocabulary: Vocabulary,
    documents: Vec<DocumentTokens>,
    suffix_array: Option<SuffixArray>,
    phrases: Vec<PhraseCandidate>,
    matrix: Option<TermDocumentMatrix>,
}

impl ClusteringContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn vocabulary_mut(&mut self) -> &mut Vocabulary {
        &mut self.vocabulary
    }

    pub fn push_document(&mut self, document: DocumentTokens) {
        self.documents.push(document);
    }

    /// Token streams in ingestion order. The position is the matrix column.
    pub fn documents(&self) -> &[DocumentTokens] {
        &self.documents
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn token_count(&self) -> usize {
        self.documents.iter().map(|d| d.tokens.len()).sum()
    }

    pub fn suffix_array(&self) -> Option<&SuffixArray> {
        self.suffix_array.as_ref()
    }

    pub fn set_suffix_array(&mut self, suffix_array: SuffixArray) {
        self.suffix_array = Some(suffix_array);
    }

    pub fn phrases(&self) -> &[PhraseCandidate] {
        &self.phrases
    }

    pub fn set_phrases(&mut self, phrases: Vec<PhraseCandidate>) {
        self.phrases = phrases;
    }

    pub fn matrix(&self) -> Option<&TermDocumentMatrix> {
        self.matrix.as_ref()
    }

    pub fn set_matrix(&mut self, matrix: TermDocumentMatrix) {
        self.matrix = Some(matrix);
    }
}
