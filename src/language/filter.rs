use std::sync::Arc;

use crate::attributes::{AttributeSpec, Binder, BindingDirection, BindingPhase};
use crate::context::ClusteringContext;
use crate::error::LingoResult;
use crate::pipeline::{Capability, CapabilitySet, DocumentStage, ProcessingComponent};
use crate::types::{Document, LANGUAGE};

use super::{LanguageGuesser, StopwordLanguageGuesser};

pub const BUFFER_CAPACITY: &str = "language.buffer_capacity";
pub const TAGGED_COUNT: &str = "language.tagged_count";

const DEFAULT_CAPACITY: usize = 500;

/// Tags each document with the language guessed from its title and summary.
///
/// Only the first `capacity` characters are inspected. Documents are never
/// dropped; an undetectable language leaves the document untagged.
pub struct LanguageDetectionFilter {
    guesser: Arc<dyn LanguageGuesser>,
    base_capacity: usize,
    capacity: usize,
    buffer: String,
    buffered_chars: usize,
    tagged: usize,
}

impl LanguageDetectionFilter {
    pub fn new(guesser: Arc<dyn LanguageGuesser>) -> Self {
        Self {
            guesser,
            base_capacity: DEFAULT_CAPACITY,
            capacity: DEFAULT_CAPACITY,
            buffer: String::with_capacity(DEFAULT_CAPACITY),
            buffered_chars: 0,
            tagged: 0,
        }
    }

    /// Capacity used whenever a request does not bind `language.buffer_capacity`.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.base_capacity = capacity;
        self.capacity = capacity;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.buffered_chars = 0;
    }

    /// Appends up to the remaining capacity and drops the rest.
    fn append(&mut self, text: &str) {
        let room = self.capacity.saturating_sub(self.buffered_chars);
        for c in text.chars().take(room) {
            self.buffer.push(c);
            self.buffered_chars += 1;
        }
    }
}

impl Default for LanguageDetectionFilter {
    fn default() -> Self {
        Self::new(Arc::new(StopwordLanguageGuesser::new()))
    }
}

impl ProcessingComponent for LanguageDetectionFilter {
    fn name(&self) -> &str {
        "language"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::ConsumesRawDocuments,
            Capability::ProducesRawDocuments,
        ])
    }

    fn required_predecessor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ProducesRawDocuments])
    }

    fn required_successor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ConsumesRawDocuments])
    }

    fn attribute_specs(&self) -> Vec<AttributeSpec> {
        vec![
            AttributeSpec::init_input(BUFFER_CAPACITY),
            AttributeSpec::processing_output(TAGGED_COUNT),
        ]
    }

    fn bind_attributes(&mut self, binder: &mut Binder<'_>) -> LingoResult<()> {
        if binder.is(BindingPhase::Init, BindingDirection::Input) {
            binder.input_into(BUFFER_CAPACITY, &mut self.capacity)?;
        } else if binder.is(BindingPhase::Processing, BindingDirection::Output) {
            binder.output(TAGGED_COUNT, &self.tagged)?;
        }
        Ok(())
    }

    fn flush_resources(&mut self) {
        self.reset();
        self.capacity = self.base_capacity;
        self.tagged = 0;
    }
}

impl DocumentStage for LanguageDetectionFilter {
    fn add_document(
        &mut self,
        document: &mut Document,
        _context: &mut ClusteringContext,
    ) -> LingoResult<()> {
        self.reset();
        if let Some(title) = document.title() {
            self.append(title);
        }
        if let Some(summary) = document.summary() {
            if document.title().is_some() {
                self.append(". ");
            }
            self.append(summary);
        }

        if !self.buffer.is_empty() {
            if let Some(language) = self.guesser.guess_language(&self.buffer) {
                document.set_field(LANGUAGE, serde_json::Value::String(language.0));
                self.tagged += 1;
            }
        }
        Ok(())
    }
}
