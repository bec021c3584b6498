use crate::attributes::{AttributeSpec, Binder, BindingDirection, BindingPhase};
use crate::error::LingoResult;
use crate::types::RawDocument;

use super::{Capability, CapabilitySet, DocumentSource, ProcessingComponent};

/// Attribute holding the request's raw documents.
pub const DOCUMENTS: &str = "documents";

/// Attribute limiting how many documents enter the pipeline.
pub const RESULTS: &str = "results";

/// Source reading the request's documents from the `documents` attribute.
#[derive(Debug, Default)]
pub struct MemoryDocumentSource {
    documents: Vec<RawDocument>,
    results: Option<usize>,
}

impl MemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessingComponent for MemoryDocumentSource {
    fn name(&self) -> &str {
        "memory-source"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ProducesRawDocuments])
    }

    fn required_successor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ConsumesRawDocuments])
    }

    fn attribute_specs(&self) -> Vec<AttributeSpec> {
        vec![
            AttributeSpec::processing_input(DOCUMENTS).required(),
            AttributeSpec::processing_input(RESULTS),
        ]
    }

    fn bind_attributes(&mut self, binder: &mut Binder<'_>) -> LingoResult<()> {
        if binder.is(BindingPhase::Processing, BindingDirection::Input) {
            self.documents = binder.input(DOCUMENTS)?.unwrap_or_default();
            self.results = binder.input(RESULTS)?;
        }
        Ok(())
    }

    fn flush_resources(&mut self) {
        self.documents = Vec::new();
        self.results = None;
    }
}

impl DocumentSource for MemoryDocumentSource {
    fn documents(&mut self) -> LingoResult<Box<dyn Iterator<Item = RawDocument> + '_>> {
        let limit = self.results.unwrap_or(usize::MAX);
        Ok(Box::new(self.documents.drain(..).take(limit)))
    }
}
