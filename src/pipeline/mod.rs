//! Capability-checked processing pipeline.
//!
//! A pipeline is one [`DocumentSource`] followed by a chain of [`DocumentStage`]s.
//! Every component declares the [`Capability`] tags it has, plus the tags it needs
//! from its immediate predecessor and successor. [`ChainBuilder`] checks each link
//! once, at assembly time, and only a fully checked chain becomes a [`Pipeline`].
//!
//! Per request, [`Pipeline::process`] drives the fixed lifecycle
//! `init → before_processing → documents → after_processing`, binding attributes at
//! each boundary, and always finishes with `flush_resources`.

mod lifecycle;
mod source;
mod tokenize;

pub use source::{MemoryDocumentSource, DOCUMENTS, RESULTS};
pub use tokenize::{TokenizerStage, POOL_HARD_SIZE, POOL_INCREMENT, TOKEN_COUNT};

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attributes::{validate_specs, AttributeMap, AttributeSpec, Binder};
use crate::context::ClusteringContext;
use crate::error::{LingoError, LingoResult};
use crate::journal::{Journal, LifecycleEvent};
use crate::types::{Document, DocumentId, RawDocument};

use lifecycle::RequestState;

// ─── Capabilities ───────────────────────────────────────────────────────────

/// Role a component can play in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ProducesRawDocuments,
    ConsumesRawDocuments,
    ProducesTokenizedDocuments,
    ConsumesTokenizedDocuments,
    ProducesClusters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(capabilities: &[Capability]) -> Self {
        Self(capabilities.iter().copied().collect())
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn intersects(&self, other: &CapabilitySet) -> bool {
        self.0.iter().any(|c| other.0.contains(c))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.0.iter().map(|c| format!("{c:?}")).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

// ─── Components ─────────────────────────────────────────────────────────────

/// Lifecycle shared by every pipeline component.
///
/// Hooks run once per request in the order `bind_attributes(init input)`,
/// `init`, `bind_attributes(init output)`, `bind_attributes(processing input)`,
/// `before_processing`, documents, `after_processing`,
/// `bind_attributes(processing output)`. `flush_resources` runs after every
/// request, including failed ones, and must leave the component ready for the
/// next request.
pub trait ProcessingComponent: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> CapabilitySet;

    fn required_predecessor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::empty()
    }

    /// Empty for a component that may end a chain.
    fn required_successor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::empty()
    }

    fn attribute_specs(&self) -> Vec<AttributeSpec> {
        Vec::new()
    }

    /// Copies declared attributes in or out. Check `binder.is(..)` for the session.
    fn bind_attributes(&mut self, _binder: &mut Binder<'_>) -> LingoResult<()> {
        Ok(())
    }

    fn init(&mut self) -> LingoResult<()> {
        Ok(())
    }

    fn before_processing(&mut self) -> LingoResult<()> {
        Ok(())
    }

    fn after_processing(&mut self, _context: &mut ClusteringContext) -> LingoResult<()> {
        Ok(())
    }

    fn flush_resources(&mut self) {}
}

/// Head of a chain: yields the request's raw documents as a one-pass sequence.
pub trait DocumentSource: ProcessingComponent {
    fn documents(&mut self) -> LingoResult<Box<dyn Iterator<Item = RawDocument> + '_>>;
}

/// Chain member receiving documents in ingestion order.
pub trait DocumentStage: ProcessingComponent {
    fn add_document(
        &mut self,
        document: &mut Document,
        context: &mut ClusteringContext,
    ) -> LingoResult<()>;
}

/// Checks that `successor` may directly follow `predecessor`.
pub fn check_compatible<P, S>(predecessor: &P, successor: &S) -> LingoResult<()>
where
    P: ProcessingComponent + ?Sized,
    S: ProcessingComponent + ?Sized,
{
    let incompatible = |reason: String| LingoError::IncompatibleStage {
        predecessor: predecessor.name().to_string(),
        successor: successor.name().to_string(),
        reason,
    };

    let wanted = predecessor.required_successor_capabilities();
    let offered = successor.capabilities();
    if !wanted.intersects(&offered) {
        return Err(incompatible(format!(
            "successor offers {offered}, predecessor requires one of {wanted}"
        )));
    }

    let wanted = successor.required_predecessor_capabilities();
    let offered = predecessor.capabilities();
    if !wanted.intersects(&offered) {
        return Err(incompatible(format!(
            "predecessor offers {offered}, successor requires one of {wanted}"
        )));
    }
    Ok(())
}

// ─── Assembly ───────────────────────────────────────────────────────────────

/// Assembles a chain link by link. A rejected link leaves the builder unchanged.
pub struct ChainBuilder {
    source: Box<dyn DocumentSource>,
    stages: Vec<Box<dyn DocumentStage>>,
}

impl std::fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("source", &self.source.name())
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ChainBuilder {
    pub fn new(source: impl DocumentSource + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    pub fn from_boxed(source: Box<dyn DocumentSource>) -> Self {
        Self {
            source,
            stages: Vec::new(),
        }
    }

    pub fn chain(&mut self, stage: impl DocumentStage + 'static) -> LingoResult<&mut Self> {
        self.chain_boxed(Box::new(stage))
    }

    pub fn chain_boxed(&mut self, stage: Box<dyn DocumentStage>) -> LingoResult<&mut Self> {
        match self.stages.last() {
            Some(tail) => check_compatible(tail.as_ref(), stage.as_ref())?,
            None => check_compatible(self.source.as_ref(), stage.as_ref())?,
        }
        self.stages.push(stage);
        Ok(self)
    }

    /// Number of stages after the source.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn tail_name(&self) -> &str {
        match self.stages.last() {
            Some(stage) => stage.name(),
            None => self.source.name(),
        }
    }

    /// Finishes the chain. Fails if the tail still requires a successor or a
    /// component's attribute declarations are invalid.
    pub fn build(self) -> LingoResult<Pipeline> {
        let tail_needs = match self.stages.last() {
            Some(stage) => stage.required_successor_capabilities(),
            None => self.source.required_successor_capabilities(),
        };
        if !tail_needs.is_empty() {
            return Err(LingoError::IncompatibleStage {
                predecessor: self.tail_name().to_string(),
                successor: "<end of chain>".to_string(),
                reason: format!("chain ends while {tail_needs} is still required"),
            });
        }

        let mut specs = Vec::with_capacity(self.stages.len() + 1);
        let source_specs = self.source.attribute_specs();
        validate_specs(self.source.name(), &source_specs)?;
        specs.push(source_specs);
        for stage in &self.stages {
            let stage_specs = stage.attribute_specs();
            validate_specs(stage.name(), &stage_specs)?;
            specs.push(stage_specs);
        }

        Ok(Pipeline {
            source: self.source,
            stages: self.stages,
            specs,
            journal: None,
        })
    }
}

// ─── Execution ──────────────────────────────────────────────────────────────

/// Outcome of one request.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub request_id: Uuid,
    /// Documents in ingestion order, with fields set by the stages.
    pub documents: Vec<Document>,
    /// The request's attributes after all outputs were bound.
    pub attributes: AttributeMap,
}

/// A checked chain, reusable across sequential requests.
pub struct Pipeline {
    source: Box<dyn DocumentSource>,
    stages: Vec<Box<dyn DocumentStage>>,
    // index 0 is the source
    specs: Vec<Vec<AttributeSpec>>,
    journal: Option<Arc<Journal>>,
}

impl Pipeline {
    pub fn set_journal(&mut self, journal: Option<Arc<Journal>>) {
        self.journal = journal;
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Component names, source first.
    pub fn component_names(&self) -> Vec<&str> {
        std::iter::once(self.source.name())
            .chain(self.stages.iter().map(|s| s.name()))
            .collect()
    }

    /// Runs one request over `attributes`. Resources are flushed whether or not
    /// the request succeeds.
    pub fn process(&mut self, attributes: AttributeMap) -> LingoResult<PipelineOutput> {
        let request_id = Uuid::new_v4();
        self.record(request_id, "pipeline", LifecycleEvent::RequestStarted);

        let result = self.run(request_id, attributes);

        self.flush(request_id);
        match &result {
            Ok(output) => {
                tracing::debug!(
                    request_id = %request_id,
                    documents = output.documents.len(),
                    "request finished"
                );
                self.record(request_id, "pipeline", LifecycleEvent::RequestFinished);
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "request failed");
                self.record(request_id, "pipeline", LifecycleEvent::RequestFailed);
            }
        }
        result
    }

    fn run(&mut self, request_id: Uuid, mut attributes: AttributeMap) -> LingoResult<PipelineOutput> {
        let mut state = RequestState::Idle;
        let mut context = ClusteringContext::new();

        state.advance(RequestState::Idle, RequestState::Initialized)?;
        lifecycle::init(self.source.as_mut(), &self.specs[0], &mut attributes)?;
        self.record(request_id, self.source.name(), LifecycleEvent::Init);
        for (stage, specs) in self.stages.iter_mut().zip(&self.specs[1..]) {
            lifecycle::init(stage.as_mut(), specs, &mut attributes)?;
            record(&self.journal, request_id, stage.name(), LifecycleEvent::Init);
        }

        state.advance(RequestState::Initialized, RequestState::Processing)?;
        lifecycle::before_processing(self.source.as_mut(), &self.specs[0], &mut attributes)?;
        self.record(request_id, self.source.name(), LifecycleEvent::BeforeProcessing);
        for (stage, specs) in self.stages.iter_mut().zip(&self.specs[1..]) {
            lifecycle::before_processing(stage.as_mut(), specs, &mut attributes)?;
            record(&self.journal, request_id, stage.name(), LifecycleEvent::BeforeProcessing);
        }

        let mut documents = Vec::new();
        for (index, raw) in self.source.documents()?.enumerate() {
            let mut document = Document::from_raw(DocumentId(index as u32), raw);
            for stage in self.stages.iter_mut() {
                stage.add_document(&mut document, &mut context)?;
            }
            documents.push(document);
        }
        tracing::debug!(
            request_id = %request_id,
            documents = documents.len(),
            tokens = context.token_count(),
            "documents ingested"
        );

        state.advance(RequestState::Processing, RequestState::Completed)?;
        lifecycle::after_processing(
            self.source.as_mut(),
            &self.specs[0],
            &mut attributes,
            &mut context,
        )?;
        self.record(request_id, self.source.name(), LifecycleEvent::AfterProcessing);
        for (stage, specs) in self.stages.iter_mut().zip(&self.specs[1..]) {
            lifecycle::after_processing(stage.as_mut(), specs, &mut attributes, &mut context)?;
            record(&self.journal, request_id, stage.name(), LifecycleEvent::AfterProcessing);
        }

        Ok(PipelineOutput {
            request_id,
            documents,
            attributes,
        })
    }

    fn flush(&mut self, request_id: Uuid) {
        self.source.flush_resources();
        record(&self.journal, request_id, self.source.name(), LifecycleEvent::Flush);
        for stage in self.stages.iter_mut() {
            stage.flush_resources();
            record(&self.journal, request_id, stage.name(), LifecycleEvent::Flush);
        }
    }

    fn record(&self, request_id: Uuid, source: &str, event: LifecycleEvent) {
        record(&self.journal, request_id, source, event);
    }
}

fn record(journal: &Option<Arc<Journal>>, request_id: Uuid, source: &str, event: LifecycleEvent) {
    if let Some(journal) = journal {
        journal.lifecycle(request_id, source, event);
    }
}
