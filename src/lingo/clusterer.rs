use std::collections::BTreeSet;

use crate::attributes::{AttributeSpec, Binder, BindingDirection, BindingPhase};
use crate::context::ClusteringContext;
use crate::error::{LingoError, LingoResult};
use crate::pipeline::{Capability, CapabilitySet, DocumentStage, ProcessingComponent};
use crate::types::{Cluster, Document, DocumentId};

use super::{
    ClusteringStrategy, LingoConfig, LingoStrategy, SuffixArrayBuilder, TdMatrixBuildingStrategy,
    TfIdfMatrixStrategy,
};

/// Per-request clustering parameters.
pub const LINGO: &str = "lingo";
/// Ranked clusters of the request.
pub const CLUSTERS: &str = "clusters";
/// Documents no cluster contains, ascending.
pub const UNCLUSTERED: &str = "unclustered";

/// Terminal stage: builds phrases, matrix and clusters from the context once all
/// documents are in.
pub struct LingoClusterer {
    base_config: LingoConfig,
    config: LingoConfig,
    matrix_strategy: Box<dyn TdMatrixBuildingStrategy>,
    clustering_strategy: Option<Box<dyn ClusteringStrategy>>,
    documents_seen: usize,
    clusters: Vec<Cluster>,
    unclustered: Vec<DocumentId>,
}

impl LingoClusterer {
    pub fn new(config: LingoConfig) -> Self {
        Self {
            base_config: config.clone(),
            config,
            matrix_strategy: Box::new(TfIdfMatrixStrategy),
            clustering_strategy: None,
            documents_seen: 0,
            clusters: Vec::new(),
            unclustered: Vec::new(),
        }
    }

    pub fn with_matrix_strategy(mut self, strategy: Box<dyn TdMatrixBuildingStrategy>) -> Self {
        self.matrix_strategy = strategy;
        self
    }

    /// Replaces the Lingo strategy. The `lingo` attribute then only affects
    /// phrase discovery.
    pub fn with_clustering_strategy(mut self, strategy: Box<dyn ClusteringStrategy>) -> Self {
        self.clustering_strategy = Some(strategy);
        self
    }

    pub fn config(&self) -> &LingoConfig {
        &self.config
    }
}

impl Default for LingoClusterer {
    fn default() -> Self {
        Self::new(LingoConfig::default())
    }
}

impl ProcessingComponent for LingoClusterer {
    fn name(&self) -> &str {
        "lingo"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::ConsumesTokenizedDocuments,
            Capability::ProducesClusters,
        ])
    }

    fn required_predecessor_capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::ProducesTokenizedDocuments])
    }

    fn attribute_specs(&self) -> Vec<AttributeSpec> {
        vec![
            AttributeSpec::processing_input(LINGO),
            AttributeSpec::processing_output(CLUSTERS).required(),
            AttributeSpec::processing_output(UNCLUSTERED),
        ]
    }

    fn bind_attributes(&mut self, binder: &mut Binder<'_>) -> LingoResult<()> {
        if binder.is(BindingPhase::Processing, BindingDirection::Input) {
            self.config = binder
                .input(LINGO)?
                .unwrap_or_else(|| self.base_config.clone());
        } else if binder.is(BindingPhase::Processing, BindingDirection::Output) {
            binder.output(CLUSTERS, &self.clusters)?;
            binder.output(UNCLUSTERED, &self.unclustered)?;
        }
        Ok(())
    }

    fn after_processing(&mut self, context: &mut ClusteringContext) -> LingoResult<()> {
        let builder = SuffixArrayBuilder::from_config(&self.config);
        let array = builder.build(context.documents());
        let phrases = builder.phrase_candidates(&array);
        tracing::debug!(
            documents = self.documents_seen,
            symbols = array.len(),
            phrases = phrases.len(),
            "phrase discovery finished"
        );
        context.set_suffix_array(array);
        context.set_phrases(phrases);

        let matrix = self.matrix_strategy.build_td_matrix(context);
        context.set_matrix(matrix);

        self.clusters = match &self.clustering_strategy {
            Some(strategy) => strategy.cluster(context)?,
            None => LingoStrategy::new(self.config.clone()).cluster(context)?,
        };

        let clustered: BTreeSet<DocumentId> = self
            .clusters
            .iter()
            .flat_map(|c| c.documents.iter().copied())
            .collect();
        self.unclustered = context
            .documents()
            .iter()
            .map(|d| d.id)
            .filter(|id| !clustered.contains(id))
            .collect();
        self.unclustered.sort();
        Ok(())
    }

    fn flush_resources(&mut self) {
        self.config = self.base_config.clone();
        self.documents_seen = 0;
        self.clusters = Vec::new();
        self.unclustered = Vec::new();
    }
}

impl DocumentStage for LingoClusterer {
    fn add_document(
        &mut self,
        document: &mut Document,
        context: &mut ClusteringContext,
    ) -> LingoResult<()> {
        let tokenized = context.documents().last().map(|d| d.id);
        if tokenized != Some(document.id()) {
            return Err(LingoError::processing(
                self.name(),
                format!("document {} reached clustering without tokens", document.id()),
            ));
        }
        self.documents_seen += 1;
        Ok(())
    }
}
