//! Hosting boundary.
//!
//! A [`Controller`] owns named algorithms, each a factory for a fully chained
//! [`Pipeline`]. Every request checks out an idle pipeline of its algorithm (or
//! builds a new one), runs it, and returns it to the pool. Concurrent requests
//! therefore never share stage instances.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attributes::AttributeMap;
use crate::error::{LingoError, LingoResult};
use crate::journal::Journal;
use crate::language::LanguageDetectionFilter;
use crate::lingo::{LingoClusterer, CLUSTERS, UNCLUSTERED};
use crate::pipeline::{ChainBuilder, MemoryDocumentSource, Pipeline, TokenizerStage, DOCUMENTS};
use crate::types::{Cluster, Document, DocumentId};

/// Algorithm ids with this prefix are never picked as the default.
pub const INTERNAL_PREFIX: &str = ".internal";

/// Builds a new pipeline instance for one algorithm.
pub type PipelineFactory = Arc<dyn Fn() -> LingoResult<Pipeline> + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Used when a request names no algorithm.
    pub default_algorithm: Option<String>,
    /// Leave documents out of results.
    pub clusters_only: bool,
}

impl ControllerConfig {
    pub fn from_json(json: &str) -> LingoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One request for [`Controller::process_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingRequest {
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub attributes: AttributeMap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub request_id: Uuid,
    pub algorithm: String,
    pub clusters: Vec<Cluster>,
    pub unclustered: Vec<DocumentId>,
    /// Empty when the controller runs clusters-only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
    /// Remaining output attributes, e.g. stage statistics.
    pub attributes: AttributeMap,
}

/// Language detection, tokenization and Lingo over in-memory documents.
pub fn lingo_pipeline() -> LingoResult<Pipeline> {
    let mut builder = ChainBuilder::new(MemoryDocumentSource::new());
    builder
        .chain(LanguageDetectionFilter::default())?
        .chain(TokenizerStage::new())?
        .chain(LingoClusterer::default())?;
    builder.build()
}

pub struct Controller {
    config: ControllerConfig,
    algorithms: Vec<(String, PipelineFactory)>,
    idle: DashMap<String, Vec<Pipeline>>,
    journal: Option<Arc<Journal>>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            algorithms: Vec::new(),
            idle: DashMap::new(),
            journal: None,
        }
    }

    /// Controller with the built-in `lingo` algorithm registered.
    pub fn with_default_algorithms(config: ControllerConfig) -> Self {
        let mut controller = Self::new(config);
        controller.register("lingo", lingo_pipeline);
        controller
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Registers or replaces an algorithm. Replacing drops its idle pipelines.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> LingoResult<Pipeline> + Send + Sync + 'static,
    {
        let id = id.into();
        let factory: PipelineFactory = Arc::new(factory);
        match self.algorithms.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => {
                entry.1 = factory;
                self.idle.remove(&id);
            }
            None => self.algorithms.push((id, factory)),
        }
        self
    }

    /// Registered ids in registration order.
    pub fn algorithms(&self) -> Vec<&str> {
        self.algorithms.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// The configured default, else the first registered non-internal id.
    pub fn default_algorithm(&self) -> LingoResult<&str> {
        if let Some(id) = &self.config.default_algorithm {
            return self
                .algorithms
                .iter()
                .find(|(existing, _)| existing == id)
                .map(|(existing, _)| existing.as_str())
                .ok_or_else(|| LingoError::UnknownAlgorithm { name: id.clone() });
        }
        self.algorithms
            .iter()
            .map(|(id, _)| id.as_str())
            .find(|id| !id.starts_with(INTERNAL_PREFIX))
            .ok_or_else(|| LingoError::UnknownAlgorithm {
                name: "<default>".to_string(),
            })
    }

    /// Number of pooled pipelines waiting for `algorithm`.
    pub fn idle_pipelines(&self, algorithm: &str) -> usize {
        self.idle.get(algorithm).map_or(0, |idle| idle.len())
    }

    /// Runs one request on `algorithm`, or on the default algorithm if `None`.
    pub fn process(
        &self,
        algorithm: Option<&str>,
        attributes: AttributeMap,
    ) -> LingoResult<ProcessingResult> {
        let algorithm = match algorithm {
            Some(id) => id.to_string(),
            None => self.default_algorithm()?.to_string(),
        };

        let mut pipeline = self.checkout(&algorithm)?;
        let outcome = pipeline.process(attributes);
        self.checkin(&algorithm, pipeline);
        let mut output = outcome?;

        let clusters: Vec<Cluster> = output.attributes.get(CLUSTERS)?.unwrap_or_default();
        let unclustered: Vec<DocumentId> =
            output.attributes.get(UNCLUSTERED)?.unwrap_or_default();
        for consumed in [CLUSTERS, UNCLUSTERED, DOCUMENTS] {
            output.attributes.remove(consumed);
        }
        tracing::debug!(
            algorithm = %algorithm,
            request_id = %output.request_id,
            clusters = clusters.len(),
            unclustered = unclustered.len(),
            "request processed"
        );

        let documents = if self.config.clusters_only {
            Vec::new()
        } else {
            output.documents
        };
        Ok(ProcessingResult {
            request_id: output.request_id,
            algorithm,
            clusters,
            unclustered,
            documents,
            attributes: output.attributes,
        })
    }

    /// Processes requests concurrently on the blocking pool. Results keep the
    /// order of `requests`.
    pub async fn process_batch(
        self: Arc<Self>,
        requests: Vec<ProcessingRequest>,
    ) -> Vec<LingoResult<ProcessingResult>> {
        let handles: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let controller = Arc::clone(&self);
                tokio::task::spawn_blocking(move || {
                    controller.process(request.algorithm.as_deref(), request.attributes)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                Err(LingoError::Other(anyhow::anyhow!(
                    "processing task failed: {e}"
                )))
            }));
        }
        results
    }

    fn checkout(&self, algorithm: &str) -> LingoResult<Pipeline> {
        let pooled = self
            .idle
            .get_mut(algorithm)
            .and_then(|mut idle| idle.pop());
        if let Some(pipeline) = pooled {
            return Ok(pipeline);
        }

        let factory = self
            .algorithms
            .iter()
            .find(|(id, _)| id == algorithm)
            .map(|(_, factory)| Arc::clone(factory))
            .ok_or_else(|| LingoError::UnknownAlgorithm {
                name: algorithm.to_string(),
            })?;
        let mut pipeline = factory()?;
        pipeline.set_journal(self.journal.clone());
        tracing::debug!(algorithm, "pipeline instance created");
        Ok(pipeline)
    }

    fn checkin(&self, algorithm: &str, pipeline: Pipeline) {
        self.idle
            .entry(algorithm.to_string())
            .or_default()
            .push(pipeline);
    }
}
