//! Lingo clustering.
//!
//! ```text
//! token streams ─▶ SuffixArrayBuilder ─▶ phrase candidates
//!        │                                      │
//!        └──────────▶ TdMatrixBuildingStrategy ◀┘
//!                               │
//!                     ClusteringStrategy (SVD concepts → labels → members)
//!                               │
//!                        ranked clusters
//! ```
//!
//! [`LingoClusterer`] runs these steps as the last pipeline stage. The matrix and
//! clustering steps sit behind traits so either can be replaced.

mod clusterer;
mod matrix;
mod strategy;
mod suffix_array;

pub use clusterer::{LingoClusterer, CLUSTERS, LINGO, UNCLUSTERED};
pub use matrix::{
    normalize_columns, MatrixRow, TdMatrixBuildingStrategy, TermDocumentMatrix,
    TfIdfMatrixStrategy, NORM_TOLERANCE,
};
pub use strategy::{ClusteringStrategy, LingoStrategy};
pub use suffix_array::{PhraseCandidate, SuffixArray, SuffixArrayBuilder, Symbol};

use serde::{Deserialize, Serialize};

/// Tuning of phrase discovery and clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LingoConfig {
    /// Longest phrase, in terms.
    pub max_phrase_length: usize,
    /// Minimum occurrences of a phrase candidate. Never below 2.
    pub min_phrase_frequency: usize,
    /// Share of singular-value energy the chosen concepts must cover.
    pub concept_threshold: f64,
    pub max_clusters: usize,
    /// Minimum label-document similarity for membership.
    pub assignment_threshold: f64,
    /// Minimum Jaccard overlap between a phrase's documents and a cluster for
    /// the phrase to label it.
    pub label_overlap_threshold: f64,
    /// Minimum centroid weight of a single-term fallback label.
    pub min_label_relevance: f64,
    /// Jaccard overlap above which two clusters merge.
    pub merge_threshold: f64,
}

impl Default for LingoConfig {
    fn default() -> Self {
        Self {
            max_phrase_length: 8,
            min_phrase_frequency: 2,
            concept_threshold: 0.9,
            max_clusters: 15,
            assignment_threshold: 0.15,
            label_overlap_threshold: 0.6,
            min_label_relevance: 0.05,
            merge_threshold: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = LingoConfig::default();
        assert_eq!(config.max_phrase_length, 8);
        assert_eq!(config.max_clusters, 15);
        assert!((config.concept_threshold - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn config_deserializes_partial() {
        let config: LingoConfig =
            serde_json::from_str(r#"{"max_clusters": 4, "assignment_threshold": 0.3}"#).unwrap();
        assert_eq!(config.max_clusters, 4);
        assert!((config.assignment_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.min_phrase_frequency, 2);
    }
}
