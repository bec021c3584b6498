//! Term-document matrix construction.

use std::collections::{BTreeMap, HashMap};

use nalgebra::DMatrix;

use crate::context::{ClusteringContext, TermId};

/// Allowed deviation of a non-zero column norm from 1.
pub const NORM_TOLERANCE: f64 = 1e-9;

/// What a matrix row stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixRow {
    Term(TermId),
    /// Index into the context's phrase candidates.
    Phrase(usize),
}

/// Weighted rows of terms, then phrases, by document columns.
///
/// Columns follow the document order of the clustering context. Term rows
/// always precede phrase rows.
#[derive(Debug, Clone)]
pub struct TermDocumentMatrix {
    weights: DMatrix<f64>,
    rows: Vec<MatrixRow>,
    term_rows: usize,
    index: HashMap<MatrixRow, usize>,
}

impl TermDocumentMatrix {
    /// Wraps `weights` whose rows are described by `rows`. Term rows must come first.
    pub fn new(weights: DMatrix<f64>, rows: Vec<MatrixRow>) -> Self {
        debug_assert_eq!(weights.nrows(), rows.len());
        let term_rows = rows
            .iter()
            .take_while(|r| matches!(r, MatrixRow::Term(_)))
            .count();
        let index = rows.iter().enumerate().map(|(i, r)| (*r, i)).collect();
        Self {
            weights,
            rows,
            term_rows,
            index,
        }
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    pub fn term_rows(&self) -> usize {
        self.term_rows
    }

    pub fn document_count(&self) -> usize {
        self.weights.ncols()
    }

    pub fn row_of_term(&self, term: TermId) -> Option<usize> {
        self.index.get(&MatrixRow::Term(term)).copied()
    }

    pub fn row_of_phrase(&self, phrase: usize) -> Option<usize> {
        self.index.get(&MatrixRow::Phrase(phrase)).copied()
    }

    /// The term rows only, with columns renormalized to unit length.
    pub fn term_block(&self) -> DMatrix<f64> {
        let mut block = self.weights.rows(0, self.term_rows).into_owned();
        normalize_columns(&mut block);
        block
    }

    pub fn column_norm(&self, column: usize) -> f64 {
        self.weights.column(column).norm()
    }
}

/// Scales every non-zero column to unit L2 norm.
pub fn normalize_columns(weights: &mut DMatrix<f64>) {
    for j in 0..weights.ncols() {
        let norm = weights.column(j).norm();
        if norm > 0.0 {
            let mut column = weights.column_mut(j);
            column /= norm;
        }
    }
}

/// Builds the weighted matrix for a clustering context.
///
/// Implementations must give every non-stop term occurring in any document a
/// row, and must return unit-norm (or all-zero) columns.
pub trait TdMatrixBuildingStrategy: Send + Sync {
    fn build_td_matrix(&self, context: &ClusteringContext) -> TermDocumentMatrix;
}

/// `(1 + ln tf) * (ln(N / df) + 1)` per cell, then column normalization.
///
/// Stop words get no row. Phrase candidates of two or more terms get a row
/// after all terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfIdfMatrixStrategy;

impl TfIdfMatrixStrategy {
    fn weight(tf: u32, df: usize, documents: usize) -> f64 {
        let tf = 1.0 + f64::from(tf).ln();
        let idf = (documents as f64 / df as f64).ln() + 1.0;
        tf * idf
    }
}

impl TdMatrixBuildingStrategy for TfIdfMatrixStrategy {
    fn build_td_matrix(&self, context: &ClusteringContext) -> TermDocumentMatrix {
        let documents = context.document_count();
        let vocabulary = context.vocabulary();

        // row -> column -> raw count, rows in their final order
        let mut counts: BTreeMap<TermId, BTreeMap<usize, u32>> = BTreeMap::new();
        for (column, document) in context.documents().iter().enumerate() {
            for term in document.terms() {
                if vocabulary.is_stop_word(term) {
                    continue;
                }
                *counts.entry(term).or_default().entry(column).or_insert(0) += 1;
            }
        }

        let mut rows: Vec<(MatrixRow, BTreeMap<usize, u32>)> = counts
            .into_iter()
            .map(|(term, per_document)| (MatrixRow::Term(term), per_document))
            .collect();

        if let Some(array) = context.suffix_array() {
            for (index, phrase) in context.phrases().iter().enumerate() {
                if phrase.len() < 2 {
                    continue;
                }
                let mut per_document = BTreeMap::new();
                for position in &phrase.occurrences {
                    if let Some(column) = array.document_at(*position as usize) {
                        *per_document.entry(column).or_insert(0) += 1;
                    }
                }
                rows.push((MatrixRow::Phrase(index), per_document));
            }
        }

        let mut weights = DMatrix::zeros(rows.len(), documents);
        for (i, (_, per_document)) in rows.iter().enumerate() {
            let df = per_document.len();
            for (&column, &tf) in per_document {
                weights[(i, column)] = Self::weight(tf, df, documents);
            }
        }
        normalize_columns(&mut weights);

        tracing::debug!(
            rows = weights.nrows(),
            documents,
            "term-document matrix built"
        );
        TermDocumentMatrix::new(weights, rows.into_iter().map(|(row, _)| row).collect())
    }
}
