//! Concept discovery, label selection and document assignment.

use nalgebra::{DMatrix, DVector};

use crate::context::ClusteringContext;
use crate::error::{LingoError, LingoResult};
use crate::types::Cluster;

use super::matrix::{MatrixRow, TermDocumentMatrix};
use super::LingoConfig;

const EPSILON: f64 = 1e-12;
/// Scores are rounded to this many steps per unit before ranking.
const SCORE_STEPS: f64 = 1e9;

/// Turns a filled clustering context into ranked clusters.
///
/// Implementations must be deterministic: the same context yields the same
/// clusters in the same order.
///
/// [`LingoStrategy`] scores a cluster as its coherence (mean cosine of the
/// members to their centroid) times its size. Among clusters of equal size the
/// more coherent one ranks higher; a larger cluster may outrank a tighter but
/// smaller one.
pub trait ClusteringStrategy: Send + Sync {
    fn cluster(&self, context: &ClusteringContext) -> LingoResult<Vec<Cluster>>;
}

/// Lingo: decompose the term block, pick one label per dominant concept, then
/// collect the documents each label describes.
#[derive(Debug, Clone, Default)]
pub struct LingoStrategy {
    config: LingoConfig,
}

/// A label candidate expressed in term space.
struct Label {
    text: String,
    vector: DVector<f64>,
    /// Index into the context's phrase candidates.
    phrase: Option<usize>,
}

struct Group {
    /// Matrix columns, ascending.
    members: Vec<usize>,
    labels: Vec<String>,
}

impl LingoStrategy {
    pub fn new(config: LingoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LingoConfig {
        &self.config
    }

    /// Left singular vectors of the dominant concepts, strongest first.
    fn concepts(&self, block: &DMatrix<f64>) -> LingoResult<Vec<DVector<f64>>> {
        let svd = block.clone().svd(true, false);
        let u = svd.u.ok_or_else(|| {
            LingoError::processing("lingo", "decomposition produced no left singular vectors")
        })?;
        let values = svd.singular_values;

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&x, &y| values[y].total_cmp(&values[x]).then(x.cmp(&y)));

        let total: f64 = values.iter().map(|s| s * s).sum();
        if total <= EPSILON {
            return Ok(Vec::new());
        }

        let mut count = 0;
        let mut energy = 0.0;
        for &i in &order {
            if values[i] <= EPSILON {
                break;
            }
            energy += values[i] * values[i];
            count += 1;
            if (energy / total).sqrt() >= self.config.concept_threshold {
                break;
            }
        }
        count = count.min(self.config.max_clusters);

        Ok(order[..count]
            .iter()
            .map(|&i| u.column(i).into_owned())
            .collect())
    }

    /// Multi-term phrases without stop words at either end, then single terms.
    fn candidate_labels(&self, context: &ClusteringContext, matrix: &TermDocumentMatrix) -> Vec<Label> {
        let vocabulary = context.vocabulary();
        let terms = matrix.term_rows();
        let mut labels = Vec::new();

        for (index, phrase) in context.phrases().iter().enumerate() {
            let (Some(first), Some(last)) = (phrase.terms.first(), phrase.terms.last()) else {
                continue;
            };
            if phrase.len() < 2 || vocabulary.is_stop_word(*first) || vocabulary.is_stop_word(*last) {
                continue;
            }
            let mut vector = DVector::zeros(terms);
            for term in &phrase.terms {
                if let Some(row) = matrix.row_of_term(*term) {
                    vector[row] = 1.0;
                }
            }
            let norm = vector.norm();
            if norm <= EPSILON {
                continue;
            }
            vector /= norm;
            labels.push(Label {
                text: vocabulary.phrase_text(&phrase.terms),
                vector,
                phrase: Some(index),
            });
        }

        for (row, kind) in matrix.rows()[..terms].iter().enumerate() {
            if let MatrixRow::Term(term) = kind {
                let mut vector = DVector::zeros(terms);
                vector[row] = 1.0;
                labels.push(Label {
                    text: vocabulary.term(*term).to_string(),
                    vector,
                    phrase: None,
                });
            }
        }
        labels
    }

    /// Best not-yet-used label for each concept. Earlier labels win ties.
    fn select_labels(concepts: &[DVector<f64>], labels: &[Label]) -> Vec<usize> {
        let mut chosen: Vec<usize> = Vec::new();
        for concept in concepts {
            let mut best: Option<(usize, f64)> = None;
            for (i, label) in labels.iter().enumerate() {
                if chosen.contains(&i) {
                    continue;
                }
                let score = concept.dot(&label.vector).abs();
                if score > EPSILON && best.map_or(true, |(_, b)| score > b + EPSILON) {
                    best = Some((i, score));
                }
            }
            if let Some((i, _)) = best {
                chosen.push(i);
            }
        }
        chosen
    }

    fn assign(&self, block: &DMatrix<f64>, label: &Label) -> Vec<usize> {
        (0..block.ncols())
            .filter(|&j| label.vector.dot(&block.column(j)) >= self.config.assignment_threshold)
            .collect()
    }

    /// Labels for a document group: overlapping phrases first, else the
    /// heaviest centroid term. `None` when nothing is relevant enough.
    fn describe(
        &self,
        members: &[usize],
        block: &DMatrix<f64>,
        matrix: &TermDocumentMatrix,
        context: &ClusteringContext,
        labels: &[Label],
    ) -> Option<Vec<String>> {
        let mut phrases: Vec<(f64, f64, &str)> = labels
            .iter()
            .filter_map(|label| {
                let index = label.phrase?;
                let phrase = &context.phrases()[index];
                let overlap = jaccard(&phrase.documents, members);
                if overlap < self.config.label_overlap_threshold {
                    return None;
                }
                let weight = matrix.row_of_phrase(index).map_or(0.0, |row| {
                    members
                        .iter()
                        .map(|&j| matrix.weights()[(row, j)])
                        .sum::<f64>()
                        / members.len() as f64
                });
                Some((overlap, weight, label.text.as_str()))
            })
            .collect();

        if !phrases.is_empty() {
            phrases.sort_by(|a, b| {
                b.0.total_cmp(&a.0)
                    .then(b.1.total_cmp(&a.1))
                    .then(a.2.cmp(b.2))
            });
            return Some(phrases.iter().take(3).map(|p| p.2.to_string()).collect());
        }

        let centroid = centroid(block, members);
        let vocabulary = context.vocabulary();
        let mut best: Option<(f64, &str)> = None;
        for (row, kind) in matrix.rows()[..matrix.term_rows()].iter().enumerate() {
            let MatrixRow::Term(term) = kind else { continue };
            let weight = centroid[row];
            let text = vocabulary.term(*term);
            let better = match best {
                None => true,
                Some((w, t)) => weight > w + EPSILON || ((weight - w).abs() <= EPSILON && text < t),
            };
            if better {
                best = Some((weight, text));
            }
        }
        match best {
            Some((weight, text)) if weight >= self.config.min_label_relevance => {
                Some(vec![text.to_string()])
            }
            _ => None,
        }
    }
}

impl ClusteringStrategy for LingoStrategy {
    fn cluster(&self, context: &ClusteringContext) -> LingoResult<Vec<Cluster>> {
        let Some(matrix) = context.matrix() else {
            return Ok(Vec::new());
        };
        if matrix.term_rows() == 0 || matrix.document_count() == 0 {
            return Ok(Vec::new());
        }

        let block = matrix.term_block();
        let concepts = self.concepts(&block)?;
        let labels = self.candidate_labels(context, matrix);
        let seeds = Self::select_labels(&concepts, &labels);

        let mut member_sets: Vec<Vec<usize>> = Vec::new();
        for seed in seeds {
            let members = self.assign(&block, &labels[seed]);
            if members.is_empty() {
                continue;
            }
            match member_sets
                .iter_mut()
                .find(|m| jaccard(m, &members) >= self.config.merge_threshold)
            {
                Some(existing) => *existing = union(existing, &members),
                None => member_sets.push(members),
            }
        }

        let mut groups: Vec<Group> = Vec::new();
        for members in member_sets {
            let Some(names) = self.describe(&members, &block, matrix, context, &labels) else {
                continue;
            };
            match groups.iter_mut().find(|g| g.labels[0] == names[0]) {
                Some(existing) => existing.members = union(&existing.members, &members),
                None => groups.push(Group {
                    members,
                    labels: names,
                }),
            }
        }

        let documents = context.documents();
        let mut clusters: Vec<Cluster> = groups
            .into_iter()
            .map(|group| {
                let similarity = coherence(&block, &group.members);
                let score = round_score(similarity * group.members.len() as f64);
                let mut ids: Vec<_> = group.members.iter().map(|&j| documents[j].id).collect();
                ids.sort();
                Cluster {
                    labels: group.labels,
                    documents: ids,
                    score,
                }
            })
            .collect();

        rank(&mut clusters);

        tracing::debug!(
            concepts = concepts.len(),
            labels = labels.len(),
            clusters = clusters.len(),
            "lingo clustering finished"
        );
        Ok(clusters)
    }
}

/// Drops float noise so that equal scores tie and fall through to the label.
fn round_score(score: f64) -> f64 {
    (score * SCORE_STEPS).round() / SCORE_STEPS
}

/// Score descending, then label, then first document.
fn rank(clusters: &mut [Cluster]) {
    clusters.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.label().cmp(b.label()))
            .then_with(|| a.documents.first().cmp(&b.documents.first()))
    });
}

fn centroid(block: &DMatrix<f64>, members: &[usize]) -> DVector<f64> {
    let mut sum = DVector::zeros(block.nrows());
    for &j in members {
        sum += block.column(j);
    }
    if !members.is_empty() {
        sum /= members.len() as f64;
    }
    sum
}

/// Mean cosine similarity of the members to their centroid.
fn coherence(block: &DMatrix<f64>, members: &[usize]) -> f64 {
    let centroid = centroid(block, members);
    let norm = centroid.norm();
    if norm <= EPSILON || members.is_empty() {
        return 0.0;
    }
    let total: f64 = members
        .iter()
        .map(|&j| {
            let column = block.column(j);
            let length = column.norm();
            if length <= EPSILON {
                0.0
            } else {
                column.dot(&centroid) / (length * norm)
            }
        })
        .sum();
    total / members.len() as f64
}

/// Jaccard index of two ascending index lists.
fn jaccard(a: &[usize], b: &[usize]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let (mut i, mut j, mut common) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                common += 1;
                i += 1;
                j += 1;
            }
        }
    }
    common as f64 / (a.len() + b.len() - common) as f64
}

fn union(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut merged: Vec<usize> = a.iter().chain(b).copied().collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}
