//! Suffix array and LCP over the concatenated token streams of all documents,
//! and frequent-phrase discovery on top of it.

use std::collections::BTreeSet;

use crate::context::{ContextToken, DocumentTokens, TermId};

use super::LingoConfig;

/// One position of the concatenated stream.
///
/// Separators order before every term, and each separator carries a unique id,
/// so no two suffixes share a prefix across a separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Separator(u32),
    Term(TermId),
}

impl Symbol {
    pub fn is_separator(self) -> bool {
        matches!(self, Symbol::Separator(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuffixArray {
    symbols: Vec<Symbol>,
    /// Document index (position in the context) owning each symbol.
    owners: Vec<u32>,
    suffixes: Vec<u32>,
    lcp: Vec<u32>,
}

impl SuffixArray {
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Suffix start offsets in lexicographic order of the suffixes.
    pub fn suffixes(&self) -> &[u32] {
        &self.suffixes
    }

    /// `lcp[i]` is the common prefix length of suffixes `i - 1` and `i`; `lcp[0] = 0`.
    pub fn lcp(&self) -> &[u32] {
        &self.lcp
    }

    pub fn suffix(&self, rank: usize) -> &[Symbol] {
        &self.symbols[self.suffixes[rank] as usize..]
    }

    /// Document index owning the symbol at `position`.
    pub fn document_at(&self, position: usize) -> Option<usize> {
        self.owners.get(position).map(|d| *d as usize)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A repeated term sequence occurring in at least two documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseCandidate {
    pub terms: Vec<TermId>,
    /// Start offsets into the concatenated stream, ascending.
    pub occurrences: Vec<u32>,
    /// Document indexes containing the phrase, ascending.
    pub documents: Vec<usize>,
}

impl PhraseCandidate {
    pub fn frequency(&self) -> usize {
        self.occurrences.len()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

pub struct SuffixArrayBuilder {
    max_phrase_length: usize,
    min_frequency: usize,
}

impl SuffixArrayBuilder {
    pub fn new(max_phrase_length: usize, min_frequency: usize) -> Self {
        Self {
            max_phrase_length: max_phrase_length.max(1),
            min_frequency: min_frequency.max(2),
        }
    }

    pub fn from_config(config: &LingoConfig) -> Self {
        Self::new(config.max_phrase_length, config.min_phrase_frequency)
    }

    /// Concatenates the documents, breaking at non-term tokens and between
    /// documents, and sorts all suffixes.
    pub fn build(&self, documents: &[DocumentTokens]) -> SuffixArray {
        let mut symbols = Vec::new();
        let mut owners = Vec::new();
        let mut separator = 0u32;
        for (index, document) in documents.iter().enumerate() {
            if index > 0 {
                symbols.push(Symbol::Separator(separator));
                owners.push(index as u32 - 1);
                separator += 1;
            }
            for token in &document.tokens {
                symbols.push(match token {
                    ContextToken::Term(id) => Symbol::Term(*id),
                    ContextToken::Break { .. } => {
                        separator += 1;
                        Symbol::Separator(separator - 1)
                    }
                });
                owners.push(index as u32);
            }
        }

        let suffixes = sort_suffixes(&symbols);
        let lcp = longest_common_prefixes(&symbols, &suffixes);
        SuffixArray {
            symbols,
            owners,
            suffixes,
            lcp,
        }
    }

    /// Every right-maximal repeat of at most `max_phrase_length` terms that occurs
    /// at least `min_frequency` times in at least two documents. Repeats longer
    /// than the limit are reported by their truncated prefix.
    pub fn phrase_candidates(&self, array: &SuffixArray) -> Vec<PhraseCandidate> {
        let n = array.len();
        let mut candidates = Vec::new();
        if n == 0 {
            return candidates;
        }

        // (lcp, left bound) of the open intervals; the root never closes
        let mut stack: Vec<(u32, usize)> = vec![(0, 0)];
        for i in 1..=n {
            let current = if i < n { array.lcp[i] } else { 0 };
            let mut left = i - 1;
            while let Some(&(depth, bound)) = stack.last() {
                if current >= depth {
                    break;
                }
                stack.pop();
                left = bound;
                let parent = stack.last().map_or(0, |(d, _)| *d).max(current);
                if let Some(candidate) = self.interval(array, depth, parent, bound, i - 1) {
                    candidates.push(candidate);
                }
            }
            if stack.last().map_or(true, |(d, _)| current > *d) {
                stack.push((current, left));
            }
        }

        candidates.sort_by(|a, b| {
            b.documents
                .len()
                .cmp(&a.documents.len())
                .then(b.frequency().cmp(&a.frequency()))
                .then(b.terms.len().cmp(&a.terms.len()))
                .then(a.terms.cmp(&b.terms))
        });
        candidates
    }

    fn interval(
        &self,
        array: &SuffixArray,
        depth: u32,
        parent: u32,
        left: usize,
        right: usize,
    ) -> Option<PhraseCandidate> {
        let max = self.max_phrase_length as u32;
        let length = if depth <= max {
            depth
        } else if parent < max {
            max
        } else {
            // an enclosing interval reports the truncated prefix
            return None;
        };

        let frequency = right - left + 1;
        if frequency < self.min_frequency {
            return None;
        }

        let mut occurrences: Vec<u32> = array.suffixes[left..=right].to_vec();
        occurrences.sort_unstable();
        let documents: BTreeSet<usize> = occurrences
            .iter()
            .filter_map(|p| array.document_at(*p as usize))
            .collect();
        if documents.len() < 2 {
            return None;
        }

        let start = occurrences[0] as usize;
        let terms = array.symbols[start..start + length as usize]
            .iter()
            .map(|s| match s {
                Symbol::Term(id) => Some(*id),
                Symbol::Separator(_) => None,
            })
            .collect::<Option<Vec<_>>>()?;

        Some(PhraseCandidate {
            terms,
            occurrences,
            documents: documents.into_iter().collect(),
        })
    }
}

/// Prefix doubling. Equal suffixes cannot occur, but ties at each round are
/// broken by offset so the order is total at every step.
fn sort_suffixes(symbols: &[Symbol]) -> Vec<u32> {
    let n = symbols.len();
    let mut suffixes: Vec<u32> = (0..n as u32).collect();
    if n == 0 {
        return suffixes;
    }

    suffixes.sort_by(|&a, &b| {
        symbols[a as usize]
            .cmp(&symbols[b as usize])
            .then(a.cmp(&b))
    });
    let mut rank = vec![0u32; n];
    for i in 1..n {
        let (prev, cur) = (suffixes[i - 1] as usize, suffixes[i] as usize);
        rank[cur] = rank[prev] + u32::from(symbols[cur] != symbols[prev]);
    }

    let mut next = vec![0u32; n];
    let mut step = 1;
    while step < n && (rank[suffixes[n - 1] as usize] as usize) < n - 1 {
        let key = |i: u32| -> (u32, i64) {
            let i = i as usize;
            let second = if i + step < n { rank[i + step] as i64 } else { -1 };
            (rank[i], second)
        };
        suffixes.sort_by(|&a, &b| key(a).cmp(&key(b)).then(a.cmp(&b)));
        next[suffixes[0] as usize] = 0;
        for i in 1..n {
            let (prev, cur) = (suffixes[i - 1], suffixes[i]);
            next[cur as usize] = next[prev as usize] + u32::from(key(cur) != key(prev));
        }
        std::mem::swap(&mut rank, &mut next);
        step *= 2;
    }
    suffixes
}

/// Kasai's algorithm. Separators never count towards a common prefix.
fn longest_common_prefixes(symbols: &[Symbol], suffixes: &[u32]) -> Vec<u32> {
    let n = symbols.len();
    let mut rank = vec![0usize; n];
    for (r, &s) in suffixes.iter().enumerate() {
        rank[s as usize] = r;
    }

    let mut lcp = vec![0u32; n];
    let mut h = 0usize;
    for i in 0..n {
        if rank[i] == 0 {
            h = 0;
            continue;
        }
        let j = suffixes[rank[i] - 1] as usize;
        while i + h < n
            && j + h < n
            && !symbols[i + h].is_separator()
            && symbols[i + h] == symbols[j + h]
        {
            h += 1;
        }
        lcp[rank[i]] = h as u32;
        h = h.saturating_sub(1);
    }
    lcp
}
