//! In-memory BM25 index over a corpus.
//!
//! Each section is scored on its title and body. Scores follow Okapi BM25 with the
//! non-negative IDF variant `ln(1 + (N - n + 0.5) / (n + 0.5))`, so a term that appears
//! in every section still contributes a small positive weight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::{Corpus, Section};

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Document-length normalization strength, `0.0..=1.0`.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub section: Section,
    pub score: f64,
    /// Distinct query terms found in the section, in query order.
    pub matched_terms: Vec<String>,
}

/// Lowercase `text` and split it on every non-alphanumeric character.
///
/// Any script counts as alphanumeric, so Hangul and Latin runs survive as tokens while
/// punctuation and whitespace separate them.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Immutable BM25 index bound to one corpus.
#[derive(Debug)]
pub struct Bm25Index {
    corpus: Arc<Corpus>,
    params: Bm25Params,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lengths: Vec<usize>,
    doc_freqs: HashMap<String, usize>,
    avg_doc_length: f64,
}

impl Bm25Index {
    pub fn build(corpus: Arc<Corpus>) -> Self {
        Self::build_with(corpus, Bm25Params::default())
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn build_with(corpus: Arc<Corpus>, params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lengths = Vec::with_capacity(corpus.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for section in corpus.sections() {
            let tokens = tokenize(&section.searchable_text());
            doc_lengths.push(tokens.len());

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_default() += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_default() += 1;
            }
            term_freqs.push(freqs);
        }

        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<usize>() as f64 / doc_lengths.len() as f64
        };

        debug!(
            "Indexed {} sections with {} unique terms",
            doc_lengths.len(),
            doc_freqs.len()
        );

        Self {
            corpus,
            params,
            term_freqs,
            doc_lengths,
            doc_freqs,
            avg_doc_length,
        }
    }

    /// The corpus this index was built from.
    pub const fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Rank every section against `query` and return at most `top_k` hits.
    ///
    /// Sections with a zero score are omitted. Equal scores keep corpus order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        self.search_filtered(query, top_k, |_| true)
    }

    /// Like [`Bm25Index::search`], but only sections accepted by `filter` are ranked.
    ///
    /// Statistics (IDF, average length) always come from the whole corpus, so a
    /// section's score does not depend on the filter.
    pub fn search_filtered<F>(&self, query: &str, top_k: usize, filter: F) -> Vec<SearchHit>
    where
        F: Fn(&Section) -> bool,
    {
        let mut seen = HashSet::new();
        let terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|term| seen.insert(term.clone()))
            .collect();
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .corpus
            .sections()
            .iter()
            .enumerate()
            .filter(|(_, section)| filter(section))
            .filter_map(|(position, section)| {
                let (score, matched_terms) = self.score(position, &terms);
                (score > 0.0).then(|| SearchHit {
                    section: section.clone(),
                    score,
                    matched_terms,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        hits
    }

    /// Inverse document frequency of `term`; zero for unknown terms.
    #[allow(clippy::cast_precision_loss)]
    pub fn idf(&self, term: &str) -> f64 {
        let Some(&n) = self.doc_freqs.get(term) else {
            return 0.0;
        };
        let total = self.doc_lengths.len() as f64;
        let n = n as f64;
        ((total - n + 0.5) / (n + 0.5)).ln_1p()
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, position: usize, terms: &[String]) -> (f64, Vec<String>) {
        let Bm25Params { k1, b } = self.params;
        let freqs = &self.term_freqs[position];
        let length_norm = if self.avg_doc_length > 0.0 {
            self.doc_lengths[position] as f64 / self.avg_doc_length
        } else {
            1.0
        };

        let mut score = 0.0;
        let mut matched = Vec::new();
        for term in terms {
            let Some(&tf) = freqs.get(term) else {
                continue;
            };
            let tf = f64::from(tf);
            let denominator = k1.mul_add(1.0 - b + b * length_norm, tf);
            score += self.idf(term) * (tf * (k1 + 1.0)) / denominator;
            matched.push(term.clone());
        }
        (score, matched)
    }
}
