//! IDF / BM25 / TF-IDF scoring over a [`Corpus`].
//!
//! - `idf(t)    = ln((N + 1) / (df + 1)) + 1`
//! - `bm25(t,d) = idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * len / avg_len))`
//! - `tfidf(t,d) = tf * idf(t)`
//!
//! Surfaced scores are rounded to six decimal places so that stored and
//! compared values are stable.

use crate::document::Document;
use crate::index::Corpus;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SCORE_DECIMALS: i32 = 6;

pub fn round_score(value: f64) -> f64 {
    let scale = 10f64.powi(SCORE_DECIMALS);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length normalization.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: 1.2, b: 0.75 } }
}

/// What happens to the IDF cache after the corpus changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Drop every cached value.
    #[default]
    InvalidateAll,
    /// Keep the cached term set and recompute each value against the new corpus.
    RecomputeInPlace,
}

/// Per-term scores for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermScore {
    pub term: String,
    pub tf: u32,
    pub tfidf: f64,
    pub bm25: f64,
}

#[derive(Debug, Default)]
pub struct ScoringEngine {
    params: Bm25Params,
    idf_cache: Mutex<HashMap<String, f64>>,
}

impl ScoringEngine {
    pub fn new(params: Bm25Params) -> Self {
        Self { params, idf_cache: Mutex::new(HashMap::new()) }
    }

    pub fn params(&self) -> Bm25Params { self.params }

    pub fn cached_terms(&self) -> usize { self.idf_cache.lock().len() }

    fn raw_idf(corpus: &Corpus, term: &str) -> f64 {
        let n = corpus.len() as f64;
        let df = corpus.df(term) as f64;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }

    fn cached_idf(&self, corpus: &Corpus, term: &str) -> f64 {
        let mut cache = self.idf_cache.lock();
        if let Some(&v) = cache.get(term) {
            return v;
        }
        let v = Self::raw_idf(corpus, term);
        cache.insert(term.to_string(), v);
        v
    }

    /// Smoothed inverse document frequency.
    pub fn idf(&self, corpus: &Corpus, term: &str) -> f64 {
        round_score(self.cached_idf(corpus, term))
    }

    pub fn bm25(&self, corpus: &Corpus, term: &str, doc: &Document) -> f64 {
        let tf = doc.tf(term);
        if tf == 0 {
            return 0.0;
        }
        let avg_len = corpus.stats().avg_doc_length;
        if avg_len <= 0.0 {
            return 0.0;
        }
        let Bm25Params { k1, b } = self.params;
        let tf = tf as f64;
        let norm = k1 * (1.0 - b + b * (doc.length as f64 / avg_len));
        round_score(self.cached_idf(corpus, term) * (tf * (k1 + 1.0)) / (tf + norm))
    }

    pub fn tfidf(&self, corpus: &Corpus, term: &str, doc: &Document) -> f64 {
        let tf = doc.tf(term);
        if tf == 0 {
            return 0.0;
        }
        round_score(tf as f64 * self.cached_idf(corpus, term))
    }

    /// Every term of `doc` with its tf, tfidf and bm25, in term order.
    pub fn score_terms(&self, corpus: &Corpus, doc: &Document) -> Vec<TermScore> {
        doc.terms
            .iter()
            .filter(|(_, e)| e.count > 0)
            .map(|(term, e)| TermScore {
                term: term.clone(),
                tf: e.count,
                tfidf: self.tfidf(corpus, term, doc),
                bm25: self.bm25(corpus, term, doc),
            })
            .collect()
    }

    /// Bring the cache in line with a mutated corpus.
    pub fn invalidate(&self, corpus: &Corpus, mode: CacheMode) {
        let mut cache = self.idf_cache.lock();
        match mode {
            CacheMode::InvalidateAll => cache.clear(),
            CacheMode::RecomputeInPlace => {
                for (term, value) in cache.iter_mut() {
                    *value = Self::raw_idf(corpus, term);
                }
            }
        }
    }
}
