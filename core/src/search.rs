use crate::index::Corpus;
use crate::scoring::{round_score, ScoringEngine};
use crate::source::PaperRecord;
use crate::tokenizer::Analyzer;
use crate::PaperId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub limit: usize,
    /// Hits must score strictly above this.
    pub min_score: f64,
    pub include_metadata: bool,
    /// Attach the per-term score breakdown to each hit.
    pub explain: bool,
}

impl Default for SearchOptions {
    fn default() -> Self { Self { limit: 10, min_score: 0.0, include_metadata: false, explain: false } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermDetail {
    pub term: String,
    pub tf: u32,
    pub idf: f64,
    pub bm25: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    pub paper_id: Option<PaperId>,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_details: Option<Vec<TermDetail>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PaperRecord>,
}

/// Score every document against the query by summed BM25 and return the top hits.
///
/// Query tokens are not stopword-filtered; a repeated query token counts once per
/// occurrence. Equal scores keep corpus insertion order.
pub fn rank(
    analyzer: &Analyzer,
    scoring: &ScoringEngine,
    corpus: &Corpus,
    query: &str,
    opts: &SearchOptions,
) -> Vec<SearchHit> {
    let terms = analyzer.tokenize(query);
    if terms.is_empty() || corpus.is_empty() || opts.limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = Vec::new();
    for doc in corpus.docs() {
        let mut total = 0.0;
        let mut details = Vec::new();
        for term in &terms {
            let bm25 = scoring.bm25(corpus, term, doc);
            total += bm25;
            if opts.explain {
                let tf = doc.tf(term);
                if tf > 0 {
                    details.push(TermDetail { term: term.clone(), tf, idf: scoring.idf(corpus, term), bm25 });
                }
            }
        }
        let score = round_score(total);
        if score > opts.min_score {
            hits.push(SearchHit {
                key: doc.key.clone(),
                paper_id: doc.paper_id().ok(),
                score,
                term_details: opts.explain.then_some(details),
                metadata: None,
            });
        }
    }

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(opts.limit);
    hits
}
