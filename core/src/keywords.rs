//! Keyword auto-tagging.
//!
//! Candidates come from four sources and are merged by lowercase form with
//! additive weights: TF-IDF terms (1.0), frequent n-grams (0.7), domain
//! dictionary hits (0.9) and pattern-matched entities (0.6).

use crate::config::KeywordConfig;
use crate::document::{Document, DocumentBuilder, PaperMetadata};
use crate::index::Corpus;
use crate::scoring::{round_score, CacheMode, ScoringEngine};
use crate::source::PaperRecord;
use crate::taxonomy::{self, CATEGORIES, DEFAULT_CATEGORY, DOMAIN_TERMS, ENTITY_PATTERNS};
use crate::tokenizer::{Analyzer, TextInput, Tokenizer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

const TFIDF_WEIGHT: f64 = 1.0;
const NGRAM_WEIGHT: f64 = 0.7;
const DOMAIN_WEIGHT: f64 = 0.9;
const ENTITY_WEIGHT: f64 = 0.6;
const TITLE_BOOST: f64 = 1.5;
const MAX_TERM_LENGTH: usize = 30;
const TOP_NGRAMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordOptions {
    pub max_keywords: usize,
    pub min_term_length: usize,
    pub include_ngrams: bool,
    pub use_domain_context: bool,
    pub boost_title_terms: bool,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self { max_keywords: 8, min_term_length: 3, include_ngrams: true, use_domain_context: true, boost_title_terms: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    TfIdf,
    NGram,
    Domain,
    Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredKeyword {
    pub keyword: String,
    pub score: f64,
    pub sources: Vec<KeywordSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedDocument {
    pub key: String,
    pub similarity: f64,
}

/// Insertion-ordered score accumulator keyed by lowercase candidate.
#[derive(Default)]
struct Merged {
    slots: HashMap<String, usize>,
    entries: Vec<(String, f64, Vec<KeywordSource>)>,
}

impl Merged {
    fn add(&mut self, candidate: &str, score: f64, source: KeywordSource) {
        let key = candidate.trim().to_lowercase();
        if key.is_empty() { return; }
        match self.slots.get(&key) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.1 += score;
                if !entry.2.contains(&source) { entry.2.push(source); }
            }
            None => {
                self.slots.insert(key.clone(), self.entries.len());
                self.entries.push((key, score, vec![source]));
            }
        }
    }
}

/// Auto-tagger with a bounded running corpus that sharpens IDF as more text is seen.
pub struct KeywordExtractor {
    analyzer: Arc<Analyzer>,
    scoring: ScoringEngine,
    running: Corpus,
    arrival: VecDeque<String>,
    next_id: u64,
    running_limit: usize,
}

impl KeywordExtractor {
    /// Candidates keep their surface form, so a stemming analyzer is swapped for an
    /// unstemmed one sharing the same stopwords.
    pub fn new(analyzer: Arc<Analyzer>, config: &KeywordConfig) -> Self {
        let analyzer = if analyzer.tokenizer.is_stemming() {
            Arc::new(Analyzer::new(Tokenizer::new(), analyzer.stopwords.clone()))
        } else {
            analyzer
        };
        Self {
            analyzer,
            scoring: ScoringEngine::default(),
            running: Corpus::new(),
            arrival: VecDeque::new(),
            next_id: 0,
            running_limit: config.running_corpus_limit.max(1),
        }
    }

    pub fn running_documents(&self) -> usize { self.running.len() }

    pub fn extract(&mut self, text: &str, opts: &KeywordOptions) -> Vec<ScoredKeyword> {
        self.extract_with_title(None, text, opts)
    }

    pub fn extract_for_paper(&mut self, paper: &PaperRecord, opts: &KeywordOptions) -> Vec<ScoredKeyword> {
        let text = format!("{} {}", paper.title, paper.abstract_text);
        self.extract_with_title(Some(&paper.title), &text, opts)
    }

    pub fn extract_with_title(&mut self, title: Option<&str>, text: &str, opts: &KeywordOptions) -> Vec<ScoredKeyword> {
        let lowered = text.to_lowercase();
        let tokens = self.analyzer.tokenize(text);
        let mut merged = Merged::default();

        for (term, score) in self.tfidf_candidates(&tokens, opts) {
            merged.add(&term, score * TFIDF_WEIGHT, KeywordSource::TfIdf);
        }
        if opts.include_ngrams {
            for (gram, freq) in self.ngrams(&tokens) {
                merged.add(&gram, freq as f64 * NGRAM_WEIGHT, KeywordSource::NGram);
            }
        }
        if opts.use_domain_context {
            for term in domain_terms(&lowered) {
                merged.add(term, DOMAIN_WEIGHT, KeywordSource::Domain);
            }
        }
        for entity in self.entities(&lowered) {
            merged.add(&entity, ENTITY_WEIGHT, KeywordSource::Entity);
        }

        let title_words: HashSet<String> = title
            .filter(|_| opts.boost_title_terms)
            .map(|t| self.analyzer.tokenize(t).into_iter().collect())
            .unwrap_or_default();
        let mut ranked: Vec<ScoredKeyword> = merged
            .entries
            .into_iter()
            .map(|(key, mut score, sources)| {
                if in_title(&title_words, &key) {
                    score *= TITLE_BOOST;
                }
                ScoredKeyword { keyword: key, score: round_score(score), sources }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(opts.max_keywords);
        for kw in &mut ranked {
            kw.keyword = taxonomy::display_form(&kw.keyword);
        }
        tracing::debug!(keywords = ranked.len(), running = self.running.len(), "extracted keywords");
        ranked
    }

    /// Adds the text to the running corpus and ranks its valid terms by TF-IDF.
    fn tfidf_candidates(&mut self, tokens: &[String], opts: &KeywordOptions) -> Vec<(String, f64)> {
        let key = format!("kw-{}", self.next_id);
        self.next_id += 1;
        let doc = match DocumentBuilder::new(&self.analyzer).build(
            key.clone(),
            &TextInput::Tokens(tokens.to_vec()),
            PaperMetadata::default(),
        ) {
            Ok(doc) => doc,
            Err(_) => return Vec::new(),
        };
        self.remember(doc);

        let Some(doc) = self.running.get(&key) else { return Vec::new() };
        let mut scored: Vec<(String, f64)> = doc
            .terms
            .keys()
            .filter(|t| self.valid_candidate(t, opts.min_term_length))
            .map(|t| (t.clone(), self.scoring.tfidf(&self.running, t, doc)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(opts.max_keywords.max(1).saturating_mul(2));
        scored
    }

    fn remember(&mut self, doc: Document) {
        self.arrival.push_back(doc.key.clone());
        self.running.insert(doc);
        while self.running.len() > self.running_limit {
            match self.arrival.pop_front() {
                Some(oldest) => { self.running.remove(&oldest); }
                None => break,
            }
        }
        self.scoring.invalidate(&self.running, CacheMode::InvalidateAll);
    }

    fn valid_candidate(&self, term: &str, min_len: usize) -> bool {
        let len = term.chars().count();
        len >= min_len
            && len <= MAX_TERM_LENGTH
            && term.chars().any(char::is_alphabetic)
            && !self.analyzer.is_stopword(term)
            && !taxonomy::is_generic(term)
    }

    /// Two- and three-word windows over the stopword-filtered tokens, most frequent first.
    fn ngrams(&self, tokens: &[String]) -> Vec<(String, usize)> {
        let words: Vec<&str> = tokens
            .iter()
            .map(String::as_str)
            .filter(|t| !self.analyzer.is_stopword(t))
            .collect();
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for n in 2..=3 {
            for window in words.windows(n) {
                if window.iter().any(|w| taxonomy::is_generic(w) || w.chars().count() < 2) {
                    continue;
                }
                let gram = window.join(" ");
                let count = counts.entry(gram.clone()).or_insert(0);
                if *count == 0 { order.push(gram); }
                *count += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = order
            .into_iter()
            .map(|g| {
                let c = counts[&g];
                (g, c)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(TOP_NGRAMS);
        ranked
    }

    fn entities(&self, lowered: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for re in ENTITY_PATTERNS.iter() {
            for m in re.find_iter(lowered) {
                let words: Vec<&str> = m
                    .as_str()
                    .split_whitespace()
                    .skip_while(|w| self.analyzer.is_stopword(w) || taxonomy::is_generic(w))
                    .collect();
                if words.is_empty() { continue; }
                let phrase = words.join(" ");
                if seen.insert(phrase.clone()) {
                    found.push(phrase);
                }
            }
        }
        found
    }
}

/// Every word of the candidate appears among the title's tokens.
fn in_title(title_words: &HashSet<String>, candidate: &str) -> bool {
    !title_words.is_empty() && candidate.split_whitespace().all(|w| title_words.contains(w))
}

fn domain_terms(lowered: &str) -> Vec<&'static str> {
    let mut hits = Vec::new();
    for (_, terms) in DOMAIN_TERMS {
        for term in terms.iter() {
            if lowered.contains(term) && !hits.contains(term) {
                hits.push(*term);
            }
        }
    }
    hits
}

/// The category whose indicative terms overlap the keywords most, or "General".
pub fn classify<S: AsRef<str>>(keywords: &[S]) -> &'static str {
    let lowered: Vec<String> = keywords.iter().map(|k| k.as_ref().to_lowercase()).collect();
    let mut best = (DEFAULT_CATEGORY, 0usize);
    for (category, terms) in CATEGORIES {
        let overlap = terms
            .iter()
            .map(|term| lowered.iter().filter(|kw| kw.contains(term) || term.contains(kw.as_str())).count())
            .sum::<usize>();
        if overlap > best.1 {
            best = (*category, overlap);
        }
    }
    best.0
}

pub fn jaccard<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> f64 {
    let a: HashSet<String> = a.iter().map(|k| k.as_ref().to_lowercase()).collect();
    let b: HashSet<String> = b.iter().map(|k| k.as_ref().to_lowercase()).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Candidates whose keyword sets reach `threshold` Jaccard similarity, most similar first.
pub fn suggest_related<'a, S, I>(target: &[S], candidates: I, threshold: f64, limit: usize) -> Vec<RelatedDocument>
where
    S: AsRef<str>,
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let mut related: Vec<RelatedDocument> = candidates
        .into_iter()
        .filter_map(|(key, keywords)| {
            let similarity = round_score(jaccard(target, keywords));
            (similarity >= threshold && similarity > 0.0).then(|| RelatedDocument { key: key.to_string(), similarity })
        })
        .collect();
    related.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    related.truncate(limit);
    related
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> KeywordExtractor {
        KeywordExtractor::new(Arc::new(Analyzer::default()), &KeywordConfig::default())
    }

    #[test]
    fn filters_invalid_candidates() {
        let mut ex = extractor();
        let opts = KeywordOptions { include_ngrams: false, use_domain_context: false, ..Default::default() };
        let kws = ex.extract("the 2024 results of an ab study using graphs", &opts);
        let names: Vec<&str> = kws.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(names, vec!["Graphs"]);
    }

    #[test]
    fn running_corpus_is_bounded() {
        let mut ex = KeywordExtractor::new(
            Arc::new(Analyzer::default()),
            &KeywordConfig { running_corpus_limit: 2, ..Default::default() },
        );
        for text in ["alpha beta", "gamma delta", "epsilon zeta"] {
            ex.extract(text, &KeywordOptions::default());
        }
        assert_eq!(ex.running_documents(), 2);
    }

    #[test]
    fn corpus_idf_demotes_common_terms() {
        let mut ex = extractor();
        let opts = KeywordOptions { include_ngrams: false, use_domain_context: false, ..Default::default() };
        ex.extract("network latency", &opts);
        ex.extract("network throughput", &opts);
        let kws = ex.extract("network routing", &opts);
        assert_eq!(kws[0].keyword, "Routing");
        assert!(kws[0].score > kws[1].score);
    }

    #[test]
    fn title_terms_are_boosted() {
        let mut ex = extractor();
        let opts = KeywordOptions { include_ngrams: false, use_domain_context: false, ..Default::default() };
        let kws = ex.extract_with_title(Some("Routing"), "latency routing", &opts);
        assert_eq!(kws[0].keyword, "Routing");
        assert_eq!(kws[0].score, 1.5);
    }

    #[test]
    fn title_boost_needs_whole_words() {
        let mut ex = extractor();
        let opts = KeywordOptions { include_ngrams: false, use_domain_context: false, ..Default::default() };
        let kws = ex.extract_with_title(Some("Networks"), "net", &opts);
        assert_eq!(kws.len(), 1);
        assert_eq!(kws[0].score, 1.0);
    }

    #[test]
    fn unbounded_keyword_limit_is_accepted() {
        let mut ex = extractor();
        let opts = KeywordOptions { max_keywords: usize::MAX, ..Default::default() };
        let kws = ex.extract("graph mining", &opts);
        let names: Vec<&str> = kws.iter().map(|k| k.keyword.as_str()).collect();
        assert!(names.contains(&"Graph"), "{names:?}");
        assert!(names.contains(&"Mining"), "{names:?}");
    }

    #[test]
    fn stemming_analyzer_still_yields_surface_keywords() {
        let stemmed = Arc::new(Analyzer::new(Tokenizer::with_stemming(), Default::default()));
        let mut ex = KeywordExtractor::new(stemmed, &KeywordConfig::default());
        let opts = KeywordOptions { include_ngrams: false, use_domain_context: false, ..Default::default() };
        let kws = ex.extract("image classification with convolutional networks", &opts);
        let mut names: Vec<&str> = kws.iter().map(|k| k.keyword.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Classification", "Convolutional", "Image", "Networks"]);
    }

    #[test]
    fn classification_picks_highest_overlap() {
        assert_eq!(classify(&["Blockchain", "Smart Contracts", "Voting"]), "Blockchain");
        assert_eq!(classify(&["Deep Learning", "Image Classification"]), "Artificial Intelligence");
        assert_eq!(classify(&["Poetry"]), "General");
        assert_eq!(classify::<&str>(&[]), "General");
    }

    #[test]
    fn related_by_jaccard() {
        let a = vec!["blockchain".to_string(), "voting".to_string()];
        let b = vec!["Blockchain".to_string(), "Ethereum".to_string()];
        let c = vec!["poetry".to_string()];
        let target = ["Blockchain", "Voting", "Ethereum"];
        let related = suggest_related(&target, [("a", a.as_slice()), ("b", b.as_slice()), ("c", c.as_slice())], 0.1, 5);
        let keys: Vec<&str> = related.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(related[0].similarity, round_score(2.0 / 3.0));
    }
}
