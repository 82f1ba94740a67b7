//! The indexing engine: in-memory corpus, scoring, persistence and search entry points.
//!
//! Mutation (`add_document`, `remove_document`, `load_from_source`) is pure
//! in-memory work; writing rows is a separate `persist` step. The engine holds
//! no locks of its own, so callers serialize writers against readers.

use crate::config::EngineConfig;
use crate::document::{resolve_paper_id, Document, DocumentBuilder, PaperMetadata};
use crate::error::IndexError;
use crate::index::Corpus;
use crate::keywords::KeywordExtractor;
use crate::persist::{BatchSummary, CancelToken, DocumentOutcome, DocumentWrite, TermStore, WriteOptions};
use crate::scoring::{CacheMode, ScoringEngine, TermScore};
use crate::search::{self, SearchHit, SearchOptions};
use crate::source::{PaperRecord, PaperSource};
use crate::tokenizer::{Analyzer, StopwordSet, TextInput, Tokenizer};
use crate::PaperId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_docs: u32,
    pub total_length: u64,
    pub avg_doc_length: f64,
    pub unique_terms: usize,
    pub cached_idf_terms: usize,
    pub updated_at: String,
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    analyzer: Arc<Analyzer>,
    scoring: ScoringEngine,
    corpus: Corpus,
}

impl Default for Engine {
    fn default() -> Self { Self::new(EngineConfig::default()) }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let tokenizer = if config.stemming { Tokenizer::with_stemming() } else { Tokenizer::new() };
        let stopwords = StopwordSet::default().with_extra(&config.extra_stopwords);
        Self {
            analyzer: Arc::new(Analyzer::new(tokenizer, stopwords)),
            scoring: ScoringEngine::new(config.bm25()),
            corpus: Corpus::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn analyzer(&self) -> &Arc<Analyzer> { &self.analyzer }

    pub fn corpus(&self) -> &Corpus { &self.corpus }

    pub fn scoring(&self) -> &ScoringEngine { &self.scoring }

    pub fn document(&self, key: &str) -> Option<&Document> { self.corpus.get(key) }

    /// An auto-tagger sharing this engine's tokenizer and stopwords.
    pub fn keyword_extractor(&self) -> KeywordExtractor {
        KeywordExtractor::new(Arc::clone(&self.analyzer), &self.config.keywords)
    }

    pub fn build_document(
        &self,
        key: impl Into<String>,
        input: &TextInput,
        metadata: PaperMetadata,
    ) -> Result<Document, IndexError> {
        DocumentBuilder::new(&self.analyzer).build(key, input, metadata)
    }

    /// Index a document in memory, replacing any document with the same key.
    /// Nothing is written to storage; see [`Engine::persist`].
    pub fn add_document(
        &mut self,
        key: impl Into<String>,
        input: &TextInput,
        metadata: PaperMetadata,
        external_id: Option<PaperId>,
    ) -> Result<&Document, IndexError> {
        let mut doc = self.build_document(key, input, metadata)?;
        doc.external_id = external_id;
        let key = doc.key.clone();
        tracing::debug!(key = %key, length = doc.length, unique_terms = doc.unique_terms, "indexing document");
        self.corpus.insert(doc);
        self.invalidate_caches(self.config.cache_mode);
        self.corpus.get(&key).ok_or(IndexError::DocumentNotFound(key))
    }

    pub fn add_paper(&mut self, paper: &PaperRecord) -> Result<&Document, IndexError> {
        self.add_document(paper.key(), &TextInput::Raw(paper.index_text()), paper.metadata(), Some(paper.id))
    }

    /// Drop a document from memory. Persisted rows are left in place; purge them
    /// through the store when they should go too.
    pub fn remove_document(&mut self, key: &str) -> Result<Document, IndexError> {
        let doc = self.corpus.remove(key).ok_or_else(|| IndexError::DocumentNotFound(key.to_string()))?;
        self.invalidate_caches(self.config.cache_mode);
        tracing::debug!(key, remaining = self.corpus.len(), "removed document");
        Ok(doc)
    }

    /// Index a document and save it. When the save fails the corpus is put back the
    /// way it was, including any document the call replaced and its slot.
    pub fn add_and_persist<S: TermStore + ?Sized>(
        &mut self,
        store: &S,
        key: impl Into<String>,
        input: &TextInput,
        metadata: PaperMetadata,
        external_id: Option<PaperId>,
        opts: &WriteOptions,
    ) -> Result<usize, IndexError> {
        let key = key.into();
        resolve_paper_id(&key, external_id)?;
        let previous = self.corpus.position(&key).zip(self.corpus.get(&key).cloned());
        self.add_document(key.clone(), input, metadata, external_id)?;
        match self.persist(store, &key, external_id, opts) {
            Ok(written) => Ok(written),
            Err(err) => {
                self.corpus.remove(&key);
                if let Some((slot, doc)) = previous {
                    self.corpus.insert_at(slot, doc);
                }
                self.invalidate_caches(self.config.cache_mode);
                tracing::warn!(key = %key, error = %err, "save failed, corpus restored");
                Err(err)
            }
        }
    }

    /// Drop a document from memory and delete its persisted rows. Returns the number
    /// of rows deleted; the document stays indexed if its rows cannot be purged.
    pub fn remove_and_purge<S: TermStore + ?Sized>(&mut self, store: &S, key: &str) -> Result<usize, IndexError> {
        let doc = self.corpus.get(key).ok_or_else(|| IndexError::DocumentNotFound(key.to_string()))?;
        let paper_id = doc.paper_id()?;
        let slot = self.corpus.position(key).unwrap_or(self.corpus.len());
        let doc = self.remove_document(key)?;
        match store.purge(paper_id) {
            Ok(removed) => Ok(removed),
            Err(source) => {
                self.corpus.insert_at(slot, doc);
                self.invalidate_caches(self.config.cache_mode);
                Err(IndexError::Persist { key: key.to_string(), paper_id: Some(paper_id), source })
            }
        }
    }

    pub fn invalidate_caches(&self, mode: CacheMode) {
        self.scoring.invalidate(&self.corpus, mode);
    }

    /// Rebuild the corpus from the paper source. Returns the number of papers loaded.
    pub fn load_from_source<S: PaperSource + ?Sized>(&mut self, source: &S) -> Result<usize, IndexError> {
        let papers = source.fetch_all()?;
        self.corpus.clear();
        let builder = DocumentBuilder::new(&self.analyzer);
        for paper in &papers {
            let mut doc = builder.build(paper.key(), &TextInput::Raw(paper.index_text()), paper.metadata())?;
            doc.external_id = Some(paper.id);
            self.corpus.insert(doc);
        }
        self.invalidate_caches(CacheMode::InvalidateAll);
        let stats = self.corpus.stats();
        tracing::info!(docs = stats.total_docs, avg_doc_length = stats.avg_doc_length, "loaded corpus from source");
        Ok(self.corpus.len())
    }

    pub fn term_scores(&self, key: &str) -> Result<Vec<TermScore>, IndexError> {
        let doc = self.corpus.get(key).ok_or_else(|| IndexError::DocumentNotFound(key.to_string()))?;
        Ok(self.scoring.score_terms(&self.corpus, doc))
    }

    /// Replace the persisted term-score and posting rows of one document in a single
    /// transaction and upsert global stats. Returns the number of term rows written.
    pub fn persist<S: TermStore + ?Sized>(
        &self,
        store: &S,
        key: &str,
        external_id: Option<PaperId>,
        opts: &WriteOptions,
    ) -> Result<usize, IndexError> {
        let doc = self.corpus.get(key).ok_or_else(|| IndexError::DocumentNotFound(key.to_string()))?;
        let paper_id = resolve_paper_id(&doc.key, external_id.or(doc.external_id))?;
        let scores = self.scoring.score_terms(&self.corpus, doc);
        let write = DocumentWrite::new(paper_id, doc, scores, self.corpus.stats());
        let written = write.term_rows.len();
        store.replace_document(&write, opts).map_err(|source| IndexError::Persist {
            key: key.to_string(),
            paper_id: Some(paper_id),
            source,
        })?;
        tracing::debug!(key, paper_id, terms = written, "persisted term scores");
        Ok(written)
    }

    /// Persist every document, each in its own transaction. A failing document is
    /// recorded and the batch moves on; cancellation stops scheduling new saves.
    pub fn persist_all<S: TermStore + ?Sized>(&self, store: &S, cancel: Option<&CancelToken>) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for doc in self.corpus.docs() {
            let paper_id = resolve_paper_id(&doc.key, doc.external_id).ok();
            if cancel.is_some_and(CancelToken::is_cancelled) {
                summary.record(DocumentOutcome {
                    key: doc.key.clone(),
                    paper_id,
                    terms_written: 0,
                    error: Some("cancelled before save".into()),
                });
                continue;
            }
            let mut opts = self.config.write_options();
            if let Some(token) = cancel {
                opts = opts.with_cancel(token.clone());
            }
            let outcome = match self.persist(store, &doc.key, None, &opts) {
                Ok(terms_written) => DocumentOutcome { key: doc.key.clone(), paper_id, terms_written, error: None },
                Err(err) => {
                    tracing::warn!(key = %doc.key, error = %err, "failed to persist document");
                    DocumentOutcome { key: doc.key.clone(), paper_id, terms_written: 0, error: Some(err.to_string()) }
                }
            };
            summary.record(outcome);
        }
        tracing::info!(
            total = summary.total_processed,
            successful = summary.successful,
            failed = summary.failed,
            "persisted corpus"
        );
        summary
    }

    /// Reload everything from the source, then persist every document.
    pub fn reindex_all<P, S>(&mut self, source: &P, store: &S, cancel: Option<&CancelToken>) -> Result<BatchSummary, IndexError>
    where
        P: PaperSource + ?Sized,
        S: TermStore + ?Sized,
    {
        self.load_from_source(source)?;
        Ok(self.persist_all(store, cancel))
    }

    pub fn search(&self, query: &str, opts: &SearchOptions) -> Vec<SearchHit> {
        search::rank(&self.analyzer, &self.scoring, &self.corpus, query, opts)
    }

    /// Search, then attach paper records from `source` to the returned hits when
    /// `include_metadata` is set. Only the returned ids are looked up.
    pub fn search_with_source<P: PaperSource + ?Sized>(
        &self,
        query: &str,
        opts: &SearchOptions,
        source: &P,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let mut hits = self.search(query, opts);
        if !opts.include_metadata || hits.is_empty() {
            return Ok(hits);
        }
        let ids: Vec<PaperId> = hits.iter().filter_map(|h| h.paper_id).collect();
        let mut papers = source.fetch_many(&ids)?;
        for hit in &mut hits {
            hit.metadata = hit.paper_id.and_then(|id| papers.remove(&id));
        }
        Ok(hits)
    }

    pub fn stats(&self) -> IndexStats {
        let stats = self.corpus.stats();
        IndexStats {
            total_docs: stats.total_docs,
            total_length: stats.total_length,
            avg_doc_length: stats.avg_doc_length,
            unique_terms: self.corpus.vocabulary_size(),
            cached_idf_terms: self.scoring.cached_terms(),
            updated_at: stats.updated_at.clone(),
        }
    }
}
