//! Durable term-score and BM25 posting rows.
//!
//! Three sled trees back the store:
//! - `term_scores`: key `paper_id (u64 BE) ++ term`, one row per (paper, term)
//! - `bm25_postings`: key `paper_id (u64 BE)`, the paper's term map and length
//! - `global_stats`: a single upserted record
//!
//! A document's rows are always replaced together inside one transaction.

use crate::document::Document;
use crate::error::StoreError;
use crate::index::GlobalStats;
use crate::scoring::TermScore;
use crate::PaperId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionResult};
use sled::Transactional;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
const GLOBAL_STATS_KEY: &[u8] = b"global";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermScoreRow {
    pub paper_id: PaperId,
    pub term: String,
    pub tf: u32,
    pub tfidf: f64,
    pub bm25: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingEntry {
    pub tf: u32,
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRow {
    pub paper_id: PaperId,
    pub terms: BTreeMap<String, PostingEntry>,
    pub doc_length: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatsRow {
    pub total_docs: u32,
    pub avg_doc_length: f64,
    pub updated_at: String,
}

impl From<&GlobalStats> for GlobalStatsRow {
    fn from(s: &GlobalStats) -> Self {
        Self { total_docs: s.total_docs, avg_doc_length: s.avg_doc_length, updated_at: s.updated_at.clone() }
    }
}

/// The complete row set for one paper, written atomically.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub paper_id: PaperId,
    pub term_rows: Vec<TermScoreRow>,
    pub posting: PostingRow,
    pub stats: GlobalStatsRow,
}

impl DocumentWrite {
    pub fn new(paper_id: PaperId, doc: &Document, scores: Vec<TermScore>, stats: &GlobalStats) -> Self {
        let term_rows = scores
            .into_iter()
            .map(|s| TermScoreRow { paper_id, term: s.term, tf: s.tf, tfidf: s.tfidf, bm25: s.bm25 })
            .collect();
        let terms = doc
            .terms
            .iter()
            .map(|(t, e)| (t.clone(), PostingEntry { tf: e.count, positions: e.positions.clone() }))
            .collect();
        Self {
            paper_id,
            term_rows,
            posting: PostingRow { paper_id, terms, doc_length: doc.length },
            stats: stats.into(),
        }
    }
}

/// Shared flag a caller flips to abandon in-flight writes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst) }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Term rows per insert batch.
    pub chunk_size: usize,
    pub cancel: Option<CancelToken>,
    pub deadline: Option<Instant>,
}

impl Default for WriteOptions {
    fn default() -> Self { Self { chunk_size: DEFAULT_CHUNK_SIZE, cancel: None, deadline: None } }
}

impl WriteOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(CancelToken::is_cancelled).unwrap_or(false)
    }

    /// Fails if the write was cancelled or ran past its deadline.
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::TimedOut),
            _ => Ok(()),
        }
    }
}

/// Sink for per-paper term scores, postings and corpus statistics.
pub trait TermStore {
    /// Atomically replace every row of `write.paper_id` and upsert global stats.
    fn replace_document(&self, write: &DocumentWrite, opts: &WriteOptions) -> Result<(), StoreError>;

    /// Drop a paper's term-score and posting rows. Returns the number of term rows removed.
    fn purge(&self, paper_id: PaperId) -> Result<usize, StoreError>;

    fn term_scores(&self, paper_id: PaperId) -> Result<Vec<TermScoreRow>, StoreError>;

    fn posting(&self, paper_id: PaperId) -> Result<Option<PostingRow>, StoreError>;

    fn global_stats(&self) -> Result<Option<GlobalStatsRow>, StoreError>;
}

impl<T: TermStore + ?Sized> TermStore for Arc<T> {
    fn replace_document(&self, write: &DocumentWrite, opts: &WriteOptions) -> Result<(), StoreError> {
        (**self).replace_document(write, opts)
    }
    fn purge(&self, paper_id: PaperId) -> Result<usize, StoreError> { (**self).purge(paper_id) }
    fn term_scores(&self, paper_id: PaperId) -> Result<Vec<TermScoreRow>, StoreError> { (**self).term_scores(paper_id) }
    fn posting(&self, paper_id: PaperId) -> Result<Option<PostingRow>, StoreError> { (**self).posting(paper_id) }
    fn global_stats(&self) -> Result<Option<GlobalStatsRow>, StoreError> { (**self).global_stats() }
}

fn term_key(paper_id: PaperId, term: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + term.len());
    key.extend_from_slice(&paper_id.to_be_bytes());
    key.extend_from_slice(term.as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<StoreError>> {
    bincode::serialize(value).map_err(|e| ConflictableTransactionError::Abort(StoreError::Codec(e)))
}

fn decode_tx<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConflictableTransactionError<StoreError>> {
    bincode::deserialize(bytes).map_err(|e| ConflictableTransactionError::Abort(StoreError::Codec(e)))
}

pub struct SledStore {
    db: sled::Db,
    term_scores: sled::Tree,
    postings: sled::Tree,
    stats: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// A store deleted when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            term_scores: db.open_tree("term_scores")?,
            postings: db.open_tree("bm25_postings")?,
            stats: db.open_tree("global_stats")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Paper ids that currently have a posting row.
    pub fn paper_ids(&self) -> Result<Vec<PaperId>, StoreError> {
        let mut ids = Vec::new();
        for item in self.postings.iter().keys() {
            let key = item?;
            let mut be = [0u8; 8];
            if key.len() == 8 {
                be.copy_from_slice(&key);
                ids.push(PaperId::from_be_bytes(be));
            }
        }
        Ok(ids)
    }
}

impl TermStore for SledStore {
    fn replace_document(&self, write: &DocumentWrite, opts: &WriteOptions) -> Result<(), StoreError> {
        let chunk_size = opts.chunk_size.max(1);
        let result: TransactionResult<(), StoreError> =
            (&self.term_scores, &self.postings, &self.stats).transaction(|(ts, ps, gs)| {
                let pkey = write.paper_id.to_be_bytes();
                if let Some(old) = ps.get(&pkey[..])? {
                    let old: PostingRow = decode_tx(&old)?;
                    for term in old.terms.keys() {
                        ts.remove(term_key(write.paper_id, term))?;
                    }
                    ps.remove(&pkey[..])?;
                }
                for chunk in write.term_rows.chunks(chunk_size) {
                    opts.check().map_err(ConflictableTransactionError::Abort)?;
                    let mut batch = sled::Batch::default();
                    for row in chunk {
                        batch.insert(term_key(write.paper_id, &row.term), encode(row)?);
                    }
                    ts.apply_batch(&batch)?;
                }
                opts.check().map_err(ConflictableTransactionError::Abort)?;
                ps.insert(&pkey[..], encode(&write.posting)?)?;
                gs.insert(GLOBAL_STATS_KEY, encode(&write.stats)?)?;
                Ok(())
            });
        result?;
        Ok(())
    }

    fn purge(&self, paper_id: PaperId) -> Result<usize, StoreError> {
        let result: TransactionResult<usize, StoreError> =
            (&self.term_scores, &self.postings).transaction(|(ts, ps)| {
                let pkey = paper_id.to_be_bytes();
                let Some(old) = ps.get(&pkey[..])? else { return Ok(0) };
                let old: PostingRow = decode_tx(&old)?;
                let mut removed = 0;
                for term in old.terms.keys() {
                    if ts.remove(term_key(paper_id, term))?.is_some() {
                        removed += 1;
                    }
                }
                ps.remove(&pkey[..])?;
                Ok(removed)
            });
        Ok(result?)
    }

    fn term_scores(&self, paper_id: PaperId) -> Result<Vec<TermScoreRow>, StoreError> {
        let mut rows = Vec::new();
        for item in self.term_scores.scan_prefix(paper_id.to_be_bytes()) {
            let (_, value) = item?;
            rows.push(bincode::deserialize(&value)?);
        }
        Ok(rows)
    }

    fn posting(&self, paper_id: PaperId) -> Result<Option<PostingRow>, StoreError> {
        match self.postings.get(paper_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn global_stats(&self) -> Result<Option<GlobalStatsRow>, StoreError> {
        match self.stats.get(GLOBAL_STATS_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Outcome of persisting one document inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub key: String,
    pub paper_id: Option<PaperId>,
    pub terms_written: usize,
    pub error: Option<String>,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool { self.error.is_none() }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<DocumentOutcome>,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: DocumentOutcome) {
        self.total_processed += 1;
        if outcome.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }
}
