use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;

/// Corpus-wide statistics, fully derived from the documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_docs: u32,
    pub total_length: u64,
    pub avg_doc_length: f64,
    pub updated_at: String,
}

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "".into())
}

/// The in-memory document collection, kept in insertion order.
///
/// No internal locking: callers serialize mutation against reads.
#[derive(Debug, Default)]
pub struct Corpus {
    docs: Vec<Document>,
    slots: HashMap<String, usize>,
    doc_freq: HashMap<String, u32>,
    stats: GlobalStats,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn docs(&self) -> &[Document] { &self.docs }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.slots.get(key).map(|&i| &self.docs[i])
    }

    pub fn contains(&self, key: &str) -> bool { self.slots.contains_key(key) }

    pub fn stats(&self) -> &GlobalStats { &self.stats }

    /// Number of documents whose count for `term` is non-zero.
    pub fn df(&self, term: &str) -> u32 { self.doc_freq.get(term).copied().unwrap_or(0) }

    pub fn vocabulary_size(&self) -> usize { self.doc_freq.len() }

    /// Append a document. An existing document with the same key is removed
    /// first, so the new one takes the last insertion slot.
    pub fn insert(&mut self, doc: Document) -> Option<Document> {
        let previous = self.detach(&doc.key);
        let at = self.docs.len();
        self.attach(at, doc);
        previous
    }

    /// Place a document at insertion slot `idx` (clamped to the end).
    pub fn insert_at(&mut self, idx: usize, doc: Document) -> Option<Document> {
        let previous = self.detach(&doc.key);
        let at = idx.min(self.docs.len());
        self.attach(at, doc);
        previous
    }

    pub fn position(&self, key: &str) -> Option<usize> { self.slots.get(key).copied() }

    pub fn remove(&mut self, key: &str) -> Option<Document> {
        let removed = self.detach(key);
        if removed.is_some() {
            self.recompute_stats();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.docs.clear();
        self.slots.clear();
        self.doc_freq.clear();
        self.recompute_stats();
    }

    fn detach(&mut self, key: &str) -> Option<Document> {
        let idx = self.slots.remove(key)?;
        let doc = self.docs.remove(idx);
        for slot in self.slots.values_mut() {
            if *slot > idx { *slot -= 1; }
        }
        for (term, entry) in &doc.terms {
            if entry.count == 0 { continue; }
            if let Some(df) = self.doc_freq.get_mut(term) {
                *df = df.saturating_sub(1);
                if *df == 0 { self.doc_freq.remove(term); }
            }
        }
        Some(doc)
    }

    fn attach(&mut self, at: usize, doc: Document) {
        for (term, entry) in &doc.terms {
            if entry.count > 0 {
                *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
        for slot in self.slots.values_mut() {
            if *slot >= at { *slot += 1; }
        }
        self.slots.insert(doc.key.clone(), at);
        self.docs.insert(at, doc);
        self.recompute_stats();
    }

    fn recompute_stats(&mut self) {
        let total_docs = self.docs.len() as u32;
        let total_length: u64 = self.docs.iter().map(|d| d.length as u64).sum();
        let avg_doc_length = if total_docs == 0 { 0.0 } else { total_length as f64 / total_docs as f64 };
        self.stats = GlobalStats { total_docs, total_length, avg_doc_length, updated_at: now_rfc3339() };
    }
}
