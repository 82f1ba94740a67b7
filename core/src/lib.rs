//! Full-text indexing and BM25 retrieval over a corpus of academic papers.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod keywords;
pub mod persist;
pub mod scoring;
pub mod search;
pub mod source;
pub mod taxonomy;
pub mod tokenizer;

/// Identifier of a paper in the external document store.
pub type PaperId = u64;

pub use config::{EngineConfig, KeywordConfig};
pub use document::{Document, DocumentBuilder, PaperMetadata, TermEntry};
pub use engine::{Engine, IndexStats};
pub use error::{IndexError, SourceError, StoreError};
pub use index::{Corpus, GlobalStats};
pub use keywords::{KeywordExtractor, KeywordOptions, ScoredKeyword};
pub use persist::{BatchSummary, CancelToken, SledStore, TermStore, WriteOptions};
pub use scoring::{Bm25Params, CacheMode, ScoringEngine};
pub use search::{SearchHit, SearchOptions};
pub use source::{JsonPaperSource, MemorySource, PaperRecord, PaperSource};
pub use tokenizer::{Analyzer, StopwordSet, TextInput, Tokenizer};
