use crate::persist::{WriteOptions, DEFAULT_CHUNK_SIZE};
use crate::scoring::{Bm25Params, CacheMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Documents kept in the auto-tagger's running corpus before the oldest is evicted.
    pub running_corpus_limit: usize,
    /// Minimum Jaccard similarity for related-document suggestions.
    pub related_threshold: f64,
}

impl Default for KeywordConfig {
    fn default() -> Self { Self { running_corpus_limit: 500, related_threshold: 0.1 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub k1: f64,
    pub b: f64,
    pub cache_mode: CacheMode,
    pub stemming: bool,
    pub extra_stopwords: Vec<String>,
    pub batch_chunk_size: usize,
    pub persist_timeout_secs: Option<u64>,
    pub keywords: KeywordConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let bm25 = Bm25Params::default();
        Self {
            k1: bm25.k1,
            b: bm25.b,
            cache_mode: CacheMode::default(),
            stemming: false,
            extra_stopwords: Vec::new(),
            batch_chunk_size: DEFAULT_CHUNK_SIZE,
            persist_timeout_secs: None,
            keywords: KeywordConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn bm25(&self) -> Bm25Params { Bm25Params { k1: self.k1, b: self.b } }

    /// Write options for one document save; the timeout clock starts now.
    pub fn write_options(&self) -> WriteOptions {
        let opts = WriteOptions::default().with_chunk_size(self.batch_chunk_size);
        match self.persist_timeout_secs {
            Some(secs) => opts.with_timeout(Duration::from_secs(secs)),
            None => opts,
        }
    }
}
