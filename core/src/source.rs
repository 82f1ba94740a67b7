//! Read-only access to the external paper store.

use crate::document::PaperMetadata;
use crate::error::SourceError;
use crate::PaperId;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: PaperId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    /// Either a JSON array or a comma-separated string on input.
    #[serde(default, deserialize_with = "keyword_list")]
    pub keywords: Vec<String>,
}

fn keyword_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
        Missing(Option<()>),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::List(v) => v,
        Raw::Joined(s) => s.split(',').map(|k| k.trim().to_string()).filter(|k| !k.is_empty()).collect(),
        Raw::Missing(_) => Vec::new(),
    })
}

impl PaperRecord {
    /// Text indexed for the paper: title, abstract and keywords joined by spaces.
    pub fn index_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(2 + self.keywords.len());
        parts.push(&self.title);
        parts.push(&self.abstract_text);
        parts.extend(self.keywords.iter().map(String::as_str));
        parts.join(" ")
    }

    pub fn metadata(&self) -> PaperMetadata {
        PaperMetadata {
            title: Some(self.title.clone()).filter(|s| !s.is_empty()),
            abstract_text: Some(self.abstract_text.clone()).filter(|s| !s.is_empty()),
            keywords: self.keywords.clone(),
        }
    }

    pub fn key(&self) -> String { self.id.to_string() }
}

pub trait PaperSource {
    /// Every paper, in source order.
    fn fetch_all(&self) -> Result<Vec<PaperRecord>, SourceError>;

    /// The papers among `ids` that exist in the source.
    fn fetch_many(&self, ids: &[PaperId]) -> Result<HashMap<PaperId, PaperRecord>, SourceError> {
        let wanted: HashSet<PaperId> = ids.iter().copied().collect();
        Ok(self
            .fetch_all()?
            .into_iter()
            .filter(|p| wanted.contains(&p.id))
            .map(|p| (p.id, p))
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub papers: Vec<PaperRecord>,
}

impl MemorySource {
    pub fn new(papers: Vec<PaperRecord>) -> Self { Self { papers } }
}

impl PaperSource for MemorySource {
    fn fetch_all(&self) -> Result<Vec<PaperRecord>, SourceError> { Ok(self.papers.clone()) }
}

/// Papers stored as `.json` (object or array) and `.jsonl` files, either a single
/// file or a directory walked recursively.
///
/// `fetch_all` re-reads the files and refreshes an id index. `fetch_many` answers
/// from that index and only touches the files when no index exists yet.
#[derive(Debug)]
pub struct JsonPaperSource {
    root: PathBuf,
    by_id: RwLock<Option<HashMap<PaperId, PaperRecord>>>,
}

impl JsonPaperSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), by_id: RwLock::new(None) }
    }

    pub fn root(&self) -> &Path { &self.root }

    fn files(&self) -> Result<Vec<PathBuf>, SourceError> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|source| SourceError::Walk { path: self.root.display().to_string(), source })?;
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        Ok(files)
    }

    fn read_files(&self) -> Result<Vec<PaperRecord>, SourceError> {
        let mut papers = Vec::new();
        for file in self.files()? {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                read_jsonl(&file, &mut papers)?;
            } else {
                read_json(&file, &mut papers)?;
            }
        }
        tracing::debug!(root = %self.root.display(), papers = papers.len(), "read paper source");
        Ok(papers)
    }
}

fn read_jsonl(path: &Path, out: &mut Vec<PaperRecord>) -> Result<(), SourceError> {
    let display = || path.display().to_string();
    let f = File::open(path).map_err(|source| SourceError::Io { path: display(), source })?;
    for line in BufReader::new(f).lines() {
        let line = line.map_err(|source| SourceError::Io { path: display(), source })?;
        if line.trim().is_empty() { continue; }
        let paper = serde_json::from_str(&line).map_err(|source| SourceError::Json { path: display(), source })?;
        out.push(paper);
    }
    Ok(())
}

fn read_json(path: &Path, out: &mut Vec<PaperRecord>) -> Result<(), SourceError> {
    let display = || path.display().to_string();
    let f = File::open(path).map_err(|source| SourceError::Io { path: display(), source })?;
    let json: serde_json::Value =
        serde_json::from_reader(BufReader::new(f)).map_err(|source| SourceError::Json { path: display(), source })?;
    let parse = |v: serde_json::Value| serde_json::from_value(v).map_err(|source| SourceError::Json { path: display(), source });
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                out.push(parse(v)?);
            }
        }
        obj @ serde_json::Value::Object(_) => out.push(parse(obj)?),
        _ => {}
    }
    Ok(())
}

impl PaperSource for JsonPaperSource {
    fn fetch_all(&self) -> Result<Vec<PaperRecord>, SourceError> {
        let papers = self.read_files()?;
        *self.by_id.write() = Some(papers.iter().map(|p| (p.id, p.clone())).collect());
        Ok(papers)
    }

    fn fetch_many(&self, ids: &[PaperId]) -> Result<HashMap<PaperId, PaperRecord>, SourceError> {
        if self.by_id.read().is_none() {
            self.fetch_all()?;
        }
        let guard = self.by_id.read();
        let Some(index) = guard.as_ref() else { return Ok(HashMap::new()) };
        Ok(ids.iter().filter_map(|id| index.get(id).map(|p| (*id, p.clone()))).collect())
    }
}
