use crate::error::IndexError;
use crate::tokenizer::{Analyzer, TextInput};
use crate::PaperId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub count: u32,
    /// Offsets into the unfiltered token stream (stopwords included).
    pub positions: Vec<u32>,
}

/// Snapshot of the paper fields a document was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// An indexed document. Replaced wholesale on update, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub key: String,
    pub external_id: Option<PaperId>,
    pub terms: BTreeMap<String, TermEntry>,
    /// Raw token count, stopwords included, so it can exceed the sum of term counts.
    pub length: u32,
    pub metadata: PaperMetadata,
    pub unique_terms: usize,
}

impl Document {
    pub fn tf(&self, term: &str) -> u32 {
        self.terms.get(term).map(|e| e.count).unwrap_or(0)
    }

    /// The paper id rows for this document are written under.
    pub fn paper_id(&self) -> Result<PaperId, IndexError> {
        resolve_paper_id(&self.key, self.external_id)
    }
}

/// An explicit external id wins; otherwise the key must be `123`, `paper-123` or `paper_123`.
pub fn resolve_paper_id(key: &str, external_id: Option<PaperId>) -> Result<PaperId, IndexError> {
    if let Some(id) = external_id {
        return Ok(id);
    }
    let digits = key
        .strip_prefix("paper-")
        .or_else(|| key.strip_prefix("paper_"))
        .unwrap_or(key);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IndexError::UnresolvedPaperId { key: key.to_string() });
    }
    digits
        .parse()
        .map_err(|_| IndexError::UnresolvedPaperId { key: key.to_string() })
}

pub struct DocumentBuilder<'a> {
    analyzer: &'a Analyzer,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(analyzer: &'a Analyzer) -> Self { Self { analyzer } }

    pub fn build(
        &self,
        key: impl Into<String>,
        input: &TextInput,
        metadata: PaperMetadata,
    ) -> Result<Document, IndexError> {
        let tokens = self.analyzer.tokens_for(input)?;
        let mut terms: BTreeMap<String, TermEntry> = BTreeMap::new();
        for (pos, token) in tokens.iter().enumerate() {
            if self.analyzer.is_stopword(token) { continue; }
            let entry = terms.entry(token.clone()).or_default();
            entry.count += 1;
            entry.positions.push(pos as u32);
        }
        let unique_terms = terms.len();
        Ok(Document {
            key: key.into(),
            external_id: None,
            terms,
            length: tokens.len() as u32,
            metadata,
            unique_terms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_index_the_unfiltered_stream() {
        let analyzer = Analyzer::default();
        let doc = DocumentBuilder::new(&analyzer)
            .build("1", &TextInput::raw("learning for the sake of learning"), PaperMetadata::default())
            .unwrap();
        assert_eq!(doc.length, 6);
        let learning = &doc.terms["learning"];
        assert_eq!(learning.count, 2);
        assert_eq!(learning.positions, vec![0, 5]);
        assert!(!doc.terms.contains_key("the"));
        assert_eq!(doc.unique_terms, 2);
    }

    #[test]
    fn empty_text_yields_empty_document() {
        let analyzer = Analyzer::default();
        let doc = DocumentBuilder::new(&analyzer)
            .build("2", &TextInput::raw(""), PaperMetadata::default())
            .unwrap();
        assert_eq!(doc.length, 0);
        assert!(doc.terms.is_empty());
    }

    #[test]
    fn paper_id_resolution() {
        assert_eq!(resolve_paper_id("42", None).unwrap(), 42);
        assert_eq!(resolve_paper_id("paper-7", None).unwrap(), 7);
        assert_eq!(resolve_paper_id("paper_8", None).unwrap(), 8);
        assert_eq!(resolve_paper_id("whatever", Some(9)).unwrap(), 9);
        assert!(matches!(
            resolve_paper_id("draft-a", None),
            Err(IndexError::UnresolvedPaperId { .. })
        ));
        assert!(resolve_paper_id("paper-", None).is_err());
    }
}
