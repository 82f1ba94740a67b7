use crate::error::IndexError;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}_]+").expect("valid regex");
}

/// English stopwords excluded from term maps (but still counted in document length).
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","cannot","could",
    "did","do","does","doing","down","during",
    "each","few","for","from","further",
    "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
    "i","if","in","into","is","it","its","itself",
    "me","more","most","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "same","she","should","so","some","such",
    "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
    "under","until","up","very",
    "was","we","were","what","when","where","which","while","who","whom","why","with","would",
    "you","your","yours","yourself","yourselves",
];

/// Splits text on word boundaries into lowercase tokens.
pub struct Tokenizer {
    stemmer: Option<Stemmer>,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer").field("stemming", &self.stemmer.is_some()).finish()
    }
}

impl Default for Tokenizer {
    fn default() -> Self { Self::new() }
}

impl Tokenizer {
    pub fn new() -> Self { Self { stemmer: None } }

    pub fn with_stemming() -> Self {
        Self { stemmer: Some(Stemmer::create(Algorithm::English)) }
    }

    pub fn is_stemming(&self) -> bool { self.stemmer.is_some() }

    /// Tokenize text into an ordered sequence of lowercase word tokens.
    /// Applies NFKC normalization first; stopwords are kept.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        WORD_RE.find_iter(&normalized).map(|m| self.stem(m.as_str())).collect()
    }

    /// Bring one pre-split token to the same form `tokenize` produces.
    pub fn normalize_token(&self, token: &str) -> String {
        let normalized = token.nfkc().collect::<String>().to_lowercase();
        self.stem(&normalized)
    }

    fn stem(&self, word: &str) -> String {
        match &self.stemmer {
            Some(stemmer) => stemmer.stem(word).into_owned(),
            None => word.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopwordSet {
    words: HashSet<String>,
}

impl Default for StopwordSet {
    fn default() -> Self {
        Self { words: DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect() }
    }
}

impl StopwordSet {
    pub fn empty() -> Self { Self { words: HashSet::new() } }

    pub fn with_extra<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words.extend(extra.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    pub fn contains(&self, token: &str) -> bool { self.words.contains(token) }

    pub fn len(&self) -> usize { self.words.len() }

    pub fn is_empty(&self) -> bool { self.words.is_empty() }
}

/// Document text handed to the builder: either raw text or an already tokenized sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TextInput {
    Raw(String),
    Tokens(Vec<String>),
}

impl TextInput {
    pub fn raw(text: impl Into<String>) -> Self { TextInput::Raw(text.into()) }

    /// Accepts a JSON string (raw text) or an array of strings (tokens).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, IndexError> {
        match value {
            serde_json::Value::String(s) => Ok(TextInput::Raw(s.clone())),
            serde_json::Value::Array(items) => {
                let mut tokens = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(s) => tokens.push(s.to_string()),
                        None => {
                            return Err(IndexError::InvalidInput(format!(
                                "token {i} is not a string: {item}"
                            )))
                        }
                    }
                }
                Ok(TextInput::Tokens(tokens))
            }
            other => Err(IndexError::InvalidInput(format!(
                "expected a string or an array of strings, got {}",
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Tokenizer plus stopword set, built once per engine and shared by reference.
#[derive(Debug, Default)]
pub struct Analyzer {
    pub tokenizer: Tokenizer,
    pub stopwords: StopwordSet,
}

impl Analyzer {
    pub fn new(tokenizer: Tokenizer, stopwords: StopwordSet) -> Self {
        Self { tokenizer, stopwords }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> { self.tokenizer.tokenize(text) }

    pub fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// Resolve a text input to its token stream. Pre-tokenized input goes through the
    /// same normalization and stemming as raw text; blank tokens are rejected.
    pub fn tokens_for(&self, input: &TextInput) -> Result<Vec<String>, IndexError> {
        match input {
            TextInput::Raw(text) => Ok(self.tokenize(text)),
            TextInput::Tokens(tokens) => tokens
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let t = t.trim();
                    if t.is_empty() {
                        Err(IndexError::InvalidInput(format!("token {i} is blank")))
                    } else {
                        Ok(self.tokenizer.normalize_token(t))
                    }
                })
                .collect(),
        }
    }
}
