//! Fixed vocabularies used by the auto-tagger.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Domain name -> multi-word or single terms matched as substrings of the text.
pub const DOMAIN_TERMS: &[(&str, &[&str])] = &[
    ("computer_science", &[
        "machine learning", "deep learning", "neural network", "artificial intelligence",
        "computer vision", "natural language processing", "data mining", "big data",
        "cloud computing", "internet of things", "distributed system", "blockchain",
        "smart contract", "ethereum", "cryptography", "cybersecurity", "database",
        "algorithm", "web application", "mobile application", "recommender system",
    ]),
    ("business", &[
        "e-commerce", "supply chain", "marketing", "business intelligence",
        "customer relationship", "inventory management", "enterprise resource planning",
        "financial", "entrepreneurship",
    ]),
    ("education", &[
        "e-learning", "online learning", "learning management system", "curriculum",
        "student performance", "assessment", "pedagogy", "education",
    ]),
    ("healthcare", &[
        "healthcare", "telemedicine", "diagnosis", "patient", "medical imaging",
    ]),
];

/// Category -> indicative terms for coarse classification.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    ("Artificial Intelligence", &[
        "machine learning", "deep learning", "neural network", "artificial intelligence",
        "computer vision", "natural language", "classification", "prediction",
    ]),
    ("Blockchain", &[
        "blockchain", "ethereum", "smart contract", "cryptocurrency", "decentralized", "ledger",
    ]),
    ("Web Development", &[
        "web", "javascript", "react", "html", "frontend", "backend", "website",
    ]),
    ("Data Science", &[
        "data mining", "big data", "analytics", "statistics", "visualization", "dataset",
    ]),
    ("Cybersecurity", &[
        "security", "secure", "encryption", "authentication", "malware", "privacy", "intrusion",
    ]),
    ("Internet of Things", &[
        "internet of things", "sensor", "embedded", "arduino", "raspberry",
    ]),
    ("Education", &[
        "education", "e-learning", "student", "teaching", "curriculum",
    ]),
    ("Business", &[
        "business", "e-commerce", "marketing", "management", "finance",
    ]),
];

pub const DEFAULT_CATEGORY: &str = "General";

/// Words too common in abstracts to make useful tags.
pub const GENERIC_TERMS: &[&str] = &[
    "also", "approach", "based", "different", "however", "method", "methods", "new",
    "paper", "present", "proposed", "propose", "research", "result", "results", "show",
    "shows", "study", "system", "systems", "use", "used", "using", "various", "well",
    "within", "work", "may", "will", "one", "two",
];

/// Lowercase word -> preferred display form.
const DISPLAY_FORMS: &[(&str, &str)] = &[
    ("ai", "AI"), ("ml", "ML"), ("nlp", "NLP"), ("iot", "IoT"), ("api", "API"), ("apis", "APIs"),
    ("ui", "UI"), ("ux", "UX"), ("sql", "SQL"), ("nosql", "NoSQL"), ("mysql", "MySQL"),
    ("postgresql", "PostgreSQL"), ("mongodb", "MongoDB"), ("javascript", "JavaScript"),
    ("typescript", "TypeScript"), ("nodejs", "Node.js"), ("php", "PHP"), ("html", "HTML"),
    ("css", "CSS"), ("json", "JSON"), ("aws", "AWS"), ("gps", "GPS"), ("rfid", "RFID"),
    ("cnn", "CNN"), ("rnn", "RNN"), ("lstm", "LSTM"), ("gpu", "GPU"), ("ios", "iOS"),
    ("github", "GitHub"), ("pytorch", "PyTorch"), ("tensorflow", "TensorFlow"),
    ("opencv", "OpenCV"), ("e-commerce", "E-Commerce"), ("e-learning", "E-Learning"),
];

lazy_static! {
    static ref GENERIC: HashSet<&'static str> = GENERIC_TERMS.iter().copied().collect();
    static ref DISPLAY: HashMap<&'static str, &'static str> = DISPLAY_FORMS.iter().copied().collect();

    /// Technology, framework and methodology phrases.
    pub static ref ENTITY_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\b(?:tensorflow|pytorch|keras|opencv|react|angular|vue|django|flask|laravel|spring boot|node\.?js|hadoop|spark|kubernetes|docker|ethereum|hyperledger|solidity|bitcoin)\b")
            .expect("valid regex"),
        Regex::new(r"\b(?:smart contracts?|convolutional neural networks?|recurrent neural networks?|support vector machines?|random forests?|decision trees?|genetic algorithms?|agile methodology|scrum|rest(?:ful)? api)\b")
            .expect("valid regex"),
        Regex::new(r"\b[a-z]+(?:\s[a-z]+)?\s(?:framework|architecture|protocol|algorithm)\b")
            .expect("valid regex"),
    ];
}

pub fn is_generic(word: &str) -> bool { GENERIC.contains(word) }

/// Title-case a lowercase phrase, honouring known acronyms and product names.
pub fn display_form(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| match DISPLAY.get(word) {
            Some(form) => form.to_string(),
            None => {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
