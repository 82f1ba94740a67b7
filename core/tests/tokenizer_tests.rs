use search_core::document::PaperMetadata;
use search_core::tokenizer::{Analyzer, TextInput, Tokenizer};
use search_core::Engine;

#[test]
fn it_normalizes_and_lowercases() {
    let words = Tokenizer::new().tokenize("Ｄeep Café's MENU, v2");
    assert_eq!(words, vec!["deep", "café", "s", "menu", "v2"]);
}

#[test]
fn it_keeps_stopwords_in_the_stream() {
    let words = Tokenizer::new().tokenize("The quick brown fox and the lazy dog");
    assert_eq!(words.len(), 8);
    assert!(words.contains(&"the".to_string()));
    let analyzer = Analyzer::default();
    assert!(analyzer.is_stopword("the"));
    assert!(!analyzer.is_stopword("fox"));
}

#[test]
fn document_length_counts_every_token() {
    let texts = [
        "A survey of the state of the art in graph neural networks",
        "",
        "of the and",
        "Blockchain based secure voting system using Ethereum smart contracts",
    ];
    let mut engine = Engine::default();
    for (i, text) in texts.iter().enumerate() {
        let doc = engine
            .add_document(i.to_string(), &TextInput::raw(*text), PaperMetadata::default(), None)
            .unwrap();
        let term_total: u32 = doc.terms.values().map(|e| e.count).sum();
        assert_eq!(doc.length as usize, Tokenizer::new().tokenize(text).len());
        assert!(doc.length >= term_total);
    }
}

#[test]
fn pre_tokenized_input_is_used_as_given() {
    let mut engine = Engine::default();
    let doc = engine
        .add_document(
            "7",
            &TextInput::Tokens(vec!["Graph".into(), "of".into(), "graphs".into()]),
            PaperMetadata::default(),
            None,
        )
        .unwrap();
    assert_eq!(doc.length, 3);
    assert_eq!(doc.tf("graph"), 1);
    assert_eq!(doc.tf("graphs"), 1);
    assert_eq!(doc.tf("of"), 0);
}
