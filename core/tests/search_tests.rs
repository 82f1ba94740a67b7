use search_core::scoring::round_score;
use search_core::{Engine, EngineConfig, MemorySource, PaperMetadata, PaperRecord, SearchOptions, TextInput};

fn paper(id: u64, title: &str) -> PaperRecord {
    PaperRecord { id, title: title.into(), abstract_text: String::new(), keywords: Vec::new() }
}

fn scenario_source() -> MemorySource {
    MemorySource::new(vec![
        paper(1, "machine learning for image classification"),
        paper(2, "deep learning neural network image"),
    ])
}

fn scenario_engine() -> Engine {
    let mut engine = Engine::new(EngineConfig { k1: 1.2, b: 0.75, ..Default::default() });
    engine.load_from_source(&scenario_source()).unwrap();
    engine
}

#[test]
fn golden_two_document_ranking() {
    let engine = scenario_engine();
    let hits = engine.search("image learning", &SearchOptions::default());
    // Both documents have length 5 (avg 5), both terms occur once in each with df = 2:
    // idf = ln(3/3) + 1 = 1 and bm25 = 1 * 2.2 / 2.2 = 1 per term.
    let ranked: Vec<(u64, f64)> = hits.iter().map(|h| (h.paper_id.unwrap(), h.score)).collect();
    assert_eq!(ranked, vec![(1, 2.0), (2, 2.0)]);
}

#[test]
fn golden_rare_term_wins() {
    let engine = scenario_engine();
    let hits = engine.search("machine image", &SearchOptions::default());
    let machine = round_score((3.0f64 / 2.0).ln() + 1.0);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].paper_id, Some(1));
    assert_eq!(hits[0].score, round_score(machine + 1.0));
    assert_eq!(hits[1].paper_id, Some(2));
    assert_eq!(hits[1].score, 1.0);
}

#[test]
fn empty_corpus_returns_nothing() {
    let engine = Engine::default();
    assert!(engine.search("anything at all", &SearchOptions::default()).is_empty());
    let hits = engine
        .search_with_source("anything", &SearchOptions { include_metadata: true, ..Default::default() }, &MemorySource::default())
        .unwrap();
    assert!(hits.is_empty());
}

#[test]
fn no_match_is_empty_not_error() {
    let engine = scenario_engine();
    assert!(engine.search("quantum chemistry", &SearchOptions::default()).is_empty());
    assert!(engine.search("", &SearchOptions::default()).is_empty());
}

#[test]
fn reloading_gives_identical_order() {
    let papers: Vec<PaperRecord> = (1..=20)
        .map(|i| paper(i, &format!("graph mining study {} {}", "graph ".repeat((i % 4) as usize), "network ".repeat((i % 3) as usize))))
        .collect();
    let source = MemorySource::new(papers);
    let opts = SearchOptions { limit: 20, ..Default::default() };

    let mut first = Engine::default();
    first.load_from_source(&source).unwrap();
    let a = first.search("graph network", &opts);

    let mut second = Engine::default();
    second.load_from_source(&source).unwrap();
    second.load_from_source(&source).unwrap();
    let b = second.search("graph network", &opts);

    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn limit_and_min_score_apply() {
    let engine = scenario_engine();
    let hits = engine.search("machine image", &SearchOptions { limit: 1, ..Default::default() });
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].paper_id, Some(1));

    let hits = engine.search("machine image", &SearchOptions { min_score: 1.0, ..Default::default() });
    assert_eq!(hits.len(), 1);
}

#[test]
fn metadata_and_term_details_on_request() {
    let engine = scenario_engine();
    let opts = SearchOptions { include_metadata: true, explain: true, ..Default::default() };
    let hits = engine.search_with_source("neural image", &opts, &scenario_source()).unwrap();
    assert_eq!(hits[0].paper_id, Some(2));
    assert_eq!(hits[0].metadata.as_ref().map(|p| p.title.as_str()), Some("deep learning neural network image"));
    let details = hits[0].term_details.as_ref().unwrap();
    assert_eq!(details.iter().map(|d| d.term.as_str()).collect::<Vec<_>>(), vec!["neural", "image"]);
    assert_eq!(details[1].idf, 1.0);

    let plain = engine.search("neural image", &SearchOptions::default());
    assert!(plain[0].metadata.is_none());
    assert!(plain[0].term_details.is_none());
}

#[test]
fn removal_updates_ranking_and_stats() {
    let mut engine = scenario_engine();
    engine.remove_document("1").unwrap();
    let stats = engine.stats();
    assert_eq!(stats.total_docs, 1);
    assert_eq!(stats.avg_doc_length, 5.0);
    let hits = engine.search("machine image", &SearchOptions::default());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].paper_id, Some(2));
    assert!(engine.remove_document("1").is_err());
}

#[test]
fn stemmed_engine_matches_raw_and_pre_split_documents() {
    let mut engine = Engine::new(EngineConfig { stemming: true, ..Default::default() });
    engine.add_document("1", &TextInput::raw("neural networks"), PaperMetadata::default(), None).unwrap();
    engine
        .add_document("2", &TextInput::Tokens(vec!["neural".into(), "networks".into()]), PaperMetadata::default(), None)
        .unwrap();

    let hits = engine.search("networks", &SearchOptions::default());
    let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys, vec!["1", "2"]);
    assert_eq!(hits[0].score, hits[1].score);
    assert_eq!(engine.document("1").unwrap().terms, engine.document("2").unwrap().terms);
}
