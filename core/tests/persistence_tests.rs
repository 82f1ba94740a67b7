use search_core::document::PaperMetadata;
use search_core::persist::{DocumentWrite, GlobalStatsRow, PostingRow, TermScoreRow};
use search_core::{
    CancelToken, Engine, EngineConfig, IndexError, MemorySource, PaperId, PaperRecord, SledStore, StoreError,
    TermStore, TextInput, WriteOptions,
};

/// Delegates to sled but rejects writes and purges for one paper.
struct FailingStore {
    inner: SledStore,
    fail_for: PaperId,
}

impl TermStore for FailingStore {
    fn replace_document(&self, write: &DocumentWrite, opts: &WriteOptions) -> Result<(), StoreError> {
        if write.paper_id == self.fail_for {
            return Err(StoreError::Backend(format!("chunk insert rejected for paper {}", write.paper_id)));
        }
        self.inner.replace_document(write, opts)
    }
    fn purge(&self, paper_id: PaperId) -> Result<usize, StoreError> {
        if paper_id == self.fail_for {
            return Err(StoreError::Backend(format!("purge rejected for paper {paper_id}")));
        }
        self.inner.purge(paper_id)
    }
    fn term_scores(&self, paper_id: PaperId) -> Result<Vec<TermScoreRow>, StoreError> { self.inner.term_scores(paper_id) }
    fn posting(&self, paper_id: PaperId) -> Result<Option<PostingRow>, StoreError> { self.inner.posting(paper_id) }
    fn global_stats(&self) -> Result<Option<GlobalStatsRow>, StoreError> { self.inner.global_stats() }
}

fn papers(n: u64) -> MemorySource {
    MemorySource::new(
        (1..=n)
            .map(|id| PaperRecord {
                id,
                title: format!("Paper {id} on distributed consensus"),
                abstract_text: format!("We study replication protocol variant {id} for the ledger"),
                keywords: vec!["consensus".into(), format!("variant{id}")],
            })
            .collect(),
    )
}

#[test]
fn saved_rows_read_back_identically() {
    let store = SledStore::temporary().unwrap();
    let mut engine = Engine::default();
    engine.load_from_source(&papers(3)).unwrap();

    let opts = WriteOptions::default().with_chunk_size(2);
    let written = engine.persist(&store, "2", None, &opts).unwrap();

    let expected = engine.term_scores("2").unwrap();
    let rows = store.term_scores(2).unwrap();
    assert_eq!(written, expected.len());
    assert_eq!(rows.len(), expected.len());
    for (row, score) in rows.iter().zip(&expected) {
        assert_eq!(row.paper_id, 2);
        assert_eq!(row.term, score.term);
        assert_eq!(row.tf, score.tf);
        assert!((row.tfidf - score.tfidf).abs() < 1e-6);
        assert!((row.bm25 - score.bm25).abs() < 1e-6);
    }

    let posting = store.posting(2).unwrap().unwrap();
    let doc = engine.document("2").unwrap();
    assert_eq!(posting.doc_length, doc.length);
    assert_eq!(posting.terms["consensus"].tf, doc.terms["consensus"].count);
    assert_eq!(posting.terms["consensus"].positions, doc.terms["consensus"].positions);

    let stats = store.global_stats().unwrap().unwrap();
    assert_eq!(stats.total_docs, 3);
    assert_eq!(stats.avg_doc_length, engine.stats().avg_doc_length);
}

#[test]
fn reindex_replaces_rows_wholesale() {
    let store = SledStore::temporary().unwrap();
    let mut engine = Engine::default();
    engine
        .add_document("paper-5", &TextInput::raw("alpha beta gamma"), PaperMetadata::default(), None)
        .unwrap();
    engine.persist(&store, "paper-5", None, &WriteOptions::default()).unwrap();

    engine
        .add_document("paper-5", &TextInput::raw("delta"), PaperMetadata::default(), None)
        .unwrap();
    engine.persist(&store, "paper-5", None, &WriteOptions::default()).unwrap();

    let terms: Vec<String> = store.term_scores(5).unwrap().into_iter().map(|r| r.term).collect();
    assert_eq!(terms, vec!["delta"]);
    assert_eq!(store.posting(5).unwrap().unwrap().doc_length, 1);
}

#[test]
fn batch_continues_past_a_failing_document() {
    let store = FailingStore { inner: SledStore::temporary().unwrap(), fail_for: 3 };
    let mut engine = Engine::default();
    let summary = engine.reindex_all(&papers(6), &store, None).unwrap();

    assert_eq!(summary.total_processed, 6);
    assert_eq!(summary.successful, 5);
    assert_eq!(summary.failed, 1);
    let failed: Vec<&str> = summary.results.iter().filter(|r| !r.is_success()).map(|r| r.key.as_str()).collect();
    assert_eq!(failed, vec!["3"]);
    for id in 4..=6 {
        assert!(store.posting(id).unwrap().is_some(), "paper {id} should be persisted");
    }
    assert!(store.posting(3).unwrap().is_none());
}

#[test]
fn failed_save_is_tagged_with_the_document() {
    let store = FailingStore { inner: SledStore::temporary().unwrap(), fail_for: 1 };
    let mut engine = Engine::default();
    engine.load_from_source(&papers(1)).unwrap();
    match engine.persist(&store, "1", None, &WriteOptions::default()) {
        Err(IndexError::Persist { key, paper_id, source: StoreError::Backend(_) }) => {
            assert_eq!(key, "1");
            assert_eq!(paper_id, Some(1));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unresolvable_key_fails_fast() {
    let store = SledStore::temporary().unwrap();
    let mut engine = Engine::default();
    engine
        .add_document("draft", &TextInput::raw("unnumbered draft"), PaperMetadata::default(), None)
        .unwrap();
    let err = engine.persist(&store, "draft", None, &WriteOptions::default()).unwrap_err();
    assert!(matches!(err, IndexError::UnresolvedPaperId { .. }));
    assert!(store.paper_ids().unwrap().is_empty());

    // an explicit id is enough
    engine.persist(&store, "draft", Some(77), &WriteOptions::default()).unwrap();
    assert_eq!(store.paper_ids().unwrap(), vec![77]);
}

#[test]
fn cancelled_batch_skips_remaining_documents() {
    let store = SledStore::temporary().unwrap();
    let mut engine = Engine::default();
    engine.load_from_source(&papers(3)).unwrap();
    let token = CancelToken::new();
    token.cancel();
    let summary = engine.persist_all(&store, Some(&token));
    assert_eq!(summary.total_processed, 3);
    assert_eq!(summary.failed, 3);
    assert!(store.paper_ids().unwrap().is_empty());
}

#[test]
fn removal_does_not_touch_persisted_rows() {
    let store = SledStore::temporary().unwrap();
    let mut engine = Engine::new(EngineConfig { batch_chunk_size: 1, ..Default::default() });
    let summary = engine.reindex_all(&papers(2), &store, None).unwrap();
    assert_eq!(summary.successful, 2);

    engine.remove_document("1").unwrap();
    assert!(store.posting(1).unwrap().is_some());
    assert!(!store.term_scores(1).unwrap().is_empty());

    let removed = store.purge(1).unwrap();
    assert!(removed > 0);
    assert!(store.posting(1).unwrap().is_none());
    assert!(store.posting(2).unwrap().is_some());
}

fn keys(engine: &Engine) -> Vec<String> {
    engine.corpus().docs().iter().map(|d| d.key.clone()).collect()
}

#[test]
fn failed_save_restores_the_replaced_document() {
    let store = FailingStore { inner: SledStore::temporary().unwrap(), fail_for: 2 };
    let mut engine = Engine::default();
    engine.load_from_source(&papers(3)).unwrap();
    let before = engine.document("2").unwrap().clone();
    let stats_before = engine.stats();

    let err = engine
        .add_and_persist(&store, "2", &TextInput::raw("entirely new text"), PaperMetadata::default(), Some(2), &WriteOptions::default())
        .unwrap_err();
    assert!(matches!(err, IndexError::Persist { paper_id: Some(2), .. }));
    assert_eq!(engine.document("2"), Some(&before));
    assert_eq!(keys(&engine), vec!["1", "2", "3"]);
    assert_eq!(engine.stats().total_length, stats_before.total_length);
    assert_eq!(engine.corpus().df("entirely"), 0);
}

#[test]
fn failed_save_drops_a_new_document() {
    let store = FailingStore { inner: SledStore::temporary().unwrap(), fail_for: 9 };
    let mut engine = Engine::default();
    engine.load_from_source(&papers(2)).unwrap();
    assert!(engine
        .add_and_persist(&store, "paper-9", &TextInput::raw("fresh"), PaperMetadata::default(), None, &WriteOptions::default())
        .is_err());
    assert!(engine.document("paper-9").is_none());
    assert_eq!(keys(&engine), vec!["1", "2"]);

    let written = engine
        .add_and_persist(&store, "paper-10", &TextInput::raw("fresh"), PaperMetadata::default(), None, &WriteOptions::default())
        .unwrap();
    assert_eq!(written, 1);
    assert!(store.posting(10).unwrap().is_some());
}

#[test]
fn unresolvable_key_is_rejected_before_indexing() {
    let store = SledStore::temporary().unwrap();
    let mut engine = Engine::default();
    let err = engine
        .add_and_persist(&store, "draft", &TextInput::raw("text"), PaperMetadata::default(), None, &WriteOptions::default())
        .unwrap_err();
    assert!(matches!(err, IndexError::UnresolvedPaperId { .. }));
    assert!(engine.corpus().is_empty());
}

#[test]
fn failed_purge_keeps_the_document_indexed() {
    let store = FailingStore { inner: SledStore::temporary().unwrap(), fail_for: 2 };
    let mut engine = Engine::default();
    engine.load_from_source(&papers(3)).unwrap();
    engine.persist_all(&store, None);

    assert!(engine.remove_and_purge(&store, "2").is_err());
    assert_eq!(keys(&engine), vec!["1", "2", "3"]);

    let removed = engine.remove_and_purge(&store, "1").unwrap();
    assert!(removed > 0);
    assert_eq!(keys(&engine), vec!["2", "3"]);
    assert!(store.posting(1).unwrap().is_none());
}

#[test]
fn purge_needs_a_resolvable_id() {
    let store = SledStore::temporary().unwrap();
    let mut engine = Engine::default();
    engine
        .add_document("draft", &TextInput::raw("unnumbered"), PaperMetadata::default(), None)
        .unwrap();
    let err = engine.remove_and_purge(&store, "draft").unwrap_err();
    assert!(matches!(err, IndexError::UnresolvedPaperId { .. }));
    assert!(engine.document("draft").is_some());
}
