use std::sync::Arc;

use serde_json::json;

use lingo_core::attributes::AttributeMap;
use lingo_core::context::{ClusteringContext, ContextToken, DocumentTokens};
use lingo_core::controller::{Controller, ControllerConfig, ProcessingRequest};
use lingo_core::error::LingoError;
use lingo_core::journal::{Journal, LifecycleEvent, MemorySink};
use lingo_core::language::LanguageDetectionFilter;
use lingo_core::lingo::{
    LingoClusterer, SuffixArrayBuilder, Symbol, TdMatrixBuildingStrategy, TfIdfMatrixStrategy,
    NORM_TOLERANCE,
};
use lingo_core::pipeline::{ChainBuilder, MemoryDocumentSource, TokenizerStage, DOCUMENTS};
use lingo_core::pool::TokenHandle;
use lingo_core::tokenizer::{TokenKind, WordTokenizer};
use lingo_core::types::*;

// ─── Fixtures ───────────────────────────────────────────────────────────────

fn search_results() -> Vec<RawDocument> {
    vec![
        RawDocument::new("Machine learning basics")
            .with_snippet("An introduction to machine learning methods."),
        RawDocument::new("Advances in machine learning")
            .with_snippet("Machine learning models for computer vision."),
        RawDocument::new("Gardening tips").with_snippet("How to grow tomatoes"),
        RawDocument::new("Stock market news").with_snippet("Prices rise today"),
    ]
}

fn request(documents: &[RawDocument]) -> AttributeMap {
    let mut attributes = AttributeMap::new();
    attributes.insert(DOCUMENTS, documents).unwrap();
    attributes
}

fn context_of(texts: &[&str]) -> ClusteringContext {
    let mut ctx = ClusteringContext::new();
    for (i, text) in texts.iter().enumerate() {
        let tokens = text
            .split_whitespace()
            .map(|w| ContextToken::Term(ctx.vocabulary_mut().intern(w, false)))
            .collect();
        ctx.push_document(DocumentTokens {
            id: DocumentId(i as u32),
            language: None,
            tokens,
        });
    }
    ctx
}

// ─── End to end ─────────────────────────────────────────────────────────────

#[test]
fn clusters_search_results_by_shared_phrase() {
    let controller = Controller::with_default_algorithms(ControllerConfig::default());
    let result = controller.process(None, request(&search_results())).unwrap();

    assert_eq!(result.algorithm, "lingo");
    assert_eq!(result.documents.len(), 4);
    let top = &result.clusters[0];
    assert_eq!(top.label(), "machine learning");
    assert_eq!(top.documents, vec![DocumentId(0), DocumentId(1)]);
    assert!(!top.contains(DocumentId(2)));
    assert!(!top.contains(DocumentId(3)));

    for pair in result.clusters.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for id in 0..4 {
        let id = DocumentId(id);
        let clustered = result.clusters.iter().any(|c| c.contains(id));
        assert!(clustered || result.unclustered.contains(&id));
    }
}

#[test]
fn documents_are_tagged_with_language() {
    let controller = Controller::with_default_algorithms(ControllerConfig::default());
    let result = controller.process(None, request(&search_results())).unwrap();
    let first = &result.documents[0];
    assert_eq!(first.language(), Some(LanguageTag::new("en")));
    assert_eq!(first.title(), Some("Machine learning basics"));
}

#[test]
fn identical_requests_give_identical_clusters() {
    let controller = Controller::with_default_algorithms(ControllerConfig::default());
    let first = controller.process(None, request(&search_results())).unwrap();
    let second = controller.process(None, request(&search_results())).unwrap();
    assert_eq!(first.clusters, second.clusters);
    assert_eq!(first.unclustered, second.unclustered);
    assert_ne!(first.request_id, second.request_id);
}

#[test]
fn empty_request_runs_the_whole_lifecycle() {
    let sink = Arc::new(MemorySink::new());
    let journal = Arc::new(Journal::new().with_sink(sink.clone()));
    let controller = Controller::with_default_algorithms(ControllerConfig::default())
        .with_journal(journal);

    let result = controller.process(None, request(&[])).unwrap();
    assert!(result.clusters.is_empty());
    assert!(result.unclustered.is_empty());
    assert!(result.documents.is_empty());

    let events: Vec<LifecycleEvent> = sink
        .for_request(result.request_id)
        .iter()
        .filter_map(|e| e.event)
        .collect();
    assert_eq!(events.first(), Some(&LifecycleEvent::RequestStarted));
    assert_eq!(events.last(), Some(&LifecycleEvent::RequestFinished));
    assert!(events.contains(&LifecycleEvent::Flush));
}

#[test]
fn per_request_config_limits_clusters() {
    let controller = Controller::with_default_algorithms(ControllerConfig::default());
    let attributes = request(&search_results()).with("lingo", json!({ "max_clusters": 1 }));
    let result = controller.process(None, attributes).unwrap();
    assert!(result.clusters.len() <= 1);

    // the override does not leak into the next request on the pooled pipeline
    let again = controller.process(None, request(&search_results())).unwrap();
    assert!(again.clusters.len() > 1);
}

#[test]
fn init_attributes_do_not_outlive_their_request() {
    let controller = Controller::with_default_algorithms(ControllerConfig::default());
    let attributes = request(&search_results())
        .with("language.buffer_capacity", json!(0))
        .with("tokenizer.pool_hard_size", json!(4));
    let first = controller.process(None, attributes).unwrap();
    assert_eq!(first.documents[0].language(), None);

    let second = controller.process(None, request(&search_results())).unwrap();
    assert_eq!(controller.idle_pipelines("lingo"), 1);
    assert_eq!(second.documents[0].language(), Some(LanguageTag::new("en")));
}

#[test]
fn detected_language_selects_stop_words() {
    let documents = vec![
        RawDocument::new("World war history")
            .with_snippet("The story of the world war and the people who fought in it."),
        RawDocument::new("World war documentary")
            .with_snippet("A film about the world war, with interviews from the soldiers."),
        RawDocument::new("Gardening tips").with_snippet("How to grow tomatoes"),
        RawDocument::new("Stock market news").with_snippet("Prices rise today"),
    ];
    let controller = Controller::with_default_algorithms(ControllerConfig::default());
    let result = controller.process(None, request(&documents)).unwrap();

    assert_eq!(result.documents[0].language(), Some(LanguageTag::new("en")));
    assert_eq!(result.documents[1].language(), Some(LanguageTag::new("en")));
    let top = &result.clusters[0];
    assert_eq!(top.label(), "world war");
    assert_eq!(top.documents, vec![DocumentId(0), DocumentId(1)]);
}

#[test]
fn clusters_only_results_omit_documents() {
    let config = ControllerConfig::from_json(r#"{"clusters_only": true}"#).unwrap();
    let controller = Controller::with_default_algorithms(config);
    let result = controller.process(None, request(&search_results())).unwrap();
    assert!(result.documents.is_empty());
    assert!(!result.clusters.is_empty());

    let serialized = serde_json::to_value(&result).unwrap();
    assert!(serialized.get("documents").is_none());
    assert!(serialized.get("clusters").is_some());
}

#[test]
fn unknown_algorithm_fails() {
    let controller = Controller::with_default_algorithms(ControllerConfig::default());
    let err = controller
        .process(Some("kmeans"), request(&search_results()))
        .unwrap_err();
    assert!(matches!(err, LingoError::UnknownAlgorithm { ref name } if name == "kmeans"));
}

#[tokio::test]
async fn batch_processing_runs_requests_concurrently() {
    let controller = Arc::new(Controller::with_default_algorithms(
        ControllerConfig::default(),
    ));
    let requests: Vec<ProcessingRequest> = (0..4)
        .map(|_| ProcessingRequest {
            algorithm: None,
            attributes: request(&search_results()),
        })
        .collect();

    let results = controller.clone().process_batch(requests).await;
    assert_eq!(results.len(), 4);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        let result = result.as_ref().unwrap();
        assert_eq!(result.clusters, first.clusters);
    }
    assert!(controller.idle_pipelines("lingo") >= 1);
}

// ─── Pipeline assembly ──────────────────────────────────────────────────────

#[test]
fn incompatible_stage_is_rejected_without_changing_the_chain() {
    let mut builder = ChainBuilder::new(MemoryDocumentSource::new());
    let err = builder.chain(LingoClusterer::default()).unwrap_err();
    assert!(matches!(err, LingoError::IncompatibleStage { .. }));
    assert_eq!(builder.len(), 0);
    assert_eq!(builder.tail_name(), "memory-source");

    builder
        .chain(LanguageDetectionFilter::default())
        .unwrap()
        .chain(TokenizerStage::new())
        .unwrap();
    assert_eq!(builder.len(), 2);
}

#[test]
fn chain_must_end_in_a_terminal_stage() {
    let mut builder = ChainBuilder::new(MemoryDocumentSource::new());
    builder.chain(TokenizerStage::new()).unwrap();
    assert!(matches!(
        builder.build(),
        Err(LingoError::IncompatibleStage { .. })
    ));
}

#[test]
fn custom_pipeline_can_skip_language_detection() {
    let mut controller = Controller::new(ControllerConfig::default());
    controller.register("plain", || {
        let mut builder = ChainBuilder::new(MemoryDocumentSource::new());
        builder
            .chain(TokenizerStage::new())?
            .chain(LingoClusterer::default())?;
        builder.build()
    });
    let result = controller.process(None, request(&search_results())).unwrap();
    assert_eq!(result.clusters[0].label(), "machine learning");
    assert_eq!(result.documents[0].language(), None);
}

// ─── Tokens ─────────────────────────────────────────────────────────────────

#[test]
fn stale_token_handles_are_rejected() {
    let mut tokenizer = WordTokenizer::new();
    let mut buffer = [TokenHandle::default(); 8];
    tokenizer.restart_tokenization_on("Rust 2021, fast!");
    let count = tokenizer.next_tokens(&mut buffer, 0).unwrap();
    assert!(count >= 3);

    let first = buffer[0];
    assert_eq!(tokenizer.token(first).unwrap().text(), "Rust");
    assert_eq!(tokenizer.token(first).unwrap().kind(), TokenKind::Term);

    tokenizer.reuse();
    assert!(matches!(
        tokenizer.token(first),
        Err(LingoError::PoolContractViolation { .. })
    ));
}

// ─── Phrases and matrix ─────────────────────────────────────────────────────

#[test]
fn suffix_array_is_a_permutation() {
    let ctx = context_of(&["a b a c", "b a c d", "c"]);
    let array = SuffixArrayBuilder::new(8, 2).build(ctx.documents());
    let mut positions: Vec<u32> = array.suffixes().to_vec();
    positions.sort_unstable();
    let expected: Vec<u32> = (0..array.len() as u32).collect();
    assert_eq!(positions, expected);

    for rank in 1..array.len() {
        assert!(array.suffix(rank - 1) <= array.suffix(rank));
    }
    // documents are separated, not terminated
    assert_eq!(
        array.symbols().iter().filter(|s| s.is_separator()).count(),
        2
    );
    assert!(matches!(array.symbols()[4], Symbol::Separator(_)));
}

#[test]
fn phrases_span_several_documents() {
    let ctx = context_of(&[
        "open source search engine",
        "search engine ranking",
        "open source license",
        "unrelated words only",
    ]);
    let builder = SuffixArrayBuilder::new(8, 2);
    let array = builder.build(ctx.documents());
    let phrases = builder.phrase_candidates(&array);

    let text = |terms: &[_]| ctx.vocabulary().phrase_text(terms);
    let search_engine = phrases
        .iter()
        .find(|p| text(&p.terms) == "search engine")
        .unwrap();
    assert_eq!(search_engine.documents, vec![0, 1]);
    assert!(phrases.iter().any(|p| text(&p.terms) == "open source"));
    for phrase in &phrases {
        assert!(phrase.documents.len() >= 2);
        assert!(phrase.frequency() >= 2);
    }
}

#[test]
fn matrix_columns_are_normalized() {
    let mut ctx = context_of(&[
        "open source search engine",
        "search engine ranking search",
        "",
    ]);
    let builder = SuffixArrayBuilder::new(8, 2);
    let array = builder.build(ctx.documents());
    let phrases = builder.phrase_candidates(&array);
    ctx.set_suffix_array(array);
    ctx.set_phrases(phrases);

    let matrix = TfIdfMatrixStrategy.build_td_matrix(&ctx);
    assert_eq!(matrix.document_count(), 3);
    assert!((matrix.column_norm(0) - 1.0).abs() < NORM_TOLERANCE);
    assert!((matrix.column_norm(1) - 1.0).abs() < NORM_TOLERANCE);
    assert_eq!(matrix.column_norm(2), 0.0);
    assert!(matrix.rows().len() > matrix.term_rows());
}
