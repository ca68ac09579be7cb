//! End-to-end workflow scenarios over scripted collaborators.

mod common;

use std::sync::Arc;

use bfsiqa::agent::{Orchestrator, SourceKind, WorkflowResult};
use bfsiqa::embedding::NullEmbedder;
use bfsiqa::memory::MemoryStore;
use bfsiqa::agent::LlmClient;
use bfsiqa::QaConfig;
use common::{StubProvider, StubSearch, build_orchestrator, write_pdf};

fn count_kind(result: &WorkflowResult, kind: SourceKind) -> usize {
    result.provenance.iter().filter(|p| p.kind == kind).count()
}

#[tokio::test]
async fn internal_only_success() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, "Total revenue in 2024 was 25.3 billion.");

    let orchestrator = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::empty()),
        dir.path(),
        false,
    );

    let result = orchestrator
        .run("What was total revenue in 2024?", &pdf)
        .await;

    assert!(result.answer.contains("25.3 billion"));
    assert!(count_kind(&result, SourceKind::Internal) >= 1);
    assert_eq!(count_kind(&result, SourceKind::External), 0);
    assert!(
        result.confidence >= 0.7,
        "confidence was {}",
        result.confidence
    );
    assert!(!result
        .flags
        .iter()
        .any(|f| f == "PARTIAL_EXTERNAL_COMPLETION"));
}

#[tokio::test]
async fn pure_external_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("archive.pdf");
    write_pdf(&pdf, "Historical performance tables for prior decades.");

    let orchestrator = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::returning(
            "Market cap is 290 billion",
            "https://example/q",
        )),
        dir.path(),
        true,
    );

    let result = orchestrator
        .run("What is the current market capitalization of the company?", &pdf)
        .await;

    let external: Vec<_> = result
        .provenance
        .iter()
        .filter(|p| p.kind == SourceKind::External)
        .collect();
    assert!(!external.is_empty());
    assert!(external.iter().any(|p| p.source == "https://example/q"));
    assert!(result.answer.contains("290 billion"));
    assert!(!result.flags.iter().any(|f| f == "NO_INTERNAL_EVIDENCE"));
}

#[tokio::test]
async fn partial_external_completion() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, "2024 revenue: 100 billion dollars.");

    let orchestrator = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::returning(
            "Market cap is 290 billion",
            "https://example/q",
        )),
        dir.path(),
        true,
    );

    let result = orchestrator
        .run(
            "What is the current market cap and how does it compare to 2024 revenue?",
            &pdf,
        )
        .await;

    assert!(count_kind(&result, SourceKind::Internal) >= 1);
    assert!(count_kind(&result, SourceKind::External) >= 1);
    assert!(result
        .flags
        .iter()
        .any(|f| f == "PARTIAL_EXTERNAL_COMPLETION"));
    assert!(
        (0.6..=0.85).contains(&result.confidence),
        "confidence was {}",
        result.confidence
    );
}

#[tokio::test]
async fn graceful_empty() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("missing.pdf");

    let orchestrator = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::empty()),
        dir.path(),
        false,
    );

    let result = orchestrator.run("anything at all", &pdf).await;

    assert_eq!(result.answer, WorkflowResult::FAILSAFE_ANSWER);
    assert_eq!(result.confidence, 0.0);
    assert!(result.provenance.is_empty());
}

#[tokio::test]
async fn numeric_contradiction_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, "The CET1 capital ratio stood at 14.2% at year end.");

    let orchestrator = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::returning(
            "Regulator data shows CET1 at 12.8%",
            "https://example/cet1",
        )),
        dir.path(),
        true,
    );

    let result = orchestrator
        .run("What is the bank's CET1 capital ratio today?", &pdf)
        .await;

    assert!(result.flags.iter().any(|f| f == "NUMERIC_CONTRADICTION"));

    // The same query with agreeing sources scores at least as high.
    let dir2 = tempfile::tempdir().unwrap();
    let pdf2 = dir2.path().join("report.pdf");
    write_pdf(&pdf2, "The CET1 capital ratio stood at 14.2% at year end.");
    let agreeing = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::returning(
            "Regulator data shows CET1 at 14.2%",
            "https://example/cet1",
        )),
        dir2.path(),
        true,
    );
    let agree_result = agreeing
        .run("What is the bank's CET1 capital ratio today?", &pdf2)
        .await;
    assert!(!agree_result.flags.iter().any(|f| f == "NUMERIC_CONTRADICTION"));
    assert!(agree_result.confidence >= result.confidence);
}

#[tokio::test]
async fn memory_grows_by_one_per_query() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, "Total revenue in 2024 was 25.3 billion.");

    let orchestrator = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::empty()),
        dir.path(),
        false,
    );
    let store = MemoryStore::new(dir.path());

    assert_eq!(store.load(&pdf).len(), 0);
    orchestrator.run("What was total revenue in 2024?", &pdf).await;
    assert_eq!(store.load(&pdf).len(), 1);
    orchestrator.run("What was total revenue in 2024?", &pdf).await;
    let entries = store.load(&pdf);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].question, "What was total revenue in 2024?");
}

#[tokio::test]
async fn identical_queries_yield_identical_provenance_sources() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, "Total revenue in 2024 was 25.3 billion.");

    let orchestrator = build_orchestrator(
        Arc::new(StubProvider::new()),
        Arc::new(StubSearch::empty()),
        dir.path(),
        false,
    );

    let first = orchestrator.run("What was total revenue in 2024?", &pdf).await;
    let second = orchestrator.run("What was total revenue in 2024?", &pdf).await;

    let key = |r: &WorkflowResult| {
        let mut v: Vec<(String, Option<u32>)> = r
            .provenance
            .iter()
            .map(|p| (p.source.clone(), p.page))
            .collect();
        v.sort();
        v
    };
    assert_eq!(key(&first), key(&second));
}

#[tokio::test]
async fn reranker_makes_multiple_synthesis_calls() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, "Total revenue in 2024 was 25.3 billion.");

    let provider = Arc::new(StubProvider::new());
    let config = QaConfig::builder()
        .api_key("test")
        .memory_dir(dir.path())
        .enable_reranker(true)
        .build()
        .unwrap();
    let orchestrator = Orchestrator::new(
        LlmClient::new(provider.clone(), "stub-model", 0.0),
        Arc::new(NullEmbedder),
        Arc::new(StubSearch::empty()),
        MemoryStore::new(dir.path()),
        config,
    );

    let result = orchestrator.run("What was total revenue in 2024?", &pdf).await;
    assert!(!result.answer.is_empty());
    assert_eq!(provider.synthesis_calls(), 3);
}

#[tokio::test]
async fn single_synthesis_call_when_reranker_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    write_pdf(&pdf, "Total revenue in 2024 was 25.3 billion.");

    let provider = Arc::new(StubProvider::new());
    let orchestrator = build_orchestrator(
        provider.clone(),
        Arc::new(StubSearch::empty()),
        dir.path(),
        false,
    );

    orchestrator.run("What was total revenue in 2024?", &pdf).await;
    assert_eq!(provider.synthesis_calls(), 1);
}
