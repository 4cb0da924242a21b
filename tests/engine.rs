use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use tariff_classifier::config::Config;
use tariff_classifier::engine::Engine;
use tariff_classifier::memory_store::{InMemoryCatalog, InMemoryContexts};
use tariff_classifier::models::{CatalogRecord, CompanyContext, MatchType, SearchRequest};
use tariff_classifier::scoring::compare_results;
use tariff_classifier::store::{CatalogStore, ContextProvider, NoContext};

// ============ Fixtures ============

fn rec(code: &str, desc: &str, base: f64, pref: f64, volume: u64) -> CatalogRecord {
    CatalogRecord::new(code, desc, base, pref, volume).unwrap()
}

fn catalog_records() -> Vec<CatalogRecord> {
    vec![
        rec("8518.30", "Headphones and earphones, wireless bluetooth headphones", 4.9, 0.0, 120_000),
        rec("8518.22", "Multiple loudspeakers, wireless", 4.9, 0.0, 40_000),
        rec("8517.62", "Bluetooth transmission apparatus", 0.0, 0.0, 90_000),
        rec("7318.15", "Bolts of iron or steel, threaded", 8.5, 0.0, 900),
        rec("7318.16", "Nuts of iron or steel", 8.5, 0.0, 400),
        rec("7318.14", "Self-tapping screws of steel", 6.2, 0.0, 300),
        rec("7308.90", "Steel structures and parts of structures", 5.0, 0.0, 200),
        rec("8302.41", "Base metal mountings for buildings with steel bolts", 3.9, 0.0, 5_000_000),
        rec("7208.10", "Flat-rolled steel products in coils", 0.0, 0.0, 2_000_000),
        rec("7228.30", "Other bars and rods of alloy steel", 2.0, 0.0, 70_000),
        rec("9403.20", "Other metal furniture", 0.0, 0.0, 10_000),
    ]
}

fn config() -> Config {
    let mut config = Config::with_db_path("unused.sqlite");
    config.retrieval.query_timeout_ms = 200;
    config.retrieval.context_timeout_ms = 200;
    config
}

fn contexts() -> InMemoryContexts {
    let contexts = InMemoryContexts::new();
    contexts
        .insert(
            "acme",
            CompanyContext {
                primary_chapters: vec![73],
                ..Default::default()
            },
        )
        .unwrap();
    contexts
        .insert(
            "sonic",
            CompanyContext {
                primary_chapters: vec![85],
                ..Default::default()
            },
        )
        .unwrap();
    contexts
}

/// Counts every catalog call before delegating.
struct CountingCatalog {
    inner: InMemoryCatalog,
    calls: AtomicUsize,
}

impl CountingCatalog {
    fn new() -> Self {
        Self {
            inner: InMemoryCatalog::from_records(catalog_records()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for CountingCatalog {
    async fn query_by_chapter_and_terms(
        &self,
        chapters: &[u16],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<CatalogRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .query_by_chapter_and_terms(chapters, terms, limit)
            .await
    }

    async fn query_exact_phrase(&self, phrase: &str, limit: usize) -> Result<Vec<CatalogRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query_exact_phrase(phrase, limit).await
    }

    async fn query_by_terms(&self, terms: &[String], limit: usize) -> Result<Vec<CatalogRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query_by_terms(terms, limit).await
    }
}

/// Every query fails with a transport error.
struct FailingCatalog;

#[async_trait]
impl CatalogStore for FailingCatalog {
    async fn query_by_chapter_and_terms(
        &self,
        _chapters: &[u16],
        _terms: &[String],
        _limit: usize,
    ) -> Result<Vec<CatalogRecord>> {
        bail!("connection refused")
    }

    async fn query_exact_phrase(&self, _phrase: &str, _limit: usize) -> Result<Vec<CatalogRecord>> {
        bail!("connection refused")
    }

    async fn query_by_terms(&self, _terms: &[String], _limit: usize) -> Result<Vec<CatalogRecord>> {
        bail!("connection refused")
    }
}

/// Every query sleeps for `delay` before answering from the fixture catalog.
struct SlowCatalog {
    inner: InMemoryCatalog,
    delay: Duration,
}

impl SlowCatalog {
    fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryCatalog::from_records(catalog_records()),
            delay,
        }
    }
}

#[async_trait]
impl CatalogStore for SlowCatalog {
    async fn query_by_chapter_and_terms(
        &self,
        chapters: &[u16],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<CatalogRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .query_by_chapter_and_terms(chapters, terms, limit)
            .await
    }

    async fn query_exact_phrase(&self, phrase: &str, limit: usize) -> Result<Vec<CatalogRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.query_exact_phrase(phrase, limit).await
    }

    async fn query_by_terms(&self, terms: &[String], limit: usize) -> Result<Vec<CatalogRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.query_by_terms(terms, limit).await
    }
}

/// Keyword queries fail; chapter and exact-phrase queries succeed.
struct KeywordOutage {
    inner: InMemoryCatalog,
}

#[async_trait]
impl CatalogStore for KeywordOutage {
    async fn query_by_chapter_and_terms(
        &self,
        chapters: &[u16],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<CatalogRecord>> {
        self.inner
            .query_by_chapter_and_terms(chapters, terms, limit)
            .await
    }

    async fn query_exact_phrase(&self, phrase: &str, limit: usize) -> Result<Vec<CatalogRecord>> {
        self.inner.query_exact_phrase(phrase, limit).await
    }

    async fn query_by_terms(&self, _terms: &[String], _limit: usize) -> Result<Vec<CatalogRecord>> {
        bail!("fts index rebuilding")
    }
}

struct FailingContexts;

#[async_trait]
impl ContextProvider for FailingContexts {
    async fn get_context(&self, _company_id: &str) -> Result<Option<CompanyContext>> {
        bail!("profile service down")
    }
}

fn engine_over(catalog: Arc<dyn CatalogStore>, contexts: Arc<dyn ContextProvider>) -> Engine {
    Engine::new(catalog, contexts, &config())
}

fn default_engine() -> (Engine, Arc<CountingCatalog>) {
    let catalog = Arc::new(CountingCatalog::new());
    let engine = engine_over(catalog.clone(), Arc::new(contexts()));
    (engine, catalog)
}

// ============ Output invariants ============

#[tokio::test]
async fn test_confidence_within_clamp_range() {
    let (engine, _) = default_engine();
    for text in [
        "wireless bluetooth headphones",
        "steel bolts",
        "other metal furniture steel",
        "zzzz unmatched words",
    ] {
        for company in [None, Some("acme"), Some("sonic")] {
            let mut req = SearchRequest::new(text).with_max_results(50);
            if let Some(c) = company {
                req = req.with_company(c);
            }
            for r in engine.classify(&req).await.results {
                assert!(
                    (30.0..=95.0).contains(&r.confidence),
                    "{} for {:?}: {}",
                    r.code,
                    text,
                    r.confidence
                );
            }
        }
    }
}

#[tokio::test]
async fn test_codes_are_distinct() {
    let (engine, _) = default_engine();
    // The exact-phrase and keyword queries both return 8302.41.
    let resp = engine
        .classify(&SearchRequest::new("steel bolts").with_max_results(50))
        .await;
    assert!(!resp.results.is_empty());
    let codes: HashSet<&str> = resp.results.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes.len(), resp.results.len());
}

#[tokio::test]
async fn test_results_are_sorted_deterministically() {
    let (engine, _) = default_engine();
    let resp = engine
        .classify(&SearchRequest::new("steel").with_max_results(50))
        .await;
    assert!(resp.results.len() > 3);
    for pair in resp.results.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
        assert_ne!(
            compare_results(&pair[0], &pair[1]),
            std::cmp::Ordering::Greater,
            "{} before {}",
            pair[0].code,
            pair[1].code
        );
    }
}

#[tokio::test]
async fn test_max_results_truncates() {
    let (engine, _) = default_engine();
    let resp = engine
        .classify(&SearchRequest::new("steel").with_max_results(2))
        .await;
    assert_eq!(resp.results.len(), 2);
}

// ============ Cache ============

#[tokio::test]
async fn test_identical_requests_hit_cache_without_store_calls() {
    let (engine, catalog) = default_engine();
    let req = SearchRequest::new("wireless bluetooth headphones");

    let first = engine.classify(&req).await;
    let calls_after_first = catalog.calls();
    assert!(calls_after_first > 0);

    let second = engine.classify(&req).await;
    assert_eq!(second.strategy, "cache");
    assert_eq!(first.results, second.results);
    assert_eq!(catalog.calls(), calls_after_first);

    // Normalisation makes cosmetic variants share the entry.
    let third = engine
        .classify(&SearchRequest::new("  Wireless, Bluetooth HEADPHONES "))
        .await;
    assert_eq!(third.strategy, "cache");
    assert_eq!(catalog.calls(), calls_after_first);
}

#[tokio::test]
async fn test_cache_is_scoped_by_company() {
    let (engine, catalog) = default_engine();
    engine.classify(&SearchRequest::new("steel bolts")).await;
    let calls = catalog.calls();

    let scoped = engine
        .classify(&SearchRequest::new("steel bolts").with_company("acme"))
        .await;
    assert_ne!(scoped.strategy, "cache");
    assert!(scoped.used_context);
    assert!(catalog.calls() > calls);
}

#[tokio::test]
async fn test_invalidate_forces_fresh_search() {
    let (engine, catalog) = default_engine();
    let req = SearchRequest::new("steel bolts").with_company("acme");
    engine.classify(&req).await;
    engine.invalidate(Some("acme"), "steel bolts");
    let calls = catalog.calls();

    let again = engine.classify(&req).await;
    assert_ne!(again.strategy, "cache");
    assert!(catalog.calls() > calls);
}

// ============ Tiering ============

#[tokio::test]
async fn test_underfilled_primary_falls_back_to_broad() {
    let (engine, _) = default_engine();
    // Chapter 85 has no steel, so the focused tier returns nothing.
    let resp = engine
        .classify(&SearchRequest::new("steel").with_company("sonic"))
        .await;
    assert!(resp.used_context);
    assert_eq!(resp.strategy, "broad");
    assert!(resp.results.len() >= 5);
}

#[tokio::test]
async fn test_sufficient_primary_stops_early() {
    let catalog = Arc::new(CountingCatalog::new());
    let contexts = InMemoryContexts::new();
    contexts
        .insert(
            "metals",
            CompanyContext {
                primary_chapters: vec![72, 73],
                ..Default::default()
            },
        )
        .unwrap();
    let engine = engine_over(catalog.clone(), Arc::new(contexts));

    let resp = engine
        .classify(&SearchRequest::new("steel").with_company("metals"))
        .await;
    assert_eq!(resp.strategy, "focused");
    assert_eq!(catalog.calls(), 1);
    assert!(resp.results.iter().all(|r| r.chapter == 72 || r.chapter == 73));
}

#[tokio::test]
async fn test_headphones_without_company() {
    let (engine, _) = default_engine();
    let resp = engine
        .classify(&SearchRequest::new("wireless bluetooth headphones"))
        .await;
    assert_eq!(resp.strategy, "broad");
    assert!(!resp.used_context);
    assert!(!resp.results.is_empty());
    let top = &resp.results[0];
    assert!(matches!(
        top.match_type,
        MatchType::ExactPhrase | MatchType::Keyword
    ));
    assert_eq!(top.code, "8518.30");
    assert!((top.savings - 4.9).abs() < 1e-9);
}

#[tokio::test]
async fn test_steel_bolts_prefers_primary_chapter() {
    let (engine, _) = default_engine();
    // 8302.41 holds the exact phrase and a far larger trade volume.
    let resp = engine
        .classify(&SearchRequest::new("steel bolts").with_company("acme"))
        .await;
    assert!(resp.used_context);
    assert_eq!(resp.results[0].chapter, 73);
    assert_eq!(resp.results[0].code, "7318.15");
    assert_eq!(resp.results[0].match_type, MatchType::ContextChapter);
    assert!(resp.results.iter().any(|r| r.code == "8302.41"));
}

// ============ Terminal and degraded outcomes ============

#[tokio::test]
async fn test_empty_input_makes_no_calls_and_no_cache_write() {
    let (engine, catalog) = default_engine();
    for text in ["", "   ", "!! ?? --", "a an 42"] {
        let resp = engine.classify(&SearchRequest::new(text)).await;
        assert!(resp.results.is_empty());
        assert_eq!(resp.strategy, "none");
    }
    assert_eq!(catalog.calls(), 0);
    assert_eq!(engine.cache_stats().inserts, 0);
}

#[tokio::test]
async fn test_store_that_always_times_out() {
    let engine = engine_over(
        Arc::new(SlowCatalog::new(Duration::from_secs(30))),
        Arc::new(contexts()),
    );
    for req in [
        SearchRequest::new("steel bolts"),
        SearchRequest::new("steel bolts").with_company("acme"),
    ] {
        let resp = engine.classify(&req).await;
        assert!(resp.results.is_empty());
        assert_eq!(resp.strategy, "unavailable");
    }
    assert_eq!(engine.cache_stats().inserts, 0);
}

#[tokio::test]
async fn test_store_that_always_fails() {
    let engine = engine_over(Arc::new(FailingCatalog), Arc::new(NoContext));
    let resp = engine
        .classify(&SearchRequest::new("wireless headphones"))
        .await;
    assert!(resp.results.is_empty());
    assert_eq!(resp.strategy, "unavailable");
    assert_eq!(engine.cache_stats().inserts, 0);
}

#[tokio::test]
async fn test_partial_outage_is_served_but_not_cached() {
    let engine = engine_over(
        Arc::new(KeywordOutage {
            inner: InMemoryCatalog::from_records(catalog_records()),
        }),
        Arc::new(NoContext),
    );
    let req = SearchRequest::new("wireless bluetooth headphones");
    let resp = engine.classify(&req).await;
    assert_eq!(resp.strategy, "broad");
    assert_eq!(resp.results[0].code, "8518.30");

    let again = engine.classify(&req).await;
    assert_eq!(again.strategy, "broad");
    assert_eq!(engine.cache_stats().inserts, 0);
}

#[tokio::test]
async fn test_context_failure_falls_back_to_no_context() {
    let catalog = Arc::new(CountingCatalog::new());
    let engine = engine_over(catalog, Arc::new(FailingContexts));
    let resp = engine
        .classify(&SearchRequest::new("steel bolts").with_company("acme"))
        .await;
    assert!(!resp.used_context);
    assert_eq!(resp.strategy, "broad");
    assert!(!resp.results.is_empty());
    assert_eq!(engine.cache_stats().inserts, 0);
}

#[tokio::test]
async fn test_cancelled_request_is_not_cached() {
    let mut config = config();
    config.retrieval.query_timeout_ms = 5_000;
    let engine = Engine::new(
        Arc::new(SlowCatalog::new(Duration::from_millis(300))),
        Arc::new(NoContext),
        &config,
    );

    let req = SearchRequest::new("steel bolts");
    let cancelled = tokio::time::timeout(Duration::from_millis(20), engine.classify(&req)).await;
    assert!(cancelled.is_err());
    assert_eq!(engine.cache_stats().inserts, 0);

    let completed = engine.classify(&req).await;
    assert_eq!(completed.strategy, "broad");
    assert_eq!(engine.cache_stats().inserts, 1);
}
