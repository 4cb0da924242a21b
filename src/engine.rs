//! The classification engine façade.
//!
//! [`Engine::classify`] wires the pipeline together:
//!
//! ```text
//! cache lookup ─► context fetch ∥ tokenize ─► prioritize terms
//!      │                                           │
//!      ▼ hit                                       ▼ empty ⇒ strategy "none"
//!   "cache"                         tiered search ─► combine ─► rank
//!                                                               │
//!                                     cache write (clean runs) ◄┘
//! ```
//!
//! `classify` never fails. Store and provider faults are downgraded to
//! zero records or "no context" and logged; a request where every catalog
//! query failed reports `strategy = "unavailable"` with no results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, CacheStats, InMemoryResponseCache, NoCache, ResponseCache};
use crate::combine::combine;
use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::error::Fault;
use crate::models::{ClassifyResponse, CompanyContext, SearchRequest};
use crate::scoring::Scorer;
use crate::sqlite_store::{SqliteCatalog, SqliteContexts};
use crate::store::{CatalogStore, ContextProvider};
use crate::terms::{normalize_text, TermExtractor};
use crate::tiered::{TierPolicy, TieredSearch};

pub const STRATEGY_CACHE: &str = "cache";
pub const STRATEGY_NONE: &str = "none";
pub const STRATEGY_UNAVAILABLE: &str = "unavailable";

pub struct Engine {
    catalog: Arc<dyn CatalogStore>,
    contexts: Arc<dyn ContextProvider>,
    cache: Arc<dyn ResponseCache>,
    extractor: TermExtractor,
    scorer: Scorer,
    policy: TierPolicy,
    retrieval: RetrievalConfig,
    cache_ttl: Duration,
}

impl Engine {
    /// Build an engine over the given backends. The response cache is
    /// chosen from `config.cache`.
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        contexts: Arc<dyn ContextProvider>,
        config: &Config,
    ) -> Self {
        let cache: Arc<dyn ResponseCache> = if config.cache.enabled {
            Arc::new(InMemoryResponseCache::new(config.cache.max_size))
        } else {
            Arc::new(NoCache)
        };
        Self {
            catalog,
            contexts,
            cache,
            extractor: TermExtractor::from(&config.retrieval),
            scorer: Scorer::new(config.scoring.clone()),
            policy: TierPolicy::from(&config.retrieval),
            retrieval: config.retrieval.clone(),
            cache_ttl: config.cache.ttl(),
        }
    }

    /// Open the SQLite catalog named by `config.db.path`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::new(
            Arc::new(SqliteCatalog::new(pool.clone())),
            Arc::new(SqliteContexts::new(pool)),
            config,
        ))
    }

    /// Replace the response cache, e.g. with a shared or distributed one.
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop the cached response for one request fingerprint.
    pub fn invalidate(&self, company_id: Option<&str>, raw_text: &str) {
        self.cache.delete(&cache_key(company_id, raw_text));
    }

    /// Requested result count, with `0` meaning the configured default and
    /// anything above the cap reduced to the cap.
    fn effective_max_results(&self, requested: usize) -> usize {
        if requested == 0 {
            self.retrieval.default_max_results
        } else {
            requested.min(self.retrieval.max_results_cap)
        }
    }

    pub async fn classify(&self, request: &SearchRequest) -> ClassifyResponse {
        let start = Instant::now();
        let max_results = self.effective_max_results(request.max_results);
        let company_id = request.company_id.as_deref();
        let key = cache_key(company_id, &request.raw_text);

        if let Some(mut results) = self.cache.get(&key) {
            debug!(company = company_id.unwrap_or("general"), "cache hit");
            results.truncate(max_results);
            return ClassifyResponse {
                results,
                used_context: false,
                strategy: STRATEGY_CACHE.to_string(),
            };
        }

        let ((context, context_fault), tokens) = tokio::join!(
            self.fetch_context(company_id),
            async { self.extractor.tokenize(&request.raw_text) },
        );
        let used_context = context.is_some();
        let terms = self.extractor.prioritize(tokens, context.as_ref());

        if terms.is_empty() {
            debug!("no searchable terms in request");
            return ClassifyResponse {
                results: Vec::new(),
                used_context,
                strategy: STRATEGY_NONE.to_string(),
            };
        }

        let phrase = normalize_text(&request.raw_text);
        let outcome = TieredSearch::new(self.catalog.as_ref(), &self.policy)
            .search(&terms, &phrase, context.as_ref())
            .await;

        let combined = combine(outcome.batches.iter().map(|b| b.records.as_slice()));
        let mut ranked = self
            .scorer
            .rank(&combined, &terms, context.as_ref(), &request.raw_text);
        ranked.truncate(self.retrieval.max_results_cap);

        let strategy = if outcome.all_failed() {
            STRATEGY_UNAVAILABLE
        } else {
            outcome
                .deepest_successful_tier()
                .map(|t| t.as_str())
                .unwrap_or(STRATEGY_UNAVAILABLE)
        };

        if outcome.degraded() || context_fault.is_some() {
            debug!(strategy, "degraded response, not caching");
        } else {
            self.cache.set(&key, ranked.clone(), self.cache_ttl);
        }

        info!(
            strategy,
            terms = terms.len(),
            candidates = combined.len(),
            results = ranked.len().min(max_results),
            used_context,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "classified"
        );

        ranked.truncate(max_results);
        ClassifyResponse {
            results: ranked,
            used_context,
            strategy: strategy.to_string(),
        }
    }

    async fn fetch_context(
        &self,
        company_id: Option<&str>,
    ) -> (Option<CompanyContext>, Option<Fault>) {
        let Some(company_id) = company_id else {
            return (None, None);
        };
        let timeout = self.retrieval.context_timeout();
        match tokio::time::timeout(timeout, self.contexts.get_context(company_id)).await {
            Ok(Ok(context)) => {
                if context.is_none() {
                    debug!(company = company_id, "no context profile");
                }
                (context, None)
            }
            Ok(Err(e)) => {
                let fault = Fault::unavailable("context", &e);
                warn!(company = company_id, error = %fault, "continuing without context");
                (None, Some(fault))
            }
            Err(_) => {
                let fault = Fault::timeout("context", timeout);
                warn!(company = company_id, error = %fault, "continuing without context");
                (None, Some(fault))
            }
        }
    }
}
