//! Tiered search over the catalog with early stop on sufficiency.
//!
//! # Tiers
//!
//! | Tier | Runs when | Query | Limit |
//! |------|-----------|-------|-------|
//! | Focused | context has primary chapters | chapter-scoped keyword-OR | 20 |
//! | Secondary | fewer than `K` codes so far and context has secondary chapters | chapter-scoped keyword-OR | 20 |
//! | Broad | no context, or still fewer than `K` codes | exact phrase (10) and keyword-OR (20), concurrently | - |
//!
//! Each query runs under its own timeout. A failed or timed-out query
//! counts as zero records and never stops the remaining tiers. No tier runs
//! twice. Records are returned per query in execution order; duplicates are
//! left for the combiner.

use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::error::Fault;
use crate::models::{CatalogRecord, CompanyContext};
use crate::store::CatalogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Focused,
    Secondary,
    Broad,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Focused => "focused",
            Tier::Secondary => "secondary",
            Tier::Broad => "broad",
        }
    }
}

/// A single catalog call issued by a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Focused,
    Secondary,
    ExactPhrase,
    Keyword,
}

impl QueryKind {
    pub fn tier(&self) -> Tier {
        match self {
            QueryKind::Focused => Tier::Focused,
            QueryKind::Secondary => Tier::Secondary,
            QueryKind::ExactPhrase | QueryKind::Keyword => Tier::Broad,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Focused => "focused",
            QueryKind::Secondary => "secondary",
            QueryKind::ExactPhrase => "broad_exact_phrase",
            QueryKind::Keyword => "broad_keyword",
        }
    }
}

/// Outcome of one catalog call.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub kind: QueryKind,
    pub records: usize,
    pub fault: Option<Fault>,
    pub elapsed_ms: u64,
}

impl QueryReport {
    pub fn succeeded(&self) -> bool {
        self.fault.is_none()
    }
}

/// Records from one catalog call, in the order the store returned them.
#[derive(Debug, Clone)]
pub struct QueryBatch {
    pub kind: QueryKind,
    pub records: Vec<CatalogRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub batches: Vec<QueryBatch>,
    pub reports: Vec<QueryReport>,
}

impl SearchOutcome {
    /// All records from executed queries, concatenated in execution order.
    pub fn records(&self) -> Vec<CatalogRecord> {
        self.batches
            .iter()
            .flat_map(|b| b.records.iter().cloned())
            .collect()
    }

    pub fn tiers_run(&self) -> Vec<Tier> {
        let mut tiers: Vec<Tier> = self.reports.iter().map(|r| r.kind.tier()).collect();
        tiers.dedup();
        tiers
    }

    pub fn ran(&self, tier: Tier) -> bool {
        self.reports.iter().any(|r| r.kind.tier() == tier)
    }

    /// True when at least one query ran and every query failed.
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.reports.iter().all(|r| !r.succeeded())
    }

    /// True when any query failed or timed out.
    pub fn degraded(&self) -> bool {
        self.reports.iter().any(|r| !r.succeeded())
    }

    /// The lowest-priority tier that had at least one successful query.
    pub fn deepest_successful_tier(&self) -> Option<Tier> {
        self.reports
            .iter()
            .filter(|r| r.succeeded())
            .map(|r| r.kind.tier())
            .max()
    }
}

/// Limits and timeout for the tiered executor.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    /// Sufficiency threshold `K`, counted in distinct codes.
    pub min_results: usize,
    pub focused_limit: usize,
    pub secondary_limit: usize,
    pub exact_phrase_limit: usize,
    pub keyword_limit: usize,
    pub query_timeout: Duration,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for TierPolicy {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            min_results: cfg.min_results,
            focused_limit: cfg.focused_limit,
            secondary_limit: cfg.secondary_limit,
            exact_phrase_limit: cfg.exact_phrase_limit,
            keyword_limit: cfg.keyword_limit,
            query_timeout: cfg.query_timeout(),
        }
    }
}

pub struct TieredSearch<'a> {
    store: &'a dyn CatalogStore,
    policy: &'a TierPolicy,
}

impl<'a> TieredSearch<'a> {
    pub fn new(store: &'a dyn CatalogStore, policy: &'a TierPolicy) -> Self {
        Self { store, policy }
    }

    /// Run the tiers for `terms`. `phrase` is the normalised request text
    /// used by the broad exact-phrase query.
    pub async fn search(
        &self,
        terms: &[String],
        phrase: &str,
        context: Option<&CompanyContext>,
    ) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();

        if let Some(ctx) = context {
            if !ctx.primary_chapters.is_empty() {
                let (batch, report) = self
                    .run_query(
                        QueryKind::Focused,
                        self.store.query_by_chapter_and_terms(
                            &ctx.primary_chapters,
                            terms,
                            self.policy.focused_limit,
                        ),
                    )
                    .await;
                accumulate(&mut outcome, &mut seen, batch, report);
            }

            if seen.len() < self.policy.min_results && !ctx.secondary_chapters.is_empty() {
                let (batch, report) = self
                    .run_query(
                        QueryKind::Secondary,
                        self.store.query_by_chapter_and_terms(
                            &ctx.secondary_chapters,
                            terms,
                            self.policy.secondary_limit,
                        ),
                    )
                    .await;
                accumulate(&mut outcome, &mut seen, batch, report);
            }
        }

        if context.is_none() || seen.len() < self.policy.min_results {
            let (exact, keyword) = tokio::join!(
                self.run_query(
                    QueryKind::ExactPhrase,
                    self.store
                        .query_exact_phrase(phrase, self.policy.exact_phrase_limit),
                ),
                self.run_query(
                    QueryKind::Keyword,
                    self.store.query_by_terms(terms, self.policy.keyword_limit),
                ),
            );
            accumulate(&mut outcome, &mut seen, exact.0, exact.1);
            accumulate(&mut outcome, &mut seen, keyword.0, keyword.1);
        } else {
            debug!(
                distinct = seen.len(),
                min_results = self.policy.min_results,
                "chapter tiers sufficient, skipping broad search"
            );
        }

        outcome
    }

    async fn run_query<F>(&self, kind: QueryKind, query: F) -> (QueryBatch, QueryReport)
    where
        F: Future<Output = Result<Vec<CatalogRecord>>>,
    {
        let start = Instant::now();
        let timeout = self.policy.query_timeout;
        let result = tokio::time::timeout(timeout, query).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let (records, fault) = match result {
            Ok(Ok(records)) => {
                debug!(query = kind.as_str(), records = records.len(), elapsed_ms, "query returned");
                (records, None)
            }
            Ok(Err(e)) => {
                let fault = Fault::unavailable(kind.as_str(), &e);
                warn!(query = kind.as_str(), error = %fault, "query failed, treating as empty");
                (Vec::new(), Some(fault))
            }
            Err(_) => {
                let fault = Fault::timeout(kind.as_str(), timeout);
                warn!(query = kind.as_str(), error = %fault, "query timed out, treating as empty");
                (Vec::new(), Some(fault))
            }
        };

        let report = QueryReport {
            kind,
            records: records.len(),
            fault,
            elapsed_ms,
        };
        (QueryBatch { kind, records }, report)
    }
}

fn accumulate(
    outcome: &mut SearchOutcome,
    seen: &mut HashSet<String>,
    batch: QueryBatch,
    report: QueryReport,
) {
    for r in &batch.records {
        seen.insert(r.code.clone());
    }
    outcome.batches.push(batch);
    outcome.reports.push(report);
}
