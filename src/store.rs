//! Storage abstractions consumed by the engine.
//!
//! The [`CatalogStore`] trait is the read-only view of the reference
//! catalog; the [`ContextProvider`] trait supplies optional company
//! profiles. Both enable pluggable backends (SQLite, in-memory) and must be
//! `Send + Sync` to be shared across in-flight requests.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`query_by_chapter_and_terms`](CatalogStore::query_by_chapter_and_terms) | Keyword-OR match scoped to chapters |
//! | [`query_exact_phrase`](CatalogStore::query_exact_phrase) | Case-insensitive substring match |
//! | [`query_by_terms`](CatalogStore::query_by_terms) | Keyword-OR match across the catalog |
//! | [`get_context`](ContextProvider::get_context) | Company profile lookup |
//!
//! All catalog queries return an empty list on no match. An `Err` is a
//! transient failure that the tiered executor downgrades to zero records.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CatalogRecord, CompanyContext};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Records whose chapter is in `chapters` and whose description matches
    /// any of `terms`.
    async fn query_by_chapter_and_terms(
        &self,
        chapters: &[u16],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<CatalogRecord>>;

    /// Records whose description contains `phrase`, ignoring case.
    async fn query_exact_phrase(&self, phrase: &str, limit: usize) -> Result<Vec<CatalogRecord>>;

    /// Records whose description matches any of `terms`.
    async fn query_by_terms(&self, terms: &[String], limit: usize) -> Result<Vec<CatalogRecord>>;
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// `Ok(None)` is the normal outcome for companies without a profile.
    async fn get_context(&self, company_id: &str) -> Result<Option<CompanyContext>>;
}

/// Provider for deployments without company profiles.
pub struct NoContext;

#[async_trait]
impl ContextProvider for NoContext {
    async fn get_context(&self, _company_id: &str) -> Result<Option<CompanyContext>> {
        Ok(None)
    }
}
