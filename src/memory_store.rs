//! In-memory [`CatalogStore`] and [`ContextProvider`] implementations.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock` for thread safety.
//! Term queries are a linear scan: a record matches when any term is a
//! substring of its normalised description, and matches are ranked by the
//! number of matched terms. Intended for tests, demos, and small catalogs.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{CatalogRecord, CompanyContext};
use crate::store::{CatalogStore, ContextProvider};
use crate::terms::normalize_text;

struct StoredRecord {
    record: CatalogRecord,
    normalized: String,
}

/// In-memory catalog.
pub struct InMemoryCatalog {
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        let catalog = Self::new();
        for r in records {
            // A fresh lock cannot be poisoned.
            let _ = catalog.upsert(r);
        }
        catalog
    }

    /// Insert or replace a record by code.
    pub fn upsert(&self, record: CatalogRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;
        records.retain(|sr| sr.record.code != record.code);
        let normalized = normalize_text(&record.description);
        records.push(StoredRecord { record, normalized });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn term_matches(
        &self,
        terms: &[String],
        limit: usize,
        chapter_filter: Option<&[u16]>,
    ) -> Result<Vec<CatalogRecord>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;

        let mut matches: Vec<(&CatalogRecord, usize)> = records
            .iter()
            .filter(|sr| chapter_filter.map_or(true, |chs| chs.contains(&sr.record.chapter)))
            .filter_map(|sr| {
                let hits = terms
                    .iter()
                    .filter(|t| sr.normalized.contains(t.as_str()))
                    .count();
                (hits > 0).then_some((&sr.record, hits))
            })
            .collect();

        matches.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(b.0.trade_volume.cmp(&a.0.trade_volume))
                .then(a.0.code.cmp(&b.0.code))
        });
        matches.truncate(limit);

        Ok(matches.into_iter().map(|(r, _)| r.clone()).collect())
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn query_by_chapter_and_terms(
        &self,
        chapters: &[u16],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<CatalogRecord>> {
        if chapters.is_empty() {
            return Ok(Vec::new());
        }
        self.term_matches(terms, limit, Some(chapters))
    }

    async fn query_exact_phrase(&self, phrase: &str, limit: usize) -> Result<Vec<CatalogRecord>> {
        let needle = normalize_text(phrase);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;

        let mut matches: Vec<&CatalogRecord> = records
            .iter()
            .filter(|sr| sr.normalized.contains(&needle))
            .map(|sr| &sr.record)
            .collect();
        matches.sort_by(|a, b| {
            b.trade_volume
                .cmp(&a.trade_volume)
                .then(a.code.cmp(&b.code))
        });
        matches.truncate(limit);

        Ok(matches.into_iter().cloned().collect())
    }

    async fn query_by_terms(&self, terms: &[String], limit: usize) -> Result<Vec<CatalogRecord>> {
        self.term_matches(terms, limit, None)
    }
}

/// In-memory company profiles keyed by company id.
pub struct InMemoryContexts {
    contexts: RwLock<HashMap<String, CompanyContext>>,
}

impl InMemoryContexts {
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, company_id: impl Into<String>, context: CompanyContext) -> Result<()> {
        let mut contexts = self
            .contexts
            .write()
            .map_err(|_| anyhow!("context lock poisoned"))?;
        contexts.insert(company_id.into(), context);
        Ok(())
    }
}

impl Default for InMemoryContexts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextProvider for InMemoryContexts {
    async fn get_context(&self, company_id: &str) -> Result<Option<CompanyContext>> {
        let contexts = self
            .contexts
            .read()
            .map_err(|_| anyhow!("context lock poisoned"))?;
        Ok(contexts.get(company_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(code: &str, desc: &str, volume: u64) -> CatalogRecord {
        CatalogRecord::new(code, desc, 5.0, 0.0, volume).unwrap()
    }

    fn terms(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|t| t.to_string()).collect()
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_records(vec![
            rec("7318.15", "Threaded steel bolts and screws", 900),
            rec("7318.16", "Steel nuts", 400),
            rec("8518.30", "Headphones and earphones, wireless bluetooth", 1200),
            rec("7208.10", "Flat-rolled steel products", 2000),
        ])
    }

    #[tokio::test]
    async fn test_terms_rank_by_hits_then_volume() {
        let c = catalog();
        let got = c
            .query_by_terms(&terms(&["steel", "bolts"]), 10)
            .await
            .unwrap();
        let codes: Vec<&str> = got.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["7318.15", "7208.10", "7318.16"]);
    }

    #[tokio::test]
    async fn test_chapter_scope() {
        let c = catalog();
        let got = c
            .query_by_chapter_and_terms(&[72], &terms(&["steel"]), 10)
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].code, "7208.10");

        let none = c
            .query_by_chapter_and_terms(&[], &terms(&["steel"]), 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_exact_phrase_ignores_case_and_punctuation() {
        let c = catalog();
        let got = c.query_exact_phrase("Wireless Bluetooth", 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].code, "8518.30");
    }

    #[tokio::test]
    async fn test_limit_and_empty_terms() {
        let c = catalog();
        assert_eq!(c.query_by_terms(&terms(&["steel"]), 2).await.unwrap().len(), 2);
        assert!(c.query_by_terms(&[], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_code() {
        let c = catalog();
        c.upsert(rec("7318.16", "Steel nuts, hexagonal", 450)).unwrap();
        assert_eq!(c.len(), 4);
        let got = c.query_exact_phrase("hexagonal", 10).await.unwrap();
        assert_eq!(got[0].trade_volume, 450);
    }

    #[tokio::test]
    async fn test_contexts_lookup() {
        let p = InMemoryContexts::new();
        p.insert(
            "acme",
            CompanyContext {
                primary_chapters: vec![73],
                ..Default::default()
            },
        )
        .unwrap();
        assert!(p.get_context("acme").await.unwrap().is_some());
        assert!(p.get_context("other").await.unwrap().is_none());
    }
}
