//! Core data models used throughout the classifier.
//!
//! These types represent the catalog rows, company search profiles, and
//! ranked results that flow through the classification pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One classification entry in the reference catalog.
///
/// Records are owned by the catalog store and never mutated by the engine.
/// `chapter` is derived from `code` (see [`chapter_of`]) and is not stored
/// as independent truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub code: String,
    pub description: String,
    pub chapter: u16,
    pub base_rate: f64,
    pub preferential_rate: f64,
    pub trade_volume: u64,
}

impl CatalogRecord {
    /// Build a record, deriving its chapter from the code.
    ///
    /// Returns `None` when the code has no two-digit numeric prefix, a rate
    /// is negative or non-finite, or the preferential rate exceeds the base
    /// rate.
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        base_rate: f64,
        preferential_rate: f64,
        trade_volume: u64,
    ) -> Option<Self> {
        let code = code.into();
        let chapter = chapter_of(&code)?;
        if !base_rate.is_finite() || !preferential_rate.is_finite() {
            return None;
        }
        if base_rate < 0.0 || preferential_rate < 0.0 || preferential_rate > base_rate {
            return None;
        }
        Some(Self {
            code,
            description: description.into(),
            chapter,
            base_rate,
            preferential_rate,
            trade_volume,
        })
    }
}

/// Derive the two-digit chapter number from a classification code.
///
/// Separators such as `.` or spaces are skipped, so `"7318.15"` and
/// `"731815"` both yield chapter 73.
pub fn chapter_of(code: &str) -> Option<u16> {
    let mut digits = code.chars().filter(|c| !matches!(c, '.' | ' ' | '-'));
    let first = digits.next()?.to_digit(10)?;
    let second = digits.next()?.to_digit(10)?;
    Some((first * 10 + second) as u16)
}

/// A company's point-in-time search-priority profile.
///
/// Produced by an offline analysis job and read fresh per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyContext {
    /// Highest priority first.
    #[serde(default)]
    pub primary_chapters: Vec<u16>,
    #[serde(default)]
    pub secondary_chapters: Vec<u16>,
    /// Term → weight in `0..=10`.
    #[serde(default)]
    pub keyword_priorities: HashMap<String, f64>,
    #[serde(default)]
    pub material_focus: Vec<String>,
    /// Phrases may use `_` between words, e.g. `automotive_electrical`.
    #[serde(default)]
    pub application_focus: Vec<String>,
}

impl CompanyContext {
    pub fn is_primary_chapter(&self, chapter: u16) -> bool {
        self.primary_chapters.contains(&chapter)
    }

    /// Weight for a term, `0.0` when the profile does not mention it.
    pub fn keyword_weight(&self, term: &str) -> f64 {
        self.keyword_priorities.get(term).copied().unwrap_or(0.0)
    }
}

/// A single classification request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub raw_text: String,
    pub company_id: Option<String>,
    pub max_results: usize,
}

impl SearchRequest {
    pub const DEFAULT_MAX_RESULTS: usize = 10;

    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            company_id: None,
            max_results: Self::DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Why a result was retrieved. Derived from which bonuses applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactPhrase,
    Keyword,
    ContextChapter,
    Semantic,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactPhrase => "exact_phrase",
            MatchType::Keyword => "keyword",
            MatchType::ContextChapter => "context_chapter",
            MatchType::Semantic => "semantic",
        }
    }
}

/// A ranked candidate returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub code: String,
    pub description: String,
    pub chapter: u16,
    pub base_rate: f64,
    pub preferential_rate: f64,
    /// `max(0, base_rate - preferential_rate)`.
    pub savings: f64,
    pub trade_volume: u64,
    /// Percentage, clamped to the configured floor and ceiling.
    pub confidence: f64,
    /// Unclamped combined score in the unit domain.
    pub relevance: f64,
    pub match_type: MatchType,
    pub matched_terms: usize,
    /// Fraction of extracted terms found in the description.
    pub term_coverage: f64,
}

/// Response of the engine's `classify` entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifyResponse {
    pub results: Vec<ScoredResult>,
    pub used_context: bool,
    pub strategy: String,
}
