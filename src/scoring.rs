//! Relevance scoring for combined catalog candidates.
//!
//! # Scoring Algorithm
//!
//! Additive, starting from a position-decay base. With the default weights:
//!
//! 1. Base: `1 − position × 0.05` (may go negative for late positions).
//! 2. Term coverage: `matched / total × 0.30`.
//! 3. Context chapter: `+0.30` when the chapter is a primary chapter.
//! 4. Material focus: `+0.15` when any material keyword is in the description.
//! 5. Application focus: `+0.20` when every word of some application phrase
//!    is in the description.
//! 6. Exact phrase: `+0.25` when the normalised request text is a substring
//!    of the normalised description.
//!
//! The sum is the unclamped `relevance`; `confidence` is `relevance × 100`
//! clamped to `[confidence_floor, confidence_ceiling]` (30–95 by default).
//!
//! The scorer never sorts. Callers score the full combined set first and
//! then order it once with [`sort_results`].

use std::cmp::Ordering;

use crate::config::ScoringConfig;
use crate::models::{CatalogRecord, CompanyContext, MatchType, ScoredResult};
use crate::terms::normalize_text;

pub struct Scorer {
    weights: ScoringConfig,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl Scorer {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringConfig {
        &self.weights
    }

    pub fn score(
        &self,
        record: &CatalogRecord,
        terms: &[String],
        context: Option<&CompanyContext>,
        original_text: &str,
        position: usize,
    ) -> ScoredResult {
        let w = &self.weights;
        let description = normalize_text(&record.description);

        let mut relevance = 1.0 - position as f64 * w.position_decay;

        let matched_terms = terms
            .iter()
            .filter(|t| description.contains(t.as_str()))
            .count();
        let term_coverage = if terms.is_empty() {
            0.0
        } else {
            matched_terms as f64 / terms.len() as f64
        };
        relevance += term_coverage * w.term_coverage_weight;

        let mut chapter_hit = false;
        if let Some(ctx) = context {
            if ctx.is_primary_chapter(record.chapter) {
                chapter_hit = true;
                relevance += w.chapter_bonus;
            }
            if material_matches(ctx, &description) {
                relevance += w.material_bonus;
            }
            if application_matches(ctx, &description) {
                relevance += w.application_bonus;
            }
        }

        let phrase = normalize_text(original_text);
        let exact_hit = !phrase.is_empty() && description.contains(&phrase);
        if exact_hit {
            relevance += w.exact_phrase_bonus;
        }

        let match_type = if exact_hit {
            MatchType::ExactPhrase
        } else if chapter_hit {
            MatchType::ContextChapter
        } else if matched_terms > 0 {
            MatchType::Keyword
        } else {
            MatchType::Semantic
        };

        ScoredResult {
            code: record.code.clone(),
            description: record.description.clone(),
            chapter: record.chapter,
            base_rate: record.base_rate,
            preferential_rate: record.preferential_rate,
            savings: (record.base_rate - record.preferential_rate).max(0.0),
            trade_volume: record.trade_volume,
            confidence: self.clamp_confidence(relevance),
            relevance,
            match_type,
            matched_terms,
            term_coverage,
        }
    }

    /// Score every record by its position in `records`, then sort.
    pub fn rank(
        &self,
        records: &[CatalogRecord],
        terms: &[String],
        context: Option<&CompanyContext>,
        original_text: &str,
    ) -> Vec<ScoredResult> {
        let mut scored: Vec<ScoredResult> = records
            .iter()
            .enumerate()
            .map(|(i, r)| self.score(r, terms, context, original_text, i))
            .collect();
        sort_results(&mut scored);
        scored
    }

    fn clamp_confidence(&self, relevance: f64) -> f64 {
        let pct = relevance * 100.0;
        if pct.is_nan() {
            return self.weights.confidence_floor;
        }
        pct.clamp(self.weights.confidence_floor, self.weights.confidence_ceiling)
    }
}

fn material_matches(ctx: &CompanyContext, description: &str) -> bool {
    ctx.material_focus.iter().any(|m| {
        let m = normalize_text(m);
        !m.is_empty() && description.contains(&m)
    })
}

fn application_matches(ctx: &CompanyContext, description: &str) -> bool {
    ctx.application_focus.iter().any(|phrase| {
        let words = normalize_text(&phrase.replace('_', " "));
        let mut tokens = words.split(' ').filter(|t| !t.is_empty()).peekable();
        tokens.peek().is_some() && tokens.all(|t| description.contains(t))
    })
}

/// Deterministic result order: confidence desc, relevance desc, trade
/// volume desc, code asc.
///
/// Relevance separates candidates whose confidence saturated at the
/// ceiling or floor.
pub fn compare_results(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then(
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal),
        )
        .then(b.trade_volume.cmp(&a.trade_volume))
        .then(a.code.cmp(&b.code))
}

pub fn sort_results(results: &mut [ScoredResult]) {
    results.sort_by(compare_results);
}
