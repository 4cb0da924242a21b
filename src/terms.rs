//! Search term extraction.
//!
//! Turns free-text product descriptions into a short, ranked list of
//! search terms. Extraction is a pure function of its inputs and never
//! fails: trivial input yields an empty list, which callers treat as
//! "no searchable signal".

use crate::config::RetrievalConfig;
use crate::models::CompanyContext;

/// Lowercase, replace punctuation with spaces, and collapse whitespace.
///
/// Letters, digits and `_` are kept. The same normalisation is applied to
/// catalog descriptions before substring checks so both sides compare
/// like for like.
pub fn normalize_text(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Term extraction limits.
#[derive(Debug, Clone, Copy)]
pub struct TermExtractor {
    pub max_terms: usize,
    pub min_term_len: usize,
}

impl Default for TermExtractor {
    fn default() -> Self {
        Self {
            max_terms: 8,
            min_term_len: 3,
        }
    }
}

impl From<&RetrievalConfig> for TermExtractor {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            max_terms: cfg.max_terms,
            min_term_len: cfg.min_term_len,
        }
    }
}

impl TermExtractor {
    /// Tokenize and filter, without applying any context weighting.
    ///
    /// Drops short and pure-numeric tokens and repeated tokens (first
    /// occurrence wins). The result is not yet truncated so a later
    /// [`prioritize`](Self::prioritize) can promote context keywords that
    /// appear late in the text.
    pub fn tokenize(&self, raw: &str) -> Vec<String> {
        let normalized = normalize_text(raw);
        let mut terms: Vec<String> = Vec::new();
        for token in normalized.split(' ') {
            if token.chars().count() < self.min_term_len {
                continue;
            }
            if token.chars().all(|c| c.is_numeric()) {
                continue;
            }
            if terms.iter().any(|t| t == token) {
                continue;
            }
            terms.push(token.to_string());
        }
        terms
    }

    /// Reorder by context keyword weight and truncate to `max_terms`.
    ///
    /// The sort is stable: terms with equal weight (including all unknown
    /// terms, weighted 0) keep their original order.
    pub fn prioritize(&self, mut terms: Vec<String>, context: Option<&CompanyContext>) -> Vec<String> {
        if let Some(ctx) = context {
            if !ctx.keyword_priorities.is_empty() {
                terms.sort_by(|a, b| {
                    ctx.keyword_weight(b)
                        .partial_cmp(&ctx.keyword_weight(a))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }
        terms.truncate(self.max_terms);
        terms
    }

    pub fn extract(&self, raw: &str, context: Option<&CompanyContext>) -> Vec<String> {
        self.prioritize(self.tokenize(raw), context)
    }
}

/// Extract terms with the default limits.
pub fn extract_terms(raw: &str, context: Option<&CompanyContext>) -> Vec<String> {
    TermExtractor::default().extract(raw, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_collapses() {
        assert_eq!(
            normalize_text("  Wireless,  Bluetooth-Headphones!! "),
            "wireless bluetooth headphones"
        );
        assert_eq!(normalize_text("stainless_steel\tbolts"), "stainless_steel bolts");
        assert_eq!(normalize_text("...  "), "");
    }

    #[test]
    fn test_drops_short_and_numeric_tokens() {
        let terms = extract_terms("10 mm steel bolts M8 2024 a", None);
        assert_eq!(terms, vec!["steel", "bolts"]);
    }

    #[test]
    fn test_keeps_alphanumeric_tokens() {
        let terms = extract_terms("18awg copper wire", None);
        assert_eq!(terms, vec!["18awg", "copper", "wire"]);
    }

    #[test]
    fn test_empty_and_trivial_input_yields_nothing() {
        assert!(extract_terms("", None).is_empty());
        assert!(extract_terms("   \n\t ", None).is_empty());
        assert!(extract_terms("a of 42 !!", None).is_empty());
    }

    #[test]
    fn test_truncates_to_max_terms() {
        let terms = extract_terms(
            "alpha bravo charlie delta echo foxtrot golf hotel india juliet",
            None,
        );
        assert_eq!(terms.len(), 8);
        assert_eq!(terms.last().map(String::as_str), Some("hotel"));
    }

    #[test]
    fn test_deduplicates_keeping_first() {
        let terms = extract_terms("steel bolts steel nuts", None);
        assert_eq!(terms, vec!["steel", "bolts", "nuts"]);
    }

    #[test]
    fn test_context_priorities_reorder_stably() {
        let mut ctx = CompanyContext::default();
        ctx.keyword_priorities.insert("harness".to_string(), 9.0);
        ctx.keyword_priorities.insert("wire".to_string(), 4.0);

        let terms = extract_terms("dashboard wire harness assembly", Some(&ctx));
        assert_eq!(terms, vec!["harness", "wire", "dashboard", "assembly"]);
    }

    #[test]
    fn test_context_keyword_survives_truncation() {
        let mut ctx = CompanyContext::default();
        ctx.keyword_priorities.insert("kilo".to_string(), 10.0);

        let terms = extract_terms(
            "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo",
            Some(&ctx),
        );
        assert_eq!(terms.len(), 8);
        assert_eq!(terms[0], "kilo");
    }

    #[test]
    fn test_context_without_priorities_keeps_order() {
        let ctx = CompanyContext {
            primary_chapters: vec![73],
            ..Default::default()
        };
        assert_eq!(
            extract_terms("steel bolts", Some(&ctx)),
            vec!["steel", "bolts"]
        );
    }
}
