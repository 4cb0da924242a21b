use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// All-defaults configuration pointing at the given database.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            retrieval: RetrievalConfig::default(),
            scoring: ScoringConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Tiered search limits and per-query timeouts.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Sufficiency threshold `K`: stop widening once this many distinct
    /// codes have been accumulated.
    #[serde(default = "default_min_results")]
    pub min_results: usize,
    #[serde(default = "default_chapter_limit")]
    pub focused_limit: usize,
    #[serde(default = "default_chapter_limit")]
    pub secondary_limit: usize,
    #[serde(default = "default_exact_phrase_limit")]
    pub exact_phrase_limit: usize,
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
    #[serde(default = "default_min_term_len")]
    pub min_term_len: usize,
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    #[serde(default = "default_max_results_cap")]
    pub max_results_cap: usize,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_context_timeout_ms")]
    pub context_timeout_ms: u64,
}

impl RetrievalConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn context_timeout(&self) -> Duration {
        Duration::from_millis(self.context_timeout_ms)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_results: default_min_results(),
            focused_limit: default_chapter_limit(),
            secondary_limit: default_chapter_limit(),
            exact_phrase_limit: default_exact_phrase_limit(),
            keyword_limit: default_keyword_limit(),
            max_terms: default_max_terms(),
            min_term_len: default_min_term_len(),
            default_max_results: default_max_results(),
            max_results_cap: default_max_results_cap(),
            query_timeout_ms: default_query_timeout_ms(),
            context_timeout_ms: default_context_timeout_ms(),
        }
    }
}

fn default_min_results() -> usize {
    5
}
fn default_chapter_limit() -> usize {
    20
}
fn default_exact_phrase_limit() -> usize {
    10
}
fn default_keyword_limit() -> usize {
    20
}
fn default_max_terms() -> usize {
    8
}
fn default_min_term_len() -> usize {
    3
}
fn default_max_results() -> usize {
    10
}
fn default_max_results_cap() -> usize {
    50
}
fn default_query_timeout_ms() -> u64 {
    3000
}
fn default_context_timeout_ms() -> u64 {
    2000
}

/// Relevance weights. Heuristic defaults; only the clamp range is a hard
/// guarantee of the output.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScoringConfig {
    #[serde(default = "default_position_decay")]
    pub position_decay: f64,
    #[serde(default = "default_term_coverage_weight")]
    pub term_coverage_weight: f64,
    #[serde(default = "default_chapter_bonus")]
    pub chapter_bonus: f64,
    #[serde(default = "default_material_bonus")]
    pub material_bonus: f64,
    #[serde(default = "default_application_bonus")]
    pub application_bonus: f64,
    #[serde(default = "default_exact_phrase_bonus")]
    pub exact_phrase_bonus: f64,
    /// Percentage domain.
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
    /// Percentage domain.
    #[serde(default = "default_confidence_ceiling")]
    pub confidence_ceiling: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            position_decay: default_position_decay(),
            term_coverage_weight: default_term_coverage_weight(),
            chapter_bonus: default_chapter_bonus(),
            material_bonus: default_material_bonus(),
            application_bonus: default_application_bonus(),
            exact_phrase_bonus: default_exact_phrase_bonus(),
            confidence_floor: default_confidence_floor(),
            confidence_ceiling: default_confidence_ceiling(),
        }
    }
}

fn default_position_decay() -> f64 {
    0.05
}
fn default_term_coverage_weight() -> f64 {
    0.30
}
fn default_chapter_bonus() -> f64 {
    0.30
}
fn default_material_bonus() -> f64 {
    0.15
}
fn default_application_bonus() -> f64 {
    0.20
}
fn default_exact_phrase_bonus() -> f64 {
    0.25
}
fn default_confidence_floor() -> f64 {
    30.0
}
fn default_confidence_ceiling() -> f64 {
    95.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_size: default_cache_max_size(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}
fn default_cache_max_size() -> usize {
    1000
}
fn default_cache_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;

    if r.min_results == 0 {
        anyhow::bail!("retrieval.min_results must be >= 1");
    }

    for (name, limit) in [
        ("focused_limit", r.focused_limit),
        ("secondary_limit", r.secondary_limit),
        ("exact_phrase_limit", r.exact_phrase_limit),
        ("keyword_limit", r.keyword_limit),
        ("max_terms", r.max_terms),
    ] {
        if limit == 0 {
            anyhow::bail!("retrieval.{} must be >= 1", name);
        }
    }

    if r.default_max_results == 0 || r.default_max_results > r.max_results_cap {
        anyhow::bail!(
            "retrieval.default_max_results must be in [1, {}]",
            r.max_results_cap
        );
    }

    if r.query_timeout_ms == 0 || r.context_timeout_ms == 0 {
        anyhow::bail!("retrieval timeouts must be > 0");
    }

    // Validate scoring
    let s = &config.scoring;
    for (name, weight) in [
        ("position_decay", s.position_decay),
        ("term_coverage_weight", s.term_coverage_weight),
        ("chapter_bonus", s.chapter_bonus),
        ("material_bonus", s.material_bonus),
        ("application_bonus", s.application_bonus),
        ("exact_phrase_bonus", s.exact_phrase_bonus),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            anyhow::bail!("scoring.{} must be a finite value >= 0", name);
        }
    }

    if !(0.0..=100.0).contains(&s.confidence_floor)
        || !(0.0..=100.0).contains(&s.confidence_ceiling)
        || s.confidence_floor >= s.confidence_ceiling
    {
        anyhow::bail!(
            "scoring.confidence_floor must be below scoring.confidence_ceiling, both in [0, 100]"
        );
    }

    if config.cache.max_size == 0 {
        anyhow::bail!("cache.max_size must be >= 1");
    }

    Ok(())
}
