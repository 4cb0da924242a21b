//! JSONL import of catalog records and company profiles.
//!
//! One JSON object per line. Blank lines are ignored. Lines that fail to
//! parse, or catalog rows that violate record invariants (non-numeric code
//! prefix, negative rate, preferential rate above base), are skipped and
//! counted rather than aborting the import.
//!
//! ```text
//! {"code":"8518.30","description":"Headphones and earphones","base_rate":4.9,"preferential_rate":0.0,"trade_volume":120000}
//! {"company_id":"acme","primary_chapters":[85],"keyword_priorities":{"wireless":8}}
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::BufRead;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{CatalogRecord, CompanyContext};
use crate::sqlite_store::{SqliteCatalog, SqliteContexts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Catalog,
    Contexts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Deserialize)]
struct CatalogRow {
    code: String,
    description: String,
    base_rate: f64,
    #[serde(default)]
    preferential_rate: f64,
    #[serde(default)]
    trade_volume: u64,
}

#[derive(Deserialize)]
struct ContextRow {
    company_id: String,
    #[serde(flatten)]
    context: CompanyContext,
}

pub async fn run_import(config: &Config, kind: ImportKind, path: &Path) -> Result<ImportSummary> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open import file: {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;

    let summary = match kind {
        ImportKind::Catalog => {
            let (records, skipped) = parse_catalog(reader)?;
            let imported = SqliteCatalog::new(pool.clone())
                .upsert_records(&records)
                .await?;
            ImportSummary { imported, skipped }
        }
        ImportKind::Contexts => {
            let (rows, skipped) = parse_contexts(reader)?;
            let store = SqliteContexts::new(pool.clone());
            for (company_id, context) in &rows {
                store.upsert(company_id, context).await?;
            }
            ImportSummary {
                imported: rows.len(),
                skipped,
            }
        }
    };

    info!(
        path = %path.display(),
        imported = summary.imported,
        skipped = summary.skipped,
        "import finished"
    );

    pool.close().await;
    Ok(summary)
}

/// Parse catalog JSONL into valid records plus a count of skipped lines.
pub fn parse_catalog(reader: impl BufRead) -> Result<(Vec<CatalogRecord>, usize)> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: CatalogRow = match serde_json::from_str(&line) {
            Ok(row) => row,
            Err(e) => {
                warn!(line = i + 1, error = %e, "skipping malformed catalog row");
                skipped += 1;
                continue;
            }
        };
        match CatalogRecord::new(
            row.code.trim(),
            row.description,
            row.base_rate,
            row.preferential_rate,
            row.trade_volume,
        ) {
            Some(record) => records.push(record),
            None => {
                warn!(line = i + 1, code = %row.code, "skipping invalid catalog record");
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

/// Parse company profile JSONL into `(company_id, context)` pairs plus a
/// count of skipped lines.
pub fn parse_contexts(reader: impl BufRead) -> Result<(Vec<(String, CompanyContext)>, usize)> {
    let mut rows = Vec::new();
    let mut skipped = 0;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ContextRow>(&line) {
            Ok(row) if !row.company_id.trim().is_empty() => {
                rows.push((row.company_id, row.context));
            }
            Ok(_) => {
                warn!(line = i + 1, "skipping context row without company_id");
                skipped += 1;
            }
            Err(e) => {
                warn!(line = i + 1, error = %e, "skipping malformed context row");
                skipped += 1;
            }
        }
    }

    Ok((rows, skipped))
}
