//! SQLite-backed [`CatalogStore`] and [`ContextProvider`] implementations.
//!
//! Keyword queries go through the `catalog_fts` FTS5 table, one prefix
//! term per extracted term joined with `OR`, ordered by bm25 rank then
//! trade volume. Exact-phrase queries use `LIKE` over the normalised
//! description column. Company profiles live in `company_context` with
//! JSON-encoded list and map columns.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{CatalogRecord, CompanyContext};
use crate::store::{CatalogStore, ContextProvider};
use crate::terms::normalize_text;

const RECORD_COLUMNS: &str =
    "c.code, c.description, c.chapter, c.base_rate, c.preferential_rate, c.trade_volume";

/// SQLite implementation of [`CatalogStore`].
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace records by code in a single transaction, keeping
    /// `catalog_fts` in sync. Returns the number of rows written.
    pub async fn upsert_records(&self, records: &[CatalogRecord]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO catalog (code, description, description_norm, chapter,
                                     base_rate, preferential_rate, trade_volume, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(code) DO UPDATE SET
                    description = excluded.description,
                    description_norm = excluded.description_norm,
                    chapter = excluded.chapter,
                    base_rate = excluded.base_rate,
                    preferential_rate = excluded.preferential_rate,
                    trade_volume = excluded.trade_volume,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&record.code)
            .bind(&record.description)
            .bind(normalize_text(&record.description))
            .bind(record.chapter as i64)
            .bind(record.base_rate)
            .bind(record.preferential_rate)
            .bind(i64::try_from(record.trade_volume).unwrap_or(i64::MAX))
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM catalog_fts WHERE code = ?")
                .bind(&record.code)
                .execute(&mut *tx)
                .await?;

            sqlx::query("INSERT INTO catalog_fts (code, description) VALUES (?, ?)")
                .bind(&record.code)
                .bind(&record.description)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    async fn fts_query(
        &self,
        chapters: Option<&[u16]>,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<CatalogRecord>> {
        let Some(expr) = fts_match_expr(terms) else {
            return Ok(Vec::new());
        };

        let chapter_clause = match chapters {
            Some(chs) => format!(
                " AND c.chapter IN ({})",
                vec!["?"; chs.len()].join(", ")
            ),
            None => String::new(),
        };
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM catalog_fts
            JOIN catalog c ON c.code = catalog_fts.code
            WHERE catalog_fts MATCH ?{chapter_clause}
            ORDER BY catalog_fts.rank, c.trade_volume DESC, c.code
            LIMIT ?
            "#
        );

        let mut query = sqlx::query(&sql).bind(expr);
        for ch in chapters.unwrap_or_default() {
            query = query.bind(*ch as i64);
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn query_by_chapter_and_terms(
        &self,
        chapters: &[u16],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<CatalogRecord>> {
        if chapters.is_empty() {
            return Ok(Vec::new());
        }
        self.fts_query(Some(chapters), terms, limit).await
    }

    async fn query_exact_phrase(&self, phrase: &str, limit: usize) -> Result<Vec<CatalogRecord>> {
        let needle = normalize_text(phrase);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM catalog c
            WHERE c.description_norm LIKE ? ESCAPE '\'
            ORDER BY c.trade_volume DESC, c.code
            LIMIT ?
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(format!("%{}%", escape_like(&needle)))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn query_by_terms(&self, terms: &[String], limit: usize) -> Result<Vec<CatalogRecord>> {
        self.fts_query(None, terms, limit).await
    }
}

fn record_from_row(row: &SqliteRow) -> CatalogRecord {
    let chapter: i64 = row.get("chapter");
    let trade_volume: i64 = row.get("trade_volume");
    CatalogRecord {
        code: row.get("code"),
        description: row.get("description"),
        chapter: chapter.clamp(0, 99) as u16,
        base_rate: row.get("base_rate"),
        preferential_rate: row.get("preferential_rate"),
        trade_volume: trade_volume.max(0) as u64,
    }
}

/// Build an FTS5 expression matching any term as a prefix:
/// `"steel"* OR "bolts"*`. Returns `None` when no usable term remains.
fn fts_match_expr(terms: &[String]) -> Option<String> {
    let parts: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"*", t.replace('"', "\"\"")))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" OR "))
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// SQLite implementation of [`ContextProvider`].
pub struct SqliteContexts {
    pool: SqlitePool,
}

impl SqliteContexts {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, company_id: &str, context: &CompanyContext) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO company_context (company_id, primary_chapters, secondary_chapters,
                                         keyword_priorities, material_focus,
                                         application_focus, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(company_id) DO UPDATE SET
                primary_chapters = excluded.primary_chapters,
                secondary_chapters = excluded.secondary_chapters,
                keyword_priorities = excluded.keyword_priorities,
                material_focus = excluded.material_focus,
                application_focus = excluded.application_focus,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(company_id)
        .bind(serde_json::to_string(&context.primary_chapters)?)
        .bind(serde_json::to_string(&context.secondary_chapters)?)
        .bind(serde_json::to_string(&context.keyword_priorities)?)
        .bind(serde_json::to_string(&context.material_focus)?)
        .bind(serde_json::to_string(&context.application_focus)?)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ContextProvider for SqliteContexts {
    async fn get_context(&self, company_id: &str) -> Result<Option<CompanyContext>> {
        let row = sqlx::query(
            r#"
            SELECT primary_chapters, secondary_chapters, keyword_priorities,
                   material_focus, application_focus
            FROM company_context
            WHERE company_id = ?
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let column = |name: &str| -> Result<String> { Ok(row.try_get::<String, _>(name)?) };
        let context = CompanyContext {
            primary_chapters: serde_json::from_str(&column("primary_chapters")?)
                .context("invalid primary_chapters")?,
            secondary_chapters: serde_json::from_str(&column("secondary_chapters")?)
                .context("invalid secondary_chapters")?,
            keyword_priorities: serde_json::from_str(&column("keyword_priorities")?)
                .context("invalid keyword_priorities")?,
            material_focus: serde_json::from_str(&column("material_focus")?)
                .context("invalid material_focus")?,
            application_focus: serde_json::from_str(&column("application_focus")?)
                .context("invalid application_focus")?,
        };
        Ok(Some(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_expr_quotes_terms() {
        let terms = vec!["steel".to_string(), "bo\"lt".to_string(), " ".to_string()];
        assert_eq!(
            fts_match_expr(&terms).as_deref(),
            Some("\"steel\"* OR \"bo\"\"lt\"*")
        );
        assert!(fts_match_expr(&[]).is_none());
    }

    #[test]
    fn test_like_escaping() {
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
        assert_eq!(escape_like("steel bolts"), "steel bolts");
    }
}
