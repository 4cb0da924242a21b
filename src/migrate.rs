use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the catalog schema on an open pool. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // `description_norm` holds the normalised description used for
    // exact-phrase matching.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog (
            code TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            description_norm TEXT NOT NULL,
            chapter INTEGER NOT NULL,
            base_rate REAL NOT NULL,
            preferential_rate REAL NOT NULL,
            trade_volume INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS company_context (
            company_id TEXT PRIMARY KEY,
            primary_chapters TEXT NOT NULL DEFAULT '[]',
            secondary_chapters TEXT NOT NULL DEFAULT '[]',
            keyword_priorities TEXT NOT NULL DEFAULT '{}',
            material_focus TEXT NOT NULL DEFAULT '[]',
            application_focus TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='catalog_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE catalog_fts USING fts5(
                code UNINDEXED,
                description
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_catalog_chapter ON catalog(chapter)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_trade_volume ON catalog(trade_volume DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
