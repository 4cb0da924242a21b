//! Catalog statistics and cache settings overview.
//!
//! Used by `tclass stats` to confirm an import landed: record and profile
//! counts, the busiest chapters, and the configured cache bounds.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Counts gathered from the catalog database.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStats {
    pub records: i64,
    pub chapters: i64,
    pub contexts: i64,
    /// `(chapter, record count)`, most populated first.
    pub top_chapters: Vec<(i64, i64)>,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<CatalogStats> {
    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog")
        .fetch_one(pool)
        .await?;

    let chapters: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT chapter) FROM catalog")
        .fetch_one(pool)
        .await?;

    let contexts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM company_context")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT chapter, COUNT(*) AS n
        FROM catalog
        GROUP BY chapter
        ORDER BY n DESC, chapter ASC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await?;

    let top_chapters = rows
        .iter()
        .map(|row| (row.get::<i64, _>("chapter"), row.get::<i64, _>("n")))
        .collect();

    Ok(CatalogStats {
        records,
        chapters,
        contexts,
        top_chapters,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Tariff Classifier: Catalog Stats");
    println!("===============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Records:     {}", stats.records);
    println!("  Chapters:    {}", stats.chapters);
    println!("  Profiles:    {}", stats.contexts);
    println!();
    if config.cache.enabled {
        println!(
            "  Cache:       {} entries max, ttl {}s",
            config.cache.max_size, config.cache.ttl_secs
        );
    } else {
        println!("  Cache:       disabled");
    }

    if !stats.top_chapters.is_empty() {
        println!();
        println!("  By chapter:");
        println!("  {:<10} {:>8}", "CHAPTER", "RECORDS");
        println!("  {}", "-".repeat(19));
        for (chapter, n) in &stats.top_chapters {
            println!("  {:<10} {:>8}", format!("{:02}", chapter), n);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
