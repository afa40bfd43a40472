//! Storage layer: SQLite schema and helpers for the labeled URL corpus.
//!
//! Holds DB pool setup, the migration runner and the handful of queries the
//! feature pipeline needs.

pub mod models;

use models::{NewUrl, Source, SourceMetadata, UrlRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("source already exists: {0}")]
    DuplicateSource(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}", norm);
        }
    }
    let connect_opts = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") {
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect_with(connect_opts).await?;
    debug!(url = %url, "sqlite pool ready");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies SQLx migrations located in crates/storage/migrations.
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn insert_source(
    pool: &SqlitePool,
    metadata: &SourceMetadata,
) -> Result<Source, StorageError> {
    let res = sqlx::query_as::<_, Source>(
        "INSERT INTO source (name, url) VALUES (?1, ?2)
         RETURNING id, name, url, created_at, updated_at",
    )
    .bind(&metadata.name)
    .bind(&metadata.url)
    .fetch_one(pool)
    .await;

    match res {
        Ok(source) => Ok(source),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            Err(StorageError::DuplicateSource(metadata.name.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Creates the source, then appends all its URLs in one transaction.
///
/// Every URL is recorded as offline.
pub async fn load_dataset(
    pool: &SqlitePool,
    metadata: &SourceMetadata,
    rows: &[NewUrl],
) -> Result<(Source, u64), StorageError> {
    let source = insert_source(pool, metadata).await?;

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for row in rows {
        let res = sqlx::query(
            "INSERT INTO url (source_id, url, is_phishing, is_online) VALUES (?1, ?2, ?3, 0)",
        )
        .bind(source.id)
        .bind(&row.url)
        .bind(row.is_phishing)
        .execute(&mut *tx)
        .await?;
        inserted += res.rows_affected();
    }
    tx.commit().await?;

    info!(source = %source.name, inserted, "dataset loaded");
    Ok((source, inserted))
}

pub async fn fetch_urls(pool: &SqlitePool) -> Result<Vec<UrlRecord>, StorageError> {
    let rows = sqlx::query_as::<_, UrlRecord>("SELECT * FROM url ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Replaces the feature column of one row. `None` clears it.
///
/// Takes any executor so a batch of updates can share one transaction.
pub async fn set_features<'e, E>(
    executor: E,
    id: i64,
    features: Option<&serde_json::Value>,
) -> Result<(), StorageError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let encoded = features.map(|f| f.to_string());
    sqlx::query(
        "UPDATE url SET features = ?1, updated_at = strftime('%s','now') WHERE id = ?2",
    )
    .bind(encoded)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}
