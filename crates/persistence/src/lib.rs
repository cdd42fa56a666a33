#![deny(warnings)]

//! Persistence layer: strategic plans and their growth-share matrix document.
//!
//! The matrix is stored whole, as one JSON field on the plan's analysis-tools
//! row. Saves overwrite that field (last write wins); loads rehydrate it into
//! a consistent [`BcgMatrix`].

use chrono::Utc;
use plan_core::BcgMatrix;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by the plan store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("plan {0} not found")]
    PlanNotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("matrix document error: {0}")]
    Document(#[from] serde_json::Error),
    #[error("database directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored strategic plan.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct PlanRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/main.db"
}

/// Create the parent directory of a file-backed SQLite URL so SQLite can
/// create the database file. In-memory URLs are left alone.
pub fn ensure_db_dir(url: &str) -> std::io::Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path.filter(|p| !p.contains(":memory:")) {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Open (creating if missing) the database at `url` and run migrations.
///
/// In-memory databases get a single connection so every query sees the same
/// database.
pub async fn init_db(url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool_options = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };
    let pool = pool_options.connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(url, "plan store ready");
    Ok(pool)
}

/// Like [`init_db`], first creating the directory of a file-backed database.
pub async fn open_store(url: &str) -> Result<SqlitePool, StoreError> {
    ensure_db_dir(url)?;
    init_db(url).await
}

/// Create a plan and return its id.
pub async fn create_plan(
    pool: &SqlitePool,
    title: &str,
    description: Option<&str>,
) -> Result<i64, StoreError> {
    let id = sqlx::query(
        "INSERT INTO strategic_plans (title, description, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(title)
    .bind(description)
    .bind(now())
    .execute(pool)
    .await?
    .last_insert_rowid();
    info!(plan_id = id, title, "created plan");
    Ok(id)
}

pub async fn get_plan(pool: &SqlitePool, plan_id: i64) -> Result<Option<PlanRecord>, StoreError> {
    let plan = sqlx::query_as::<_, PlanRecord>(
        "SELECT id, title, description, created_at, updated_at FROM strategic_plans WHERE id = ?1",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;
    Ok(plan)
}

pub async fn list_plans(pool: &SqlitePool) -> Result<Vec<PlanRecord>, StoreError> {
    let plans = sqlx::query_as::<_, PlanRecord>(
        "SELECT id, title, description, created_at, updated_at FROM strategic_plans ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(plans)
}

/// Store the whole matrix document on a plan, replacing any previous one.
pub async fn save_bcg_matrix(
    pool: &SqlitePool,
    plan_id: i64,
    matrix: &BcgMatrix,
) -> Result<(), StoreError> {
    if get_plan(pool, plan_id).await?.is_none() {
        return Err(StoreError::PlanNotFound(plan_id));
    }
    let document = serde_json::to_string(matrix)?;
    let ts = now();
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO analysis_tools (strategic_plan_id, bcg_matrix_data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(strategic_plan_id) DO UPDATE SET
             bcg_matrix_data = excluded.bcg_matrix_data,
             updated_at = excluded.updated_at",
    )
    .bind(plan_id)
    .bind(&document)
    .bind(&ts)
    .execute(&mut *tx)
    .await?;
    sqlx::query("UPDATE strategic_plans SET updated_at = ?1 WHERE id = ?2")
        .bind(&ts)
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(plan_id, bytes = document.len(), "saved growth-share matrix");
    Ok(())
}

/// Load a plan's matrix. `None` when the plan has no saved matrix yet.
pub async fn load_bcg_matrix(
    pool: &SqlitePool,
    plan_id: i64,
) -> Result<Option<BcgMatrix>, StoreError> {
    if get_plan(pool, plan_id).await?.is_none() {
        return Err(StoreError::PlanNotFound(plan_id));
    }
    let stored: Option<Option<String>> = sqlx::query_scalar(
        "SELECT bcg_matrix_data FROM analysis_tools WHERE strategic_plan_id = ?1",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;
    match stored.flatten() {
        Some(text) => {
            debug!(plan_id, "loading growth-share matrix");
            Ok(Some(serde_json::from_str(&text)?))
        }
        None => Ok(None),
    }
}
