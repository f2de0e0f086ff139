//! Database initialization
//!
//! Creates the MQT schema on first run and opens existing databases without
//! touching their data. Every `CREATE` is idempotent, so initialization is
//! safe to run on each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Schema version written by this build
pub const SCHEMA_VERSION: i32 = 1;

/// Milliseconds SQLite waits on a locked database before failing
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Open (or create) the database at `db_path` and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection options apply to every pooled connection, unlike a one-off PRAGMA
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to a single connection that is never recycled: each SQLite
/// in-memory connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes, then record the schema version
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_categories_table(pool).await?;
    create_items_table(pool).await?;
    create_import_history_table(pool).await?;
    create_import_items_table(pool).await?;
    create_validation_rules_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Categories are unique per (construction, code); the import pipeline's
/// insert-or-ignore relies on this constraint.
pub async fn create_categories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mqt_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            construction_id INTEGER NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 999,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (construction_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mqt_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            construction_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL REFERENCES mqt_categories(id),
            code TEXT NOT NULL,
            item_type TEXT,
            subtype TEXT,
            zone TEXT,
            description TEXT NOT NULL,
            unit TEXT NOT NULL,
            quantity REAL NOT NULL,
            unit_price REAL,
            total_price REAL,
            supplier TEXT,
            notes TEXT,
            sort_order INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mqt_items_construction_order ON mqt_items(construction_id, sort_order)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_import_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mqt_import_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            construction_id INTEGER NOT NULL,
            imported_by INTEGER,
            source TEXT NOT NULL CHECK (source IN ('excel', 'sheets')),
            file_name TEXT,
            sheets_url TEXT,
            items_imported INTEGER NOT NULL,
            items_success INTEGER NOT NULL DEFAULT 0,
            items_error INTEGER NOT NULL DEFAULT 0,
            error_log TEXT NOT NULL DEFAULT '[]',
            imported_at TEXT NOT NULL,
            reverted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// No foreign key on `mqt_item_id`: join rows outlive the items they name
/// so a reverted batch keeps its audit trail.
pub async fn create_import_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mqt_import_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            import_id INTEGER NOT NULL REFERENCES mqt_import_history(id),
            mqt_item_id INTEGER NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mqt_import_items_import ON mqt_import_items(import_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_validation_rules_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mqt_validation_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            construction_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            rule_type TEXT NOT NULL CHECK (rule_type IN (
                'price_min', 'price_max', 'code_pattern',
                'quantity_min', 'quantity_max', 'duplicate_check'
            )),
            field TEXT NOT NULL,
            condition TEXT NOT NULL,
            severity TEXT NOT NULL CHECK (severity IN ('error', 'warning', 'info')),
            message TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            category TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
