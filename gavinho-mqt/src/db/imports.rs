//! Import history database operations
//!
//! One `mqt_import_history` row per import call and one `mqt_import_items`
//! row per item it created. Revert reads the join rows; neither table is
//! cleared by a revert.

use gavinho_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};

use super::{parse_timestamp, timestamp_now};
use crate::models::{ImportBatch, ImportSource, RowFailure};

/// Values recorded when a batch starts
#[derive(Debug, Clone)]
pub struct NewImportBatch<'a> {
    pub construction_id: i64,
    pub imported_by: Option<i64>,
    pub source: ImportSource,
    pub file_name: Option<&'a str>,
    pub sheets_url: Option<&'a str>,
    /// Rows submitted with the call
    pub items_imported: i64,
}

const BATCH_COLUMNS: &str = r#"
    id, construction_id, imported_by, source, file_name, sheets_url,
    items_imported, items_success, items_error, error_log, imported_at, reverted_at
"#;

pub async fn create_import_batch(pool: &SqlitePool, batch: &NewImportBatch<'_>) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO mqt_import_history (
            construction_id, imported_by, source, file_name, sheets_url,
            items_imported, imported_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(batch.construction_id)
    .bind(batch.imported_by)
    .bind(batch.source.as_str())
    .bind(batch.file_name)
    .bind(batch.sheets_url)
    .bind(batch.items_imported)
    .bind(timestamp_now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Link an item to the batch that created it
pub async fn record_import_item<'e, E: SqliteExecutor<'e>>(
    executor: E,
    import_id: i64,
    item_id: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO mqt_import_items (import_id, mqt_item_id) VALUES (?, ?)")
        .bind(import_id)
        .bind(item_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Store the per-row results once the batch has been processed
pub async fn finish_import_batch(
    pool: &SqlitePool,
    import_id: i64,
    items_success: usize,
    failures: &[RowFailure],
) -> Result<()> {
    let error_log = serde_json::to_string(failures)
        .map_err(|e| Error::Internal(format!("Failed to serialize error log: {}", e)))?;

    sqlx::query(
        r#"
        UPDATE mqt_import_history
        SET items_success = ?, items_error = ?, error_log = ?
        WHERE id = ?
        "#,
    )
    .bind(items_success as i64)
    .bind(failures.len() as i64)
    .bind(error_log)
    .bind(import_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_import_batch<'e, E: SqliteExecutor<'e>>(
    executor: E,
    import_id: i64,
) -> Result<Option<ImportBatch>> {
    let sql = format!("SELECT {} FROM mqt_import_history WHERE id = ?", BATCH_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(import_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(row_to_batch).transpose()
}

/// Import history of a construction, oldest first
pub async fn list_import_history(
    pool: &SqlitePool,
    construction_id: i64,
) -> Result<Vec<ImportBatch>> {
    let sql = format!(
        "SELECT {} FROM mqt_import_history WHERE construction_id = ? ORDER BY imported_at, id",
        BATCH_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(construction_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_batch).collect()
}

/// Ids of the items a batch created, in creation order
pub async fn import_item_ids(pool: &SqlitePool, import_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        "SELECT mqt_item_id FROM mqt_import_items WHERE import_id = ? ORDER BY id",
    )
    .bind(import_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Stamp a batch as reverted
///
/// Returns false when the batch does not exist or was already reverted.
pub async fn mark_reverted<'e, E: SqliteExecutor<'e>>(
    executor: E,
    import_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE mqt_import_history SET reverted_at = ? WHERE id = ? AND reverted_at IS NULL",
    )
    .bind(timestamp_now())
    .bind(import_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn row_to_batch(row: &SqliteRow) -> Result<ImportBatch> {
    let source: String = row.get("source");
    let source = source.parse::<ImportSource>().map_err(Error::Internal)?;

    let error_log: String = row.get("error_log");
    let error_log: Vec<RowFailure> = serde_json::from_str(&error_log)
        .map_err(|e| Error::Internal(format!("Failed to deserialize error log: {}", e)))?;

    let imported_at: String = row.get("imported_at");
    let reverted_at: Option<String> = row.get("reverted_at");

    Ok(ImportBatch {
        id: row.get("id"),
        construction_id: row.get("construction_id"),
        imported_by: row.get("imported_by"),
        source,
        file_name: row.get("file_name"),
        sheets_url: row.get("sheets_url"),
        items_imported: row.get("items_imported"),
        items_success: row.get("items_success"),
        items_error: row.get("items_error"),
        error_log,
        imported_at: parse_timestamp(&imported_at)?,
        reverted_at: reverted_at.as_deref().map(parse_timestamp).transpose()?,
    })
}
