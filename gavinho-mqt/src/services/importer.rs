//! MQT import and revert
//!
//! An import records a history batch, then inserts rows one by one. Each row
//! runs in its own transaction (category, item, join row), so a failing row
//! leaves nothing behind and the rest of the batch carries on.
//!
//! A revert deletes the items a batch created in a single transaction and
//! stamps the batch as reverted. History and join rows are kept.
//!
//! Transactions that write must write first. A deferred SQLite transaction
//! that starts with a read cannot take the write lock once another
//! connection has committed, and fails with SQLITE_BUSY instead of waiting.

use chrono::Utc;
use gavinho_common::events::{EventBus, GavinhoEvent};
use gavinho_common::{Error, Result};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::{categories, imports, items};
use crate::models::{ImportOutcome, ImportRequest, ImportRow, RevertOutcome, RowFailure};

/// Why a single row could not be imported
#[derive(Debug, Error)]
pub enum RowError {
    #[error("item code is empty")]
    EmptyCode,

    #[error("cannot derive a category code from item code '{0}'")]
    CategoryDerivation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Storage(#[from] Error),
}

/// Category code of an item code: everything before the first `.`
///
/// `"1.1"` → `"1"`, `"12.3.4"` → `"12"`, `"7"` → `"7"`.
pub fn category_code(code: &str) -> std::result::Result<&str, RowError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(RowError::EmptyCode);
    }

    let prefix = code.split('.').next().unwrap_or_default().trim();
    if prefix.is_empty() {
        return Err(RowError::CategoryDerivation(code.to_string()));
    }

    Ok(prefix)
}

/// Import `request.items` into a construction
///
/// Returns once every row has been attempted. Row failures are part of the
/// outcome; only failures to create or finish the batch record are errors.
pub async fn import_items(
    pool: &SqlitePool,
    event_bus: &EventBus,
    construction_id: i64,
    request: &ImportRequest,
) -> Result<ImportOutcome> {
    let import_id = imports::create_import_batch(
        pool,
        &imports::NewImportBatch {
            construction_id,
            imported_by: request.imported_by,
            source: request.source,
            file_name: request.file_name.as_deref(),
            sheets_url: request.sheets_url.as_deref(),
            items_imported: request.items.len() as i64,
        },
    )
    .await?;

    tracing::info!(
        import_id,
        construction_id,
        rows = request.items.len(),
        source = request.source.as_str(),
        "Import started"
    );

    let base_order = items::max_sort_order(pool, construction_id).await?;
    let mut outcome = ImportOutcome::new(import_id);

    for (index, row) in request.items.iter().enumerate() {
        let sort_order = base_order + index as i64 + 1;
        match import_row(pool, construction_id, import_id, row, sort_order).await {
            Ok(item_id) => outcome.succeeded.push(item_id),
            Err(e) => {
                tracing::warn!(import_id, index, code = %row.code, error = %e, "Row import failed");
                outcome.failed.push(RowFailure {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }

    imports::finish_import_batch(pool, import_id, outcome.imported(), &outcome.failed).await?;

    tracing::info!(
        import_id,
        imported = outcome.imported(),
        failed = outcome.failed.len(),
        "Import finished"
    );

    event_bus.emit_lossy(GavinhoEvent::ImportCompleted {
        import_id,
        construction_id,
        imported: outcome.imported(),
        failed: outcome.failed.len(),
        timestamp: Utc::now(),
    });

    Ok(outcome)
}

async fn import_row(
    pool: &SqlitePool,
    construction_id: i64,
    import_id: i64,
    row: &ImportRow,
    sort_order: i64,
) -> std::result::Result<i64, RowError> {
    let code = category_code(&row.code)?;

    let mut tx = pool.begin().await?;
    let category_id =
        categories::resolve_category(&mut tx, construction_id, &row.category, code).await?;
    let item_id =
        items::insert_item(&mut *tx, construction_id, category_id, row, sort_order).await?;
    imports::record_import_item(&mut *tx, import_id, item_id).await?;
    tx.commit().await?;

    Ok(item_id)
}

/// Delete every item created by an import batch
///
/// Runs in one transaction: either all of the batch's items are gone and the
/// batch is stamped reverted, or nothing changed.
pub async fn revert_import(
    pool: &SqlitePool,
    event_bus: &EventBus,
    import_id: i64,
) -> Result<RevertOutcome> {
    let mut tx = pool.begin().await?;

    if !imports::mark_reverted(&mut *tx, import_id).await? {
        tx.rollback().await?;
        return Err(match imports::load_import_batch(pool, import_id).await? {
            Some(_) => Error::Conflict(format!(
                "Import {} has already been reverted",
                import_id
            )),
            None => Error::NotFound(format!("Import {} not found", import_id)),
        });
    }

    let deleted_items = items::delete_items_of_import(&mut *tx, import_id).await? as usize;
    let batch = imports::load_import_batch(&mut *tx, import_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Import {} not found", import_id)))?;
    tx.commit().await?;

    tracing::info!(
        import_id,
        construction_id = batch.construction_id,
        deleted_items,
        "Import reverted"
    );

    event_bus.emit_lossy(GavinhoEvent::ImportReverted {
        import_id,
        construction_id: batch.construction_id,
        deleted_items,
        timestamp: Utc::now(),
    });

    Ok(RevertOutcome {
        import_id,
        deleted_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImportSource;
    use gavinho_common::db::init_memory_database;

    fn row(code: &str, category: &str, quantity: f64) -> ImportRow {
        ImportRow {
            code: code.to_string(),
            category: category.to_string(),
            item_type: None,
            subtype: None,
            zone: None,
            description: String::new(),
            unit: "m³".to_string(),
            quantity,
            unit_price: None,
            total_price: None,
            supplier: None,
            notes: None,
        }
    }

    fn request(items: Vec<ImportRow>) -> ImportRequest {
        ImportRequest {
            items,
            source: ImportSource::Excel,
            file_name: Some("mqt.xlsx".to_string()),
            sheets_url: None,
            imported_by: None,
        }
    }

    #[test]
    fn test_category_code_derivation() {
        assert_eq!(category_code("1.1").unwrap(), "1");
        assert_eq!(category_code("12.3.4").unwrap(), "12");
        assert_eq!(category_code("7").unwrap(), "7");
        assert_eq!(category_code(" 3.2 ").unwrap(), "3");
        assert!(matches!(category_code("  "), Err(RowError::EmptyCode)));
        assert!(matches!(
            category_code(".5"),
            Err(RowError::CategoryDerivation(_))
        ));
    }

    #[tokio::test]
    async fn test_two_rows_share_one_category() {
        let pool = init_memory_database().await.unwrap();
        let bus = EventBus::new(10);

        let outcome = import_items(
            &pool,
            &bus,
            1,
            &request(vec![row("1.1", "Estrutura", 10.0), row("1.2", "Estrutura", 5.0)]),
        )
        .await
        .unwrap();

        assert_eq!(outcome.imported(), 2);
        assert!(outcome.failed.is_empty());

        let categories = categories::list_categories(&pool, 1).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].code, "1");

        let stored = items::list_items(&pool, 1).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|i| i.category_id == categories[0].id));
    }

    #[tokio::test]
    async fn test_failed_rows_are_collected() {
        let pool = init_memory_database().await.unwrap();
        let bus = EventBus::new(10);

        let outcome = import_items(
            &pool,
            &bus,
            1,
            &request(vec![
                row("1.1", "Estrutura", 10.0),
                row("", "Estrutura", 1.0),
                row("2.1", "Alvenarias", 3.0),
                row(".9", "Alvenarias", 3.0),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(outcome.imported() + outcome.failed.len(), 4);
        assert_eq!(outcome.succeeded.len(), 2);
        let failed: Vec<usize> = outcome.failed.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 3]);

        let batch = imports::load_import_batch(&pool, outcome.import_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.items_imported, 4, "submitted rows, not successes");
        assert_eq!(batch.items_success, 2);
        assert_eq!(batch.items_error, 2);
        assert_eq!(batch.error_log, outcome.failed);
    }

    #[tokio::test]
    async fn test_sort_order_follows_input_and_continues() {
        let pool = init_memory_database().await.unwrap();
        let bus = EventBus::new(10);

        import_items(&pool, &bus, 1, &request(vec![row("2.1", "A", 1.0), row("1.1", "B", 1.0)]))
            .await
            .unwrap();
        let second = import_items(
            &pool,
            &bus,
            1,
            &request(vec![row("3.1", "C", 1.0), row("3.2", "C", 1.0), row("3.3", "C", 1.0)]),
        )
        .await
        .unwrap();

        let stored = items::list_items(&pool, 1).await.unwrap();
        let codes: Vec<&str> = stored.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["2.1", "1.1", "3.1", "3.2", "3.3"]);

        let orders: Vec<i64> = stored
            .iter()
            .filter(|i| second.succeeded.contains(&i.id))
            .map(|i| i.sort_order)
            .collect();
        assert_eq!(orders, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_revert_removes_only_its_batch() {
        let pool = init_memory_database().await.unwrap();
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let kept = import_items(&pool, &bus, 1, &request(vec![row("1.1", "Estrutura", 1.0)]))
            .await
            .unwrap();
        let reverted = import_items(
            &pool,
            &bus,
            1,
            &request(vec![row("2.1", "Alvenarias", 1.0), row("2.2", "Alvenarias", 2.0)]),
        )
        .await
        .unwrap();

        let result = revert_import(&pool, &bus, reverted.import_id).await.unwrap();
        assert_eq!(result.deleted_items, 2);

        let remaining: Vec<i64> = items::list_items(&pool, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(remaining, kept.succeeded);

        // History and join rows survive the revert
        let batch = imports::load_import_batch(&pool, reverted.import_id)
            .await
            .unwrap()
            .unwrap();
        assert!(batch.reverted_at.is_some());
        assert_eq!(
            imports::import_item_ids(&pool, reverted.import_id).await.unwrap(),
            reverted.succeeded
        );

        let events: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(events, vec!["ImportCompleted", "ImportCompleted", "ImportReverted"]);
    }

    #[tokio::test]
    async fn test_second_revert_is_a_conflict() {
        let pool = init_memory_database().await.unwrap();
        let bus = EventBus::new(10);

        let outcome = import_items(&pool, &bus, 1, &request(vec![row("1.1", "Estrutura", 1.0)]))
            .await
            .unwrap();
        revert_import(&pool, &bus, outcome.import_id).await.unwrap();

        let again = revert_import(&pool, &bus, outcome.import_id).await;
        assert!(matches!(again, Err(Error::Conflict(_))));

        let missing = revert_import(&pool, &bus, outcome.import_id + 50).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
