//! MQT item database operations

use gavinho_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};

use crate::models::{ImportRow, Item};

const ITEM_COLUMNS: &str = r#"
    id, construction_id, category_id, code, item_type, subtype, zone,
    description, unit, quantity, unit_price, total_price, supplier, notes, sort_order
"#;

/// Insert one item and return its id
pub async fn insert_item<'e, E: SqliteExecutor<'e>>(
    executor: E,
    construction_id: i64,
    category_id: i64,
    row: &ImportRow,
    sort_order: i64,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO mqt_items (
            construction_id, category_id, code, item_type, subtype, zone,
            description, unit, quantity, unit_price, total_price, supplier, notes, sort_order
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(construction_id)
    .bind(category_id)
    .bind(&row.code)
    .bind(&row.item_type)
    .bind(&row.subtype)
    .bind(&row.zone)
    .bind(&row.description)
    .bind(&row.unit)
    .bind(row.quantity)
    .bind(row.unit_price)
    .bind(row.total_price)
    .bind(&row.supplier)
    .bind(&row.notes)
    .bind(sort_order)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Highest sort order used in a construction (0 when it has no items)
pub async fn max_sort_order(pool: &SqlitePool, construction_id: i64) -> Result<i64> {
    let max: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(sort_order), 0) FROM mqt_items WHERE construction_id = ?",
    )
    .bind(construction_id)
    .fetch_one(pool)
    .await?;

    Ok(max)
}

/// All items of a construction ordered by sort order
pub async fn list_items(pool: &SqlitePool, construction_id: i64) -> Result<Vec<Item>> {
    let sql = format!(
        "SELECT {} FROM mqt_items WHERE construction_id = ? ORDER BY sort_order, id",
        ITEM_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(construction_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(row_to_item).collect())
}

/// Items whose code or description contains `query` (ASCII case-insensitive)
pub async fn search_items(
    pool: &SqlitePool,
    construction_id: i64,
    query: &str,
    limit: i64,
) -> Result<Vec<Item>> {
    let pattern = format!("%{}%", escape_like(query));
    let sql = format!(
        r#"
        SELECT {} FROM mqt_items
        WHERE construction_id = ?
          AND (code LIKE ? ESCAPE '\' OR description LIKE ? ESCAPE '\')
        ORDER BY sort_order, id
        LIMIT ?
        "#,
        ITEM_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(construction_id)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(row_to_item).collect())
}

/// Delete every item linked to `import_id`, returning how many were removed
pub async fn delete_items_of_import<'e, E: SqliteExecutor<'e>>(
    executor: E,
    import_id: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM mqt_items
        WHERE id IN (SELECT mqt_item_id FROM mqt_import_items WHERE import_id = ?)
        "#,
    )
    .bind(import_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_item(row: &SqliteRow) -> Item {
    Item {
        id: row.get("id"),
        construction_id: row.get("construction_id"),
        category_id: row.get("category_id"),
        code: row.get("code"),
        item_type: row.get("item_type"),
        subtype: row.get("subtype"),
        zone: row.get("zone"),
        description: row.get("description"),
        unit: row.get("unit"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        total_price: row.get("total_price"),
        supplier: row.get("supplier"),
        notes: row.get("notes"),
        sort_order: row.get("sort_order"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::categories::resolve_category;
    use gavinho_common::db::init_memory_database;

    fn row(code: &str, description: &str) -> ImportRow {
        ImportRow {
            code: code.to_string(),
            category: "Pinturas".to_string(),
            item_type: None,
            subtype: None,
            zone: Some("Geral".to_string()),
            description: description.to_string(),
            unit: "m2".to_string(),
            quantity: 42.5,
            unit_price: Some(8.0),
            total_price: None,
            supplier: None,
            notes: None,
        }
    }

    async fn seed(pool: &SqlitePool) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        resolve_category(&mut conn, 1, "Pinturas", "13").await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list_in_sort_order() {
        let pool = init_memory_database().await.unwrap();
        let category_id = seed(&pool).await;

        insert_item(&pool, 1, category_id, &row("13.2", "Pintura de tetos"), 2)
            .await
            .unwrap();
        insert_item(&pool, 1, category_id, &row("13.1", "Pintura de paredes"), 1)
            .await
            .unwrap();

        let items = list_items(&pool, 1).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].code, "13.1");
        assert_eq!(items[1].code, "13.2");
        assert_eq!(items[0].zone.as_deref(), Some("Geral"));
        assert_eq!(items[0].unit_price, Some(8.0));
        assert_eq!(max_sort_order(&pool, 1).await.unwrap(), 2);
        assert_eq!(max_sort_order(&pool, 99).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_matches_code_and_description() {
        let pool = init_memory_database().await.unwrap();
        let category_id = seed(&pool).await;

        insert_item(&pool, 1, category_id, &row("13.1", "Pintura de paredes"), 1)
            .await
            .unwrap();
        insert_item(&pool, 1, category_id, &row("13.2", "Esmalte em portas"), 2)
            .await
            .unwrap();

        let by_description = search_items(&pool, 1, "PAREDES", 50).await.unwrap();
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].code, "13.1");

        let by_code = search_items(&pool, 1, "13.2", 50).await.unwrap();
        assert_eq!(by_code.len(), 1);

        let wildcard = search_items(&pool, 1, "%", 50).await.unwrap();
        assert!(wildcard.is_empty(), "LIKE wildcards are matched literally");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
