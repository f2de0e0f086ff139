//! Category database operations

use gavinho_common::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::models::Category;

/// Sort order used when a code has no leading number
pub const DEFAULT_CATEGORY_ORDER: i64 = 999;

/// Sort order for a new category: the leading digits of its code
///
/// `"12"` → 12, `"3A"` → 3, `"A1"` → 999.
pub fn category_order(code: &str) -> i64 {
    let digits: String = code
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().unwrap_or(DEFAULT_CATEGORY_ORDER)
}

/// Return the id of the (construction, code) category, creating it if missing
///
/// Insert-or-ignore against the UNIQUE(construction_id, code) constraint,
/// then read the id back. Two concurrent callers with a new code both end up
/// with the single surviving row.
pub async fn resolve_category(
    conn: &mut SqliteConnection,
    construction_id: i64,
    name: &str,
    code: &str,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO mqt_categories (construction_id, code, name, sort_order)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(construction_id, code) DO NOTHING
        "#,
    )
    .bind(construction_id)
    .bind(code)
    .bind(name)
    .bind(category_order(code))
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar(
        "SELECT id FROM mqt_categories WHERE construction_id = ? AND code = ?",
    )
    .bind(construction_id)
    .bind(code)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// All categories of a construction in display order
pub async fn list_categories(pool: &SqlitePool, construction_id: i64) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        r#"
        SELECT id, construction_id, code, name, sort_order
        FROM mqt_categories
        WHERE construction_id = ?
        ORDER BY sort_order, code
        "#,
    )
    .bind(construction_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Category {
            id: row.get("id"),
            construction_id: row.get("construction_id"),
            code: row.get("code"),
            name: row.get("name"),
            sort_order: row.get("sort_order"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavinho_common::db::init_memory_database;

    #[test]
    fn test_category_order_parsing() {
        assert_eq!(category_order("1"), 1);
        assert_eq!(category_order("12"), 12);
        assert_eq!(category_order("3A"), 3);
        assert_eq!(category_order("A1"), DEFAULT_CATEGORY_ORDER);
        assert_eq!(category_order(""), DEFAULT_CATEGORY_ORDER);
    }

    #[tokio::test]
    async fn test_resolve_twice_returns_same_id() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = resolve_category(&mut conn, 1, "Estrutura", "1").await.unwrap();
        let second = resolve_category(&mut conn, 1, "Estrutura (renamed)", "1")
            .await
            .unwrap();
        assert_eq!(first, second);

        let other_site = resolve_category(&mut conn, 2, "Estrutura", "1").await.unwrap();
        assert_ne!(first, other_site);
        drop(conn);

        let categories = list_categories(&pool, 1).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Estrutura", "existing name is kept");
        assert_eq!(categories[0].sort_order, 1);
    }

    #[tokio::test]
    async fn test_list_orders_by_sort_order() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        resolve_category(&mut conn, 1, "Diversos", "18").await.unwrap();
        resolve_category(&mut conn, 1, "Demolições", "1").await.unwrap();
        resolve_category(&mut conn, 1, "Extras", "X").await.unwrap();
        drop(conn);

        let codes: Vec<String> = list_categories(&pool, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["1", "18", "X"]);
    }
}
