//! Validation rule database operations

use gavinho_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{parse_timestamp, timestamp_now};
use crate::models::{NewValidationRule, RuleType, Severity, ValidationRule};

const RULE_COLUMNS: &str = r#"
    id, construction_id, name, rule_type, field, condition, severity,
    message, enabled, category, created_at, updated_at
"#;

/// Rules of a construction in creation order
pub async fn list_rules(pool: &SqlitePool, construction_id: i64) -> Result<Vec<ValidationRule>> {
    let sql = format!(
        "SELECT {} FROM mqt_validation_rules WHERE construction_id = ? ORDER BY created_at, id",
        RULE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(construction_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_rule).collect()
}

pub async fn load_rule(pool: &SqlitePool, rule_id: i64) -> Result<Option<ValidationRule>> {
    let sql = format!("SELECT {} FROM mqt_validation_rules WHERE id = ?", RULE_COLUMNS);
    let row = sqlx::query(&sql).bind(rule_id).fetch_optional(pool).await?;

    row.as_ref().map(row_to_rule).transpose()
}

pub async fn insert_rule(
    pool: &SqlitePool,
    construction_id: i64,
    rule: &NewValidationRule,
) -> Result<ValidationRule> {
    let now = timestamp_now();

    let result = sqlx::query(
        r#"
        INSERT INTO mqt_validation_rules (
            construction_id, name, rule_type, field, condition, severity,
            message, enabled, category, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(construction_id)
    .bind(&rule.name)
    .bind(rule.rule_type.as_str())
    .bind(&rule.field)
    .bind(&rule.condition)
    .bind(rule.severity.as_str())
    .bind(&rule.message)
    .bind(rule.enabled)
    .bind(&rule.category)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    load_rule(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Rule {} vanished after insert", id)))
}

/// Write every mutable column of `rule` and bump `updated_at`
pub async fn save_rule(pool: &SqlitePool, rule: &ValidationRule) -> Result<ValidationRule> {
    let result = sqlx::query(
        r#"
        UPDATE mqt_validation_rules
        SET name = ?, rule_type = ?, field = ?, condition = ?, severity = ?,
            message = ?, enabled = ?, category = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&rule.name)
    .bind(rule.rule_type.as_str())
    .bind(&rule.field)
    .bind(&rule.condition)
    .bind(rule.severity.as_str())
    .bind(&rule.message)
    .bind(rule.enabled)
    .bind(&rule.category)
    .bind(timestamp_now())
    .bind(rule.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Validation rule {} not found", rule.id)));
    }

    load_rule(pool, rule.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Validation rule {} not found", rule.id)))
}

/// Returns false when no rule had that id
pub async fn delete_rule(pool: &SqlitePool, rule_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM mqt_validation_rules WHERE id = ?")
        .bind(rule_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns false when no rule had that id
pub async fn set_rule_enabled(pool: &SqlitePool, rule_id: i64, enabled: bool) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE mqt_validation_rules SET enabled = ?, updated_at = ? WHERE id = ?",
    )
    .bind(enabled)
    .bind(timestamp_now())
    .bind(rule_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn row_to_rule(row: &SqliteRow) -> Result<ValidationRule> {
    let rule_type: String = row.get("rule_type");
    let severity: String = row.get("severity");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(ValidationRule {
        id: row.get("id"),
        construction_id: row.get("construction_id"),
        name: row.get("name"),
        rule_type: rule_type.parse::<RuleType>().map_err(Error::Internal)?,
        field: row.get("field"),
        condition: row.get("condition"),
        severity: severity.parse::<Severity>().map_err(Error::Internal)?,
        message: row.get("message"),
        enabled: row.get("enabled"),
        category: row.get("category"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavinho_common::db::init_memory_database;

    fn price_max(value: f64) -> NewValidationRule {
        NewValidationRule {
            name: "Preço Máximo".to_string(),
            rule_type: RuleType::PriceMax,
            field: "unitPrice".to_string(),
            condition: format!(r#"{{"value":{}}}"#, value),
            severity: Severity::Warning,
            message: None,
            enabled: true,
            category: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_in_creation_order() {
        let pool = init_memory_database().await.unwrap();

        let first = insert_rule(&pool, 3, &price_max(10000.0)).await.unwrap();
        let second = insert_rule(&pool, 3, &price_max(500.0)).await.unwrap();
        insert_rule(&pool, 4, &price_max(1.0)).await.unwrap();

        let rules = list_rules(&pool, 3).await.unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, first.id);
        assert_eq!(rules[1].id, second.id);
        assert_eq!(rules[0].rule_type, RuleType::PriceMax);
        assert!(rules[0].enabled);
    }

    #[tokio::test]
    async fn test_save_updates_columns() {
        let pool = init_memory_database().await.unwrap();
        let mut rule = insert_rule(&pool, 3, &price_max(10000.0)).await.unwrap();

        rule.severity = Severity::Error;
        rule.category = Some("Pinturas".to_string());
        let saved = save_rule(&pool, &rule).await.unwrap();

        assert_eq!(saved.severity, Severity::Error);
        assert_eq!(saved.category.as_deref(), Some("Pinturas"));
        assert!(saved.updated_at >= saved.created_at);
    }

    #[tokio::test]
    async fn test_toggle_and_delete_report_missing_rows() {
        let pool = init_memory_database().await.unwrap();
        let rule = insert_rule(&pool, 3, &price_max(10000.0)).await.unwrap();

        assert!(set_rule_enabled(&pool, rule.id, false).await.unwrap());
        assert!(!load_rule(&pool, rule.id).await.unwrap().unwrap().enabled);
        assert!(!set_rule_enabled(&pool, rule.id + 1, false).await.unwrap());

        assert!(delete_rule(&pool, rule.id).await.unwrap());
        assert!(!delete_rule(&pool, rule.id).await.unwrap());
        assert!(load_rule(&pool, rule.id).await.unwrap().is_none());
    }
}
