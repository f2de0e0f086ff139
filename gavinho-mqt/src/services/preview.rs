//! Import preview: parse a sheet and run the construction's rules over it
//!
//! Nothing is written. The client shows the report and then submits the
//! rows it wants through the import endpoint.

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use super::row_parser::{parse_csv, ParsedSheet, SheetIssue};
use super::rule_engine::apply_validation_rules;
use super::sheets::{parse_sheets_url, SheetsClient, SheetsError};
use crate::db::rules;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error(transparent)]
    Sheets(#[from] SheetsError),

    #[error(transparent)]
    Storage(#[from] gavinho_common::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub sheet: ParsedSheet,
    pub rule_violations: Vec<SheetIssue>,
}

/// Preview CSV text supplied by the client
pub async fn preview_csv(
    pool: &SqlitePool,
    construction_id: i64,
    csv: &str,
) -> gavinho_common::Result<PreviewReport> {
    let sheet = parse_csv(csv);
    let rules = rules::list_rules(pool, construction_id).await?;
    let rule_violations = apply_validation_rules(&sheet.numbered_rows(), &rules);

    tracing::debug!(
        construction_id,
        rows = sheet.data.len(),
        violations = rule_violations.len(),
        "Import preview"
    );

    Ok(PreviewReport {
        sheet,
        rule_violations,
    })
}

/// Fetch a Google Sheet and preview it
pub async fn preview_sheet(
    pool: &SqlitePool,
    client: &SheetsClient,
    construction_id: i64,
    url: &str,
) -> Result<PreviewReport, PreviewError> {
    let sheet = parse_sheets_url(url)?;
    let csv = client.fetch_csv(&sheet).await?;

    Ok(preview_csv(pool, construction_id, &csv).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewValidationRule, RuleType, Severity};
    use gavinho_common::db::init_memory_database;

    #[tokio::test]
    async fn test_preview_applies_enabled_rules_without_writing() {
        let pool = init_memory_database().await.unwrap();
        rules::insert_rule(
            &pool,
            1,
            &NewValidationRule {
                name: "Preço Máximo".to_string(),
                rule_type: RuleType::PriceMax,
                field: "unitPrice".to_string(),
                condition: r#"{"value":100}"#.to_string(),
                severity: Severity::Warning,
                message: None,
                enabled: true,
                category: None,
            },
        )
        .await
        .unwrap();

        let csv = "Código,Categoria,Descrição,Unidade,Quantidade,Preço Unitário\n\
                   1.1,Estrutura,Betão,m3,10,95\n\
                   \n\
                   1.2,Estrutura,Aço,kg,200,250\n";
        let report = preview_csv(&pool, 1, csv).await.unwrap();

        assert_eq!(report.sheet.summary.total, 2);
        assert_eq!(report.rule_violations.len(), 1);
        assert_eq!(report.rule_violations[0].row, 4, "line numbers follow the sheet");

        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mqt_items")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(items, 0);
    }

    #[tokio::test]
    async fn test_preview_sheet_rejects_bad_url() {
        let pool = init_memory_database().await.unwrap();
        let client = SheetsClient::new().unwrap();

        let result = preview_sheet(&pool, &client, 1, "not a sheet").await;
        assert!(matches!(
            result,
            Err(PreviewError::Sheets(SheetsError::InvalidUrl(_)))
        ));
    }
}
