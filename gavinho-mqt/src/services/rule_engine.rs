//! Validation rule evaluation
//!
//! Rules are checked against parsed rows before import. Evaluation only
//! reports; it never blocks an import.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use super::row_parser::{IssueSeverity, SheetIssue};
use crate::models::{ImportRow, NewValidationRule, RuleType, Severity, ValidationRule};

#[derive(Debug, Error)]
pub enum RuleConditionError {
    #[error("condition is not valid JSON for a {rule_type} rule: {source}")]
    InvalidJson {
        rule_type: RuleType,
        source: serde_json::Error,
    },

    #[error("invalid code pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("duplicate check needs at least one field")]
    NoFields,
}

#[derive(Debug, Deserialize)]
struct ThresholdJson {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct PatternJson {
    pattern: String,
}

#[derive(Debug, Deserialize)]
struct DuplicateJson {
    fields: Vec<String>,
    #[serde(default)]
    tolerance: Option<f64>,
}

/// Decoded rule condition
#[derive(Debug, Clone)]
pub enum RuleCondition {
    /// `{"value": n}` for price and quantity limits
    Threshold(f64),
    /// `{"pattern": "..."}`
    Pattern(Regex),
    /// `{"fields": [...], "tolerance"?: n}`; tolerance is accepted but
    /// values are compared exactly
    Duplicate {
        fields: Vec<String>,
        tolerance: Option<f64>,
    },
}

impl RuleCondition {
    /// Decode the JSON condition of a rule of `rule_type`
    pub fn parse(rule_type: RuleType, condition: &str) -> Result<Self, RuleConditionError> {
        let invalid = |source| RuleConditionError::InvalidJson { rule_type, source };

        match rule_type {
            RuleType::PriceMin
            | RuleType::PriceMax
            | RuleType::QuantityMin
            | RuleType::QuantityMax => {
                let parsed: ThresholdJson = serde_json::from_str(condition).map_err(invalid)?;
                Ok(RuleCondition::Threshold(parsed.value))
            }
            RuleType::CodePattern => {
                let parsed: PatternJson = serde_json::from_str(condition).map_err(invalid)?;
                Ok(RuleCondition::Pattern(Regex::new(&parsed.pattern)?))
            }
            RuleType::DuplicateCheck => {
                let parsed: DuplicateJson = serde_json::from_str(condition).map_err(invalid)?;
                if parsed.fields.is_empty() {
                    return Err(RuleConditionError::NoFields);
                }
                Ok(RuleCondition::Duplicate {
                    fields: parsed.fields,
                    tolerance: parsed.tolerance,
                })
            }
        }
    }
}

/// Pair rows with spreadsheet lines assuming one header line and no gaps
pub fn number_rows(rows: &[ImportRow]) -> Vec<(usize, &ImportRow)> {
    rows.iter().enumerate().map(|(i, row)| (i + 2, row)).collect()
}

fn issue_severity(severity: Severity) -> IssueSeverity {
    match severity {
        Severity::Error => IssueSeverity::Error,
        Severity::Warning | Severity::Info => IssueSeverity::Warning,
    }
}

fn applies_to(rule: &ValidationRule, row: &ImportRow) -> bool {
    rule.scope().map_or(true, |category| row.category == category)
}

/// Evaluate the enabled rules against numbered rows
///
/// Per-row rules are reported row by row first, then duplicate groups.
pub fn apply_validation_rules(
    rows: &[(usize, &ImportRow)],
    rules: &[ValidationRule],
) -> Vec<SheetIssue> {
    let compiled: Vec<(&ValidationRule, RuleCondition)> = rules
        .iter()
        .filter(|rule| rule.enabled)
        .filter_map(|rule| match RuleCondition::parse(rule.rule_type, &rule.condition) {
            Ok(condition) => Some((rule, condition)),
            Err(e) => {
                tracing::warn!(
                    rule_id = rule.id,
                    error = %e,
                    "Skipping rule with invalid condition"
                );
                None
            }
        })
        .collect();

    let mut issues = Vec::new();

    for (line, row) in rows {
        for (rule, condition) in &compiled {
            if !applies_to(rule, row) {
                continue;
            }
            if let Some(issue) = check_row(rule, condition, *line, row) {
                issues.push(issue);
            }
        }
    }

    for (rule, condition) in &compiled {
        if let RuleCondition::Duplicate { fields, .. } = condition {
            issues.extend(check_duplicates(rule, fields, rows));
        }
    }

    issues
}

fn check_row(
    rule: &ValidationRule,
    condition: &RuleCondition,
    line: usize,
    row: &ImportRow,
) -> Option<SheetIssue> {
    let (field, default_message) = match (rule.rule_type, condition) {
        (RuleType::PriceMin, RuleCondition::Threshold(min)) => {
            let price = row.unit_price?;
            if price >= *min {
                return None;
            }
            (
                "unitPrice",
                format!("Preço unitário ({}€) abaixo do mínimo permitido ({}€)", price, min),
            )
        }
        (RuleType::PriceMax, RuleCondition::Threshold(max)) => {
            let price = row.unit_price?;
            if price <= *max {
                return None;
            }
            (
                "unitPrice",
                format!("Preço unitário ({}€) acima do máximo permitido ({}€)", price, max),
            )
        }
        (RuleType::QuantityMin, RuleCondition::Threshold(min)) => {
            if row.quantity >= *min {
                return None;
            }
            (
                "quantity",
                format!("Quantidade ({}) abaixo do mínimo permitido ({})", row.quantity, min),
            )
        }
        (RuleType::QuantityMax, RuleCondition::Threshold(max)) => {
            if row.quantity <= *max {
                return None;
            }
            (
                "quantity",
                format!("Quantidade ({}) acima do máximo permitido ({})", row.quantity, max),
            )
        }
        (RuleType::CodePattern, RuleCondition::Pattern(re)) => {
            if re.is_match(&row.code) {
                return None;
            }
            (
                "code",
                format!(
                    "Código \"{}\" não corresponde ao padrão esperado ({})",
                    row.code,
                    re.as_str()
                ),
            )
        }
        _ => return None,
    };

    Some(SheetIssue {
        row: line,
        field: field.to_string(),
        message: rule
            .custom_message()
            .map_or(default_message, str::to_string),
        severity: issue_severity(rule.severity),
    })
}

fn check_duplicates(
    rule: &ValidationRule,
    fields: &[String],
    rows: &[(usize, &ImportRow)],
) -> Vec<SheetIssue> {
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (line, row) in rows.iter().filter(|(_, row)| applies_to(rule, row)) {
        let key = fields
            .iter()
            .map(|field| row.field_value(field).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("|");

        match group_index.get(&key) {
            Some(&i) => groups[i].push(*line),
            None => {
                group_index.insert(key, groups.len());
                groups.push(vec![*line]);
            }
        }
    }

    let field = fields.join(", ");
    let mut issues = Vec::new();

    for lines in groups.iter().filter(|lines| lines.len() > 1) {
        let listed = lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let message = rule.custom_message().map_or_else(
            || format!("Item duplicado encontrado (linhas: {})", listed),
            str::to_string,
        );

        for line in lines {
            issues.push(SheetIssue {
                row: *line,
                field: field.clone(),
                message: message.clone(),
                severity: issue_severity(rule.severity),
            });
        }
    }

    issues
}

/// Starter rules offered to a construction without any
pub fn default_rules() -> Vec<NewValidationRule> {
    vec![
        NewValidationRule {
            name: "Preço Mínimo Razoável".to_string(),
            rule_type: RuleType::PriceMin,
            field: "unitPrice".to_string(),
            condition: r#"{"value":0.01}"#.to_string(),
            severity: Severity::Warning,
            message: Some("Preço unitário muito baixo - verificar se está correto".to_string()),
            enabled: true,
            category: None,
        },
        NewValidationRule {
            name: "Preço Máximo Suspeito".to_string(),
            rule_type: RuleType::PriceMax,
            field: "unitPrice".to_string(),
            condition: r#"{"value":10000}"#.to_string(),
            severity: Severity::Warning,
            message: Some("Preço unitário muito alto - verificar se está correto".to_string()),
            enabled: true,
            category: None,
        },
        NewValidationRule {
            name: "Quantidade Mínima".to_string(),
            rule_type: RuleType::QuantityMin,
            field: "quantity".to_string(),
            condition: r#"{"value":0.01}"#.to_string(),
            severity: Severity::Error,
            message: Some("Quantidade deve ser maior que zero".to_string()),
            enabled: true,
            category: None,
        },
        NewValidationRule {
            name: "Código Duplicado".to_string(),
            rule_type: RuleType::DuplicateCheck,
            field: "code".to_string(),
            condition: r#"{"fields":["code"]}"#.to_string(),
            severity: Severity::Warning,
            message: Some("Código duplicado encontrado".to_string()),
            enabled: true,
            category: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: i64, rule_type: RuleType, condition: &str, severity: Severity) -> ValidationRule {
        ValidationRule {
            id,
            construction_id: 1,
            name: format!("rule {}", id),
            rule_type,
            field: String::new(),
            condition: condition.to_string(),
            severity,
            message: None,
            enabled: true,
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn row(code: &str, category: &str, quantity: f64, unit_price: Option<f64>) -> ImportRow {
        ImportRow {
            code: code.to_string(),
            category: category.to_string(),
            item_type: None,
            subtype: None,
            zone: None,
            description: "Item".to_string(),
            unit: "un".to_string(),
            quantity,
            unit_price,
            total_price: None,
            supplier: None,
            notes: None,
        }
    }

    #[test]
    fn test_condition_parsing() {
        assert!(matches!(
            RuleCondition::parse(RuleType::PriceMax, r#"{"value":10000}"#),
            Ok(RuleCondition::Threshold(v)) if v == 10000.0
        ));
        assert!(matches!(
            RuleCondition::parse(RuleType::CodePattern, r#"{"pattern":"^\\d+\\.\\d+$"}"#),
            Ok(RuleCondition::Pattern(_))
        ));
        assert!(matches!(
            RuleCondition::parse(RuleType::CodePattern, r#"{"pattern":"("}"#),
            Err(RuleConditionError::InvalidPattern(_))
        ));
        assert!(matches!(
            RuleCondition::parse(RuleType::DuplicateCheck, r#"{"fields":[]}"#),
            Err(RuleConditionError::NoFields)
        ));
        assert!(matches!(
            RuleCondition::parse(RuleType::QuantityMin, r#"{"fields":["code"]}"#),
            Err(RuleConditionError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_thresholds_and_missing_price() {
        let rows = vec![
            row("1.1", "Estrutura", 0.0, Some(0.001)),
            row("1.2", "Estrutura", 5.0, None),
            row("1.3", "Estrutura", 5.0, Some(20000.0)),
        ];
        let rules = vec![
            rule(1, RuleType::PriceMin, r#"{"value":0.01}"#, Severity::Warning),
            rule(2, RuleType::PriceMax, r#"{"value":10000}"#, Severity::Warning),
            rule(3, RuleType::QuantityMin, r#"{"value":0.01}"#, Severity::Error),
        ];

        let issues = apply_validation_rules(&number_rows(&rows), &rules);
        let found: Vec<(usize, &str)> = issues.iter().map(|i| (i.row, i.field.as_str())).collect();

        assert_eq!(
            found,
            vec![(2, "unitPrice"), (2, "quantity"), (4, "unitPrice")],
            "row without a price is not checked against price rules"
        );
        assert_eq!(issues[1].severity, IssueSeverity::Error);
    }

    #[test]
    fn test_disabled_scoped_and_info_rules() {
        let rows = vec![
            row("A-1", "Pinturas", 1.0, Some(1.0)),
            row("A-2", "Estrutura", 1.0, Some(1.0)),
        ];

        let mut disabled = rule(1, RuleType::CodePattern, r#"{"pattern":"^\\d"}"#, Severity::Error);
        disabled.enabled = false;

        let mut scoped = rule(2, RuleType::CodePattern, r#"{"pattern":"^\\d"}"#, Severity::Info);
        scoped.category = Some("Pinturas".to_string());
        scoped.message = Some("Código inválido".to_string());

        let issues = apply_validation_rules(&number_rows(&rows), &[disabled, scoped]);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 2);
        assert_eq!(issues[0].message, "Código inválido");
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_blank_category_and_message_are_unset() {
        let rows = vec![row("1.1", "Estrutura", 1.0, Some(99.0))];

        let mut blank = rule(1, RuleType::PriceMax, r#"{"value":10}"#, Severity::Warning);
        blank.category = Some(String::new());
        blank.message = Some("  ".to_string());

        let issues = apply_validation_rules(&number_rows(&rows), &[blank]);

        assert_eq!(issues.len(), 1, "blank scope applies to every category");
        assert_eq!(issues[0].row, 2);
        assert!(!issues[0].message.trim().is_empty());
    }

    #[test]
    fn test_duplicate_groups_report_every_member() {
        let rows = vec![
            row("1.1", "Estrutura", 1.0, None),
            row("1.2", "Estrutura", 1.0, None),
            row("1.1", "Estrutura", 2.0, None),
        ];
        let rules = vec![rule(
            1,
            RuleType::DuplicateCheck,
            r#"{"fields":["code"],"tolerance":5}"#,
            Severity::Warning,
        )];

        let issues = apply_validation_rules(&number_rows(&rows), &rules);

        let lines: Vec<usize> = issues.iter().map(|i| i.row).collect();
        assert_eq!(lines, vec![2, 4]);
        assert_eq!(issues[0].field, "code");
        assert_eq!(issues[0].message, "Item duplicado encontrado (linhas: 2, 4)");
    }

    #[test]
    fn test_invalid_condition_is_skipped() {
        let rows = vec![row("1.1", "Estrutura", 1.0, Some(99999.0))];
        let rules = vec![
            rule(1, RuleType::PriceMax, "not json", Severity::Error),
            rule(2, RuleType::PriceMax, r#"{"value":10}"#, Severity::Error),
        ];

        let issues = apply_validation_rules(&number_rows(&rows), &rules);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_default_rules_have_valid_conditions() {
        let defaults = default_rules();
        assert_eq!(defaults.len(), 4);
        for rule in &defaults {
            assert!(RuleCondition::parse(rule.rule_type, &rule.condition).is_ok());
        }
    }
}
