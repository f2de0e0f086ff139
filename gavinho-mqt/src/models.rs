//! MQT data model
//!
//! JSON field names are camelCase to match the existing web client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One spreadsheet row as submitted for import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub code: String,
    pub category: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Optional on input; stored as an empty description when absent
    #[serde(default)]
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ImportRow {
    /// Text value of a row field by its client-side name, used by rules that
    /// name fields dynamically. Unknown names yield `None`.
    pub fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "code" => Some(self.code.clone()),
            "category" => Some(self.category.clone()),
            "type" => self.item_type.clone(),
            "subtype" => self.subtype.clone(),
            "zone" => self.zone.clone(),
            "description" => Some(self.description.clone()),
            "unit" => Some(self.unit.clone()),
            "quantity" => Some(self.quantity.to_string()),
            "unitPrice" => self.unit_price.map(|v| v.to_string()),
            "totalPrice" => self.total_price.map(|v| v.to_string()),
            "supplier" => self.supplier.clone(),
            "notes" => self.notes.clone(),
            _ => None,
        }
    }
}

/// Where an import batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSource {
    /// Spreadsheet file uploaded by the user
    Excel,
    /// Linked Google Sheet
    Sheets,
}

impl ImportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportSource::Excel => "excel",
            ImportSource::Sheets => "sheets",
        }
    }
}

impl FromStr for ImportSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excel" => Ok(ImportSource::Excel),
            "sheets" => Ok(ImportSource::Sheets),
            other => Err(format!("unknown import source: {}", other)),
        }
    }
}

/// Body of an import call
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub items: Vec<ImportRow>,
    pub source: ImportSource,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub sheets_url: Option<String>,
    /// Acting user, supplied by the authenticated caller
    #[serde(default)]
    pub imported_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub construction_id: i64,
    pub code: String,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub construction_id: i64,
    pub category_id: i64,
    pub code: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub subtype: Option<String>,
    pub zone: Option<String>,
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub sort_order: i64,
}

/// A row that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFailure {
    /// Zero-based position of the row in the submitted list
    pub index: usize,
    pub message: String,
}

/// History record of one import operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: i64,
    pub construction_id: i64,
    pub imported_by: Option<i64>,
    pub source: ImportSource,
    pub file_name: Option<String>,
    pub sheets_url: Option<String>,
    /// Number of rows submitted, not the number that succeeded
    pub items_imported: i64,
    pub items_success: i64,
    pub items_error: i64,
    pub error_log: Vec<RowFailure>,
    pub imported_at: DateTime<Utc>,
    pub reverted_at: Option<DateTime<Utc>>,
}

/// Result of one import call: rows either produced an item or a failure
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub import_id: i64,
    pub succeeded: Vec<i64>,
    pub failed: Vec<RowFailure>,
}

impl ImportOutcome {
    pub fn new(import_id: i64) -> Self {
        Self {
            import_id,
            ..Default::default()
        }
    }

    pub fn imported(&self) -> usize {
        self.succeeded.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertOutcome {
    pub import_id: i64,
    pub deleted_items: usize,
}

/// Kind of check a validation rule performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    PriceMin,
    PriceMax,
    CodePattern,
    QuantityMin,
    QuantityMax,
    DuplicateCheck,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::PriceMin => "price_min",
            RuleType::PriceMax => "price_max",
            RuleType::CodePattern => "code_pattern",
            RuleType::QuantityMin => "quantity_min",
            RuleType::QuantityMax => "quantity_max",
            RuleType::DuplicateCheck => "duplicate_check",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_min" => Ok(RuleType::PriceMin),
            "price_max" => Ok(RuleType::PriceMax),
            "code_pattern" => Ok(RuleType::CodePattern),
            "quantity_min" => Ok(RuleType::QuantityMin),
            "quantity_max" => Ok(RuleType::QuantityMax),
            "duplicate_check" => Ok(RuleType::DuplicateCheck),
            other => Err(format!("unknown rule type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// User-defined check over imported rows, scoped to one construction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub id: i64,
    pub construction_id: i64,
    pub name: String,
    pub rule_type: RuleType,
    pub field: String,
    /// JSON condition, shape depends on `rule_type`
    pub condition: String,
    pub severity: Severity,
    pub message: Option<String>,
    pub enabled: bool,
    /// When set, the rule only applies to rows of this category
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ValidationRule {
    /// Category the rule is limited to. A blank category means every row.
    pub fn scope(&self) -> Option<&str> {
        non_blank(self.category.as_deref())
    }

    /// Message to report instead of the rule type's default text
    pub fn custom_message(&self) -> Option<&str> {
        non_blank(self.message.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Payload for creating a validation rule
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewValidationRule {
    pub name: String,
    pub rule_type: RuleType,
    pub field: String,
    pub condition: String,
    pub severity: Severity,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl NewValidationRule {
    /// Drop blank `message` and `category` values so they are stored as unset
    pub fn normalized(&self) -> Self {
        Self {
            message: non_blank(self.message.as_deref()).map(str::to_string),
            category: non_blank(self.category.as_deref()).map(str::to_string),
            ..self.clone()
        }
    }
}

/// Partial update of a validation rule. Absent fields keep their value; an
/// empty `message` or `category` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRuleUpdate {
    pub name: Option<String>,
    pub rule_type: Option<RuleType>,
    pub field: Option<String>,
    pub condition: Option<String>,
    pub severity: Option<Severity>,
    pub message: Option<String>,
    pub enabled: Option<bool>,
    pub category: Option<String>,
}

impl ValidationRuleUpdate {
    /// Apply the present fields onto `rule`
    pub fn apply_to(&self, rule: &mut ValidationRule) {
        if let Some(name) = &self.name {
            rule.name = name.clone();
        }
        if let Some(rule_type) = self.rule_type {
            rule.rule_type = rule_type;
        }
        if let Some(field) = &self.field {
            rule.field = field.clone();
        }
        if let Some(condition) = &self.condition {
            rule.condition = condition.clone();
        }
        if let Some(severity) = self.severity {
            rule.severity = severity;
        }
        if let Some(message) = &self.message {
            rule.message = non_blank(Some(message.as_str())).map(str::to_string);
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
        if let Some(category) = &self.category {
            rule.category = non_blank(Some(category.as_str())).map(str::to_string);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_row_accepts_client_json() {
        let row: ImportRow = serde_json::from_value(serde_json::json!({
            "code": "1.1",
            "category": "Demolições",
            "type": "Demolições",
            "subtype": "Remoção de Pavimentos",
            "description": "Remoção de pavimento em madeira flutuante",
            "unit": "m2",
            "quantity": 170.0,
            "unitPrice": 12.5
        }))
        .unwrap();

        assert_eq!(row.item_type.as_deref(), Some("Demolições"));
        assert_eq!(row.unit_price, Some(12.5));
        assert_eq!(row.total_price, None);
        assert_eq!(row.field_value("unitPrice").as_deref(), Some("12.5"));
        assert_eq!(row.field_value("quantity").as_deref(), Some("170"));
        assert_eq!(row.field_value("nope"), None);
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let result: Result<ImportRow, _> = serde_json::from_value(serde_json::json!({
            "code": "1.1",
            "category": "Estrutura",
            "unit": "m3"
        }));
        assert!(result.is_err(), "quantity is required");
    }

    #[test]
    fn test_enum_string_forms_round_trip() {
        for rule_type in [
            RuleType::PriceMin,
            RuleType::PriceMax,
            RuleType::CodePattern,
            RuleType::QuantityMin,
            RuleType::QuantityMax,
            RuleType::DuplicateCheck,
        ] {
            assert_eq!(rule_type.as_str().parse::<RuleType>(), Ok(rule_type));
        }
        assert_eq!("sheets".parse::<ImportSource>(), Ok(ImportSource::Sheets));
        assert!("csv".parse::<ImportSource>().is_err());
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let now = Utc::now();
        let mut rule = ValidationRule {
            id: 1,
            construction_id: 4,
            name: "Preço Máximo".to_string(),
            rule_type: RuleType::PriceMax,
            field: "unitPrice".to_string(),
            condition: r#"{"value":10000}"#.to_string(),
            severity: Severity::Warning,
            message: None,
            enabled: true,
            category: None,
            created_at: now,
            updated_at: now,
        };

        let update = ValidationRuleUpdate {
            condition: Some(r#"{"value":5000}"#.to_string()),
            enabled: Some(false),
            ..Default::default()
        };
        update.apply_to(&mut rule);

        assert_eq!(rule.name, "Preço Máximo");
        assert_eq!(rule.condition, r#"{"value":5000}"#);
        assert!(!rule.enabled);
        assert_eq!(rule.severity, Severity::Warning);
    }

    #[test]
    fn test_update_with_empty_text_clears_scope_and_message() {
        let now = Utc::now();
        let mut rule = ValidationRule {
            id: 2,
            construction_id: 4,
            name: "Preço Máximo Pinturas".to_string(),
            rule_type: RuleType::PriceMax,
            field: "unitPrice".to_string(),
            condition: r#"{"value":50}"#.to_string(),
            severity: Severity::Warning,
            message: Some("Preço alto".to_string()),
            enabled: true,
            category: Some("Pinturas".to_string()),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(rule.scope(), Some("Pinturas"));

        let update = ValidationRuleUpdate {
            message: Some(String::new()),
            category: Some(" ".to_string()),
            ..Default::default()
        };
        update.apply_to(&mut rule);

        assert_eq!(rule.message, None);
        assert_eq!(rule.category, None);
        assert_eq!(rule.scope(), None);
    }

    #[test]
    fn test_new_rule_blank_category_is_unscoped() {
        let rule: NewValidationRule = serde_json::from_value::<NewValidationRule>(serde_json::json!({
            "name": "Preço Máximo",
            "ruleType": "price_max",
            "field": "unitPrice",
            "condition": "{\"value\":10}",
            "severity": "warning",
            "message": "",
            "category": ""
        }))
        .unwrap()
        .normalized();

        assert_eq!(rule.category, None);
        assert_eq!(rule.message, None);
        assert!(rule.enabled);
    }
}
