//! Validation rule management
//!
//! CRUD over stored rules. Conditions are checked against the rule type
//! before anything is written, and every change is announced on the event
//! bus so open clients can reload their rule list.

use chrono::Utc;
use gavinho_common::events::{EventBus, GavinhoEvent};
use gavinho_common::{Error, Result};
use sqlx::SqlitePool;

use super::rule_engine::{default_rules, RuleCondition};
use crate::db::rules;
use crate::models::{NewValidationRule, RuleType, ValidationRule, ValidationRuleUpdate};

fn validate_definition(
    name: &str,
    rule_type: RuleType,
    field: &str,
    condition: &str,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Rule name is required".to_string()));
    }
    if field.trim().is_empty() {
        return Err(Error::InvalidInput("Rule field is required".to_string()));
    }

    RuleCondition::parse(rule_type, condition)
        .map(|_| ())
        .map_err(|e| Error::InvalidInput(e.to_string()))
}

fn rules_changed(event_bus: &EventBus, construction_id: i64, rule_id: Option<i64>) {
    event_bus.emit_lossy(GavinhoEvent::ValidationRulesChanged {
        construction_id,
        rule_id,
        timestamp: Utc::now(),
    });
}

async fn load_existing(pool: &SqlitePool, rule_id: i64) -> Result<ValidationRule> {
    rules::load_rule(pool, rule_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Validation rule {} not found", rule_id)))
}

pub async fn create_rule(
    pool: &SqlitePool,
    event_bus: &EventBus,
    construction_id: i64,
    rule: &NewValidationRule,
) -> Result<ValidationRule> {
    let rule = rule.normalized();
    validate_definition(&rule.name, rule.rule_type, &rule.field, &rule.condition)?;

    let created = rules::insert_rule(pool, construction_id, &rule).await?;
    tracing::info!(
        rule_id = created.id,
        construction_id,
        rule_type = %created.rule_type,
        "Validation rule created"
    );

    rules_changed(event_bus, construction_id, Some(created.id));
    Ok(created)
}

/// Merge `update` into the stored rule, then validate and save the result
pub async fn update_rule(
    pool: &SqlitePool,
    event_bus: &EventBus,
    rule_id: i64,
    update: &ValidationRuleUpdate,
) -> Result<ValidationRule> {
    let mut rule = load_existing(pool, rule_id).await?;
    update.apply_to(&mut rule);
    validate_definition(&rule.name, rule.rule_type, &rule.field, &rule.condition)?;

    let saved = rules::save_rule(pool, &rule).await?;
    tracing::info!(rule_id, "Validation rule updated");

    rules_changed(event_bus, saved.construction_id, Some(rule_id));
    Ok(saved)
}

pub async fn toggle_rule(
    pool: &SqlitePool,
    event_bus: &EventBus,
    rule_id: i64,
    enabled: bool,
) -> Result<ValidationRule> {
    if !rules::set_rule_enabled(pool, rule_id, enabled).await? {
        return Err(Error::NotFound(format!("Validation rule {} not found", rule_id)));
    }

    let rule = load_existing(pool, rule_id).await?;
    tracing::info!(rule_id, enabled, "Validation rule toggled");

    rules_changed(event_bus, rule.construction_id, Some(rule_id));
    Ok(rule)
}

pub async fn delete_rule(pool: &SqlitePool, event_bus: &EventBus, rule_id: i64) -> Result<()> {
    let rule = load_existing(pool, rule_id).await?;

    if !rules::delete_rule(pool, rule_id).await? {
        return Err(Error::NotFound(format!("Validation rule {} not found", rule_id)));
    }
    tracing::info!(rule_id, construction_id = rule.construction_id, "Validation rule deleted");

    rules_changed(event_bus, rule.construction_id, Some(rule_id));
    Ok(())
}

/// Add the default rules a construction does not already have (matched by
/// name). Returns the rules that were created.
pub async fn seed_default_rules(
    pool: &SqlitePool,
    event_bus: &EventBus,
    construction_id: i64,
) -> Result<Vec<ValidationRule>> {
    let existing = rules::list_rules(pool, construction_id).await?;

    let mut created = Vec::new();
    for rule in default_rules() {
        if existing.iter().any(|r| r.name == rule.name) {
            continue;
        }
        created.push(rules::insert_rule(pool, construction_id, &rule).await?);
    }

    tracing::info!(construction_id, created = created.len(), "Default validation rules seeded");

    if !created.is_empty() {
        rules_changed(event_bus, construction_id, None);
    }
    Ok(created)
}
