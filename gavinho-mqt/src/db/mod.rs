//! Database access for gavinho-mqt
//!
//! Single-statement functions take any [`sqlx::SqliteExecutor`] so they run
//! against the pool or inside a transaction. Functions issuing several
//! statements take `&mut SqliteConnection`.

pub mod categories;
pub mod imports;
pub mod items;
pub mod rules;

use chrono::{DateTime, SecondsFormat, Utc};
use gavinho_common::{Error, Result};

/// Current time in the stored text form (RFC 3339, UTC, microseconds)
///
/// The fixed format keeps lexical order equal to chronological order.
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}
