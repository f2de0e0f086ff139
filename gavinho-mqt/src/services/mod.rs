//! MQT service logic
//!
//! - `importer`: import batches and their revert
//! - `row_parser`, `sheets`: reading spreadsheets
//! - `rule_engine`, `rule_store`: validation rules
//! - `preview`: parse plus rule check without writing

pub mod importer;
pub mod preview;
pub mod row_parser;
pub mod rule_engine;
pub mod rule_store;
pub mod sheets;

pub use importer::{category_code, import_items, revert_import, RowError};
pub use preview::{preview_csv, preview_sheet, PreviewError, PreviewReport};
pub use row_parser::{parse_csv, IssueSeverity, ParsedSheet, SheetIssue, SheetSummary};
pub use rule_engine::{apply_validation_rules, default_rules, number_rows, RuleCondition};
pub use sheets::{parse_sheets_url, SheetRef, SheetsClient, SheetsError};
