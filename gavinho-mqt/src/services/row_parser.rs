//! Spreadsheet parsing for MQT imports
//!
//! Turns a CSV export (file upload or Google Sheets) into [`ImportRow`]s plus
//! the row-level problems found while reading it. Columns are located by
//! matching header text in Portuguese or English, so column order is free.
//!
//! Row numbers in issues are spreadsheet line numbers: the header is line 1.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::ImportRow;

/// Row fields a header can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Code,
    Category,
    Type,
    Subtype,
    Zone,
    Description,
    Unit,
    Quantity,
    UnitPrice,
    TotalPrice,
    Supplier,
    Notes,
}

/// Header patterns in match order. Subtype precedes type and both prices
/// precede unit, since their headers contain the shorter words.
const HEADER_PATTERNS: &[(Column, &str)] = &[
    (Column::Code, r"c[óo]digo|code"),
    (Column::Category, r"categoria|category"),
    (Column::Subtype, r"subtipo|subtype"),
    (Column::Type, r"tipo|type"),
    (Column::Zone, r"zona|zone"),
    (Column::Description, r"descri[çc][ãa]o|description"),
    (Column::UnitPrice, r"pre[çc]o.*unit[áa]rio|unit.*price|p\.u\."),
    (Column::TotalPrice, r"pre[çc]o.*total|total.*price|p\.t\."),
    (Column::Unit, r"unidade|unit|un\."),
    (Column::Quantity, r"quantidade|quantity|qtd"),
    (Column::Supplier, r"fornecedor|supplier"),
    (Column::Notes, r"notas|notes|observa[çc][õo]es"),
];

fn header_patterns() -> &'static [(Column, Regex)] {
    static PATTERNS: OnceLock<Vec<(Column, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        HEADER_PATTERNS
            .iter()
            .filter_map(|(column, pattern)| Regex::new(pattern).ok().map(|re| (*column, re)))
            .collect()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// A problem found in one spreadsheet row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetIssue {
    /// Spreadsheet line (header is 1)
    pub row: usize,
    pub field: String,
    pub message: String,
    pub severity: IssueSeverity,
}

impl SheetIssue {
    fn error(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
            severity: IssueSeverity::Error,
        }
    }

    fn warning(row: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row,
            field: field.to_string(),
            message: message.into(),
            severity: IssueSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetSummary {
    pub total: usize,
    /// Rows without any error
    pub valid: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// Rows read from a sheet together with their issues
///
/// Rows with errors are kept in `data` so the caller can show them; the
/// importer rejects them individually.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedSheet {
    pub data: Vec<ImportRow>,
    pub errors: Vec<SheetIssue>,
    pub warnings: Vec<SheetIssue>,
    pub summary: SheetSummary,
    /// Spreadsheet line of each entry in `data`
    #[serde(skip)]
    pub line_numbers: Vec<usize>,
}

impl ParsedSheet {
    /// Rows paired with their spreadsheet line
    pub fn numbered_rows(&self) -> Vec<(usize, &ImportRow)> {
        self.line_numbers.iter().copied().zip(self.data.iter()).collect()
    }
}

/// Map header cells to columns; the first header matching a column wins
pub fn detect_columns<'a, I>(headers: I) -> Vec<(Column, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found: Vec<(Column, usize)> = Vec::new();

    for (index, header) in headers.into_iter().enumerate() {
        let normalized = header.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }

        let matched = header_patterns()
            .iter()
            .find(|(_, re)| re.is_match(&normalized))
            .map(|(column, _)| *column);

        if let Some(column) = matched {
            if !found.iter().any(|(c, _)| *c == column) {
                found.push((column, index));
            }
        }
    }

    found
}

/// Parse a number as written in a Portuguese or English spreadsheet
///
/// Accepts `1234.5`, `1234,5`, `1.234,50`, `1,234.50` and a trailing `€`.
pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse CSV text into rows and issues
pub fn parse_csv(text: &str) -> ParsedSheet {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut sheet = ParsedSheet::default();
    let mut records = reader.records().enumerate();

    let columns = match records.next() {
        Some((_, Ok(header))) => detect_columns(header.iter()),
        Some((_, Err(e))) => {
            sheet
                .errors
                .push(SheetIssue::error(1, "general", format!("Cabeçalho inválido: {}", e)));
            sheet.summary.errors = 1;
            return sheet;
        }
        None => return sheet,
    };

    tracing::debug!(columns = columns.len(), "Detected sheet columns");

    let mut seen_codes: HashSet<String> = HashSet::new();
    let mut rows_with_errors: HashSet<usize> = HashSet::new();

    for (index, record) in records {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(index + 1, |p| p.line() as usize);
                sheet.errors.push(SheetIssue::error(
                    line,
                    "general",
                    format!("Erro ao processar linha: {}", e),
                ));
                rows_with_errors.insert(line);
                continue;
            }
        };

        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        // Blank lines produce no record, so the index alone can drift
        let line = record.position().map_or(index + 1, |p| p.line() as usize);

        let cell = |column: Column| -> String {
            columns
                .iter()
                .find(|(c, _)| *c == column)
                .and_then(|(_, i)| record.get(*i))
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        let optional = |column: Column| Some(cell(column)).filter(|v| !v.is_empty());
        let price = |column: Column| parse_number(&cell(column)).filter(|v| *v != 0.0);

        let row = ImportRow {
            code: cell(Column::Code),
            category: cell(Column::Category),
            item_type: optional(Column::Type),
            subtype: optional(Column::Subtype),
            zone: optional(Column::Zone),
            description: cell(Column::Description),
            unit: cell(Column::Unit),
            quantity: parse_number(&cell(Column::Quantity)).unwrap_or(0.0),
            unit_price: price(Column::UnitPrice),
            total_price: price(Column::TotalPrice),
            supplier: optional(Column::Supplier),
            notes: optional(Column::Notes),
        };

        let errors_before = sheet.errors.len();
        check_required(&row, line, &mut sheet.errors);
        if sheet.errors.len() > errors_before {
            rows_with_errors.insert(line);
        }

        if row.unit_price.is_none() {
            sheet.warnings.push(SheetIssue::warning(
                line,
                "unitPrice",
                "Preço unitário não definido",
            ));
        }

        if !row.code.is_empty() && !seen_codes.insert(row.code.clone()) {
            sheet.warnings.push(SheetIssue::warning(
                line,
                "code",
                format!("Código duplicado: {}", row.code),
            ));
        }

        sheet.data.push(row);
        sheet.line_numbers.push(line);
    }

    sheet.summary = SheetSummary {
        total: sheet.data.len(),
        valid: sheet
            .line_numbers
            .iter()
            .filter(|line| !rows_with_errors.contains(line))
            .count(),
        errors: sheet.errors.len(),
        warnings: sheet.warnings.len(),
    };

    sheet
}

fn check_required(row: &ImportRow, line: usize, errors: &mut Vec<SheetIssue>) {
    if row.code.is_empty() {
        errors.push(SheetIssue::error(line, "code", "Código é obrigatório"));
    }
    if row.category.is_empty() {
        errors.push(SheetIssue::error(line, "category", "Categoria é obrigatória"));
    }
    if row.description.is_empty() {
        errors.push(SheetIssue::error(line, "description", "Descrição é obrigatória"));
    }
    if row.unit.is_empty() {
        errors.push(SheetIssue::error(line, "unit", "Unidade é obrigatória"));
    }
    if row.quantity <= 0.0 {
        errors.push(SheetIssue::error(
            line,
            "quantity",
            "Quantidade deve ser maior que zero",
        ));
    }
}
