//! Google Sheets CSV export client
//!
//! Only sheets readable without authentication (published or shared by
//! link) can be fetched; private sheets answer with an error status.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("gavinho-mqt/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Invalid Google Sheets URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Google Sheets returned status {0}; is the sheet shared publicly?")]
    Status(u16),
}

/// Spreadsheet and optional tab identified by a sheet URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub spreadsheet_id: String,
    /// Tab id from `gid=`; the first tab when absent
    pub gid: Option<String>,
}

impl SheetRef {
    /// CSV export address of the referenced tab
    pub fn export_url(&self) -> String {
        match &self.gid {
            Some(gid) => format!(
                "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
                self.spreadsheet_id, gid
            ),
            None => format!(
                "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
                self.spreadsheet_id
            ),
        }
    }
}

fn id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").ok())
        .as_ref()
}

fn gid_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[#&?]gid=([0-9]+)").ok())
        .as_ref()
}

/// Extract the spreadsheet id and tab from a sheet URL
///
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=<gid>`
pub fn parse_sheets_url(url: &str) -> Result<SheetRef, SheetsError> {
    let spreadsheet_id = id_pattern()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SheetsError::InvalidUrl(url.to_string()))?;

    let gid = gid_pattern()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Ok(SheetRef {
        spreadsheet_id,
        gid,
    })
}

/// HTTP client for sheet exports
#[derive(Clone)]
pub struct SheetsClient {
    http_client: reqwest::Client,
}

impl SheetsClient {
    pub fn new() -> Result<Self, SheetsError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { http_client })
    }

    /// Download the CSV export of a sheet
    pub async fn fetch_csv(&self, sheet: &SheetRef) -> Result<String, SheetsError> {
        let url = sheet.export_url();
        tracing::debug!(
            spreadsheet_id = %sheet.spreadsheet_id,
            gid = ?sheet.gid,
            "Fetching sheet export"
        );

        let response = self.http_client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                spreadsheet_id = %sheet.spreadsheet_id,
                status = status.as_u16(),
                "Sheet export failed"
            );
            return Err(SheetsError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        tracing::info!(
            spreadsheet_id = %sheet.spreadsheet_id,
            bytes = text.len(),
            "Sheet export downloaded"
        );

        Ok(text)
    }
}
