//! Blocking client for the Google Sheets v4 REST API.
//!
//! Only the handful of calls needed to keep a single log sheet are wrapped:
//! reading sheet metadata, creating a sheet, reading and writing A1 ranges,
//! growing the row count and formatting the header row.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::google_auth::{GoogleAuth, GoogleAuthError};

pub const DEFAULT_SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// Rows allocated when the client creates a fresh sheet.
const NEW_SHEET_ROW_COUNT: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("auth error: {0}")]
    Auth(#[from] GoogleAuthError),
    #[error("http error: {0}")]
    Http(String),
    #[error("sheets api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse sheets response: {0}")]
    Parse(String),
}

/// Properties of one tab inside the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: RawSheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: Option<GridProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

impl From<RawSheetProperties> for SheetProperties {
    fn from(raw: RawSheetProperties) -> Self {
        let grid = raw.grid_properties.unwrap_or_default();
        Self {
            sheet_id: raw.sheet_id,
            title: raw.title,
            row_count: grid.row_count,
            column_count: grid.column_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Client bound to one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    auth: GoogleAuth,
    spreadsheet_id: String,
    api_base: String,
}

impl SheetsClient {
    /// Create a client; `GOOGLE_SHEETS_API_BASE_URL` overrides the API host.
    pub fn new(auth: GoogleAuth, spreadsheet_id: impl Into<String>) -> Self {
        let api_base = std::env::var("GOOGLE_SHEETS_API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE_URL.to_string());
        Self {
            auth,
            spreadsheet_id: spreadsheet_id.into(),
            api_base,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}",
            self.api_base.trim_end_matches('/'),
            self.spreadsheet_id
        )
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(range)
        )
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        action: &str,
    ) -> Result<reqwest::blocking::Response, SheetsError> {
        let access_token = self.auth.get_access_token()?;
        let response = request
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!(
                "Sheets {} failed for {}: {} - {}",
                action, self.spreadsheet_id, status, body
            );
            return Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn batch_update(&self, requests: Vec<Value>, action: &str) -> Result<Value, SheetsError> {
        let client = reqwest::blocking::Client::new();
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let response = self.send(
            client.post(&url).json(&json!({ "requests": requests })),
            action,
        )?;
        response
            .json()
            .map_err(|e| SheetsError::Parse(e.to_string()))
    }

    /// Metadata of the first tab, or `None` when the spreadsheet has no tabs.
    pub fn first_sheet(&self) -> Result<Option<SheetProperties>, SheetsError> {
        let client = reqwest::blocking::Client::new();
        let url = format!("{}?fields=sheets.properties", self.spreadsheet_url());
        let response = self.send(client.get(&url), "metadata")?;
        let spreadsheet: SpreadsheetResponse = response
            .json()
            .map_err(|e| SheetsError::Parse(e.to_string()))?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .next()
            .map(|entry| entry.properties.into()))
    }

    /// Create a tab and write `headers` into its first row.
    pub fn add_sheet(&self, title: &str, headers: &[&str]) -> Result<SheetProperties, SheetsError> {
        let reply = self.batch_update(
            vec![json!({
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROW_COUNT,
                            "columnCount": headers.len(),
                        }
                    }
                }
            })],
            "addSheet",
        )?;

        let raw = reply
            .pointer("/replies/0/addSheet/properties")
            .cloned()
            .ok_or_else(|| SheetsError::Parse("addSheet reply missing properties".to_string()))?;
        let properties: SheetProperties = serde_json::from_value::<RawSheetProperties>(raw)
            .map_err(|e| SheetsError::Parse(e.to_string()))?
            .into();

        if !headers.is_empty() {
            let range = a1_range(&properties.title, 0, 1, headers.len() - 1, Some(1));
            let row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
            self.update_values(&range, &[row])?;
        }

        info!(
            "Created sheet '{}' ({}) in {}",
            properties.title, properties.sheet_id, self.spreadsheet_id
        );
        Ok(properties)
    }

    /// Read an A1 range as rows of display strings.
    ///
    /// The API omits trailing empty rows and trailing empty cells within a row,
    /// so callers must treat missing entries as blank.
    pub fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let client = reqwest::blocking::Client::new();
        let url = format!(
            "{}?majorDimension=ROWS&valueRenderOption=FORMATTED_VALUE",
            self.values_url(range)
        );
        let response = self.send(client.get(&url), "values.get")?;
        let value_range: ValueRange = response
            .json()
            .map_err(|e| SheetsError::Parse(e.to_string()))?;
        debug!("Read {} rows from {}", value_range.values.len(), range);
        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    /// Overwrite an A1 range. Values are parsed as if typed by a user, so
    /// formulas such as `=HYPERLINK(...)` stay live.
    pub fn update_values(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        let client = reqwest::blocking::Client::new();
        let url = format!("{}?valueInputOption=USER_ENTERED", self.values_url(range));
        let payload = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        self.send(client.put(&url).json(&payload), "values.update")?;
        debug!("Updated {}", range);
        Ok(())
    }

    /// Set the tab's grid row count.
    pub fn resize_rows(&self, sheet_id: i64, row_count: u32) -> Result<(), SheetsError> {
        self.batch_update(
            vec![json!({
                "updateSheetProperties": {
                    "properties": {
                        "sheetId": sheet_id,
                        "gridProperties": { "rowCount": row_count }
                    },
                    "fields": "gridProperties.rowCount"
                }
            })],
            "resize",
        )?;
        info!("Resized sheet {} to {} rows", sheet_id, row_count);
        Ok(())
    }

    /// Bold the first `column_count` header cells on a light grey background.
    pub fn format_header(&self, sheet_id: i64, column_count: usize) -> Result<(), SheetsError> {
        self.batch_update(
            vec![json!({
                "repeatCell": {
                    "range": {
                        "sheetId": sheet_id,
                        "startRowIndex": 0,
                        "endRowIndex": 1,
                        "startColumnIndex": 0,
                        "endColumnIndex": column_count,
                    },
                    "cell": {
                        "userEnteredFormat": {
                            "textFormat": { "bold": true },
                            "backgroundColor": { "red": 0.8, "green": 0.8, "blue": 0.8 }
                        }
                    },
                    "fields": "userEnteredFormat(textFormat,backgroundColor)"
                }
            })],
            "repeatCell",
        )?;
        info!("Formatted header row of sheet {}", sheet_id);
        Ok(())
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Spreadsheet column letter for a zero-based column index (0 → `A`, 26 → `AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Build a quoted A1 range. Rows are 1-based sheet rows; `end_row: None`
/// leaves the range open to the bottom of the sheet.
pub fn a1_range(
    title: &str,
    start_column: usize,
    start_row: u32,
    end_column: usize,
    end_row: Option<u32>,
) -> String {
    let quoted = format!("'{}'", title.replace('\'', "''"));
    let end_row = end_row.map(|row| row.to_string()).unwrap_or_default();
    format!(
        "{}!{}{}:{}{}",
        quoted,
        column_letter(start_column),
        start_row,
        column_letter(end_column),
        end_row
    )
}
