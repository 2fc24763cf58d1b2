//! Cell-level access to the destination sheet.

use tracing::{debug, info};

use sheets_module::{a1_range, GoogleAuth, GoogleAuthError, SheetsClient, SheetsError};

use crate::config::SheetAccess;
use crate::placement::RowPosition;
use crate::record::{headers, Column, SCHEMA_WIDTH};

/// The tab rows are appended to, as last loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetHandle {
    pub sheet_id: i64,
    pub title: String,
    /// Allocated grid rows, header included.
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("sheet read failed: {0}")]
pub struct SheetReadError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("sheet write failed: {0}")]
pub struct SheetWriteError(pub String);

impl From<SheetsError> for SheetReadError {
    fn from(err: SheetsError) -> Self {
        SheetReadError(err.to_string())
    }
}

impl From<SheetsError> for SheetWriteError {
    fn from(err: SheetsError) -> Self {
        SheetWriteError(err.to_string())
    }
}

pub trait SheetStore: Send + Sync {
    /// Load the destination tab, creating it with the header row if absent.
    fn open_sheet(&self) -> Result<SheetHandle, SheetReadError>;

    /// Values of one column for every data row; index 0 is data row 1.
    /// Trailing blank rows may be omitted.
    fn read_column(&self, sheet: &SheetHandle, column: Column) -> Result<Vec<String>, SheetReadError>;

    /// Cells `first..=last` of one data row. Missing trailing cells may be omitted.
    fn read_row(
        &self,
        sheet: &SheetHandle,
        row: RowPosition,
        first: Column,
        last: Column,
    ) -> Result<Vec<String>, SheetReadError>;

    /// Set the allocated row count (header included).
    fn resize_rows(&self, sheet: &SheetHandle, row_count: u32) -> Result<(), SheetWriteError>;

    /// Write `values` into one data row starting at `first`.
    fn write_row(
        &self,
        sheet: &SheetHandle,
        row: RowPosition,
        first: Column,
        values: &[String],
    ) -> Result<(), SheetWriteError>;

    fn format_header(&self, sheet: &SheetHandle) -> Result<(), SheetWriteError>;
}

/// [`SheetStore`] backed by the first tab of a Google spreadsheet.
#[derive(Debug, Clone)]
pub struct GoogleSheetStore {
    client: SheetsClient,
    new_sheet_title: String,
}

impl GoogleSheetStore {
    /// `new_sheet_title` names the tab created when the spreadsheet has none.
    pub fn new(client: SheetsClient, new_sheet_title: impl Into<String>) -> Self {
        Self {
            client,
            new_sheet_title: new_sheet_title.into(),
        }
    }

    pub fn from_config(access: &SheetAccess) -> Result<Self, GoogleAuthError> {
        let auth = GoogleAuth::new(access.google.clone())?;
        let client = SheetsClient::new(auth, access.spreadsheet_id.clone());
        Ok(Self::new(client, access.settings.title.clone()))
    }
}

impl SheetStore for GoogleSheetStore {
    fn open_sheet(&self) -> Result<SheetHandle, SheetReadError> {
        let properties = match self.client.first_sheet()? {
            Some(properties) => properties,
            None => {
                info!(
                    "spreadsheet {} has no sheets; creating '{}'",
                    self.client.spreadsheet_id(),
                    self.new_sheet_title
                );
                self.client.add_sheet(&self.new_sheet_title, &headers())?
            }
        };
        debug!(
            "loaded sheet '{}' rows={} columns={}",
            properties.title, properties.row_count, properties.column_count
        );
        Ok(SheetHandle {
            sheet_id: properties.sheet_id,
            title: properties.title,
            row_count: properties.row_count,
            column_count: properties.column_count,
        })
    }

    fn read_column(&self, sheet: &SheetHandle, column: Column) -> Result<Vec<String>, SheetReadError> {
        let index = column.index();
        let range = a1_range(&sheet.title, index, 2, index, None);
        let rows = self.client.get_values(&range)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }

    fn read_row(
        &self,
        sheet: &SheetHandle,
        row: RowPosition,
        first: Column,
        last: Column,
    ) -> Result<Vec<String>, SheetReadError> {
        let sheet_row = row.sheet_row();
        let range = a1_range(&sheet.title, first.index(), sheet_row, last.index(), Some(sheet_row));
        let rows = self.client.get_values(&range)?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    fn resize_rows(&self, sheet: &SheetHandle, row_count: u32) -> Result<(), SheetWriteError> {
        self.client.resize_rows(sheet.sheet_id, row_count)?;
        Ok(())
    }

    fn write_row(
        &self,
        sheet: &SheetHandle,
        row: RowPosition,
        first: Column,
        values: &[String],
    ) -> Result<(), SheetWriteError> {
        if values.is_empty() {
            return Ok(());
        }
        let start = first.index();
        let end = start + values.len() - 1;
        if end >= SCHEMA_WIDTH {
            return Err(SheetWriteError(format!(
                "{} values starting at column {} exceed the {}-column schema",
                values.len(),
                start,
                SCHEMA_WIDTH
            )));
        }
        let sheet_row = row.sheet_row();
        let range = a1_range(&sheet.title, start, sheet_row, end, Some(sheet_row));
        self.client.update_values(&range, &[values.to_vec()])?;
        Ok(())
    }

    fn format_header(&self, sheet: &SheetHandle) -> Result<(), SheetWriteError> {
        self.client.format_header(sheet.sheet_id, SCHEMA_WIDTH)?;
        Ok(())
    }
}
