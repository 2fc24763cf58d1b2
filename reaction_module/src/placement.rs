//! Choosing the data row a new record goes into.
//!
//! The sheet is pre-filled with blank rows and may carry formulas further
//! down, so the last row with a date is the anchor rather than the grid size.

use std::fmt;

use tracing::{debug, info};

use crate::record::Column;
use crate::sheet_store::{SheetHandle, SheetReadError, SheetStore, SheetWriteError};

/// 1-based data row index; the header is not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowPosition(u32);

impl RowPosition {
    /// Returns `None` for 0.
    pub fn new(position: u32) -> Option<Self> {
        (position > 0).then_some(RowPosition(position))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// A1 row number, header included.
    pub fn sheet_row(self) -> u32 {
        self.0 + 1
    }
}

impl fmt::Display for RowPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row after the last data row whose date cell is non-blank.
pub fn find_insertion_row(dates: &[String]) -> RowPosition {
    let last_dated = dates
        .iter()
        .rposition(|cell| !cell.trim().is_empty())
        .map(|index| index as u32 + 1)
        .unwrap_or(0);
    RowPosition(last_dated + 1)
}

pub fn locate_insertion_row(
    store: &dyn SheetStore,
    sheet: &SheetHandle,
) -> Result<RowPosition, SheetReadError> {
    let dates = store.read_column(sheet, Column::Date)?;
    let position = find_insertion_row(&dates);
    debug!(
        "insertion row {} after scanning {} date cells in '{}'",
        position,
        dates.len(),
        sheet.title
    );
    Ok(position)
}

/// Grow the grid so `position` exists. Never shrinks and leaves columns alone.
/// Returns whether a resize was issued.
pub fn ensure_capacity(
    store: &dyn SheetStore,
    sheet: &mut SheetHandle,
    position: RowPosition,
) -> Result<bool, SheetWriteError> {
    let required = position.sheet_row();
    if sheet.row_count >= required {
        return Ok(false);
    }
    info!(
        "growing '{}' from {} to {} rows",
        sheet.title, sheet.row_count, required
    );
    store.resize_rows(sheet, required)?;
    sheet.row_count = required;
    Ok(true)
}
