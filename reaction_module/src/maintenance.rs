//! Operations behind the `reaction-sheet` maintenance CLI.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::pipeline::{append_record, PipelineError};
use crate::placement::{locate_insertion_row, RowPosition};
use crate::record::{origin_link, RecordDefaults, SheetRecord};
use crate::sheet_store::{SheetHandle, SheetReadError, SheetStore};

pub const TEST_ROW_LINK: &str = "https://example.com";

/// Row the next recorded reaction would land in.
pub fn last_row(store: &dyn SheetStore) -> Result<RowPosition, SheetReadError> {
    let sheet = store.open_sheet()?;
    locate_insertion_row(store, &sheet)
}

/// Append a clearly labelled row dated `now`, exercising the whole write path.
pub fn append_test_row(
    store: &dyn SheetStore,
    defaults: &RecordDefaults,
    now: DateTime<Utc>,
) -> Result<RowPosition, PipelineError> {
    let record = SheetRecord {
        system: Some(defaults.system_tag.clone()).filter(|tag| !tag.is_empty()),
        date: Some(
            now.with_timezone(&defaults.utc_offset)
                .format("%Y/%m/%d")
                .to_string(),
        ),
        origin: Some(origin_link(TEST_ROW_LINK)),
        assignee1: Some("reaction-sheet".to_string()),
        content: Some(format!("test row {}", now.to_rfc3339())),
        ..Default::default()
    };
    let (sheet, row) = append_record(store, &record)?;
    info!("appended test row {} to '{}'", row, sheet.title);
    Ok(row)
}

/// Bold the header row on a grey background.
pub fn format_headers(store: &dyn SheetStore) -> Result<SheetHandle, PipelineError> {
    let sheet = store.open_sheet()?;
    store.format_header(&sheet)?;
    info!("formatted header row of '{}'", sheet.title);
    Ok(sheet)
}
