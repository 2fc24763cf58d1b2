//! Writing one record into its row, columns B..R only.

use tracing::{debug, warn};

use crate::placement::RowPosition;
use crate::record::{Column, SheetRecord};
use crate::sheet_store::{SheetHandle, SheetStore, SheetWriteError};

pub fn write_row(
    store: &dyn SheetStore,
    sheet: &SheetHandle,
    position: RowPosition,
    record: &SheetRecord,
) -> Result<(), SheetWriteError> {
    let current = store
        .read_row(sheet, position, Column::first_owned(), Column::last_owned())
        .map_err(|err| SheetWriteError(err.to_string()))?;
    if current.iter().any(|cell| !cell.trim().is_empty()) {
        warn!(
            "row {} of '{}' already holds data in B..R; overwriting",
            position, sheet.title
        );
    }

    let values = record.owned_cells();
    debug!("writing {} cells to row {} of '{}'", values.len(), position, sheet.title);
    store.write_row(sheet, position, Column::first_owned(), &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemorySheet;

    fn position(n: u32) -> RowPosition {
        RowPosition::new(n).expect("position")
    }

    #[test]
    fn writes_owned_columns_and_leaves_sequence() {
        let store = MemorySheet::with_dates(&["2024/01/01"]);
        store.set_cell(2, Column::Sequence, "=ROW()-1");
        let sheet = store.open_sheet().expect("open");
        let record = SheetRecord {
            sequence: Some("7".to_string()),
            system: Some("ops".to_string()),
            date: Some("2024/01/02".to_string()),
            content: Some("bob: hello".to_string()),
            ..Default::default()
        };

        write_row(&store, &sheet, position(2), &record).expect("write");

        assert_eq!(store.cell(2, Column::Sequence), "=ROW()-1");
        assert_eq!(store.cell(2, Column::System), "ops");
        assert_eq!(store.cell(2, Column::Date), "2024/01/02");
        assert_eq!(store.cell(2, Column::Content), "bob: hello");
        assert_eq!(store.cell(2, Column::Table3), "");
    }

    #[test]
    fn existing_content_is_overwritten() {
        let store = MemorySheet::with_dates(&["2024/01/01"]);
        store.set_cell(1, Column::Content, "manual note");
        let sheet = store.open_sheet().expect("open");
        let record = SheetRecord {
            content: Some("carol: replaced".to_string()),
            ..Default::default()
        };

        write_row(&store, &sheet, position(1), &record).expect("write");
        assert_eq!(store.cell(1, Column::Content), "carol: replaced");
        assert_eq!(store.cell(1, Column::Date), "");
    }

    #[test]
    fn store_failure_surfaces_as_write_error() {
        let store = MemorySheet::with_dates(&[]);
        let sheet = store.open_sheet().expect("open");
        store.fail_writes(true);
        let err = write_row(&store, &sheet, position(1), &SheetRecord::default())
            .expect_err("write should fail");
        assert!(err.to_string().contains("sheet write failed"));
    }
}
