//! In-memory fakes of the chat, sheet and clock capabilities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::channel::{ChannelClassifier, ChannelKind, ChannelLookupError};
use crate::dedup::Clock;
use crate::message::{MessageResolutionError, MessageResolver, ResolvedMessage};
use crate::placement::RowPosition;
use crate::record::{Column, SCHEMA_WIDTH};
use crate::sheet_store::{SheetHandle, SheetReadError, SheetStore, SheetWriteError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }
}

/// Grid of data rows; index 0 is data row 1. The grid always holds exactly
/// `row_count - 1` data rows.
pub(crate) struct MemorySheet {
    rows: Mutex<Vec<Vec<String>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    resize_calls: AtomicUsize,
    write_calls: AtomicUsize,
    header_formats: AtomicUsize,
}

impl MemorySheet {
    /// One data row per date, blank dates allowed.
    pub(crate) fn with_dates(dates: &[&str]) -> Self {
        let rows = dates
            .iter()
            .map(|date| {
                let mut row = blank_row();
                row[Column::Date.index()] = date.to_string();
                row
            })
            .collect();
        Self {
            rows: Mutex::new(rows),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_delay: Mutex::new(None),
            resize_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            header_formats: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn slow_writes(&self, delay: Duration) {
        *lock(&self.write_delay) = Some(delay);
    }

    pub(crate) fn set_cell(&self, data_row: u32, column: Column, value: &str) {
        let mut rows = lock(&self.rows);
        let index = data_row as usize - 1;
        if rows.len() <= index {
            rows.resize_with(index + 1, blank_row);
        }
        rows[index][column.index()] = value.to_string();
    }

    pub(crate) fn cell(&self, data_row: u32, column: Column) -> String {
        lock(&self.rows)
            .get(data_row as usize - 1)
            .map(|row| row[column.index()].clone())
            .unwrap_or_default()
    }

    pub(crate) fn row_count(&self) -> u32 {
        lock(&self.rows).len() as u32 + 1
    }

    pub(crate) fn column_count(&self) -> u32 {
        SCHEMA_WIDTH as u32
    }

    pub(crate) fn resize_calls(&self) -> usize {
        self.resize_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn header_formats(&self) -> usize {
        self.header_formats.load(Ordering::SeqCst)
    }
}

fn blank_row() -> Vec<String> {
    vec![String::new(); SCHEMA_WIDTH]
}

impl SheetStore for MemorySheet {
    fn open_sheet(&self) -> Result<SheetHandle, SheetReadError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SheetReadError("sheet unavailable".to_string()));
        }
        Ok(SheetHandle {
            sheet_id: 0,
            title: "Log".to_string(),
            row_count: self.row_count(),
            column_count: self.column_count(),
        })
    }

    fn read_column(&self, _sheet: &SheetHandle, column: Column) -> Result<Vec<String>, SheetReadError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SheetReadError("sheet unavailable".to_string()));
        }
        Ok(lock(&self.rows)
            .iter()
            .map(|row| row[column.index()].clone())
            .collect())
    }

    fn read_row(
        &self,
        _sheet: &SheetHandle,
        row: RowPosition,
        first: Column,
        last: Column,
    ) -> Result<Vec<String>, SheetReadError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SheetReadError("sheet unavailable".to_string()));
        }
        Ok(lock(&self.rows)
            .get(row.get() as usize - 1)
            .map(|cells| cells[first.index()..=last.index()].to_vec())
            .unwrap_or_default())
    }

    fn resize_rows(&self, _sheet: &SheetHandle, row_count: u32) -> Result<(), SheetWriteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SheetWriteError("sheet is read-only".to_string()));
        }
        self.resize_calls.fetch_add(1, Ordering::SeqCst);
        let data_rows = row_count.saturating_sub(1) as usize;
        lock(&self.rows).resize_with(data_rows, blank_row);
        Ok(())
    }

    fn write_row(
        &self,
        _sheet: &SheetHandle,
        row: RowPosition,
        first: Column,
        values: &[String],
    ) -> Result<(), SheetWriteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SheetWriteError("sheet is read-only".to_string()));
        }
        let delay = *lock(&self.write_delay);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut rows = lock(&self.rows);
        let index = row.get() as usize - 1;
        let Some(cells) = rows.get_mut(index) else {
            return Err(SheetWriteError(format!(
                "row {} is outside the grid",
                row.sheet_row()
            )));
        };
        for (offset, value) in values.iter().enumerate() {
            cells[first.index() + offset] = value.clone();
        }
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn format_header(&self, _sheet: &SheetHandle) -> Result<(), SheetWriteError> {
        self.header_formats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeMessage {
    user: String,
    text: String,
}

/// Chat platform with a fixed set of channels, users and messages.
pub(crate) struct FakeSlack {
    channels: Mutex<HashMap<String, ChannelKind>>,
    users: Mutex<HashMap<String, String>>,
    messages: Mutex<HashMap<(String, String), FakeMessage>>,
    failing_resolutions: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl FakeSlack {
    pub(crate) fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            failing_resolutions: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn channel(self, id: &str, kind: ChannelKind) -> Self {
        lock(&self.channels).insert(id.to_string(), kind);
        self
    }

    pub(crate) fn user(self, id: &str, name: &str) -> Self {
        lock(&self.users).insert(id.to_string(), name.to_string());
        self
    }

    pub(crate) fn message(self, channel: &str, ts: &str, user: &str, text: &str) -> Self {
        self.add_message(channel, ts, user, text);
        self
    }

    pub(crate) fn add_message(&self, channel: &str, ts: &str, user: &str, text: &str) {
        lock(&self.messages).insert(
            (channel.to_string(), ts.to_string()),
            FakeMessage {
                user: user.to_string(),
                text: text.to_string(),
            },
        );
    }

    /// Make the next `count` resolve calls fail with an API error.
    pub(crate) fn fail_next_resolutions(&self, count: usize) {
        self.failing_resolutions.store(count, Ordering::SeqCst);
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

impl ChannelClassifier for FakeSlack {
    fn classify(&self, channel_id: &str) -> Result<ChannelKind, ChannelLookupError> {
        lock(&self.channels)
            .get(channel_id)
            .copied()
            .ok_or_else(|| ChannelLookupError {
                channel_id: channel_id.to_string(),
                reason: "channel_not_found".to_string(),
            })
    }
}

impl MessageResolver for FakeSlack {
    fn resolve(&self, channel_id: &str, ts: &str) -> Result<ResolvedMessage, MessageResolutionError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_resolutions.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_resolutions.store(failing - 1, Ordering::SeqCst);
            return Err(MessageResolutionError::Api("ratelimited".to_string()));
        }

        let (user, text) = {
            let messages = lock(&self.messages);
            let message = messages
                .get(&(channel_id.to_string(), ts.to_string()))
                .ok_or_else(|| MessageResolutionError::NotFound {
                    channel_id: channel_id.to_string(),
                    ts: ts.to_string(),
                })?;
            (message.user.clone(), message.text.clone())
        };
        let author_name = self.display_name(&user)?;
        Ok(ResolvedMessage {
            ts: ts.to_string(),
            author_id: user,
            author_name,
            text,
            permalink: format!(
                "https://example.slack.com/archives/{}/p{}",
                channel_id,
                ts.replace('.', "")
            ),
        })
    }

    fn display_name(&self, user_id: &str) -> Result<String, MessageResolutionError> {
        lock(&self.users)
            .get(user_id)
            .cloned()
            .ok_or_else(|| MessageResolutionError::UserNotFound(user_id.to_string()))
    }
}
