//! Fixed column schema of the destination sheet and the record written into it.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Columns A..R, in sheet order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Sequence,
    System,
    Date,
    Origin,
    Assignee1,
    Assignee2,
    Assignee3,
    Content,
    Completed,
    Hidden,
    Result,
    SupportIssue,
    Screen1,
    Screen2,
    Screen3,
    Table1,
    Table2,
    Table3,
}

pub struct ColumnSpec {
    pub column: Column,
    pub header: &'static str,
}

/// Ordered mapping between record fields and header text.
pub const COLUMNS: [ColumnSpec; 18] = [
    ColumnSpec { column: Column::Sequence, header: "#" },
    ColumnSpec { column: Column::System, header: "システム" },
    ColumnSpec { column: Column::Date, header: "発生日" },
    ColumnSpec { column: Column::Origin, header: "起点\n(リンク等)" },
    ColumnSpec { column: Column::Assignee1, header: "対応者1" },
    ColumnSpec { column: Column::Assignee2, header: "対応者2" },
    ColumnSpec { column: Column::Assignee3, header: "対応者3" },
    ColumnSpec { column: Column::Content, header: "内容" },
    ColumnSpec { column: Column::Completed, header: "完了" },
    ColumnSpec { column: Column::Hidden, header: "非表示" },
    ColumnSpec { column: Column::Result, header: "調査結果\n対応結果" },
    ColumnSpec { column: Column::SupportIssue, header: "Support Issue" },
    ColumnSpec { column: Column::Screen1, header: "関連画面1" },
    ColumnSpec { column: Column::Screen2, header: "関連画面2" },
    ColumnSpec { column: Column::Screen3, header: "関連画面3" },
    ColumnSpec { column: Column::Table1, header: "関連テーブル1" },
    ColumnSpec { column: Column::Table2, header: "関連テーブル2" },
    ColumnSpec { column: Column::Table3, header: "関連テーブル3" },
];

pub const SCHEMA_WIDTH: usize = COLUMNS.len();

impl Column {
    /// Zero-based column index (A = 0).
    pub fn index(self) -> usize {
        // Variants are declared in sheet order, matching COLUMNS.
        self as usize
    }

    pub fn header(self) -> &'static str {
        COLUMNS[self.index()].header
    }

    /// Columns the row writer owns: everything except the sequence number,
    /// which spreadsheet formulas or people maintain.
    pub fn owned() -> impl Iterator<Item = Column> {
        COLUMNS
            .iter()
            .map(|spec| spec.column)
            .filter(|column| *column != Column::Sequence)
    }

    pub fn first_owned() -> Column {
        Column::System
    }

    pub fn last_owned() -> Column {
        Column::Table3
    }
}

pub fn headers() -> Vec<&'static str> {
    COLUMNS.iter().map(|spec| spec.header).collect()
}

/// One row of the log. `None` fields are written as empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRecord {
    /// Never written; present so callers cannot smuggle a value into column A.
    pub sequence: Option<String>,
    pub system: Option<String>,
    pub date: Option<String>,
    pub origin: Option<String>,
    pub assignee1: Option<String>,
    pub assignee2: Option<String>,
    pub assignee3: Option<String>,
    pub content: Option<String>,
    pub completed: Option<String>,
    pub hidden: Option<String>,
    pub result: Option<String>,
    pub support_issue: Option<String>,
    pub screen1: Option<String>,
    pub screen2: Option<String>,
    pub screen3: Option<String>,
    pub table1: Option<String>,
    pub table2: Option<String>,
    pub table3: Option<String>,
}

impl SheetRecord {
    pub fn value(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Sequence => &self.sequence,
            Column::System => &self.system,
            Column::Date => &self.date,
            Column::Origin => &self.origin,
            Column::Assignee1 => &self.assignee1,
            Column::Assignee2 => &self.assignee2,
            Column::Assignee3 => &self.assignee3,
            Column::Content => &self.content,
            Column::Completed => &self.completed,
            Column::Hidden => &self.hidden,
            Column::Result => &self.result,
            Column::SupportIssue => &self.support_issue,
            Column::Screen1 => &self.screen1,
            Column::Screen2 => &self.screen2,
            Column::Screen3 => &self.screen3,
            Column::Table1 => &self.table1,
            Column::Table2 => &self.table2,
            Column::Table3 => &self.table3,
        };
        value.as_deref()
    }

    /// Cell values for the owned columns B..R, blanks for unset fields.
    pub fn owned_cells(&self) -> Vec<String> {
        Column::owned()
            .map(|column| self.value(column).unwrap_or_default().to_string())
            .collect()
    }
}

/// Per-deployment values for the columns the message itself does not supply.
#[derive(Debug, Clone)]
pub struct RecordDefaults {
    pub system_tag: String,
    pub default_assignee: Option<String>,
    /// Put the reacting user's display name into the first assignee slot.
    pub assign_reactor: bool,
    pub completed: String,
    /// Offset used to turn message timestamps into calendar dates.
    pub utc_offset: FixedOffset,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            system_tag: String::new(),
            default_assignee: None,
            assign_reactor: false,
            completed: String::new(),
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap_or(Utc.fix()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid message timestamp: {0}")]
pub struct InvalidTimestamp(pub String);

/// Calendar date (`YYYY/MM/DD`) of a Slack message timestamp such as
/// `1700000000.000100`, in the given offset.
pub fn format_message_date(ts: &str, offset: FixedOffset) -> Result<String, InvalidTimestamp> {
    let seconds: i64 = ts
        .split('.')
        .next()
        .and_then(|secs| secs.parse().ok())
        .ok_or_else(|| InvalidTimestamp(ts.to_string()))?;
    let utc: DateTime<Utc> =
        DateTime::from_timestamp(seconds, 0).ok_or_else(|| InvalidTimestamp(ts.to_string()))?;
    Ok(utc.with_timezone(&offset).format("%Y/%m/%d").to_string())
}

/// `=HYPERLINK(...)` formula pointing back at the message.
pub fn origin_link(permalink: &str) -> String {
    format!("=HYPERLINK(\"{}\", \"Slack\")", permalink.replace('"', "\"\""))
}

/// `author: text`, the content cell.
pub fn content_cell(author_name: &str, text: &str) -> String {
    format!("{}: {}", author_name, text)
}
