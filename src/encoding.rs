//! Wire formats for the three sink encodings.
//!
//! - Tabular: CSV with a one-time header row of the historical column titles.
//! - Structured list: one pretty-printed JSON array of record objects,
//!   non-ASCII characters preserved as-is.
//! - Plain text: a banner written once, then one self-delimited block per
//!   record, each closed by a rule line.

use crate::error::SinkError;
use crate::record::AttendanceRecord;

/// File encoding a sink uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    PlainText,
    StructuredList,
    TabularRows,
}

/// Column titles shared by the tabular header and the structured-list keys.
pub const COLUMNS: [&str; 7] =
    ["Date", "Day", "Time", "Computer Name", "User", "Event", "Status"];

/// Width of the banner and rule lines in the plain-text journal.
const RULE_WIDTH: usize = 80;

/// The line that closes every plain-text record block. Verification re-reads
/// the tail of the file and expects to find this line last.
pub fn plain_text_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Banner written once at the top of a fresh plain-text journal.
pub fn plain_text_banner() -> String {
    let bar = "=".repeat(RULE_WIDTH);
    format!("{bar}\nATTENDANCE LOG\n{bar}\n\n")
}

/// One self-contained plain-text block. Safe to append blindly: every block
/// is independently delimited, so a record killed mid-write never corrupts
/// its predecessors.
pub fn plain_text_block(record: &AttendanceRecord) -> String {
    format!(
        "Date: {} ({})\nTime: {}\nUser: {}\nComputer: {}\nEvent: {}\nStatus: {}\n{}\n\n",
        record.date,
        record.weekday,
        record.time,
        record.user,
        record.host,
        record.event,
        record.status,
        plain_text_rule(),
    )
}

/// CSV header row, newline-terminated.
pub fn tabular_header() -> Result<Vec<u8>, SinkError> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(COLUMNS)?;
        writer.flush()?;
    }
    Ok(buf)
}

/// One CSV data row, newline-terminated. Fields with embedded commas or
/// quotes are quoted by the writer.
pub fn tabular_row(record: &AttendanceRecord) -> Result<Vec<u8>, SinkError> {
    let event = record.event.to_string();
    let status = record.status.to_string();
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record([
            record.date.as_str(),
            record.weekday.as_str(),
            record.time.as_str(),
            record.host.as_str(),
            record.user.as_str(),
            event.as_str(),
            status.as_str(),
        ])?;
        writer.flush()?;
    }
    Ok(buf)
}

/// Parse the whole structured-list file. A file that is empty or whitespace
/// only parses as the empty collection.
pub fn parse_structured_list(bytes: &[u8]) -> Result<Vec<AttendanceRecord>, SinkError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Serialize the whole collection, pretty-printed. `serde_json` leaves
/// non-ASCII characters unescaped, matching the file's historical format.
pub fn render_structured_list(records: &[AttendanceRecord]) -> Result<Vec<u8>, SinkError> {
    Ok(serde_json::to_vec_pretty(records)?)
}
