//! Plaintext line rendering
//!
//! ```text
//! 2025-01-15T10:30:45.123+01:00 [INFO] api.employees[1001:FetchEmployee] fetched 3 records
//! 2025-01-15T10:30:46.001+01:00 [ERROR] db[0] query failed exception="Io: disk full"
//! ```
//!
//! Control characters are escaped so every record is exactly one line.

use std::fmt::Write as FmtWrite;

use logbatch_pipeline::LogRecord;

/// Timestamp layout for rendered lines
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Render one record into `buf` (cleared first), newline included
pub fn format_record(record: &LogRecord, buf: &mut String) {
    buf.clear();

    let _ = write!(
        buf,
        "{} [{}] {}[{}] ",
        record.timestamp().format(LINE_TIMESTAMP_FORMAT),
        record.level(),
        record.category(),
        record.event_id(),
    );
    append_escaped(buf, record.message(), false);

    if let Some(exception) = record.exception() {
        buf.push_str(" exception=\"");
        append_escaped(buf, &exception.to_string(), true);
        buf.push('"');
    }

    buf.push('\n');
}

/// Append text with newlines and control chars escaped
fn append_escaped(buf: &mut String, text: &str, quoted: bool) {
    for ch in text.chars() {
        match ch {
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            '\\' => buf.push_str("\\\\"),
            '"' if quoted => buf.push_str("\\\""),
            c if c.is_control() => {
                let _ = write!(buf, "\\x{:02x}", c as u32);
            }
            c => buf.push(c),
        }
    }
}
