// LogPump - core/record.rs
//
// Column splitting for one logical record.
//
// Records are tab-separated with Excel-style double-quote quoting: a quoted
// column may contain tabs, newlines, and doubled `""` quotes. The segment
// reader has already joined the physical lines of a quoted record, so each
// input here is exactly one record.

use crate::util::error::RecordError;

/// Split one record into its columns.
///
/// A blank record (only line terminators or nothing) yields an empty vector.
pub fn split_record(text: &str) -> Result<Vec<String>, RecordError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quote(b'"')
        .double_quote(true)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => Ok(record.iter().map(str::to_string).collect()),
        Some(Err(source)) => Err(RecordError::Csv { source }),
        None => Ok(Vec::new()),
    }
}
