// LogPump - core/model.rs
//
// Core data model. Pure data definitions with no I/O.
//
// An `Entry` is the unit that flows from the reorder buffer through the
// hand-off queue to downstream handlers.

use crate::core::timestamp::{self, TimestampCache};
use crate::util::error::RecordError;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

// =============================================================================
// Entry
// =============================================================================

/// One parsed log record, tagged with its category.
///
/// Immutable once constructed. Ordering and equality consider `sequence`
/// only: the writer's counter is the sole ordering authority, and two
/// entries share a sequence number only across a session restart.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    category: String,
    fields: Vec<String>,
    timestamp: i64,
    sequence: u64,
}

impl Entry {
    /// Build an entry from a split record and the category of its file.
    pub fn new(fields: Vec<String>, category: &str) -> Result<Self, RecordError> {
        Self::build(fields, category, timestamp::parse_timestamp)
    }

    /// Like [`Entry::new`], reusing timestamps already parsed by `cache`.
    pub fn with_cache(
        fields: Vec<String>,
        category: &str,
        cache: &mut TimestampCache,
    ) -> Result<Self, RecordError> {
        Self::build(fields, category, |raw| cache.get_or_parse(raw))
    }

    fn build<F>(mut fields: Vec<String>, category: &str, parse_ts: F) -> Result<Self, RecordError>
    where
        F: FnOnce(&str) -> Result<i64, RecordError>,
    {
        if fields.len() < 2 {
            return Err(RecordError::TooFewFields {
                count: fields.len(),
            });
        }

        // Three-column records carry their payload as one quoted column
        // whose contents are themselves tab-separated.
        if fields.len() == 3 {
            if let Some(payload) = fields.pop() {
                fields.extend(payload.split('\t').map(str::to_string));
            }
        }

        let timestamp = parse_ts(&fields[0])?;
        let sequence = fields[1]
            .trim()
            .parse::<u64>()
            .map_err(|_| RecordError::BadSequence {
                raw: fields[1].clone(),
            })?;

        fields.push(category.to_string());

        Ok(Self {
            category: category.to_string(),
            fields,
            timestamp,
            sequence,
        })
    }

    /// Log category this entry was read from (e.g. "Chat", "Reward").
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Columns in file order, with the category appended as the last one.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Column `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Record time in unix seconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Writer-assigned sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Look up a numeric attribute written as `Name(value)` inside any column.
    ///
    /// Columns are searched in order and the first `Name(<integer>)` token
    /// wins. The name is matched as a plain substring, so `Num` also matches
    /// `TotalNum(3)`. Returns `None` when no column carries the attribute.
    pub fn attribute(&self, name: &str) -> Option<i64> {
        if name.is_empty() {
            return None;
        }
        self.fields
            .iter()
            .find_map(|field| find_attribute(field, name))
    }
}

/// Scan one column for `name(` followed by an optionally negative integer
/// and a closing parenthesis. Occurrences whose suffix does not parse are
/// skipped and the search resumes one character later.
fn find_attribute(field: &str, name: &str) -> Option<i64> {
    let mut from = 0;
    while let Some(pos) = field[from..].find(name) {
        let start = from + pos;
        if let Some(value) = parenthesised_integer(&field[start + name.len()..]) {
            return Some(value);
        }
        from = start + field[start..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// Parse a leading `(<integer>)`, e.g. `(-250)`.
fn parenthesised_integer(text: &str) -> Option<i64> {
    let inner = text.strip_prefix('(')?;
    let close = inner.find(')')?;
    let digits = &inner[..close];
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence.cmp(&other.sequence)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.join(" | "))
    }
}
