// LogPump - core/timestamp.rs
//
// Fixed-width timestamp parsing and a small bounded parse cache.
//
// The writer stamps every record with local wall time as
// `YYYY-MM-DDTHH:MM:SS`. Only the digit positions are significant, so
// separator characters are not validated. Anything after the 19th
// character is ignored.

use crate::util::constants::{TIMESTAMP_CACHE_CAPACITY, TIMESTAMP_WIDTH};
use crate::util::error::RecordError;
use chrono::{Local, NaiveDate, Offset, TimeZone};
use std::collections::VecDeque;

/// Parse a fixed-width local timestamp into unix seconds.
pub fn parse_timestamp(raw: &str) -> Result<i64, RecordError> {
    let bad = || RecordError::BadTimestamp {
        raw: raw.to_string(),
    };

    let bytes = raw.as_bytes();
    if bytes.len() < TIMESTAMP_WIDTH || !raw.is_char_boundary(TIMESTAMP_WIDTH) {
        return Err(bad());
    }

    let num = |start: usize, end: usize| -> Option<u32> {
        let digits = &bytes[start..end];
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        digits
            .iter()
            .try_fold(0u32, |acc, d| acc.checked_mul(10)?.checked_add(u32::from(d - b'0')))
    };

    let year = num(0, 4).ok_or_else(bad)?;
    let month = num(5, 7).ok_or_else(bad)?;
    let day = num(8, 10).ok_or_else(bad)?;
    let hour = num(11, 13).ok_or_else(bad)?;
    let minute = num(14, 16).ok_or_else(bad)?;
    let second = num(17, 19).ok_or_else(bad)?;

    let year = i32::try_from(year).map_err(|_| bad())?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(bad)?;

    // A wall time skipped by a DST transition has no local mapping; shift it
    // by the offset in force at that instant so it still orders sensibly.
    let secs = match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.timestamp(),
        None => {
            let offset = Local.offset_from_utc_datetime(&naive).fix();
            naive.and_utc().timestamp() - i64::from(offset.local_minus_utc())
        }
    };
    Ok(secs)
}

/// Bounded cache of recently parsed timestamp strings.
///
/// Records arrive in bursts that share the same second, so a handful of
/// slots removes nearly all repeated parsing. The oldest insertion is
/// evicted when the cache is full.
#[derive(Debug)]
pub struct TimestampCache {
    capacity: usize,
    slots: VecDeque<(String, i64)>,
}

impl TimestampCache {
    /// Create a cache holding at most `capacity` strings (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    /// Return the cached value for `raw`, parsing and remembering it on a miss.
    /// Parse failures are not cached.
    pub fn get_or_parse(&mut self, raw: &str) -> Result<i64, RecordError> {
        if let Some((_, secs)) = self.slots.iter().find(|(key, _)| key == raw) {
            return Ok(*secs);
        }
        let secs = parse_timestamp(raw)?;
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back((raw.to_string(), secs));
        Ok(secs)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for TimestampCache {
    fn default() -> Self {
        Self::new(TIMESTAMP_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matches_local_time() {
        let secs = parse_timestamp("2021-04-15T12:34:56").unwrap();
        let expected = Local
            .with_ymd_and_hms(2021, 4, 15, 12, 34, 56)
            .earliest()
            .unwrap()
            .timestamp();
        assert_eq!(secs, expected);
    }

    #[test]
    fn test_parse_differences_in_seconds() {
        let a = parse_timestamp("2021-04-15T12:00:00").unwrap();
        let b = parse_timestamp("2021-04-15T12:00:04").unwrap();
        assert_eq!(b - a, 4);
    }

    #[test]
    fn test_parse_ignores_separators_and_suffix() {
        let a = parse_timestamp("2021-04-15T12:00:00").unwrap();
        let b = parse_timestamp("2021/04/15 12.00.00 extra").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_short_and_non_numeric() {
        assert!(matches!(
            parse_timestamp("2021-04-15"),
            Err(RecordError::BadTimestamp { .. })
        ));
        assert!(parse_timestamp("2021-0x-15T12:00:00").is_err());
        assert!(parse_timestamp("2021-13-15T12:00:00").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_cache_is_bounded_and_evicts_oldest() {
        let mut cache = TimestampCache::new(2);
        cache.get_or_parse("2021-04-15T12:00:00").unwrap();
        cache.get_or_parse("2021-04-15T12:00:01").unwrap();
        cache.get_or_parse("2021-04-15T12:00:01").unwrap();
        assert_eq!(cache.len(), 2);
        cache.get_or_parse("2021-04-15T12:00:02").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.slots.iter().any(|(k, _)| k == "2021-04-15T12:00:00"));
    }

    #[test]
    fn test_cache_does_not_store_failures() {
        let mut cache = TimestampCache::default();
        assert!(cache.get_or_parse("garbage").is_err());
        assert!(cache.is_empty());
    }
}
