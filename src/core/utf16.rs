// LogPump - core/utf16.rs
//
// Record framing over raw UTF-16LE bytes.
//
// Works on code units rather than decoded text so that a read ending in the
// middle of a code unit or surrogate pair is simply an unfinished line. A
// record is one or more newline-terminated physical lines; lines are joined
// while the cumulative count of `"` characters is odd, because a quoted
// column may embed newlines.
//
// Core layer: pure functions over byte slices, no I/O.

const NEWLINE: u16 = 0x000A;
const QUOTE: u16 = 0x0022;

/// Why framing stopped before the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    /// The last line has no terminating newline yet, or the input ends in
    /// the middle of a code unit.
    UnfinishedLine,
    /// A quoted column was opened but its closing line has not been written.
    OpenQuote,
}

/// Complete records found at the start of a byte buffer.
#[derive(Debug, Default)]
pub struct Framed {
    /// Decoded records, each including its line terminator(s).
    pub records: Vec<String>,
    /// Bytes covered by `records`; always even.
    pub consumed_bytes: usize,
    /// Set when bytes after `consumed_bytes` hold an incomplete record.
    pub stall: Option<Stall>,
    /// Records that were not valid UTF-16 and were decoded lossily.
    pub lossy: usize,
}

/// Split `bytes` into complete records.
///
/// Nothing after the last complete record is decoded; the caller keeps its
/// read position at `consumed_bytes` and retries the remainder later.
pub fn frame_records(bytes: &[u8]) -> Framed {
    let units = code_units(bytes);
    let odd_byte = bytes.len() % 2 == 1;

    let mut framed = Framed::default();
    let mut start = 0usize;

    'records: while start < units.len() {
        let mut end = start;
        let mut quotes = 0usize;
        loop {
            let Some(nl) = units[end..].iter().position(|&u| u == NEWLINE) else {
                framed.stall = Some(if end > start {
                    Stall::OpenQuote
                } else {
                    Stall::UnfinishedLine
                });
                break 'records;
            };
            let line = &units[end..end + nl + 1];
            quotes += line.iter().filter(|&&u| u == QUOTE).count();
            end += nl + 1;
            if quotes % 2 == 0 {
                break;
            }
        }

        let record = &units[start..end];
        let text = match String::from_utf16(record) {
            Ok(text) => text,
            Err(_) => {
                framed.lossy += 1;
                String::from_utf16_lossy(record)
            }
        };
        framed.records.push(text);
        start = end;
    }

    if framed.stall.is_none() && odd_byte {
        framed.stall = Some(Stall::UnfinishedLine);
    }
    framed.consumed_bytes = start * 2;
    framed
}

/// The first physical line of `bytes`, ignoring quote parity, with the
/// number of bytes it covers. `None` when no newline has been written.
///
/// Used to give up on a quoted column that never closes.
pub fn first_line(bytes: &[u8]) -> Option<(String, usize)> {
    let units = code_units(bytes);
    let nl = units.iter().position(|&u| u == NEWLINE)?;
    let line = &units[..=nl];
    Some((String::from_utf16_lossy(line), line.len() * 2))
}

fn code_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode `text` as UTF-16LE bytes, without a BOM.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines_are_framed() {
        let bytes = encode_utf16le("a\tb\r\nc\td\r\n");
        let f = frame_records(&bytes);
        assert_eq!(f.records, vec!["a\tb\r\n", "c\td\r\n"]);
        assert_eq!(f.consumed_bytes, bytes.len());
        assert_eq!(f.stall, None);
    }

    #[test]
    fn test_unfinished_tail_is_not_consumed() {
        let done = encode_utf16le("a\r\n");
        let mut bytes = done.clone();
        bytes.extend(encode_utf16le("partial"));
        let f = frame_records(&bytes);
        assert_eq!(f.records, vec!["a\r\n"]);
        assert_eq!(f.consumed_bytes, done.len());
        assert_eq!(f.stall, Some(Stall::UnfinishedLine));
    }

    #[test]
    fn test_quoted_newline_joins_lines() {
        let bytes = encode_utf16le("x\t\"first\r\nsecond\"\r\ny\r\n");
        let f = frame_records(&bytes);
        assert_eq!(f.records, vec!["x\t\"first\r\nsecond\"\r\n", "y\r\n"]);
        assert_eq!(f.stall, None);
    }

    #[test]
    fn test_open_quote_waits_for_closing_line() {
        let bytes = encode_utf16le("ok\r\nx\t\"first\r\nstill open\r\n");
        let f = frame_records(&bytes);
        assert_eq!(f.records, vec!["ok\r\n"]);
        assert_eq!(f.consumed_bytes, encode_utf16le("ok\r\n").len());
        assert_eq!(f.stall, Some(Stall::OpenQuote));
    }

    #[test]
    fn test_odd_trailing_byte_is_unfinished() {
        let mut bytes = encode_utf16le("a\r\n");
        bytes.push(0x41);
        let f = frame_records(&bytes);
        assert_eq!(f.records.len(), 1);
        assert_eq!(f.consumed_bytes, 6);
        assert_eq!(f.stall, Some(Stall::UnfinishedLine));
    }

    #[test]
    fn test_non_ascii_text_round_trips() {
        let bytes = encode_utf16le("こんにちは\t😀\n");
        let f = frame_records(&bytes);
        assert_eq!(f.records, vec!["こんにちは\t😀\n"]);
        assert_eq!(f.lossy, 0);
    }

    #[test]
    fn test_unpaired_surrogate_decoded_lossily() {
        let mut bytes = 0xD800u16.to_le_bytes().to_vec();
        bytes.extend(encode_utf16le("\n"));
        let f = frame_records(&bytes);
        assert_eq!(f.records, vec!["\u{FFFD}\n"]);
        assert_eq!(f.lossy, 1);
        assert_eq!(f.consumed_bytes, 4);
    }

    #[test]
    fn test_first_line_ignores_open_quote() {
        let bytes = encode_utf16le("x\t\"stray\r\nnext\r\n");
        let (line, consumed) = first_line(&bytes).unwrap();
        assert_eq!(line, "x\t\"stray\r\n");
        assert_eq!(consumed, encode_utf16le("x\t\"stray\r\n").len());
        assert!(first_line(&encode_utf16le("no newline")).is_none());
    }

    #[test]
    fn test_empty_input() {
        let f = frame_records(&[]);
        assert!(f.records.is_empty());
        assert_eq!(f.consumed_bytes, 0);
        assert_eq!(f.stall, None);
    }
}
