// LogPump - app/segment.rs
//
// Segment reader: incrementally reads one physical log file from a
// remembered byte offset and returns the complete records written since the
// previous call.
//
// Invariants:
//   - The offset only moves forward, and only past complete records. An
//     unfinished line (or an open quoted column) is left on disk and read
//     again on the next call.
//   - The BOM is skipped exactly once, and only for a file created while
//     we were watching (read from offset 0).
//
// Transient conditions (unfinished tail, read ending mid code unit) are
// retried a bounded number of times within one call after a short pause,
// then left for the next scan. An open record is kept waiting only up to
// `max_partial_bytes`; past that it is given up so a stray quote cannot make
// every scan re-read the rest of the file. A file that disappears is reported through
// `Tail::vanished`; other I/O failures are logged and yield no data.

use crate::core::tracker::StartPosition;
use crate::core::utf16::{self, Stall};
use crate::platform::fs;
use crate::util::constants::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS, MAX_TAIL_PARTIAL_BYTES,
    MAX_TAIL_READ_BYTES_PER_TICK, UTF16LE_BOM,
};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry and read-size settings shared by all readers of a pump.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Extra reads attempted within one call when the tail is unfinished.
    pub retry_attempts: u32,
    /// Pause before each extra read.
    pub retry_delay: Duration,
    /// Maximum bytes read per attempt.
    pub max_read_bytes: usize,
    /// Largest unfinished record kept waiting for its end.
    pub max_partial_bytes: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_read_bytes: MAX_TAIL_READ_BYTES_PER_TICK,
            max_partial_bytes: MAX_TAIL_PARTIAL_BYTES,
        }
    }
}

/// Result of one `tail` call.
#[derive(Debug, Default)]
pub struct Tail {
    /// Complete raw records, in file order.
    pub records: Vec<String>,
    /// The file no longer exists.
    pub vanished: bool,
}

/// Incremental reader for one log file.
#[derive(Debug)]
pub struct SegmentReader {
    path: PathBuf,
    category: String,
    offset: u64,
    bom_pending: bool,
    config: ReaderConfig,
}

impl SegmentReader {
    /// Reader for a file created during the run: starts at offset 0 and
    /// skips the BOM once it has been written.
    pub fn fresh(path: PathBuf, category: String, config: ReaderConfig) -> Self {
        tracing::debug!(file = %path.display(), %category, "Segment reader at start of file");
        Self {
            path,
            category,
            offset: 0,
            bom_pending: true,
            config,
        }
    }

    /// Reader for a file that existed before we looked at it: starts at the
    /// current end so earlier content is not replayed.
    pub fn at_end(path: PathBuf, category: String, config: ReaderConfig) -> io::Result<Self> {
        let len = std::fs::metadata(&path)?.len();
        // Stay on a code unit boundary even if the writer is mid-character.
        let offset = len & !1;
        tracing::debug!(file = %path.display(), %category, offset, "Segment reader at end of file");
        Ok(Self {
            path,
            category,
            offset,
            bom_pending: false,
            config,
        })
    }

    /// Create a reader positioned according to `start`.
    pub fn open(
        path: PathBuf,
        category: String,
        start: StartPosition,
        config: ReaderConfig,
    ) -> io::Result<Self> {
        match start {
            StartPosition::Beginning => Ok(Self::fresh(path, category, config)),
            StartPosition::End => Self::at_end(path, category, config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Byte offset of the first unconsumed byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read every complete record written since the last call.
    pub fn tail(&mut self) -> Tail {
        let mut tail = Tail::default();
        let mut attempts = 0u32;

        loop {
            match self.read_once(&mut tail.records) {
                Ok(None) => break,
                Ok(Some(stall)) => {
                    if attempts >= self.config.retry_attempts {
                        tracing::trace!(
                            file = %self.path.display(),
                            offset = self.offset,
                            ?stall,
                            "Unfinished record left for next scan"
                        );
                        break;
                    }
                    attempts += 1;
                    tracing::trace!(
                        file = %self.path.display(),
                        ?stall,
                        attempt = attempts,
                        "Unfinished record; retrying shortly"
                    );
                    std::thread::sleep(self.config.retry_delay);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(file = %self.path.display(), "Log file vanished");
                    tail.vanished = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(file = %self.path.display(), error = %e, "Read error; will retry next scan");
                    break;
                }
            }
        }
        tail
    }

    /// One read pass. Appends complete records to `out` and advances the
    /// offset past them. Returns the stall reason if the unfinished bytes
    /// reach end-of-file, i.e. waiting for the writer could help.
    fn read_once(&mut self, out: &mut Vec<String>) -> io::Result<Option<Stall>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();

        if len < self.offset {
            tracing::info!(
                file = %self.path.display(),
                old_offset = self.offset,
                new_size = len,
                "File truncated or replaced; reading from the start"
            );
            self.offset = 0;
            self.bom_pending = true;
        }

        if self.bom_pending && self.offset == 0 {
            if len < UTF16LE_BOM.len() as u64 {
                return Ok(None);
            }
            let head = fs::read_range(&mut file, 0, UTF16LE_BOM.len())?;
            if head == UTF16LE_BOM {
                self.offset = UTF16LE_BOM.len() as u64;
            }
            self.bom_pending = false;
        }

        let available = len.saturating_sub(self.offset);
        if available == 0 {
            return Ok(None);
        }

        let available = usize::try_from(available).unwrap_or(usize::MAX);
        let limit = available.min(self.config.max_read_bytes);
        let mut bytes = fs::read_range(&mut file, self.offset, limit)?;
        let mut framed = utf16::frame_records(&bytes);

        // A single record larger than the read cap would never complete;
        // extend the read up to the partial-record bound.
        if framed.records.is_empty() && framed.stall.is_some() && bytes.len() < available {
            let extended = available.min(self.config.max_partial_bytes.max(limit));
            if extended > bytes.len() {
                bytes = fs::read_range(&mut file, self.offset, extended)?;
                framed = utf16::frame_records(&bytes);
            }
        }

        if let Some(stall) = framed.stall {
            if framed.records.is_empty() && bytes.len() >= self.config.max_partial_bytes {
                self.give_up_open_record(&bytes, stall, out);
                return Ok(None);
            }
        }

        if framed.lossy > 0 {
            tracing::warn!(
                file = %self.path.display(),
                records = framed.lossy,
                "Invalid UTF-16 in record; decoded with replacement characters"
            );
        }

        self.offset += framed.consumed_bytes as u64;
        out.extend(framed.records);

        // Bytes past the read cap are already on disk; the next scan takes
        // them without a retry pause.
        if bytes.len() < available {
            return Ok(None);
        }
        Ok(framed.stall)
    }

    /// Move past an open record that outgrew `max_partial_bytes`. An open
    /// quote yields its first line as a record of its own; an unterminated
    /// line is skipped.
    fn give_up_open_record(&mut self, bytes: &[u8], stall: Stall, out: &mut Vec<String>) {
        match utf16::first_line(bytes) {
            Some((line, consumed)) => {
                tracing::warn!(
                    file = %self.path.display(),
                    offset = self.offset,
                    pending = bytes.len(),
                    ?stall,
                    "Open record exceeds size bound; delivering its first line alone"
                );
                self.offset += consumed as u64;
                out.push(line);
            }
            None => {
                let skipped = bytes.len() & !1;
                tracing::warn!(
                    file = %self.path.display(),
                    offset = self.offset,
                    skipped,
                    ?stall,
                    "Unterminated line exceeds size bound; skipping it"
                );
                self.offset += skipped as u64;
            }
        }
    }
}
