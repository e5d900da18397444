// LogPump - core/reorder.rs
//
// Sequence reconciliation for one source group.
//
// The writer spreads records over several category files and flushes them
// with some skew, so entries reach us slightly out of sequence order. The
// buffer holds entries in a min-heap and releases them strictly by
// ascending sequence number, with three escape hatches:
//
//   - restart: a sequence number below the expected one means the writer's
//     counter was reset; everything buffered is flushed and counting
//     restarts from the new baseline.
//   - gap flush: when the buffered entries span more than `gap_threshold`
//     seconds of writer time, the missing number is assumed lost and the
//     heap is flushed.
//   - idle flush (opt-in, off by default): entries that have waited longer
//     than `idle_flush` with no newer arrivals are flushed, so a gap
//     followed by silence cannot hold entries back forever. A record that
//     turns up after its gap was idle-flushed is treated as a restart.
//
// Flushes are still ascending. Skipped sequence numbers are reported as
// dropped ranges. Sequence numbers come from file content, so all
// arithmetic on them saturates. Nothing here ever fails.

use crate::core::model::Entry;
use crate::util::constants::DEFAULT_GAP_THRESHOLD_SECS;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

/// Entries released by one buffer operation, in emission order.
#[derive(Debug, Default)]
pub struct Release {
    /// Entries to deliver downstream, ascending by sequence.
    pub entries: Vec<Entry>,
    /// Runs of sequence numbers given up as lost during a force-flush.
    pub dropped: Vec<RangeInclusive<u64>>,
    /// Whether this operation detected a writer session restart.
    pub restarted: bool,
}

impl Release {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.dropped.is_empty()
    }
}

fn run_len(run: &RangeInclusive<u64>) -> u64 {
    run.end().saturating_sub(*run.start()).saturating_add(1)
}

/// Running totals, for the shutdown summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderStats {
    pub emitted: u64,
    pub dropped: u64,
    pub restarts: u64,
    pub force_flushes: u64,
}

/// Restores ascending sequence order within one source group.
#[derive(Debug)]
pub struct ReorderBuffer {
    heap: BinaryHeap<Reverse<Entry>>,
    /// Next sequence number due; `None` before the first entry.
    expected: Option<u64>,
    gap_threshold: i64,
    idle_flush: Option<Duration>,
    /// Arrival time of the newest entry while the heap is non-empty.
    pending_since: Option<Instant>,
    stats: ReorderStats,
}

impl ReorderBuffer {
    /// Create a buffer that force-flushes once buffered entries span more
    /// than `gap_threshold_secs` seconds. With `idle_flush` set, entries
    /// also flush after waiting that long with no newer arrival.
    pub fn new(gap_threshold_secs: i64, idle_flush: Option<Duration>) -> Self {
        Self {
            heap: BinaryHeap::new(),
            expected: None,
            gap_threshold: gap_threshold_secs,
            idle_flush,
            pending_since: None,
            stats: ReorderStats::default(),
        }
    }

    /// Feed one entry and collect whatever it releases.
    pub fn ingest(&mut self, entry: Entry) -> Release {
        self.ingest_at(entry, Instant::now())
    }

    /// `ingest` with an explicit arrival time for the idle clock.
    pub fn ingest_at(&mut self, entry: Entry, now: Instant) -> Release {
        let mut release = Release::default();
        let sequence = entry.sequence();

        match self.expected {
            Some(expected) if sequence >= expected => {}
            Some(expected) => {
                tracing::info!(sequence, expected, "Sequence restart detected");
                self.force_flush(expected, &mut release);
                self.stats.restarts += 1;
                release.restarted = true;
                self.expected = Some(sequence);
            }
            None => self.expected = Some(sequence),
        }

        self.heap.push(Reverse(entry));
        self.release_contiguous(&mut release);

        if !self.heap.is_empty() {
            tracing::trace!(
                expected = ?self.expected,
                pending = %self.pending_list(),
                "Waiting for missing sequence"
            );
            if self.timestamp_span() > self.gap_threshold {
                if let Some(expected) = self.expected {
                    let next = self.force_flush(expected, &mut release);
                    self.expected = Some(next);
                }
            }
        }

        self.touch_pending(now);
        release
    }

    /// Force-flush if entries have been waiting longer than the idle interval
    /// as of `now`. Does nothing when the idle flush is disabled.
    pub fn flush_idle(&mut self, now: Instant) -> Release {
        let mut release = Release::default();
        let Some(limit) = self.idle_flush else {
            return release;
        };
        let idle = self
            .pending_since
            .is_some_and(|since| now.saturating_duration_since(since) > limit);
        if idle {
            if let Some(expected) = self.expected {
                tracing::debug!(
                    pending = self.heap.len(),
                    "Flushing entries idle past the wait limit"
                );
                let next = self.force_flush(expected, &mut release);
                self.expected = Some(next);
            }
            self.pending_since = None;
        }
        release
    }

    /// Release everything still buffered, e.g. at shutdown.
    pub fn flush(&mut self) -> Release {
        let mut release = Release::default();
        if let Some(expected) = self.expected {
            if !self.heap.is_empty() {
                let next = self.force_flush(expected, &mut release);
                self.expected = Some(next);
            }
        }
        self.pending_since = None;
        release
    }

    /// Next sequence number due, if any entry has been seen.
    pub fn expected(&self) -> Option<u64> {
        self.expected
    }

    /// Number of entries waiting for a missing predecessor.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    pub fn stats(&self) -> ReorderStats {
        self.stats
    }

    fn release_contiguous(&mut self, release: &mut Release) {
        let Some(mut expected) = self.expected else {
            return;
        };
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(top)| top.sequence() == expected)
        {
            if let Some(Reverse(entry)) = self.heap.pop() {
                release.entries.push(entry);
                self.stats.emitted += 1;
                expected = expected.saturating_add(1);
            }
        }
        self.expected = Some(expected);
    }

    /// Empty the heap in ascending order starting the gap count at `expected`.
    /// Returns the sequence number that follows the last flushed entry.
    fn force_flush(&mut self, mut expected: u64, release: &mut Release) -> u64 {
        if self.heap.is_empty() {
            return expected;
        }
        self.stats.force_flushes += 1;
        let first_dropped = release.dropped.len();

        while let Some(Reverse(entry)) = self.heap.pop() {
            let sequence = entry.sequence();
            if sequence > expected {
                release.dropped.push(expected..=sequence - 1);
            }
            expected = expected.max(sequence.saturating_add(1));
            release.entries.push(entry);
            self.stats.emitted += 1;
        }

        let dropped = &release.dropped[first_dropped..];
        if !dropped.is_empty() {
            let count = dropped
                .iter()
                .fold(0u64, |total, run| total.saturating_add(run_len(run)));
            self.stats.dropped = self.stats.dropped.saturating_add(count);
            let list = dropped
                .iter()
                .map(|run| {
                    if run.start() == run.end() {
                        run.start().to_string()
                    } else {
                        format!("{}-{}", run.start(), run.end())
                    }
                })
                .collect::<Vec<_>>()
                .join(",");
            tracing::warn!(count, dropped = %list, "Sequence numbers dropped");
        }
        self.pending_since = None;
        expected
    }

    fn timestamp_span(&self) -> i64 {
        let mut stamps = self.heap.iter().map(|Reverse(e)| e.timestamp());
        let Some(first) = stamps.next() else {
            return 0;
        };
        let (min, max) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        max - min
    }

    fn touch_pending(&mut self, now: Instant) {
        self.pending_since = if self.heap.is_empty() { None } else { Some(now) };
    }

    fn pending_list(&self) -> String {
        let mut seqs: Vec<u64> = self.heap.iter().map(|Reverse(e)| e.sequence()).collect();
        seqs.sort_unstable();
        seqs.iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_THRESHOLD_SECS, None)
    }
}
