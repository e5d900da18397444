// LogPump - app/group.rs
//
// Source group: everything watched under one root directory. Owns the
// category tracker, one segment reader per active file, the timestamp cache
// and the reorder buffer, and turns each scan into ordered entries.
//
// A group is driven by exactly one thread (the pump worker) and holds no
// locks. Listing the root is the only operation that can fail it.

use crate::app::pump::PumpConfig;
use crate::app::segment::{ReaderConfig, SegmentReader};
use crate::core::model::Entry;
use crate::core::record::split_record;
use crate::core::reorder::{Release, ReorderBuffer, ReorderStats};
use crate::core::timestamp::TimestampCache;
use crate::core::tracker::{CategoryTracker, Rotation, StartPosition};
use crate::platform::fs;
use crate::util::error::SourceError;
use crate::util::logging::preview;
use glob::Pattern;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Per-group counters, for the shutdown summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    /// Raw records read from disk.
    pub records: u64,
    /// Records discarded as malformed.
    pub malformed: u64,
    /// Files that became active after startup.
    pub rotations: u64,
    pub reorder: ReorderStats,
}

/// All log files under one watched directory.
#[derive(Debug)]
pub struct SourceGroup {
    root: PathBuf,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    tracker: CategoryTracker,
    /// Active file path → its reader.
    readers: BTreeMap<PathBuf, SegmentReader>,
    buffer: ReorderBuffer,
    cache: TimestampCache,
    reader_config: ReaderConfig,
    stats: GroupStats,
}

impl SourceGroup {
    /// Open a group for `root`. Files already present are tailed from their
    /// current end.
    pub fn open(root: PathBuf, config: &PumpConfig) -> Result<Self, SourceError> {
        fs::check_root(&root)?;

        let mut group = Self {
            include: fs::compile_patterns(&config.include_patterns, "include"),
            exclude: fs::compile_patterns(&config.exclude_patterns, "exclude"),
            tracker: CategoryTracker::new(),
            readers: BTreeMap::new(),
            buffer: ReorderBuffer::new(config.gap_threshold_secs, config.idle_flush),
            cache: TimestampCache::default(),
            reader_config: config.reader.clone(),
            stats: GroupStats::default(),
            root,
        };

        let listing = fs::list_log_files(&group.root, &group.include, &group.exclude)?;
        let rotation = group.tracker.reconcile(&listing);
        group.apply(rotation);

        tracing::info!(
            root = %group.root.display(),
            files = group.readers.len(),
            categories = %group.tracker.categories().collect::<Vec<_>>().join(","),
            "Source group opened"
        );
        Ok(group)
    }

    /// Watched directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths currently being tailed.
    pub fn active_files(&self) -> impl Iterator<Item = &Path> {
        self.readers.keys().map(PathBuf::as_path)
    }

    pub fn stats(&self) -> GroupStats {
        GroupStats {
            reorder: self.buffer.stats(),
            ..self.stats
        }
    }

    /// Run one scan: pick up rotations, read new records from every active
    /// file, and pass each entry the reorder buffer releases to `sink`.
    ///
    /// Returns the number of entries delivered.
    pub fn scan<F>(&mut self, sink: &mut F) -> Result<usize, SourceError>
    where
        F: FnMut(Entry),
    {
        let listing = fs::list_log_files(&self.root, &self.include, &self.exclude)?;
        let rotation = self.tracker.reconcile(&listing);
        if !rotation.is_empty() {
            self.apply(rotation);
        }

        let mut delivered = 0;
        let mut vanished = Vec::new();

        for (path, reader) in self.readers.iter_mut() {
            let tail = reader.tail();
            if tail.vanished {
                vanished.push(path.clone());
            }
            for raw in tail.records {
                self.stats.records += 1;
                let columns = match split_record(&raw) {
                    Ok(columns) if columns.is_empty() => continue,
                    Ok(columns) => columns,
                    Err(e) => {
                        self.stats.malformed += 1;
                        tracing::warn!(
                            file = %path.display(),
                            error = %e,
                            record = preview(raw.trim_end()),
                            "Skipping malformed record"
                        );
                        continue;
                    }
                };
                match Entry::with_cache(columns, reader.category(), &mut self.cache) {
                    Ok(entry) => delivered += deliver(self.buffer.ingest(entry), sink),
                    Err(e) => {
                        self.stats.malformed += 1;
                        tracing::warn!(
                            file = %path.display(),
                            error = %e,
                            record = preview(raw.trim_end()),
                            "Skipping malformed record"
                        );
                    }
                }
            }
        }

        for path in vanished {
            self.readers.remove(&path);
            tracing::info!(file = %path.display(), "Stopped tailing deleted file");
        }

        delivered += deliver(self.buffer.flush_idle(Instant::now()), sink);
        Ok(delivered)
    }

    /// Release everything still buffered. Called once when the pump stops.
    pub fn finish<F>(&mut self, sink: &mut F) -> usize
    where
        F: FnMut(Entry),
    {
        let delivered = deliver(self.buffer.flush(), sink);
        let stats = self.stats();
        tracing::info!(
            root = %self.root.display(),
            records = stats.records,
            malformed = stats.malformed,
            rotations = stats.rotations,
            emitted = stats.reorder.emitted,
            dropped = stats.reorder.dropped,
            restarts = stats.reorder.restarts,
            "Source group finished"
        );
        delivered
    }

    fn apply(&mut self, rotation: Rotation) {
        for path in rotation.removed {
            if self.readers.remove(&path).is_some() {
                tracing::info!(file = %path.display(), "Stopped tailing rotated-out file");
            }
        }
        for segment in rotation.added {
            match SegmentReader::open(
                segment.path.clone(),
                segment.category,
                segment.start,
                self.reader_config.clone(),
            ) {
                Ok(reader) => {
                    if segment.start == StartPosition::Beginning {
                        self.stats.rotations += 1;
                        tracing::info!(
                            file = %segment.path.display(),
                            category = reader.category(),
                            "Tailing new file from the start"
                        );
                    } else {
                        tracing::debug!(
                            file = %segment.path.display(),
                            category = reader.category(),
                            offset = reader.offset(),
                            "Tailing existing file from its end"
                        );
                    }
                    self.readers.insert(segment.path, reader);
                }
                Err(e) => {
                    tracing::debug!(
                        file = %segment.path.display(),
                        error = %e,
                        "Could not open newly active file"
                    );
                }
            }
        }
    }
}

/// Hand released entries to `sink`; returns how many were delivered.
fn deliver<F>(release: Release, sink: &mut F) -> usize
where
    F: FnMut(Entry),
{
    let count = release.entries.len();
    for entry in release.entries {
        sink(entry);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utf16::encode_utf16le;
    use crate::util::constants::UTF16LE_BOM;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config() -> PumpConfig {
        PumpConfig {
            reader: ReaderConfig {
                retry_attempts: 0,
                retry_delay: Duration::from_millis(1),
                ..ReaderConfig::default()
            },
            ..PumpConfig::default()
        }
    }

    fn line(second: u32, sequence: u64, text: &str) -> String {
        format!("2021-04-15T10:00:{second:02}\t{sequence}\t{text}\r\n")
    }

    fn create(dir: &Path, name: &str, body: &str) {
        let mut bytes = UTF16LE_BOM.to_vec();
        bytes.extend(encode_utf16le(body));
        std::fs::write(dir.join(name), bytes).unwrap();
    }

    fn append(dir: &Path, name: &str, body: &str) {
        let mut f = OpenOptions::new()
            .append(true)
            .open(dir.join(name))
            .unwrap();
        f.write_all(&encode_utf16le(body)).unwrap();
    }

    fn scan(group: &mut SourceGroup) -> Vec<Entry> {
        let mut out = Vec::new();
        group.scan(&mut |e| out.push(e)).unwrap();
        out
    }

    fn sequences(entries: &[Entry]) -> Vec<u64> {
        entries.iter().map(Entry::sequence).collect()
    }

    #[test]
    fn test_existing_content_not_replayed() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "ChatLog001.txt", &line(0, 1, "old"));
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config()).unwrap();
        assert!(scan(&mut group).is_empty());

        append(dir.path(), "ChatLog001.txt", &line(1, 2, "new"));
        let entries = scan(&mut group);
        assert_eq!(sequences(&entries), vec![2]);
        assert_eq!(entries[0].category(), "Chat");
        assert_eq!(entries[0].field(2), Some("new"));
        assert_eq!(entries[0].fields().last().map(String::as_str), Some("Chat"));
    }

    #[test]
    fn test_entries_across_categories_are_ordered() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "ChatLog001.txt", "");
        create(dir.path(), "RewardLog001.txt", "");
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config()).unwrap();

        append(dir.path(), "ChatLog001.txt", &line(0, 1, "hi"));
        assert_eq!(sequences(&scan(&mut group)), vec![1]);

        // Chat is read before Reward, so 3 arrives ahead of 2.
        append(dir.path(), "ChatLog001.txt", &line(1, 3, "later"));
        append(dir.path(), "RewardLog001.txt", &line(1, 2, "Meseta(100)"));
        let entries = scan(&mut group);
        assert_eq!(sequences(&entries), vec![2, 3]);
        assert_eq!(entries[0].category(), "Reward");
        assert_eq!(entries[0].attribute("Meseta"), Some(100));
    }

    #[test]
    fn test_rotation_reads_new_file_from_start() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "A_Log_001.txt", &line(0, 1, "before start"));
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config()).unwrap();

        append(dir.path(), "A_Log_001.txt", &line(1, 2, "tail of 001"));
        assert_eq!(sequences(&scan(&mut group)), vec![2]);

        create(
            dir.path(),
            "A_Log_002.txt",
            &format!("{}{}", line(2, 3, "first"), line(2, 4, "second")),
        );
        append(dir.path(), "A_Log_001.txt", &line(2, 99, "late write to 001"));

        let entries = scan(&mut group);
        assert_eq!(sequences(&entries), vec![3, 4]);
        let active: Vec<_> = group.active_files().collect();
        assert_eq!(active, vec![dir.path().join("A_Log_002.txt").as_path()]);
        assert_eq!(group.stats().rotations, 1);
    }

    #[test]
    fn test_malformed_records_skipped() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "ChatLog001.txt", "");
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config()).unwrap();

        append(
            dir.path(),
            "ChatLog001.txt",
            &format!("garbage\r\n\r\nnot-a-date\t1\tx\r\n{}", line(0, 5, "ok")),
        );
        let entries = scan(&mut group);
        assert_eq!(sequences(&entries), vec![5]);
        let stats = group.stats();
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.records, 4);
    }

    #[test]
    fn test_idle_gap_released_on_later_scan() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "ChatLog001.txt", "");
        let config = PumpConfig {
            idle_flush: Some(Duration::from_millis(20)),
            ..config()
        };
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config).unwrap();

        append(
            dir.path(),
            "ChatLog001.txt",
            &format!("{}{}", line(0, 1, "a"), line(0, 3, "c")),
        );
        assert_eq!(sequences(&scan(&mut group)), vec![1]);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sequences(&scan(&mut group)), vec![3]);
        assert_eq!(group.stats().reorder.dropped, 1);
    }

    #[test]
    fn test_gap_held_across_scans_without_idle_flush() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "ChatLog001.txt", "");
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config()).unwrap();

        append(
            dir.path(),
            "ChatLog001.txt",
            &format!("{}{}", line(0, 1, "a"), line(0, 3, "c")),
        );
        assert_eq!(sequences(&scan(&mut group)), vec![1]);

        std::thread::sleep(Duration::from_millis(50));
        assert!(scan(&mut group).is_empty());

        append(dir.path(), "ChatLog001.txt", &line(0, 2, "b"));
        assert_eq!(sequences(&scan(&mut group)), vec![2, 3]);
        assert_eq!(group.stats().reorder.dropped, 0);
        assert_eq!(group.stats().reorder.restarts, 0);
    }

    #[test]
    fn test_finish_flushes_pending() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "ChatLog001.txt", "");
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config()).unwrap();
        append(
            dir.path(),
            "ChatLog001.txt",
            &format!("{}{}", line(0, 1, "a"), line(0, 4, "d")),
        );
        assert_eq!(sequences(&scan(&mut group)), vec![1]);

        let mut out = Vec::new();
        assert_eq!(group.finish(&mut |e| out.push(e)), 1);
        assert_eq!(sequences(&out), vec![4]);
    }

    #[test]
    fn test_deleted_file_dropped() {
        let dir = TempDir::new().unwrap();
        create(dir.path(), "ChatLog001.txt", "");
        let mut group = SourceGroup::open(dir.path().to_path_buf(), &config()).unwrap();
        std::fs::remove_file(dir.path().join("ChatLog001.txt")).unwrap();
        assert!(scan(&mut group).is_empty());
        assert_eq!(group.active_files().count(), 0);
    }

    #[test]
    fn test_missing_root_fails_open_and_scan() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("log");
        assert!(matches!(
            SourceGroup::open(root.clone(), &config()),
            Err(SourceError::RootNotFound { .. })
        ));

        std::fs::create_dir(&root).unwrap();
        let mut group = SourceGroup::open(root.clone(), &config()).unwrap();
        std::fs::remove_dir(&root).unwrap();
        assert!(group.scan(&mut |_| {}).is_err());
    }
}
