// LogPump - core/tracker.rs
//
// Category tracking: decides, for every scan of one directory, which file
// is the active (newest) one for each log category and what changed since
// the previous scan.
//
// The writer embeds an increasing date/sequence in each file name, so the
// lexicographically greatest name within a category is the newest file.
//
// Core layer: works on directory listings handed in by the caller and never
// touches the filesystem itself.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Derive a log category from a file stem by removing the last `Log` or
/// `_log` marker and everything after it.
///
/// `ChatLog20210415_00` → `Chat`, `Amusement_log20210415` → `Amusement`.
/// Returns `None` when the stem has no marker or nothing precedes it.
pub fn category_of(stem: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(.+)(Log|_log)").expect("category pattern is a valid regex")
    });
    re.captures(stem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Category of the file at `path`, from its stem.
pub fn category_of_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    category_of(&stem).map(str::to_string)
}

/// Where a newly tracked file should be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// A file created while we were watching: read everything after the BOM.
    Beginning,
    /// A file that already existed: only content written from now on.
    End,
}

/// A file that became active for its category on this scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSegment {
    pub path: PathBuf,
    pub category: String,
    pub start: StartPosition,
}

/// Changes to the active-file set found by one scan.
#[derive(Debug, Default)]
pub struct Rotation {
    /// Files to start tailing.
    pub added: Vec<NewSegment>,
    /// Files to stop tailing (rotated out or deleted).
    pub removed: Vec<PathBuf>,
}

impl Rotation {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Per-directory record of which file is active for each category.
#[derive(Debug, Default)]
pub struct CategoryTracker {
    /// category → active file, as of the last scan.
    active: BTreeMap<String, PathBuf>,
    /// Every matching file seen by the last scan, active or not.
    listed: HashSet<PathBuf>,
    initialised: bool,
}

impl CategoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the active file for every category present in `listing`.
    /// Files without a recognisable category are ignored.
    pub fn select_active(listing: &[PathBuf]) -> BTreeMap<String, PathBuf> {
        let mut active: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in listing {
            let Some(category) = category_of_path(path) else {
                tracing::trace!(file = %path.display(), "Ignoring file without a log category");
                continue;
            };
            let newer = match active.get(&category) {
                Some(current) => path.file_name() > current.file_name(),
                None => true,
            };
            if newer {
                active.insert(category, path.clone());
            }
        }
        active
    }

    /// Compare `listing` against the previous scan.
    ///
    /// On the first call every active file starts at its end so history is
    /// not replayed. Afterwards, a newly active file starts at the beginning
    /// if it did not exist on the previous scan, and at its end if it did
    /// (e.g. it became active again because a newer file was deleted).
    pub fn reconcile(&mut self, listing: &[PathBuf]) -> Rotation {
        let now = Self::select_active(listing);
        let now_paths: HashSet<&PathBuf> = now.values().collect();

        let mut rotation = Rotation::default();

        for path in self.active.values() {
            if !now_paths.contains(path) {
                rotation.removed.push(path.clone());
            }
        }

        let known: HashSet<&PathBuf> = self.active.values().collect();
        for (category, path) in &now {
            if known.contains(path) {
                continue;
            }
            let start = if self.initialised && !self.listed.contains(path) {
                StartPosition::Beginning
            } else {
                StartPosition::End
            };
            rotation.added.push(NewSegment {
                path: path.clone(),
                category: category.clone(),
                start,
            });
        }

        self.active = now;
        self.listed = listing.iter().cloned().collect();
        self.initialised = true;
        rotation
    }

    /// Active file for `category`, if any.
    pub fn active_file(&self, category: &str) -> Option<&Path> {
        self.active.get(category).map(PathBuf::as_path)
    }

    /// Whether `path` is currently an active file.
    pub fn is_known(&self, path: &Path) -> bool {
        self.active.values().any(|p| p == path)
    }

    /// Categories with an active file, in name order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/logs").join(n)).collect()
    }

    #[test]
    fn test_category_of_strips_marker() {
        assert_eq!(category_of("ChatLog20210415_00"), Some("Chat"));
        assert_eq!(category_of("RewardLog20210415_00"), Some("Reward"));
        assert_eq!(category_of("Amusement_log20210415"), Some("Amusement"));
        assert_eq!(category_of("SymbolChatLog20210415_00"), Some("SymbolChat"));
        assert_eq!(category_of("A_Log_001"), Some("A_"));
        assert_eq!(category_of("Log"), None);
        assert_eq!(category_of("notes"), None);
    }

    #[test]
    fn test_select_active_takes_greatest_name() {
        let listing = paths(&[
            "ChatLog20210414_00.txt",
            "ChatLog20210415_01.txt",
            "ChatLog20210415_00.txt",
            "RewardLog20210401_00.txt",
            "readme.txt",
        ]);
        let active = CategoryTracker::select_active(&listing);
        assert_eq!(active.len(), 2);
        assert_eq!(
            active["Chat"].file_name().unwrap(),
            "ChatLog20210415_01.txt"
        );
        assert_eq!(
            active["Reward"].file_name().unwrap(),
            "RewardLog20210401_00.txt"
        );
    }

    #[test]
    fn test_first_scan_starts_at_end() {
        let mut tracker = CategoryTracker::new();
        let rotation = tracker.reconcile(&paths(&["ChatLog001.txt", "RewardLog001.txt"]));
        assert_eq!(rotation.added.len(), 2);
        assert!(rotation.added.iter().all(|s| s.start == StartPosition::End));
        assert!(rotation.removed.is_empty());
    }

    #[test]
    fn test_rotation_adds_new_from_beginning_and_removes_old() {
        let mut tracker = CategoryTracker::new();
        tracker.reconcile(&paths(&["A_Log_001.txt"]));

        let rotation = tracker.reconcile(&paths(&["A_Log_001.txt", "A_Log_002.txt"]));
        assert_eq!(
            rotation.added,
            vec![NewSegment {
                path: PathBuf::from("/logs/A_Log_002.txt"),
                category: "A_".to_string(),
                start: StartPosition::Beginning,
            }]
        );
        assert_eq!(rotation.removed, paths(&["A_Log_001.txt"]));
        assert!(tracker.is_known(Path::new("/logs/A_Log_002.txt")));
        assert!(!tracker.is_known(Path::new("/logs/A_Log_001.txt")));
    }

    #[test]
    fn test_unchanged_listing_is_quiet() {
        let mut tracker = CategoryTracker::new();
        let listing = paths(&["ChatLog001.txt"]);
        tracker.reconcile(&listing);
        assert!(tracker.reconcile(&listing).is_empty());
    }

    #[test]
    fn test_deleted_file_is_removed() {
        let mut tracker = CategoryTracker::new();
        tracker.reconcile(&paths(&["ChatLog001.txt", "RewardLog001.txt"]));
        let rotation = tracker.reconcile(&paths(&["RewardLog001.txt"]));
        assert!(rotation.added.is_empty());
        assert_eq!(rotation.removed, paths(&["ChatLog001.txt"]));
        assert_eq!(tracker.categories().collect::<Vec<_>>(), vec!["Reward"]);
    }

    #[test]
    fn test_reactivated_existing_file_resumes_at_end() {
        let mut tracker = CategoryTracker::new();
        tracker.reconcile(&paths(&["ChatLog001.txt", "ChatLog002.txt"]));
        let rotation = tracker.reconcile(&paths(&["ChatLog001.txt"]));
        assert_eq!(rotation.added.len(), 1);
        assert_eq!(rotation.added[0].start, StartPosition::End);
        assert_eq!(
            tracker.active_file("Chat"),
            Some(Path::new("/logs/ChatLog001.txt"))
        );
    }

    #[test]
    fn test_new_category_mid_run_starts_at_beginning() {
        let mut tracker = CategoryTracker::new();
        tracker.reconcile(&paths(&["ChatLog001.txt"]));
        let rotation = tracker.reconcile(&paths(&["ChatLog001.txt", "ActionLog001.txt"]));
        assert_eq!(rotation.added.len(), 1);
        assert_eq!(rotation.added[0].category, "Action");
        assert_eq!(rotation.added[0].start, StartPosition::Beginning);
    }
}
