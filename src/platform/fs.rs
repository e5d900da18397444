// LogPump - platform/fs.rs
//
// Filesystem helpers: directory listing for a source group and ranged
// reads for the segment reader.

use crate::util::error::SourceError;
use glob::Pattern;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Compile glob patterns, skipping (and logging) invalid ones.
pub fn compile_patterns(patterns: &[String], kind: &str) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pat) => Some(pat),
            Err(e) => {
                tracing::warn!(pattern = %p, kind, error = %e, "Ignoring invalid glob pattern");
                None
            }
        })
        .collect()
}

/// Check that `root` is an existing directory.
pub fn check_root(root: &Path) -> Result<(), SourceError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SourceError::NotADirectory {
            path: root.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::RootNotFound {
            path: root.to_path_buf(),
        }),
        Err(e) => Err(SourceError::Unreadable {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

/// List the regular files directly inside `root` whose names match at least
/// one include pattern and no exclude pattern. Sorted by path.
///
/// Failing to list the directory itself is an error; a single entry that
/// cannot be inspected (e.g. deleted mid-listing) is skipped.
pub fn list_log_files(
    root: &Path,
    include: &[Pattern],
    exclude: &[Pattern],
) -> Result<Vec<PathBuf>, SourceError> {
    let entries = std::fs::read_dir(root).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            SourceError::RootNotFound {
                path: root.to_path_buf(),
            }
        } else {
            SourceError::Unreadable {
                path: root.to_path_buf(),
                source: e,
            }
        }
    })?;

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !include.iter().any(|p| p.matches(&name)) {
            continue;
        }
        if exclude.iter().any(|p| p.matches(&name)) {
            tracing::trace!(file = %name, "Skipping excluded log file");
            continue;
        }
        found.push(entry.path());
    }
    found.sort();
    Ok(found)
}

/// Read up to `limit` bytes from `file` starting at byte position `offset`.
///
/// Returns fewer bytes than `limit` if the file ends first.
pub fn read_range(file: &mut File, offset: u64, limit: usize) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(limit.min(1 << 20));
    file.by_ref().take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}
