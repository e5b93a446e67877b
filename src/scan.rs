//! Directory scanning: resumption and retention listings.
//!
//! Resumption walks the base directory for names in the rotation scheme and
//! picks up the highest sequence number, so a restarted process continues the
//! series instead of clobbering it. Retention in sweep mode reuses the same
//! walk to order every matching file by `(file_time, file_number)`.

use std::{
    fs::{self, DirEntry},
    io,
    path::{Path, PathBuf},
    time::{Duration, UNIX_EPOCH},
};

use crate::{
    filename::{identify_log_file, LogFileId},
    pattern::DatePattern,
};

/// A directory entry recognised as part of the rotation series.
#[derive(Debug)]
pub(crate) struct MatchedFile {
    pub(crate) path: PathBuf,
    pub(crate) id: LogFileId,
}

/// Highest sequence number already present for `base`, or 1.
///
/// With `since_ms` set, entries born before the current period are skipped so
/// the series resumes inside the period instead of colliding with an older
/// one. Scan failures (missing directory, unreadable entries) yield 1; if the
/// parent genuinely does not exist, opening the file will fail later with a
/// clearer error.
pub(crate) fn detect_last_number(base: &str, since_ms: Option<i64>, extension: &str) -> u32 {
    let (dir, stem) = split_base(base);
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!(
                "RollingFileSink: cannot scan '{}' for resumption, starting at 1: {err}",
                dir.display()
            );
            return 1;
        }
    };

    let mut last = 1;
    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let Some(tail) = name.strip_prefix(&stem).and_then(|t| t.strip_prefix('.')) else {
            continue;
        };
        if let Some(since) = since_ms {
            if born_before(&entry, since) {
                continue;
            }
        }
        if let Some(number) = trailing_number(tail, extension) {
            last = last.max(number);
        }
    }
    last
}

/// Every entry of `base`'s directory that parses under the rotation scheme,
/// ordered oldest first by `(file_time, file_number)`.
pub(crate) fn matching_log_files(
    base: &str,
    date_format: Option<&DatePattern>,
    extension: &str,
) -> io::Result<Vec<MatchedFile>> {
    let (dir, stem) = split_base(base);
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if let Some(id) = identify_log_file(&name, &stem, date_format, extension) {
            matches.push(MatchedFile {
                path: entry.path(),
                id,
            });
        }
    }
    matches.sort_by_key(|m| m.id);
    Ok(matches)
}

fn split_base(base: &str) -> (&Path, String) {
    let path = Path::new(base);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stem = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, stem)
}

/// Whether the entry was created before `since_ms`.
///
/// Falls back to mtime where the filesystem does not report birth time, and
/// keeps the entry when no timestamp is readable at all: the filter guards
/// against cross-period collisions and must not hide legitimate files.
fn born_before(entry: &DirEntry, since_ms: i64) -> bool {
    let Ok(metadata) = entry.metadata() else {
        return false;
    };
    let Ok(born) = metadata.created().or_else(|_| metadata.modified()) else {
        return false;
    };
    if since_ms < 0 {
        return false;
    }
    born < UNIX_EPOCH + Duration::from_millis(since_ms as u64)
}

/// Extract the trailing sequence number from the part of an entry after
/// `"{stem}."`, honouring the configured extension: `2024-01-01.7.log`
/// yields 7. Tails without the extension, or without a trailing integer,
/// yield `None`.
fn trailing_number(name: &str, extension: &str) -> Option<u32> {
    let extension = extension.trim_start_matches('.');
    let without_ext = if extension.is_empty() {
        name
    } else {
        name.strip_suffix(extension)?.strip_suffix('.')?
    };
    without_ext.rsplit('.').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).expect("test file must be creatable");
    }

    #[test]
    fn returns_highest_sequence_number() {
        let dir = tempdir().expect("tempdir must create");
        for name in ["file.1.log", "file.5.log", "file.7.log", "file.10.log"] {
            touch(dir.path(), name);
        }
        let base = dir.path().join("file");
        assert_eq!(
            detect_last_number(&base.to_string_lossy(), None, "log"),
            10
        );
    }

    #[test]
    fn returns_one_for_empty_directory() {
        let dir = tempdir().expect("tempdir must create");
        let base = dir.path().join("file");
        assert_eq!(detect_last_number(&base.to_string_lossy(), None, "log"), 1);
    }

    #[test]
    fn returns_one_for_missing_directory() {
        let dir = tempdir().expect("tempdir must create");
        let base = dir.path().join("nope").join("file");
        assert_eq!(detect_last_number(&base.to_string_lossy(), None, "log"), 1);
    }

    #[test]
    fn ignores_entries_without_a_trailing_number() {
        let dir = tempdir().expect("tempdir must create");
        for name in ["file.log", "file.3.log", "file.notes.log", "unrelated.9.log"] {
            touch(dir.path(), name);
        }
        let base = dir.path().join("file");
        assert_eq!(detect_last_number(&base.to_string_lossy(), None, "log"), 3);
    }

    #[test]
    fn ignores_entries_missing_the_extension() {
        let dir = tempdir().expect("tempdir must create");
        for name in ["file.7", "file.2.log"] {
            touch(dir.path(), name);
        }
        let base = dir.path().join("file");
        assert_eq!(detect_last_number(&base.to_string_lossy(), None, "log"), 2);
    }

    #[test]
    fn since_filter_excludes_files_from_older_periods() {
        let dir = tempdir().expect("tempdir must create");
        touch(dir.path(), "file.9.log");
        std::thread::sleep(Duration::from_millis(20));
        let cutoff = chrono::Utc::now().timestamp_millis();
        std::thread::sleep(Duration::from_millis(20));
        touch(dir.path(), "file.2.log");

        let base = dir.path().join("file");
        assert_eq!(
            detect_last_number(&base.to_string_lossy(), Some(cutoff), "log"),
            2
        );
    }

    #[test]
    fn matching_orders_by_time_then_number() {
        let dir = tempdir().expect("tempdir must create");
        let pattern: DatePattern = "HH-mm-ss-S".parse().expect("pattern must parse");
        for name in [
            "log.10-00-00-0.2",
            "log.09-00-00-0.1",
            "log.10-00-00-0.1",
            "notLogFile",
        ] {
            touch(dir.path(), name);
        }
        let base = dir.path().join("log");
        let matches = matching_log_files(&base.to_string_lossy(), Some(&pattern), "")
            .expect("scan must succeed");
        let names: Vec<_> = matches
            .iter()
            .map(|m| m.path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            names,
            [
                Some("log.09-00-00-0.1".to_owned()),
                Some("log.10-00-00-0.1".to_owned()),
                Some("log.10-00-00-0.2".to_owned()),
            ]
        );
    }

    #[test]
    fn matching_surfaces_missing_directory() {
        let dir = tempdir().expect("tempdir must create");
        let base = dir.path().join("nope").join("log");
        assert!(matching_log_files(&base.to_string_lossy(), None, "log").is_err());
    }
}
