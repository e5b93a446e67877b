//! Retention: bounding how many rotated files stay on disk.
//!
//! Two modes. The default prunes the FIFO of files this process created,
//! keeping the active file plus `count` predecessors. With
//! `remove_other_log_files` the directory is rediscovered on every rotation
//! and the oldest matching files are deleted until `count` remain, whether or
//! not this process created them.
//!
//! Deletion retries: another handle (an antivirus scanner, the just-closed
//! writer) can briefly hold a file on some platforms, so unlink backs off and
//! tries again before giving up. A file that is already gone counts as
//! deleted.

use std::{collections::VecDeque, fs, io, path::{Path, PathBuf}, thread, time::Duration};

use crate::{
    error::RollError,
    pattern::DatePattern,
    scan::matching_log_files,
};

pub(crate) const UNLINK_MAX_ATTEMPTS: u32 = 50;
pub(crate) const UNLINK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// How many rotated files to keep around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionLimit {
    /// Files retained in addition to the currently active one. Must be at
    /// least 1.
    pub count: u32,
    /// Delete any directory entry matching the rotation scheme, not just
    /// files this process created.
    pub remove_other_log_files: bool,
}

impl RetentionLimit {
    /// Keep the active file plus `count` rotated predecessors.
    pub fn new(count: u32) -> Self {
        RetentionLimit {
            count,
            remove_other_log_files: false,
        }
    }

    /// Extend deletion to matching files this process did not create.
    pub fn removing_other_log_files(mut self) -> Self {
        self.remove_other_log_files = true;
        self
    }
}

/// Drop the oldest entries from the created-files FIFO until at most
/// `count + 1` remain (active file plus `count` retained), returning the
/// paths to delete.
pub(crate) fn prune_created(created: &mut VecDeque<PathBuf>, count: u32) -> Vec<PathBuf> {
    let keep = count as usize + 1;
    let excess = created.len().saturating_sub(keep);
    created.drain(..excess).collect()
}

/// Sweep mode: delete the oldest matching files until `count` remain.
///
/// The active file is among the matches, so a sweep keeps `count` files in
/// total. Returns how many files were deleted.
pub(crate) fn sweep_directory(
    base: &str,
    date_format: Option<&DatePattern>,
    extension: &str,
    count: u32,
) -> Result<usize, RollError> {
    let matches = matching_log_files(base, date_format, extension).map_err(|source| {
        let dir = Path::new(base)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        RollError::Scan { dir, source }
    })?;

    let excess = matches.len().saturating_sub(count as usize);
    let mut deleted = 0;
    for matched in matches.into_iter().take(excess) {
        unlink_with_retry(&matched.path, UNLINK_MAX_ATTEMPTS, UNLINK_RETRY_DELAY).map_err(
            |source| RollError::Unlink {
                path: matched.path.clone(),
                source,
            },
        )?;
        deleted += 1;
    }
    Ok(deleted)
}

/// Unlink `path`, retrying up to `max_attempts` times with `delay` between
/// attempts. A missing file is success.
pub(crate) fn unlink_with_retry(
    path: &Path,
    max_attempts: u32,
    delay: Duration,
) -> io::Result<()> {
    let mut attempt = 1;
    loop {
        match fs::remove_file(path) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                log::debug!(
                    "RollingFileSink: unlink of '{}' failed (attempt {attempt}/{max_attempts}): {err}",
                    path.display()
                );
                attempt += 1;
                thread::sleep(delay);
            }
        }
    }
}
