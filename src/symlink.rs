//! Maintains the `current.log` symlink beside the active file.
//!
//! The link target is the active file's basename, not its absolute path, so
//! the link survives the directory being moved. Callers treat failure as a
//! warning: on platforms where creating symlinks needs privileges (Windows
//! without developer mode) the sink keeps rotating without one.

use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

pub(crate) const SYMLINK_NAME: &str = "current.log";

/// Point `current.log` at `active`.
///
/// Idempotent: when the link already names the active file nothing is
/// touched. A stale link, or a regular file squatting on the name, is
/// removed and replaced. Returns whether the filesystem was modified.
pub(crate) fn ensure_symlink(active: &Path) -> io::Result<bool> {
    let dir = active.parent().unwrap_or_else(|| Path::new("."));
    let link = dir.join(SYMLINK_NAME);
    let target: OsString = active
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "active file has no name"))?
        .to_owned();

    match fs::symlink_metadata(&link) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            if fs::read_link(&link)?.as_os_str() == target {
                return Ok(false);
            }
            fs::remove_file(&link)?;
        }
        Ok(_) => fs::remove_file(&link)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    create_symlink(&PathBuf::from(target), &link)?;
    Ok(true)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).expect("test file must be creatable");
        path
    }

    #[test]
    fn creates_relative_link_to_active_file() {
        let dir = tempdir().expect("tempdir must create");
        let active = touch(dir.path(), "app.1.log");

        let changed = ensure_symlink(&active).expect("symlink must be created");
        assert!(changed);
        let link = dir.path().join(SYMLINK_NAME);
        assert_eq!(
            fs::read_link(&link).expect("link must be readable"),
            PathBuf::from("app.1.log")
        );
    }

    #[test]
    fn second_call_is_a_noop() {
        let dir = tempdir().expect("tempdir must create");
        let active = touch(dir.path(), "app.1.log");

        assert!(ensure_symlink(&active).expect("first call must create"));
        assert!(!ensure_symlink(&active).expect("second call must succeed"));
        assert_eq!(
            fs::read_link(dir.path().join(SYMLINK_NAME)).expect("link must survive"),
            PathBuf::from("app.1.log")
        );
    }

    #[test]
    fn retargets_stale_link() {
        let dir = tempdir().expect("tempdir must create");
        let old = touch(dir.path(), "app.1.log");
        let new = touch(dir.path(), "app.2.log");

        ensure_symlink(&old).expect("initial link must be created");
        assert!(ensure_symlink(&new).expect("retarget must succeed"));
        assert_eq!(
            fs::read_link(dir.path().join(SYMLINK_NAME)).expect("link must be readable"),
            PathBuf::from("app.2.log")
        );
    }

    #[test]
    fn replaces_regular_file_squatting_on_the_name() {
        let dir = tempdir().expect("tempdir must create");
        touch(dir.path(), SYMLINK_NAME);
        let active = touch(dir.path(), "app.1.log");

        assert!(ensure_symlink(&active).expect("squatter must be replaced"));
        let metadata = fs::symlink_metadata(dir.path().join(SYMLINK_NAME))
            .expect("link metadata must be readable");
        assert!(metadata.file_type().is_symlink());
    }

    #[test]
    fn reading_through_the_link_reaches_the_active_file() {
        let dir = tempdir().expect("tempdir must create");
        let active = dir.path().join("app.1.log");
        fs::write(&active, "hello\n").expect("active file must be writable");

        ensure_symlink(&active).expect("link must be created");
        let through = fs::read_to_string(dir.path().join(SYMLINK_NAME))
            .expect("reading through the link must work");
        assert_eq!(through, "hello\n");
    }
}
