//! Name codec for rotated log files.
//!
//! Rotated names follow `{base}[.{date}].{number}[.{ext}]`, where each
//! optional segment appears only when configured. The codec is pure string
//! work: [`build_file_name`] composes a name, [`identify_log_file`] parses
//! one back, and the round trip recovers the `(date, number)` pair exactly.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::{error::ConfigError, pattern::DatePattern};

/// Characters that cannot appear in a file name on any supported platform.
const FORBIDDEN: &[char] = &['<', '>', '"', '|', '?', '*', '\0'];

/// Identity of a rotated file recovered from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct LogFileId {
    /// Epoch milliseconds parsed from the date segment; 0 when the name
    /// carries no date.
    pub(crate) time_ms: i64,
    pub(crate) number: u32,
}

/// Compose the path of a rotated file.
///
/// `extension` may be passed with or without its leading dot; empty disables
/// the segment.
pub(crate) fn build_file_name(
    base: &str,
    date: Option<&str>,
    number: u32,
    extension: &str,
) -> PathBuf {
    let mut name = String::from(base);
    if let Some(date) = date {
        name.push('.');
        name.push_str(date);
    }
    name.push('.');
    name.push_str(&number.to_string());
    if !extension.is_empty() {
        if !extension.starts_with('.') {
            name.push('.');
        }
        name.push_str(extension);
    }
    PathBuf::from(name)
}

/// Parse a directory entry name against the rotation scheme.
///
/// `stem` is the file-name part of the base path. Returns `None` for
/// anything that is not a rotated file of this series: a foreign prefix, the
/// wrong segment count, a missing or mismatched extension, a non-numeric
/// sequence segment, or a date segment that does not parse under
/// `date_format`.
pub(crate) fn identify_log_file(
    candidate: &str,
    stem: &str,
    date_format: Option<&DatePattern>,
    extension: &str,
) -> Option<LogFileId> {
    let tail = candidate.strip_prefix(stem)?.strip_prefix('.')?;
    let segments: Vec<&str> = tail.split('.').collect();

    let extension = extension.trim_start_matches('.');
    let expected =
        1 + usize::from(date_format.is_some()) + usize::from(!extension.is_empty());
    if segments.len() != expected {
        return None;
    }

    let mut last = segments.len();
    if !extension.is_empty() {
        last -= 1;
        if segments[last] != extension {
            return None;
        }
    }
    let number: u32 = segments[last - 1].parse().ok()?;

    let time_ms = match date_format {
        Some(pattern) => pattern.parse(segments[0])?,
        None => 0,
    };
    Some(LogFileId { time_ms, number })
}

/// Split a user-supplied file option into `(base, extension)`.
///
/// A path ending in a separator gains the stem `app`. When the final path
/// segment carries a suffix, that suffix becomes the extension unless the
/// caller supplied one explicitly; a bare suffix shorter than two characters
/// (dot included) is left on the base and the extension falls back to `log`.
pub(crate) fn sanitize_file(
    file: &str,
    extension: Option<&str>,
) -> Result<(String, String), ConfigError> {
    if file.is_empty() {
        return Err(ConfigError::EmptyFile);
    }

    let mut base = file.to_owned();
    if base.ends_with('/') || base.ends_with(MAIN_SEPARATOR) {
        base.push_str("app");
    }

    let file_part = Path::new(&base)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = match file_part.rfind('.') {
        Some(idx) if idx > 0 => Some(file_part[idx..].to_owned()),
        _ => None,
    };

    let peel = |base: &mut String, suffix: &str| base.truncate(base.len() - suffix.len());
    let extension = match (extension, suffix) {
        (Some(explicit), suffix) => {
            if let Some(suffix) = suffix {
                peel(&mut base, &suffix);
            }
            explicit.trim_start_matches('.').to_owned()
        }
        (None, Some(suffix)) if suffix.len() >= 2 => {
            peel(&mut base, &suffix);
            suffix[1..].to_owned()
        }
        (None, _) => "log".to_owned(),
    };

    Ok((base, extension))
}

/// Reject base paths containing characters no filesystem accepts.
///
/// A leading Windows drive letter is allowed; any other colon is not.
pub(crate) fn validate_file_name(path: &str) -> Result<(), ConfigError> {
    let rest = strip_drive_letter(path);
    if rest.contains(FORBIDDEN) || rest.contains(':') {
        return Err(ConfigError::InvalidFileName {
            path: path.to_owned(),
        });
    }
    Ok(())
}

fn strip_drive_letter(path: &str) -> &str {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => &path[2..],
        _ => path,
    }
}
