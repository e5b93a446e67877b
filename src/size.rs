//! Size threshold parsing for size-based rotation.

use std::str::FromStr;

use thiserror::Error;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

/// Size at which the active file rolls over.
///
/// The string form accepts `<n>[b|k|m|g]`, case-insensitive, with decimals
/// allowed; a bare number is read as megabytes:
///
/// ```ignore
/// let limit: SizeLimit = "20b".parse()?;
/// assert_eq!(limit.bytes(), 20);
/// assert_eq!("10".parse::<SizeLimit>()?.bytes(), 10 * 1024 * 1024);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeLimit {
    Bytes(u64),
    Kilobytes(u64),
    Megabytes(u64),
    Gigabytes(u64),
}

impl SizeLimit {
    /// The threshold in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            SizeLimit::Bytes(n) => *n,
            SizeLimit::Kilobytes(n) => n * KIB,
            SizeLimit::Megabytes(n) => n * MIB,
            SizeLimit::Gigabytes(n) => n * GIB,
        }
    }
}

/// Errors produced while parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseSizeError {
    #[error("empty size")]
    Empty,
    #[error("invalid size: '{input}'")]
    Invalid { input: String },
    #[error("unknown size unit '{unit}' in '{input}'. Valid units are: b, k, m, g")]
    UnknownUnit { input: String, unit: char },
    #[error("size must be at least one byte: '{input}'")]
    Zero { input: String },
}

impl FromStr for SizeLimit {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseSizeError::Empty);
        }

        // At most one unit character, and only in the final position.
        let (digits, unit) = match trimmed.char_indices().find(|(_, c)| !c.is_ascii_digit() && *c != '.') {
            None => (trimmed, None),
            Some((idx, c)) if idx + c.len_utf8() == trimmed.len() => (&trimmed[..idx], Some(c)),
            Some(_) => {
                return Err(ParseSizeError::Invalid {
                    input: trimmed.to_owned(),
                })
            }
        };

        let value: f64 = digits.parse().map_err(|_| ParseSizeError::Invalid {
            input: trimmed.to_owned(),
        })?;
        if !value.is_finite() {
            return Err(ParseSizeError::Invalid {
                input: trimmed.to_owned(),
            });
        }

        let multiplier = match unit.map(|c| c.to_ascii_lowercase()) {
            Some('b') => 1,
            Some('k') => KIB,
            Some('m') | None => MIB,
            Some('g') => GIB,
            Some(other) => {
                return Err(ParseSizeError::UnknownUnit {
                    input: trimmed.to_owned(),
                    unit: other,
                })
            }
        };

        let bytes = (value * multiplier as f64).round() as u64;
        if bytes == 0 {
            return Err(ParseSizeError::Zero {
                input: trimmed.to_owned(),
            });
        }
        Ok(SizeLimit::Bytes(bytes))
    }
}
