//! Date-format patterns for the date segment of rotated file names.
//!
//! Patterns use fixed-width tokens (`yyyy`, `yy`, `MM`, `dd`, `HH`, `mm`,
//! `ss`, `SSS`, `S`) separated by literal characters, e.g. `yyyy-MM-dd` or
//! `HH-mm-ss-S`. A pattern knows how to format an instant into a segment and
//! to parse a segment back into epoch milliseconds, which is what lets the
//! directory scanner order rotated files by period.
//!
//! Characters that cannot appear in file names are rejected up front, as is a
//! literal dot: the name codec splits file names on dots, so a dot inside the
//! date segment would make every rotated name unparseable.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Timelike};
use thiserror::Error;

const FORBIDDEN: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Errors produced while parsing a date-format pattern.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDatePatternError {
    #[error("empty date format")]
    Empty,
    #[error("invalid character '{ch}' in date format '{pattern}'")]
    InvalidCharacter { pattern: String, ch: char },
    /// Dots separate file-name segments, so they cannot appear inside one.
    #[error("date format '{pattern}' must not contain '.'")]
    DotSeparator { pattern: String },
    #[error("unsupported token '{token}' in date format '{pattern}'")]
    UnsupportedToken { pattern: String, token: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Year4,
    Year2,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millis,
    Tenths,
    Literal(char),
}

impl Token {
    fn width(self) -> usize {
        match self {
            Token::Year4 => 4,
            Token::Millis => 3,
            Token::Tenths | Token::Literal(_) => 1,
            _ => 2,
        }
    }
}

/// A validated date-format pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePattern {
    source: String,
    tokens: Vec<Token>,
}

impl FromStr for DatePattern {
    type Err = ParseDatePatternError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        if pattern.is_empty() {
            return Err(ParseDatePatternError::Empty);
        }
        if let Some(ch) = pattern.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(ParseDatePatternError::InvalidCharacter {
                pattern: pattern.to_owned(),
                ch,
            });
        }
        if pattern.contains('.') {
            return Err(ParseDatePatternError::DotSeparator {
                pattern: pattern.to_owned(),
            });
        }

        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if !c.is_ascii_alphabetic() {
                tokens.push(Token::Literal(c));
                i += 1;
                continue;
            }
            let run = chars[i..].iter().take_while(|&&x| x == c).count();
            let token = match (c, run) {
                ('y', 4) => Token::Year4,
                ('y', 2) => Token::Year2,
                ('M', 2) => Token::Month,
                ('d', 2) => Token::Day,
                ('H', 2) => Token::Hour,
                ('m', 2) => Token::Minute,
                ('s', 2) => Token::Second,
                ('S', 3) => Token::Millis,
                ('S', 1) => Token::Tenths,
                _ => {
                    return Err(ParseDatePatternError::UnsupportedToken {
                        pattern: pattern.to_owned(),
                        token: chars[i..i + run].iter().collect(),
                    })
                }
            };
            tokens.push(token);
            i += run;
        }

        Ok(DatePattern {
            source: pattern.to_owned(),
            tokens,
        })
    }
}

impl DatePattern {
    /// The pattern string this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render the date segment for a local instant.
    pub(crate) fn format(&self, at: &DateTime<Local>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for token in &self.tokens {
            match token {
                Token::Year4 => out.push_str(&format!("{:04}", at.year())),
                Token::Year2 => out.push_str(&format!("{:02}", at.year().rem_euclid(100))),
                Token::Month => out.push_str(&format!("{:02}", at.month())),
                Token::Day => out.push_str(&format!("{:02}", at.day())),
                Token::Hour => out.push_str(&format!("{:02}", at.hour())),
                Token::Minute => out.push_str(&format!("{:02}", at.minute())),
                Token::Second => out.push_str(&format!("{:02}", at.second())),
                Token::Millis => {
                    out.push_str(&format!("{:03}", at.timestamp_subsec_millis() % 1000))
                }
                Token::Tenths => {
                    out.push_str(&format!("{}", (at.timestamp_subsec_millis() % 1000) / 100))
                }
                Token::Literal(c) => out.push(*c),
            }
        }
        out
    }

    /// Parse a file-name segment produced by [`format`](Self::format) back
    /// into local epoch milliseconds.
    ///
    /// Fields the pattern does not mention anchor at the Unix epoch, so
    /// time-only patterns still order deterministically. Returns `None` when
    /// the segment does not match the pattern or names an invalid date.
    pub(crate) fn parse(&self, segment: &str) -> Option<i64> {
        let chars: Vec<char> = segment.chars().collect();
        let mut pos = 0;

        let mut year: i32 = 1970;
        let mut month: u32 = 1;
        let mut day: u32 = 1;
        let mut hour: u32 = 0;
        let mut minute: u32 = 0;
        let mut second: u32 = 0;
        let mut millis: u32 = 0;

        for token in &self.tokens {
            let width = token.width();
            if pos + width > chars.len() {
                return None;
            }
            let field = &chars[pos..pos + width];
            match token {
                Token::Literal(c) => {
                    if field[0] != *c {
                        return None;
                    }
                }
                _ => {
                    if !field.iter().all(|c| c.is_ascii_digit()) {
                        return None;
                    }
                    let value: u32 = field.iter().collect::<String>().parse().ok()?;
                    match token {
                        Token::Year4 => year = value as i32,
                        Token::Year2 => year = 2000 + value as i32,
                        Token::Month => month = value,
                        Token::Day => day = value,
                        Token::Hour => hour = value,
                        Token::Minute => minute = value,
                        Token::Second => second = value,
                        Token::Millis => millis = value,
                        Token::Tenths => millis = value * 100,
                        Token::Literal(_) => unreachable!(),
                    }
                }
            }
            pos += width;
        }
        if pos != chars.len() {
            return None;
        }

        let naive = NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_milli_opt(hour, minute, second, millis)?;
        match Local.from_local_datetime(&naive).earliest() {
            Some(local) => Some(local.timestamp_millis()),
            None => Some(naive.and_utc().timestamp_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .earliest()
            .expect("test instant must exist")
            + chrono::TimeDelta::milliseconds(ms as i64)
    }

    #[rstest]
    #[case::slash('/')]
    #[case::backslash('\\')]
    #[case::question('?')]
    #[case::percent('%')]
    #[case::star('*')]
    #[case::colon(':')]
    #[case::pipe('|')]
    #[case::quote('"')]
    #[case::less('<')]
    #[case::greater('>')]
    fn rejects_forbidden_characters(#[case] ch: char) {
        let pattern = format!("yyyy{ch}MM");
        let err = pattern
            .parse::<DatePattern>()
            .expect_err("forbidden character must be rejected");
        assert_eq!(
            err,
            ParseDatePatternError::InvalidCharacter { pattern, ch }
        );
    }

    #[test]
    fn rejects_dot_separator() {
        assert!(matches!(
            "yyyy.MM".parse::<DatePattern>(),
            Err(ParseDatePatternError::DotSeparator { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_token() {
        let err = "yyyy-Q".parse::<DatePattern>().expect_err("Q is not a token");
        assert_eq!(
            err.to_string(),
            "unsupported token 'Q' in date format 'yyyy-Q'"
        );
    }

    #[test]
    fn rejects_empty_pattern() {
        assert_eq!("".parse::<DatePattern>(), Err(ParseDatePatternError::Empty));
    }

    #[test]
    fn formats_calendar_date() {
        let pattern: DatePattern = "yyyy-MM-dd".parse().expect("pattern must parse");
        let at = local(2024, 3, 7, 15, 30, 0, 0);
        assert_eq!(pattern.format(&at), "2024-03-07");
    }

    #[test]
    fn formats_time_with_tenths() {
        let pattern: DatePattern = "HH-mm-ss-S".parse().expect("pattern must parse");
        let at = local(2024, 3, 7, 9, 5, 2, 345);
        assert_eq!(pattern.format(&at), "09-05-02-3");
    }

    #[rstest]
    #[case::calendar("yyyy-MM-dd", "2024-03-07")]
    #[case::time_of_day("HH-mm-ss-S", "14-30-00-5")]
    #[case::two_digit_year("yy-MM", "24-12")]
    #[case::millis("HHmmssSSS", "143000250")]
    fn parse_round_trips_formatted_segments(#[case] pattern: &str, #[case] segment: &str) {
        let pattern: DatePattern = pattern.parse().expect("pattern must parse");
        let ms = pattern.parse(segment).expect("segment must parse");
        let rendered = pattern.format(
            &DateTime::from_timestamp_millis(ms)
                .expect("epoch millis must convert")
                .with_timezone(&Local),
        );
        assert_eq!(rendered, segment);
    }

    #[test]
    fn parse_orders_by_instant() {
        let pattern: DatePattern = "HH-mm-ss-S".parse().expect("pattern must parse");
        let earlier = pattern.parse("09-00-00-0").expect("must parse");
        let later = pattern.parse("09-00-01-5").expect("must parse");
        assert!(earlier < later);
    }

    #[rstest]
    #[case::wrong_literal("2024_03_07")]
    #[case::too_short("2024-03")]
    #[case::trailing_garbage("2024-03-07x")]
    #[case::non_digit("2024-xx-07")]
    #[case::invalid_month("2024-13-07")]
    #[case::invalid_day("2024-02-30")]
    fn parse_rejects_mismatched_segments(#[case] segment: &str) {
        let pattern: DatePattern = "yyyy-MM-dd".parse().expect("pattern must parse");
        assert_eq!(pattern.parse(segment), None);
    }
}
