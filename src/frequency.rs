//! Time policy: when the next rotation boundary falls.
//!
//! Daily and hourly boundaries are calendar boundaries in the system local
//! zone, not fixed offsets from now: "tomorrow" is local midnight reached by
//! calendar addition, so a daylight-saving day is 23 or 25 hours long and
//! still rotates exactly at midnight. `Every` boundaries are plain modular
//! arithmetic on the epoch-millisecond clock.
//!
//! The boundary helpers are generic over [`chrono::TimeZone`]; production
//! code uses [`Local`], tests pin daylight-saving transitions with explicit
//! zones.

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Days, Local, LocalResult, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};
use thiserror::Error;

/// How often the sink rotates on the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frequency {
    /// Rotate at local midnight.
    Daily,
    /// Rotate at the top of every hour.
    Hourly,
    /// Rotate every fixed interval.
    Every(Duration),
}

/// Errors produced while parsing a frequency string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseFrequencyError {
    #[error("empty frequency")]
    Empty,
    #[error("invalid frequency: '{input}'. Valid options are: daily, hourly, or milliseconds")]
    Invalid { input: String },
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseFrequencyError::Empty);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "hourly" => Ok(Frequency::Hourly),
            other => match other.parse::<u64>() {
                Ok(millis) if millis > 0 => Ok(Frequency::Every(Duration::from_millis(millis))),
                _ => Err(ParseFrequencyError::Invalid {
                    input: trimmed.to_owned(),
                }),
            },
        }
    }
}

/// The current rotation period: its beginning and the next boundary, both in
/// epoch milliseconds. Holds `start <= now < next` at construction.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FrequencySpec {
    kind: Frequency,
    pub(crate) start_ms: i64,
    pub(crate) next_ms: i64,
}

impl FrequencySpec {
    pub(crate) fn starting_now(kind: Frequency) -> Self {
        Self::at(kind, &Local::now())
    }

    pub(crate) fn at<Tz: TimeZone>(kind: Frequency, now: &DateTime<Tz>) -> Self {
        FrequencySpec {
            kind,
            start_ms: period_start(kind, now),
            next_ms: next_boundary(kind, now),
        }
    }

    /// Recompute the next boundary from the wall clock.
    ///
    /// The timer can fire marginally before the boundary it was armed for;
    /// in that case the fresh computation would return the same boundary
    /// again, so derive the one after it instead.
    pub(crate) fn advance(&mut self) {
        let next = next_boundary(self.kind, &Local::now());
        self.next_ms = if next > self.next_ms {
            next
        } else {
            next_boundary(self.kind, &local_from_ms(self.next_ms))
        };
    }
}

/// Convert epoch milliseconds to a local timestamp.
pub(crate) fn local_from_ms(ms: i64) -> DateTime<Local> {
    DateTime::from_timestamp_millis(ms)
        .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC)
        .with_timezone(&Local)
}

/// Beginning of the period containing `now`, in epoch milliseconds.
pub(crate) fn period_start<Tz: TimeZone>(kind: Frequency, now: &DateTime<Tz>) -> i64 {
    match kind {
        Frequency::Daily => truncate_to(now, now.date_naive().and_time(NaiveTime::MIN)),
        Frequency::Hourly => start_of_hour(now),
        Frequency::Every(interval) => {
            let f = interval.as_millis() as i64;
            (now.timestamp_millis() / f) * f
        }
    }
}

/// First boundary strictly after `now`, in epoch milliseconds.
pub(crate) fn next_boundary<Tz: TimeZone>(kind: Frequency, now: &DateTime<Tz>) -> i64 {
    match kind {
        Frequency::Daily => {
            let tomorrow = now.date_naive() + Days::new(1);
            resolve_after(now, tomorrow.and_time(NaiveTime::MIN))
        }
        // One absolute hour past the top of the current hour: on a 25-hour
        // day each repeated wall-clock hour still gets its own boundary.
        Frequency::Hourly => start_of_hour(now) + 3_600_000,
        Frequency::Every(interval) => {
            let f = interval.as_millis() as i64;
            (now.timestamp_millis() / f) * f + f
        }
    }
}

fn start_of_hour<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let naive = now
        .naive_local()
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or_else(|| now.naive_local());
    truncate_to(now, naive)
}

/// Resolve a truncation of `now` back into its zone, picking the candidate
/// on the same side of a fold as `now` itself.
fn truncate_to<Tz: TimeZone>(now: &DateTime<Tz>, naive: NaiveDateTime) -> i64 {
    match now.timezone().from_local_datetime(&naive) {
        LocalResult::Single(t) => t.timestamp_millis(),
        LocalResult::Ambiguous(earlier, later) => {
            if later.timestamp_millis() <= now.timestamp_millis() {
                later.timestamp_millis()
            } else {
                earlier.timestamp_millis()
            }
        }
        // The truncated instant fell into a spring-forward gap; step past it.
        LocalResult::None => resolve_after(now, naive),
    }
}

/// Resolve a naive local time expected to lie after `now`, stepping forward
/// over daylight-saving gaps.
fn resolve_after<Tz: TimeZone>(now: &DateTime<Tz>, naive: NaiveDateTime) -> i64 {
    let tz = now.timezone();
    let mut candidate = naive;
    for _ in 0..8 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(t) => return t.timestamp_millis(),
            LocalResult::Ambiguous(earlier, later) => {
                let now_ms = now.timestamp_millis();
                if earlier.timestamp_millis() > now_ms {
                    return earlier.timestamp_millis();
                }
                return later.timestamp_millis().max(now_ms + 1);
            }
            LocalResult::None => candidate += TimeDelta::minutes(30),
        }
    }
    // No real zone skips four hours; interpret as UTC rather than loop.
    naive.and_utc().timestamp_millis()
}
