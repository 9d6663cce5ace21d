//! Parsers for the scalar attribute types used throughout an MPD.
//!
//! Every parser takes the raw attribute (or text) string and either returns a
//! fully-built value or a [`ScalarError`]; nothing is written on failure, so a
//! caller keeping a default can apply the result atomically.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScalarError {
    #[error("invalid unsigned integer: {0:?}")]
    Integer(String),

    #[error("invalid double: {0:?}")]
    Double(String),

    #[error("invalid boolean: {0:?}")]
    Boolean(String),

    #[error("invalid ratio: {0:?}")]
    Ratio(String),

    #[error("invalid frame rate: {0:?}")]
    FrameRate(String),

    #[error("invalid conditional uint: {0:?}")]
    ConditionalUint(String),

    #[error("invalid byte range: {0:?}")]
    ByteRange(String),

    #[error("invalid duration: {0:?}")]
    Duration(String),

    #[error("duration out of range: {0:?}")]
    DurationOverflow(String),

    #[error("invalid date time: {0:?}")]
    DateTime(String),
}

pub type ScalarResult<T> = Result<T, ScalarError>;

/// `num:den` pair as used by `@par` and `@sar`. `den` defaults to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub num: u32,
    pub den: u32,
}

/// `num/den` pair as used by `@frameRate`. `den` defaults to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    /// Fraction comparison without dividing: `self > other`.
    pub fn exceeds(&self, other: &FrameRate) -> bool {
        (self.num as u64) * (other.den as u64) > (other.num as u64) * (self.den as u64)
    }
}

/// `xs:boolean | xs:unsignedInt` as used by `@segmentAlignment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionalUint {
    pub flag: bool,
    pub value: u32,
}

/// A single contiguous byte range (RFC 7233 byte-range-spec). `last` absent
/// means "to the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub first: u64,
    pub last: Option<u64>,
}

impl ByteRange {
    pub fn to_http_range(&self) -> String {
        match self.last {
            Some(last) => format!("bytes={}-{}", self.first, last),
            None => format!("bytes={}-", self.first),
        }
    }
}

pub fn parse_uint(s: &str) -> ScalarResult<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| ScalarError::Integer(s.to_string()))
}

pub fn parse_uint32(s: &str) -> ScalarResult<u32> {
    s.trim()
        .parse::<u32>()
        .map_err(|_| ScalarError::Integer(s.to_string()))
}

pub fn parse_int(s: &str) -> ScalarResult<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| ScalarError::Integer(s.to_string()))
}

pub fn parse_double(s: &str) -> ScalarResult<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| ScalarError::Double(s.to_string()))
}

/// Strict `xs:boolean`: only the literals `true` and `false` are accepted.
pub fn parse_bool(s: &str) -> ScalarResult<bool> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ScalarError::Boolean(s.to_string())),
    }
}

/// Whitespace-separated list, as used by `@dependencyId` and `UTCTiming@value`.
pub fn parse_string_vector(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

pub fn parse_ratio(s: &str) -> ScalarResult<Ratio> {
    let (num, den) = split_fraction(s, ':').ok_or_else(|| ScalarError::Ratio(s.to_string()))?;
    Ok(Ratio { num, den })
}

pub fn parse_frame_rate(s: &str) -> ScalarResult<FrameRate> {
    let (num, den) =
        split_fraction(s, '/').ok_or_else(|| ScalarError::FrameRate(s.to_string()))?;
    Ok(FrameRate { num, den })
}

fn split_fraction(s: &str, sep: char) -> Option<(u32, u32)> {
    let s = s.trim();
    let (num, den) = match s.split_once(sep) {
        Some((num, den)) => (num, den),
        None => (s, ""),
    };
    let num = num.parse::<u32>().ok()?;
    let den = if den.is_empty() {
        1
    } else {
        den.parse::<u32>().ok()?
    };
    Some((num, den))
}

/// `"true"` => flag with no value, `"false"` => cleared, anything else must be
/// a non-negative integer and implies the flag.
pub fn parse_conditional_uint(s: &str) -> ScalarResult<ConditionalUint> {
    match s.trim() {
        "true" => Ok(ConditionalUint {
            flag: true,
            value: 0,
        }),
        "false" => Ok(ConditionalUint {
            flag: false,
            value: 0,
        }),
        other => {
            let value = other
                .parse::<u32>()
                .map_err(|_| ScalarError::ConditionalUint(s.to_string()))?;
            Ok(ConditionalUint { flag: true, value })
        }
    }
}

/// `first-last` with `last` optional. The separator is mandatory and an open
/// start (`-500`) is rejected.
pub fn parse_byte_range(s: &str) -> ScalarResult<ByteRange> {
    let err = || ScalarError::ByteRange(s.to_string());

    let (first, last) = s.trim().split_once('-').ok_or_else(err)?;
    if first.is_empty() {
        return Err(err());
    }
    let first = first.parse::<u64>().map_err(|_| err())?;
    let last = if last.is_empty() {
        None
    } else {
        Some(last.parse::<u64>().map_err(|_| err())?)
    };

    Ok(ByteRange { first, last })
}

/// `value * mul + add` with overflow turned into an error.
fn accumulate(value: u64, mul: u64, add: u64) -> Option<u64> {
    value.checked_mul(mul)?.checked_add(add)
}

/// Parse an `xs:duration` (`PnYnMnDTnHnMnS`) into a [`Duration`] with
/// millisecond precision.
///
/// Calendar handling is deliberately lenient: one month counts as 30 days and
/// one year as 365. Months of 12 or more and days of 31 or more are rejected
/// instead of being carried over. Negative durations are rejected. The result
/// must stay representable after a later x1_000_000 scale to nanoseconds.
pub fn parse_duration(s: &str) -> ScalarResult<Duration> {
    let err = || ScalarError::Duration(s.to_string());
    let overflow = || ScalarError::DurationOverflow(s.to_string());

    let input = s.trim();
    if input.starts_with('-') {
        return Err(err());
    }
    let rest = input.strip_prefix('P').ok_or_else(err)?;
    if rest.is_empty() {
        return Err(err());
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((_, t)) if t.is_empty() => return Err(err()),
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut years = 0u64;
    let mut months = 0u64;
    let mut days = 0u64;
    let mut seen = [false; 3];
    let mut cursor = date_part;
    while !cursor.is_empty() {
        let (value, unit, rest) = next_group(cursor).ok_or_else(err)?;
        let slot = match unit {
            'Y' => 0,
            'M' => 1,
            'D' => 2,
            _ => return Err(err()),
        };
        if seen[slot] {
            return Err(err());
        }
        seen[slot] = true;
        match unit {
            'Y' => years = value,
            'M' => months = value,
            _ => days = value,
        }
        cursor = rest;
    }
    if months >= 12 || days >= 31 {
        return Err(err());
    }

    let mut hours = 0u64;
    let mut minutes = 0u64;
    let mut seconds = 0u64;
    let mut millis = 0u64;
    if let Some(time_part) = time_part {
        let mut seen = [false; 3];
        let mut cursor = time_part;
        while !cursor.is_empty() {
            let (value, unit, rest) = next_group(cursor).ok_or_else(err)?;
            let slot = match unit {
                'H' => 0,
                'M' => 1,
                'S' | '.' | ',' => 2,
                _ => return Err(err()),
            };
            if seen[slot] {
                return Err(err());
            }
            match unit {
                'H' => {
                    seen[0] = true;
                    hours = value;
                }
                'M' => {
                    seen[1] = true;
                    minutes = value;
                }
                'S' => {
                    seen[2] = true;
                    seconds = value;
                }
                _ => {
                    // Integer part of a decimal seconds value; the fraction
                    // runs up to the closing 'S' and is truncated to ms.
                    seen[2] = true;
                    seconds = value;
                    let frac = rest.strip_suffix('S').ok_or_else(err)?;
                    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(err());
                    }
                    millis = fraction_to_millis(frac);
                    cursor = "";
                    continue;
                }
            }
            cursor = rest;
        }
    }

    let total = accumulate(years, 365, accumulate(months, 30, days).ok_or_else(overflow)?)
        .and_then(|d| accumulate(d, 24, hours))
        .and_then(|h| accumulate(h, 60, minutes))
        .and_then(|m| accumulate(m, 60, seconds))
        .and_then(|secs| accumulate(secs, 1000, millis))
        .ok_or_else(overflow)?;

    // The finest internal unit is the nanosecond; a value that cannot be
    // scaled there is rejected rather than silently truncated.
    total.checked_mul(1_000_000).ok_or_else(overflow)?;

    Ok(Duration::from_millis(total))
}

/// Split a leading `<digits><unit>` group off `s`.
fn next_group(s: &str) -> Option<(u64, char, &str)> {
    let digits_end = s.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let value = s[..digits_end].parse::<u64>().ok()?;
    let unit = s[digits_end..].chars().next()?;
    Some((value, unit, &s[digits_end + unit.len_utf8()..]))
}

/// `digits * 10 ^ (3 - digit_count)`, truncating below milliseconds.
fn fraction_to_millis(frac: &str) -> u64 {
    let digits: &str = &frac[..frac.len().min(3)];
    let value = digits.parse::<u64>().unwrap_or(0);
    value * 10u64.pow(3 - digits.len() as u32)
}

/// Parse an `xs:dateTime` (`YYYY-MM-DDThh:mm:ss[.frac][Z|+-hh:mm|+-hhmm]`)
/// into a UTC-normalized instant.
pub fn parse_date_time(s: &str) -> ScalarResult<DateTime<Utc>> {
    let err = || ScalarError::DateTime(s.to_string());

    let input = s.trim();
    let (date, time) = input.split_once('T').ok_or_else(err)?;

    let mut parts = date.splitn(3, '-');
    let year = parts.next().and_then(|p| p.parse::<i32>().ok());
    let month = parts.next().and_then(|p| p.parse::<u32>().ok());
    let day = parts.next().and_then(|p| p.parse::<u32>().ok());
    let (year, month, day) = match (year, month, day) {
        (Some(y), Some(m), Some(d)) if y > 0 && m > 0 && d > 0 => (y, m, d),
        _ => return Err(err()),
    };

    let (time, offset_secs) = split_timezone(time).ok_or_else(err)?;

    let mut parts = time.splitn(3, ':');
    let hour = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minute = parts.next().and_then(|p| p.parse::<u32>().ok());
    let second = parts.next();
    let (hour, minute, second) = match (hour, minute, second) {
        (Some(h), Some(m), Some(s)) => (h, m, s),
        _ => return Err(err()),
    };
    let (second, millis) = match second.split_once('.') {
        Some((sec, frac)) if !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()) => (
            sec.parse::<u32>().map_err(|_| err())?,
            fraction_to_millis(frac) as u32,
        ),
        Some(_) => return Err(err()),
        None => (second.parse::<u32>().map_err(|_| err())?, 0),
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis))
        .ok_or_else(err)?;

    // A positive offset means the local time is ahead of UTC.
    let utc = naive - TimeDelta::seconds(offset_secs);
    Ok(DateTime::from_naive_utc_and_offset(utc, Utc))
}

/// Split a trailing timezone designator off a time string, returning the bare
/// time and the offset in seconds. No designator means UTC.
fn split_timezone(time: &str) -> Option<(&str, i64)> {
    if let Some(stripped) = time.strip_suffix('Z') {
        return Some((stripped, 0));
    }
    if let Some(pos) = time.find(['+', '-']) {
        let (bare, tz) = time.split_at(pos);
        let sign = if tz.starts_with('-') { -1 } else { 1 };
        let tz = &tz[1..];
        let (hours, minutes) = match tz.split_once(':') {
            Some((h, m)) => (h, m),
            // +-hhmm without a colon
            None if tz.len() > 2 => tz.split_at(2),
            None => (tz, ""),
        };
        let hours = hours.parse::<i64>().ok()?;
        let minutes = if minutes.is_empty() {
            0
        } else {
            minutes.parse::<i64>().ok()?
        };
        if hours > 14 || minutes > 59 {
            return None;
        }
        return Some((bare, sign * (hours * 3600 + minutes * 60)));
    }
    Some((time, 0))
}
