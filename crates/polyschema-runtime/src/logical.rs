//! JSON forms of logical scalars and their integer or byte encodings.
//!
//! | scalar                | JSON form                      | binary              |
//! |-----------------------|--------------------------------|---------------------|
//! | decimal               | `"-12.50"` (exactly `scale` digits) | two's complement |
//! | date                  | `"2024-02-29"`                 | days since epoch    |
//! | time                  | `"13:45:00.250"`               | ms or µs since midnight |
//! | timestamp             | `"2024-02-29T13:45:00.250Z"`   | ms or µs since epoch |
//! | local timestamp       | `"2024-02-29T13:45:00.250"`    | ms or µs since epoch |
//! | bytes                 | base64                         | raw                 |

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta, Timelike};
use polyschema_core::TimePrecision;

const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn per_second(precision: TimePrecision) -> i64 {
    match precision {
        TimePrecision::Millis => 1_000,
        TimePrecision::Micros => 1_000_000,
    }
}

/// Decimal digits an `i128` always holds.
pub const MAX_DECIMAL_DIGITS: u32 = 38;

/// The unscaled integer of a decimal string, or `None` when it has more
/// fractional digits than `scale` or is not a number.
pub fn decimal_to_unscaled(text: &str, scale: u32) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let scale = scale as usize;
    if fraction.len() > scale || (whole.is_empty() && fraction.is_empty()) {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    if scale > MAX_DECIMAL_DIGITS as usize {
        // Only zero scales into an i128.
        let zero = whole.chars().chain(fraction.chars()).all(|c| c == '0');
        return zero.then_some(0);
    }
    let mut joined = String::with_capacity(whole.len() + scale);
    joined.push_str(whole);
    joined.push_str(fraction);
    joined.extend(std::iter::repeat_n('0', scale - fraction.len()));
    let n: i128 = joined.parse().ok()?;
    Some(if negative { -n } else { n })
}

pub fn unscaled_to_decimal(n: i128, scale: u32) -> String {
    if scale == 0 {
        return n.to_string();
    }
    let scale = scale as usize;
    let mut digits = n.unsigned_abs().to_string();
    if digits.len() <= scale {
        digits.insert_str(0, &"0".repeat(scale + 1 - digits.len()));
    }
    let (whole, fraction) = digits.split_at(digits.len() - scale);
    let sign = if n < 0 { "-" } else { "" };
    format!("{sign}{whole}.{fraction}")
}

/// Minimal big-endian two's complement bytes.
pub fn twos_complement(n: i128) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xff && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

pub fn from_twos_complement(bytes: &[u8]) -> Option<i128> {
    if bytes.len() > 16 {
        return None;
    }
    let fill = match bytes.first() {
        Some(b) if b & 0x80 != 0 => 0xff,
        _ => 0x00,
    };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Some(i128::from_be_bytes(buf))
}

pub fn date_to_days(text: &str) -> Option<i32> {
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    i32::try_from(date.signed_duration_since(epoch()).num_days()).ok()
}

pub fn days_to_date(days: i32) -> Option<String> {
    let date = epoch().checked_add_signed(TimeDelta::try_days(days.into())?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

pub fn time_to_ticks(text: &str, precision: TimePrecision) -> Option<i64> {
    let time = NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok()?;
    let per_second = per_second(precision);
    let sub = i64::from(time.nanosecond()) / (1_000_000_000 / per_second);
    Some(i64::from(time.num_seconds_from_midnight()) * per_second + sub)
}

pub fn ticks_to_time(ticks: i64, precision: TimePrecision) -> Option<String> {
    let per_second = per_second(precision);
    let secs = u32::try_from(ticks.div_euclid(per_second)).ok()?;
    let nanos = u32::try_from(ticks.rem_euclid(per_second) * (1_000_000_000 / per_second)).ok()?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)?;
    Some(match precision {
        TimePrecision::Millis => time.format("%H:%M:%S%.3f").to_string(),
        TimePrecision::Micros => time.format("%H:%M:%S%.6f").to_string(),
    })
}

pub fn timestamp_to_ticks(text: &str, precision: TimePrecision, local: bool) -> Option<i64> {
    let utc = if local {
        NaiveDateTime::parse_from_str(text, LOCAL_FORMAT).ok()?.and_utc()
    } else {
        DateTime::parse_from_rfc3339(text).ok()?.to_utc()
    };
    Some(match precision {
        TimePrecision::Millis => utc.timestamp_millis(),
        TimePrecision::Micros => utc.timestamp_micros(),
    })
}

pub fn ticks_to_timestamp(ticks: i64, precision: TimePrecision, local: bool) -> Option<String> {
    let (utc, seconds) = match precision {
        TimePrecision::Millis => (DateTime::from_timestamp_millis(ticks)?, SecondsFormat::Millis),
        TimePrecision::Micros => (DateTime::from_timestamp_micros(ticks)?, SecondsFormat::Micros),
    };
    if local {
        let fraction = match precision {
            TimePrecision::Millis => "%.3f",
            TimePrecision::Micros => "%.6f",
        };
        return Some(utc.naive_utc().format(&format!("%Y-%m-%dT%H:%M:%S{fraction}")).to_string());
    }
    Some(utc.to_rfc3339_opts(seconds, true))
}

pub fn decode_base64(text: &str) -> Option<Vec<u8>> {
    general_purpose::STANDARD.decode(text).ok()
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Canonical hyphenated form: 8-4-4-4-12 hex digits.
pub fn is_uuid(text: &str) -> bool {
    text.len() == 36
        && text.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}
