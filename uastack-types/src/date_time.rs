// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `DateTime`.

use std::{
    fmt,
    io::{Read, Write},
    ops::{Add, Sub},
    str::FromStr,
};

use chrono::{Duration, SecondsFormat, TimeZone, Utc};

use crate::encoding::{
    read_i64, write_i64, DecodingOptions, EncodingResult, SimpleBinaryDecodable,
    SimpleBinaryEncodable, UaNullable,
};

const TICKS_PER_SECOND: i64 = 10_000_000;

/// Minimum valid year for an OPC UA timestamp, i.e. the Windows epoch.
const MIN_YEAR: i32 = 1601;
/// Maximum valid year. Everything at or past this serializes as "end of time".
const MAX_YEAR: i32 = 9999;

/// A date/time value with 100 nanosecond resolution. On the wire this is the number of 100
/// nanosecond ticks since 1601-01-01 00:00:00 UTC. A tick count of 0 is the null date,
/// `i64::MAX` means "end of time".
#[derive(PartialEq, PartialOrd, Eq, Ord, Clone, Copy, Hash)]
pub struct DateTime {
    date_time: chrono::DateTime<Utc>,
}

impl UaNullable for DateTime {
    fn is_ua_null(&self) -> bool {
        self.is_null()
    }
}

impl SimpleBinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_i64(stream, self.checked_ticks())
    }
}

impl SimpleBinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let ticks = read_i64(stream)?;
        // The client offset compensates for clock skew between client and server, when the
        // client has been configured to ignore time skew.
        Ok(DateTime::from_ticks(ticks) + decoding_options.client_offset)
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.date_time)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            self.date_time.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::null()
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(date_time: chrono::DateTime<Utc>) -> Self {
        // Round to the nearest tick; anything smaller is lost on the wire anyway.
        let nanos = date_time.timestamp_subsec_nanos() % 100;
        DateTime {
            date_time: date_time - Duration::nanoseconds(nanos as i64),
        }
    }
}

impl From<DateTime> for chrono::DateTime<Utc> {
    fn from(value: DateTime) -> Self {
        value.date_time
    }
}

impl FromStr for DateTime {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        chrono::DateTime::parse_from_rfc3339(s)
            .map(|v| DateTime::from(v.with_timezone(&Utc)))
            .map_err(|_| ())
    }
}

impl Add<Duration> for DateTime {
    type Output = DateTime;

    fn add(self, other: Duration) -> DateTime {
        DateTime::from(self.date_time + other)
    }
}

impl Sub<DateTime> for DateTime {
    type Output = Duration;

    fn sub(self, other: DateTime) -> Duration {
        self.date_time - other.date_time
    }
}

impl Sub<Duration> for DateTime {
    type Output = DateTime;

    fn sub(self, other: Duration) -> DateTime {
        DateTime::from(self.date_time - other)
    }
}

impl DateTime {
    /// The current time in UTC.
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// The null date, midnight 1601-01-01. Serializes as a tick count of 0.
    pub fn null() -> DateTime {
        DateTime::epoch()
    }

    /// The start of the OPC UA time epoch.
    pub fn epoch() -> DateTime {
        DateTime::from(epoch_chrono())
    }

    /// The maximum representable date, "end of time".
    pub fn endtimes() -> DateTime {
        DateTime::from(endtimes_chrono())
    }

    /// Create a date time from the number of 100 nanosecond ticks since the 1601-01-01 epoch.
    /// Ticks out of the valid range clamp to the epoch / end of time.
    pub fn from_ticks(ticks: i64) -> DateTime {
        if ticks == i64::MAX {
            return Self::endtimes();
        }
        let secs = ticks / TICKS_PER_SECOND;
        let nanos = (ticks % TICKS_PER_SECOND) * 100;
        let date_time = epoch_chrono() + Duration::seconds(secs) + Duration::nanoseconds(nanos);
        if date_time.date_naive().year() > MAX_YEAR {
            Self::endtimes()
        } else if ticks < 0 {
            Self::epoch()
        } else {
            DateTime { date_time }
        }
    }

    /// Time in 100 nanosecond ticks since the 1601-01-01 epoch.
    pub fn ticks(&self) -> i64 {
        let duration = self.date_time - epoch_chrono();
        let secs = duration.num_seconds();
        // The total duration in nanoseconds overflows an i64 for dates this far from
        // the epoch, so the subsecond part is computed separately.
        let subsec = (duration - Duration::seconds(secs))
            .num_nanoseconds()
            .unwrap_or(0);
        secs * TICKS_PER_SECOND + subsec / 100
    }

    /// Ticks as they appear on the wire: values outside the valid range clamp to 0 or
    /// `i64::MAX` respectively.
    pub fn checked_ticks(&self) -> i64 {
        let nanos = self.ticks();
        if nanos < 0 {
            return 0;
        }
        if self.date_time.date_naive().year() >= MAX_YEAR {
            return i64::MAX;
        }
        nanos
    }

    /// Test if this is the null date.
    pub fn is_null(&self) -> bool {
        self.checked_ticks() == 0
    }

    /// The value as a chrono `DateTime<Utc>`.
    pub fn as_chrono(&self) -> chrono::DateTime<Utc> {
        self.date_time
    }
}

use chrono::Datelike;

fn epoch_chrono() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(MIN_YEAR, 1, 1, 0, 0, 0).unwrap()
}

fn endtimes_chrono() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(MAX_YEAR, 12, 31, 23, 59, 59).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_zero_ticks() {
        let dt = DateTime::null();
        assert!(dt.is_null());
        assert_eq!(dt.checked_ticks(), 0);
        assert_eq!(dt.encode_to_vec(), vec![0u8; 8]);
    }

    #[test]
    fn endtimes_is_infinity() {
        assert_eq!(DateTime::endtimes().checked_ticks(), i64::MAX);
        assert_eq!(DateTime::from_ticks(i64::MAX), DateTime::endtimes());
    }

    #[test]
    fn ticks_round_trip() {
        let now = DateTime::now();
        let again = DateTime::from_ticks(now.ticks());
        assert_eq!(now, again);
    }

    #[test]
    fn known_value() {
        // One second past the epoch.
        let dt = DateTime::from_ticks(TICKS_PER_SECOND);
        assert_eq!(dt.to_string(), "1601-01-01T00:00:01.000Z");
    }
}
