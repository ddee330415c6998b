//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp type with seconds precision.
//!
//! ## Invariant
//!
//! The stack records provenance facts attested by two ledgers with
//! independent clocks. Every off-chain timestamp is therefore normalized to
//! UTC with a `Z` suffix at construction; local timezone offsets are
//! rejected rather than silently converted. External telemetry, which
//! arrives with arbitrary offsets, goes through [`Timestamp::parse_lenient`]
//! and is converted on ingest.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Seconds in a day, used for age computations in time-window rules.
const SECS_PER_DAY: f64 = 86_400.0;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time, truncated.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`] — from an ISO8601 string, rejecting non-UTC offsets.
/// - [`Timestamp::parse_lenient()`] — from an ISO8601 string with any offset,
///   converting to UTC (telemetry ingest only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 / ISO8601 string.
    ///
    /// **Rejects non-UTC inputs.** Only timestamps with the `Z` suffix are
    /// accepted — even `+00:00`, which is semantically equivalent, is
    /// rejected so that stored representations stay deterministic.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the string is not valid RFC 3339 or
    /// uses a non-Z timezone offset.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }

        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            CoreError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;

        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Parse a timestamp from an RFC 3339 string, accepting any timezone
    /// offset and converting to UTC.
    ///
    /// Lenient parser for ingesting external data (telemetry events). The
    /// result is always UTC with seconds precision, matching the strict
    /// invariant. Prefer [`Timestamp::parse()`] everywhere else.
    pub fn parse_lenient(s: &str) -> Result<Self, CoreError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            CoreError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    pub fn from_epoch_secs(secs: i64) -> Result<Self, CoreError> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| CoreError::Validation(format!("invalid Unix timestamp: {secs}")))?;
        Ok(Self(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Fractional days elapsed from `earlier` to `self`.
    ///
    /// Negative when `earlier` is in the future. Used by time-window
    /// verification rules, which compare an attribute's age in days.
    pub fn days_since(&self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0).num_seconds() as f64 / SECS_PER_DAY
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_no_subseconds() {
        let ts = Timestamp::now();
        assert_eq!(ts.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 10, 8, 30, 45).unwrap();
        let dt_with_nanos = dt.with_nanosecond(987_654_321).unwrap();
        let ts = Timestamp::from_utc(dt_with_nanos);
        assert_eq!(ts.as_datetime().nanosecond(), 0);
        assert_eq!(ts.to_iso8601(), "2026-03-10T08:30:45Z");
    }

    #[test]
    fn test_parse_z_suffix_accepted() {
        let ts = Timestamp::parse("2026-03-10T08:00:00Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-03-10T08:00:00Z");
    }

    #[test]
    fn test_parse_plus_zero_rejected() {
        assert!(Timestamp::parse("2026-03-10T08:00:00+00:00").is_err());
    }

    #[test]
    fn test_parse_offset_rejected() {
        assert!(Timestamp::parse("2026-03-10T13:00:00+05:00").is_err());
        assert!(Timestamp::parse("2026-03-10T03:00:00-04:00").is_err());
    }

    #[test]
    fn test_parse_subseconds_truncated() {
        let ts = Timestamp::parse("2026-03-10T08:00:00.123456Z").unwrap();
        assert_eq!(ts.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(Timestamp::parse("not-a-date").is_err());
        assert!(Timestamp::parse("2026-03-10").is_err());
        assert!(Timestamp::parse("").is_err());
    }

    #[test]
    fn test_parse_lenient_converts_offset() {
        let ts = Timestamp::parse_lenient("2026-03-10T13:00:00+05:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-03-10T08:00:00Z");
    }

    #[test]
    fn test_epoch_roundtrip() {
        let ts = Timestamp::parse("2026-03-10T08:00:00Z").unwrap();
        let ts2 = Timestamp::from_epoch_secs(ts.epoch_secs()).unwrap();
        assert_eq!(ts, ts2);
    }

    #[test]
    fn test_days_since_whole_days() {
        let earlier = Timestamp::parse("2026-03-01T00:00:00Z").unwrap();
        let later = Timestamp::parse("2026-03-11T00:00:00Z").unwrap();
        assert!((later.days_since(earlier) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_days_since_fractional() {
        let earlier = Timestamp::parse("2026-03-01T00:00:00Z").unwrap();
        let later = Timestamp::parse("2026-03-01T12:00:00Z").unwrap();
        assert!((later.days_since(earlier) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_days_since_negative_for_future() {
        let earlier = Timestamp::parse("2026-03-01T00:00:00Z").unwrap();
        let later = Timestamp::parse("2026-03-02T00:00:00Z").unwrap();
        assert!(earlier.days_since(later) < 0.0);
    }

    #[test]
    fn test_ordering() {
        let earlier = Timestamp::parse("2026-03-10T08:00:00Z").unwrap();
        let later = Timestamp::parse("2026-03-10T08:00:01Z").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn test_serde_roundtrip() {
        let ts = Timestamp::parse("2026-03-10T08:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_iso8601_render_reparses(secs in 0i64..=4_102_444_800i64) {
                let ts = Timestamp::from_epoch_secs(secs).unwrap();
                let reparsed = Timestamp::parse(&ts.to_iso8601()).unwrap();
                prop_assert_eq!(ts, reparsed);
            }

            #[test]
            fn prop_days_since_antisymmetric(
                a in 0i64..=4_102_444_800i64,
                b in 0i64..=4_102_444_800i64,
            ) {
                let ta = Timestamp::from_epoch_secs(a).unwrap();
                let tb = Timestamp::from_epoch_secs(b).unwrap();
                prop_assert!((ta.days_since(tb) + tb.days_since(ta)).abs() < 1e-9);
            }
        }
    }
}
