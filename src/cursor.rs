//! Pagination cursors
//!
//! A cursor is the timestamp of the last row a client has seen, truncated to
//! milliseconds, rendered as RFC 3339 and wrapped in standard base-64 so it can
//! travel in a query string. Clients treat it as an opaque blob and hand it
//! back unchanged to get the next page.
//!
//! Cursors are not signed. Decoded values are only good as a filter boundary
//! (`WHERE created_at < $1`), never as proof of anything.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, SecondsFormat, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

const NANOS_PER_MILLI: u32 = 1_000_000;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("cursor {value:?} is not a timestamp: {source}")]
    Format {
        value: String,
        source: chrono::ParseError,
    },
}

/// Encode a timestamp as an opaque cursor
///
/// Only years 0 through 9999 round-trip. RFC 3339 has no room for wider years,
/// so cursors for timestamps outside that range fail to decode.
pub fn encode_cursor<Tz: TimeZone>(t: &DateTime<Tz>) -> String {
    let text = truncate_to_millis(t).to_rfc3339_opts(SecondsFormat::Millis, true);
    STANDARD.encode(text)
}

/// Decode a cursor produced by [`encode_cursor`]
///
/// Any RFC 3339 timestamp is accepted, with or without a fractional part, so
/// cursors that carry fewer than three fraction digits still decode. Extra
/// precision is dropped.
pub fn decode_cursor(encoded: &str) -> Result<DateTime<FixedOffset>, CursorError> {
    let bytes = STANDARD.decode(encoded)?;
    let text = String::from_utf8_lossy(&bytes);

    match DateTime::parse_from_rfc3339(&text) {
        Ok(t) => Ok(truncate_to_millis(&t)),
        Err(source) => Err(CursorError::Format {
            value: text.into_owned(),
            source,
        }),
    }
}

fn truncate_to_millis<Tz: TimeZone>(t: &DateTime<Tz>) -> DateTime<FixedOffset> {
    let t = t.fixed_offset();
    let nanos = t.nanosecond();
    t.with_nanosecond(nanos - nanos % NANOS_PER_MILLI)
        .unwrap_or(t)
}

/// A decoded cursor
///
/// Displays and serializes as its encoded form, so it can sit directly in
/// request and response DTOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(DateTime<FixedOffset>);

impl Cursor {
    pub fn new<Tz: TimeZone>(t: &DateTime<Tz>) -> Self {
        Self(truncate_to_millis(t))
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.0
    }

    pub fn encode(&self) -> String {
        encode_cursor(&self.0)
    }

    pub fn decode(encoded: &str) -> Result<Self, CursorError> {
        decode_cursor(encoded).map(Self)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Cursor {
    fn from(t: DateTime<Tz>) -> Self {
        Self::new(&t)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::decode(&encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_round_trip_keeps_millis() {
        let t = ts("2023-05-01T10:00:00.123Z");
        let encoded = encode_cursor(&t);

        assert_eq!(encoded, STANDARD.encode("2023-05-01T10:00:00.123Z"));
        assert_eq!(decode_cursor(&encoded).unwrap(), t);
        assert_eq!(
            decode_cursor(&encoded).unwrap().to_rfc3339_opts(SecondsFormat::Millis, true),
            "2023-05-01T10:00:00.123Z"
        );
    }

    #[test]
    fn test_round_trip_truncates_sub_millis() {
        let t = ts("2024-02-29T23:59:59.987654321+05:30");
        let decoded = decode_cursor(&encode_cursor(&t)).unwrap();

        assert_eq!(decoded, ts("2024-02-29T23:59:59.987+05:30"));
        assert_eq!(decoded.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
    }

    #[test]
    fn test_round_trip_across_offsets() {
        let naive = NaiveDate::from_ymd_opt(2021, 12, 31)
            .unwrap()
            .and_hms_nano_opt(18, 30, 15, 450_999_999)
            .unwrap();

        for secs in [0, 3600, -7 * 3600, 9 * 3600 + 45 * 60, -(3 * 3600 + 30 * 60)] {
            let offset = FixedOffset::east_opt(secs).unwrap();
            let t = offset.from_local_datetime(&naive).unwrap();
            let decoded = decode_cursor(&encode_cursor(&t)).unwrap();

            assert_eq!(decoded.offset(), t.offset());
            assert_eq!(decoded.naive_local(), naive.with_nanosecond(450_000_000).unwrap());
        }
    }

    #[test]
    fn test_utc_input_uses_zulu_suffix() {
        let t = Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap();
        let text = String::from_utf8(STANDARD.decode(encode_cursor(&t)).unwrap()).unwrap();

        assert_eq!(text, "2023-05-01T10:00:00.000Z");
    }

    #[test]
    fn test_numeric_offset_is_kept() {
        let t = ts("2023-05-01T10:00:00.5-04:00");
        let text = String::from_utf8(STANDARD.decode(encode_cursor(&t)).unwrap()).unwrap();

        assert_eq!(text, "2023-05-01T10:00:00.500-04:00");
    }

    #[test]
    fn test_decode_accepts_short_fractions() {
        let short = STANDARD.encode("2023-05-01T10:00:00.12Z");
        let none = STANDARD.encode("2023-05-01T10:00:00Z");

        assert_eq!(decode_cursor(&short).unwrap(), ts("2023-05-01T10:00:00.120Z"));
        assert_eq!(decode_cursor(&none).unwrap(), ts("2023-05-01T10:00:00Z"));
    }

    #[test]
    fn test_invalid_base64_is_decode_error() {
        let err = decode_cursor("not base64!!").unwrap_err();
        assert!(matches!(err, CursorError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_non_timestamp_is_format_error() {
        let err = decode_cursor(&STANDARD.encode("hello world")).unwrap_err();
        match err {
            CursorError::Format { value, .. } => assert_eq!(value, "hello world"),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_timestamp_is_format_error() {
        let err = decode_cursor(&STANDARD.encode("2023-05-01T10:00")).unwrap_err();
        assert!(matches!(err, CursorError::Format { .. }));
    }

    #[test]
    fn test_years_beyond_four_digits_do_not_round_trip() {
        let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(-1, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();

        assert!(matches!(decode_cursor(&encode_cursor(&far)), Err(CursorError::Format { .. })));
        assert!(matches!(decode_cursor(&encode_cursor(&before)), Err(CursorError::Format { .. })));
        assert_eq!(decode_cursor(&encode_cursor(&last)).unwrap(), last);
    }

    #[test]
    fn test_cursor_display_and_parse() {
        let cursor = Cursor::new(&ts("2023-05-01T10:00:00.123456Z"));
        let parsed: Cursor = cursor.to_string().parse().unwrap();

        assert_eq!(parsed, cursor);
        assert_eq!(parsed.timestamp(), ts("2023-05-01T10:00:00.123Z"));
    }

    #[test]
    fn test_cursor_serde_as_string() {
        let cursor = Cursor::from(ts("2023-05-01T10:00:00.123Z"));
        let json = serde_json::to_string(&cursor).unwrap();

        assert_eq!(json, format!("\"{}\"", STANDARD.encode("2023-05-01T10:00:00.123Z")));
        assert_eq!(serde_json::from_str::<Cursor>(&json).unwrap(), cursor);
        assert!(serde_json::from_str::<Cursor>("\"not base64!!\"").is_err());
    }

    #[test]
    fn test_cursors_order_by_instant() {
        let earlier = Cursor::new(&ts("2023-05-01T10:00:00.001Z"));
        let later = Cursor::new(&ts("2023-05-01T10:00:00.002Z"));
        assert!(earlier < later);
    }
}
