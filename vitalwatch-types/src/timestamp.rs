//! Timestamp representation for observations and alerts.
//!
//! Unix milliseconds are the canonical unit so that ordering checks are a
//! plain integer comparison. The serde form accepts what monitoring services
//! actually emit: RFC 3339 strings, naive ISO-8601 strings (read as UTC), or
//! integer milliseconds.

use core::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// A point in time, in milliseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Create from Unix milliseconds.
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Get the value in Unix milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Convert to a chrono `DateTime<Utc>`.
    ///
    /// Returns `None` if the value is outside chrono's representable range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }

    /// Parse an RFC 3339 or naive ISO-8601 string.
    ///
    /// Naive strings carry no offset and are interpreted as UTC.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self(dt.timestamp_millis()));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| Self(naive.and_utc().timestamp_millis()))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use core::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Timestamp;

    impl Serialize for Timestamp {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = Timestamp;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an ISO-8601 timestamp string or Unix milliseconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
            Timestamp::parse(v).ok_or_else(|| E::custom(format!("invalid timestamp: {v}")))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
            Ok(Timestamp(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
            i64::try_from(v)
                .map(Timestamp)
                .map_err(|_| E::custom("timestamp out of range"))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Timestamp, E> {
            Ok(Timestamp(v as i64))
        }
    }

    impl<'de> Deserialize<'de> for Timestamp {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(TimestampVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        let ts = Timestamp::parse("2024-01-01T00:00:01Z").unwrap();
        assert_eq!(ts.as_millis(), 1_704_067_201_000);
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let naive = Timestamp::parse("2024-01-01T00:00:01.500").unwrap();
        let zoned = Timestamp::parse("2024-01-01T00:00:01.500+00:00").unwrap();
        assert_eq!(naive, zoned);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_ordering() {
        assert!(Timestamp::from_millis(10) < Timestamp::from_millis(11));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Timestamp::from_millis(1_704_067_201_000).to_string(),
            "2024-01-01T00:00:01.000Z"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_forms() {
        let from_str: Timestamp = serde_json::from_str("\"2024-01-01T00:00:01Z\"").unwrap();
        let from_int: Timestamp = serde_json::from_str("1704067201000").unwrap();
        assert_eq!(from_str, from_int);
        assert!(serde_json::from_str::<Timestamp>("\"not a time\"").is_err());
    }
}
