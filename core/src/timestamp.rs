//! Time values stored as floating-point seconds.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// A UTC instant stored as seconds since the Unix epoch.
///
/// Serializes as an `f64`, so record fields of this type map to `REAL`
/// columns. Sub-second precision is kept to the resolution of the float.
///
/// # Examples
///
/// ```
/// use rowmap_core::Timestamp;
///
/// let ts = Timestamp::from_seconds(1_700_000_000.5).unwrap();
/// assert_eq!(ts.seconds(), 1_700_000_000.5);
/// assert_eq!(ts.as_datetime().timestamp(), 1_700_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Converts float seconds since the Unix epoch.
    ///
    /// Returns `None` for non-finite or out-of-range values.
    pub fn from_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
            return None;
        }
        let mut secs = whole as i64;
        let mut nanos = ((seconds - whole) * 1e9).round() as u32;
        if nanos >= 1_000_000_000 {
            secs = secs.checked_add(1)?;
            nanos -= 1_000_000_000;
        }
        DateTime::from_timestamp(secs, nanos).map(Self)
    }

    /// Seconds since the Unix epoch.
    pub fn seconds(&self) -> f64 {
        self.0.timestamp() as f64 + f64::from(self.0.timestamp_subsec_nanos()) / 1e9
    }

    /// The wrapped `chrono` value.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.seconds())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Self::from_seconds(seconds)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {seconds}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_and_fractional_seconds() {
        let ts = Timestamp::from_seconds(3600.0).unwrap();
        assert_eq!(ts.seconds(), 3600.0);
        assert_eq!(ts.as_datetime().timestamp_subsec_nanos(), 0);

        let ts = Timestamp::from_seconds(-1.25).unwrap();
        assert_eq!(ts.as_datetime().timestamp(), -2);
        assert_eq!(ts.as_datetime().timestamp_subsec_nanos(), 750_000_000);
        assert_eq!(ts.seconds(), -1.25);
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(Timestamp::from_seconds(f64::NAN).is_none());
        assert!(Timestamp::from_seconds(f64::INFINITY).is_none());
        assert!(Timestamp::from_seconds(1e300).is_none());
    }

    #[test]
    fn test_serde_as_float() {
        let ts = Timestamp::from_seconds(10.5).unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "10.5");
        let back: Timestamp = serde_json::from_str("10.5").unwrap();
        assert_eq!(back, ts);
        assert!(serde_json::from_str::<Timestamp>("1e300").is_err());
    }
}
