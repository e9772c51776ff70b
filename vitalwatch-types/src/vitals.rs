//! Scalar vital signs and the tri-state `Reading` wrapper.

use std::fmt;
use std::str::FromStr;

use crate::Timestamp;

/// A single vital-sign field as reported by the monitoring service.
///
/// `Absent` and `Placeholder` are deliberately distinct: a field the sender
/// left out means "unknown", while a field that is present but carries a
/// placeholder (`null`, `"--"`) means "no new value" and must never replace a
/// known value when snapshots are merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    /// The field was not present.
    Absent,
    /// The field was present but carried no usable value.
    Placeholder,
    /// A measured value.
    Value(T),
}

impl<T> Reading<T> {
    /// Returns the measured value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Value(v) => Some(v),
            _ => None,
        }
    }

    /// True if this reading carries a measured value.
    pub fn is_known(&self) -> bool {
        matches!(self, Reading::Value(_))
    }

    /// True if the field was absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Reading::Absent)
    }

    /// Combine an incoming reading with the previously stored one.
    ///
    /// A value always wins and an absent field resets to unknown. A
    /// placeholder keeps whatever was known before.
    pub fn merge(self, previous: Reading<T>) -> Reading<T> {
        match self {
            Reading::Placeholder if previous.is_known() => previous,
            other => other,
        }
    }
}

impl<T> Default for Reading<T> {
    fn default() -> Self {
        Reading::Absent
    }
}

/// Unknown readings render as `--`.
impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => v.fmt(f),
            _ => f.write_str("--"),
        }
    }
}

impl<T> From<T> for Reading<T> {
    fn from(value: T) -> Self {
        Reading::Value(value)
    }
}

/// Arterial blood pressure in mmHg.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BloodPressure {
    pub systolic: f64,
    pub diastolic: f64,
}

impl BloodPressure {
    pub const fn new(systolic: f64, diastolic: f64) -> Self {
        Self {
            systolic,
            diastolic,
        }
    }
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.systolic, self.diastolic)
    }
}

impl FromStr for BloodPressure {
    type Err = String;

    /// Parse the `"120/80"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sys, dia) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid blood pressure: {s}"))?;
        let systolic = sys
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid systolic value {sys:?}: {e}"))?;
        let diastolic = dia
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid diastolic value {dia:?}: {e}"))?;
        Ok(Self::new(systolic, diastolic))
    }
}

/// The latest known set of scalar vitals for one subject.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VitalsSnapshot {
    #[cfg_attr(feature = "serde", serde(default, alias = "patient_id"))]
    pub subject_id: String,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Reading::is_absent")
    )]
    pub heart_rate: Reading<f64>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Reading::is_absent")
    )]
    pub blood_pressure: Reading<BloodPressure>,

    #[cfg_attr(
        feature = "serde",
        serde(default, alias = "oxygen_saturation", skip_serializing_if = "Reading::is_absent")
    )]
    pub spo2: Reading<f64>,

    #[cfg_attr(
        feature = "serde",
        serde(default, alias = "respiratory_rate", skip_serializing_if = "Reading::is_absent")
    )]
    pub respiration_rate: Reading<f64>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Reading::is_absent")
    )]
    pub temperature: Reading<f64>,

    #[cfg_attr(feature = "serde", serde(alias = "timestamp"))]
    pub observed_at: Timestamp,
}

impl VitalsSnapshot {
    /// A snapshot with every field unknown.
    pub fn unknown(subject_id: impl Into<String>, observed_at: Timestamp) -> Self {
        Self {
            subject_id: subject_id.into(),
            heart_rate: Reading::Absent,
            blood_pressure: Reading::Absent,
            spo2: Reading::Absent,
            respiration_rate: Reading::Absent,
            temperature: Reading::Absent,
            observed_at,
        }
    }

    /// Fold this (newer) snapshot over the previously stored one.
    ///
    /// See [`Reading::merge`] for per-field rules. The subject and timestamp
    /// always come from `self`.
    pub fn merged_over(self, previous: &VitalsSnapshot) -> VitalsSnapshot {
        VitalsSnapshot {
            subject_id: self.subject_id,
            heart_rate: self.heart_rate.merge(previous.heart_rate),
            blood_pressure: self.blood_pressure.merge(previous.blood_pressure),
            spo2: self.spo2.merge(previous.spo2),
            respiration_rate: self.respiration_rate.merge(previous.respiration_rate),
            temperature: self.temperature.merge(previous.temperature),
            observed_at: self.observed_at,
        }
    }

    pub fn with_heart_rate(mut self, bpm: f64) -> Self {
        self.heart_rate = Reading::Value(bpm);
        self
    }

    pub fn with_blood_pressure(mut self, systolic: f64, diastolic: f64) -> Self {
        self.blood_pressure = Reading::Value(BloodPressure::new(systolic, diastolic));
        self
    }

    pub fn with_spo2(mut self, percent: f64) -> Self {
        self.spo2 = Reading::Value(percent);
        self
    }

    pub fn with_respiration_rate(mut self, per_minute: f64) -> Self {
        self.respiration_rate = Reading::Value(per_minute);
        self
    }

    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature = Reading::Value(celsius);
        self
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{BloodPressure, Reading};

    impl<T: Serialize> Serialize for Reading<T> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Reading::Value(v) => serializer.serialize_some(v),
                Reading::Absent | Reading::Placeholder => serializer.serialize_none(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawReading<T> {
        Value(T),
        Unusable(IgnoredAny),
    }

    impl<'de, T: Deserialize<'de>> Deserialize<'de> for Reading<T> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            Ok(match Option::<RawReading<T>>::deserialize(deserializer)? {
                Some(RawReading::Value(v)) => Reading::Value(v),
                Some(RawReading::Unusable(_)) | None => Reading::Placeholder,
            })
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPressure {
        Text(String),
        Parts { systolic: f64, diastolic: f64 },
    }

    impl<'de> Deserialize<'de> for BloodPressure {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            match RawPressure::deserialize(deserializer)? {
                RawPressure::Text(s) => s.parse().map_err(serde::de::Error::custom),
                RawPressure::Parts {
                    systolic,
                    diastolic,
                } => Ok(BloodPressure::new(systolic, diastolic)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_display() {
        assert_eq!(Reading::Value(72.5).to_string(), "72.5");
        assert_eq!(Reading::<f64>::Placeholder.to_string(), "--");
        assert_eq!(Reading::Value(BloodPressure::new(120.0, 80.0)).to_string(), "120/80");
    }

    #[test]
    fn test_merge_value_wins() {
        assert_eq!(Reading::Value(80.0).merge(Reading::Value(70.0)), Reading::Value(80.0));
    }

    #[test]
    fn test_merge_placeholder_keeps_known() {
        assert_eq!(Reading::Placeholder.merge(Reading::Value(70.0)), Reading::Value(70.0));
        assert_eq!(
            Reading::<f64>::Placeholder.merge(Reading::Absent),
            Reading::Placeholder
        );
    }

    #[test]
    fn test_merge_absent_resets() {
        assert_eq!(Reading::Absent.merge(Reading::Value(70.0)), Reading::Absent);
    }

    #[test]
    fn test_blood_pressure_from_str() {
        assert_eq!("120/80".parse::<BloodPressure>(), Ok(BloodPressure::new(120.0, 80.0)));
        assert!("120".parse::<BloodPressure>().is_err());
        assert!("--/80".parse::<BloodPressure>().is_err());
    }

    #[test]
    fn test_snapshot_merged_over() {
        let previous = VitalsSnapshot::unknown("s1", Timestamp::from_millis(1))
            .with_heart_rate(72.0)
            .with_spo2(98.0)
            .with_temperature(36.9);

        let mut incoming = VitalsSnapshot::unknown("s1", Timestamp::from_millis(2)).with_spo2(97.0);
        incoming.heart_rate = Reading::Placeholder;

        let merged = incoming.merged_over(&previous);
        assert_eq!(merged.heart_rate, Reading::Value(72.0));
        assert_eq!(merged.spo2, Reading::Value(97.0));
        assert_eq!(merged.temperature, Reading::Absent);
        assert_eq!(merged.observed_at, Timestamp::from_millis(2));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_service_frame() {
        let json = r#"{
            "timestamp": "2024-05-01T10:00:00.250",
            "heart_rate": 88,
            "blood_pressure": "128/84",
            "oxygen_saturation": null,
            "respiratory_rate": "--"
        }"#;
        let snapshot: VitalsSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.heart_rate, Reading::Value(88.0));
        assert_eq!(snapshot.blood_pressure, Reading::Value(BloodPressure::new(128.0, 84.0)));
        assert_eq!(snapshot.spo2, Reading::Placeholder);
        assert_eq!(snapshot.respiration_rate, Reading::Placeholder);
        assert_eq!(snapshot.temperature, Reading::Absent);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_unusable_values_are_placeholders() {
        let json = r#"{"observed_at": 1, "heart_rate": "n/a", "blood_pressure": "--", "spo2": false}"#;
        let snapshot: VitalsSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.heart_rate, Reading::Placeholder);
        assert_eq!(snapshot.blood_pressure, Reading::Placeholder);
        assert_eq!(snapshot.spo2, Reading::Placeholder);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_structured_pressure() {
        let json = r#"{"observed_at": 5, "blood_pressure": {"systolic": 118, "diastolic": 76}}"#;
        let snapshot: VitalsSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.blood_pressure, Reading::Value(BloodPressure::new(118.0, 76.0)));
    }
}
