//! Out-of-band alert events raised by the monitoring service.

use std::fmt;

use crate::Timestamp;

/// How urgently an alert needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "low"))]
    Info,
    Medium,
    High,
}

impl Severity {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Medium => "MED",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single alert.
///
/// `acknowledged` only ever moves from `false` to `true`, and only through a
/// local acknowledgment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertEvent {
    /// Unique alert id. Numeric ids on the wire are read as their decimal string.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "serde_impl::string_or_number"))]
    pub id: String,

    #[cfg_attr(feature = "serde", serde(alias = "patient_id"))]
    pub subject_id: String,

    /// Alert category (e.g. "heart_rate", "blood_pressure").
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub severity: Severity,

    #[cfg_attr(feature = "serde", serde(default))]
    pub message: String,

    #[cfg_attr(feature = "serde", serde(alias = "timestamp"))]
    pub raised_at: Timestamp,

    #[cfg_attr(feature = "serde", serde(default))]
    pub acknowledged: bool,
}

impl AlertEvent {
    /// Create an unacknowledged alert.
    pub fn new(
        id: impl Into<String>,
        subject_id: impl Into<String>,
        kind: impl Into<String>,
        severity: Severity,
        raised_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            subject_id: subject_id.into(),
            kind: kind.into(),
            severity,
            message: String::new(),
            raised_at,
            acknowledged: false,
        }
    }

    /// Set the human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => s,
            RawId::Signed(n) => n.to_string(),
            RawId::Unsigned(n) => n.to_string(),
        })
    }
}
