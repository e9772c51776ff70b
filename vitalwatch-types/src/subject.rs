//! Subjects - the people or entities being monitored.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Clinical status of a subject.
///
/// Only inbound status events change this after the roster is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SubjectStatus {
    #[default]
    Stable,
    /// Under closer observation. Older rosters call this "monitoring".
    #[cfg_attr(feature = "serde", serde(alias = "monitoring"))]
    Guarded,
    Critical,
}

impl SubjectStatus {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            SubjectStatus::Stable => "stable",
            SubjectStatus::Guarded => "guarded",
            SubjectStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SubjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(SubjectStatus::Stable),
            "guarded" | "monitoring" => Ok(SubjectStatus::Guarded),
            "critical" => Ok(SubjectStatus::Critical),
            other => Err(format!("unknown subject status: {other}")),
        }
    }
}

/// A monitored subject as listed by the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subject {
    /// Stable identifier used on the wire (e.g. "patient_001").
    pub id: String,

    #[cfg_attr(feature = "serde", serde(alias = "name"))]
    pub display_name: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub condition: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub status: SubjectStatus,

    /// Free-form descriptive fields (room, age, ...).
    ///
    /// On the wire these are the entry's other top-level fields. Scalars are
    /// kept as text; nested values other than a `metadata` object are
    /// skipped.
    #[cfg_attr(
        feature = "serde",
        serde(flatten, deserialize_with = "serde_impl::metadata")
    )]
    pub metadata: BTreeMap<String, String>,
}

impl Subject {
    /// Create a subject with no condition or metadata.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            condition: String::new(),
            status: SubjectStatus::default(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the condition.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Set the initial status.
    pub fn with_status(mut self, status: SubjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::collections::BTreeMap;

    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Text(String),
        Flag(bool),
        Integer(i64),
        Number(f64),
        Table(BTreeMap<String, Field>),
        Other(IgnoredAny),
    }

    impl Field {
        fn into_text(self) -> Option<String> {
            match self {
                Field::Text(s) => Some(s),
                Field::Flag(b) => Some(b.to_string()),
                Field::Integer(n) => Some(n.to_string()),
                Field::Number(n) => Some(n.to_string()),
                Field::Table(_) | Field::Other(_) => None,
            }
        }
    }

    pub fn metadata<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, String>, D::Error> {
        let fields = BTreeMap::<String, Field>::deserialize(deserializer)?;
        let mut metadata = BTreeMap::new();
        for (key, field) in fields {
            match field {
                Field::Table(nested) if key == "metadata" => {
                    metadata.extend(
                        nested
                            .into_iter()
                            .filter_map(|(k, v)| v.into_text().map(|v| (k, v))),
                    );
                }
                field => {
                    if let Some(text) = field.into_text() {
                        metadata.insert(key, text);
                    }
                }
            }
        }
        Ok(metadata)
    }
}
