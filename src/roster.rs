//! Roster and alert backlog sources.
//!
//! The monitoring service also exposes its roster and recent alerts outside
//! the stream. A [`RosterSource`] supplies both so the monitor can populate
//! the registry before any live data arrives.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use vitalwatch_types::{AlertEvent, Subject};

use crate::error::{MonitorError, Result};

/// Trait for loading the subject roster and alert backlog.
///
/// # Example
///
/// ```
/// use vitalwatch::roster::{RosterSource, StaticRoster};
/// use vitalwatch_types::Subject;
///
/// # tokio_test::block_on(async {
/// let roster = StaticRoster::new(vec![Subject::new("s1", "John Doe")]);
/// assert_eq!(roster.subjects().await.unwrap().len(), 1);
/// assert!(roster.alert_backlog().await.unwrap().is_empty());
/// # });
/// ```
#[async_trait]
pub trait RosterSource: Send + Sync + Debug {
    /// The full list of subjects.
    async fn subjects(&self) -> Result<Vec<Subject>>;

    /// Alerts raised before this client connected.
    async fn alert_backlog(&self) -> Result<Vec<AlertEvent>>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}

/// In-memory roster.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    subjects: Vec<Subject>,
    alerts: Vec<AlertEvent>,
}

impl StaticRoster {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self {
            subjects,
            alerts: Vec::new(),
        }
    }

    pub fn with_alerts(mut self, alerts: Vec<AlertEvent>) -> Self {
        self.alerts = alerts;
        self
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn subjects(&self) -> Result<Vec<Subject>> {
        Ok(self.subjects.clone())
    }

    async fn alert_backlog(&self) -> Result<Vec<AlertEvent>> {
        Ok(self.alerts.clone())
    }

    fn description(&self) -> &str {
        "static"
    }
}

/// Roster file contents: either an object with both lists or a bare
/// subject array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RosterFile {
    Document {
        #[serde(alias = "patients")]
        subjects: Vec<Subject>,
        #[serde(default)]
        alerts: Vec<AlertEvent>,
    },
    Subjects(Vec<Subject>),
}

/// A roster read from JSON files.
///
/// The roster file holds `{"subjects": [...], "alerts": [...]}` or a bare
/// subject array. An optional separate file holds an alert array; when set
/// it takes the place of any alerts in the roster file.
#[derive(Debug)]
pub struct FileRoster {
    path: PathBuf,
    alerts_path: Option<PathBuf>,
    description: String,
}

impl FileRoster {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            alerts_path: None,
            description,
        }
    }

    /// Read the alert backlog from a separate file.
    pub fn with_alerts<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.alerts_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Returns the roster path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MonitorError::Roster(format!("read error: {}: {}", path.display(), e)))
    }

    async fn load(&self) -> Result<RosterFile> {
        let content = Self::read(&self.path).await?;
        serde_json::from_str(&content).map_err(|e| {
            MonitorError::Roster(format!("parse error: {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl RosterSource for FileRoster {
    async fn subjects(&self) -> Result<Vec<Subject>> {
        let subjects = match self.load().await? {
            RosterFile::Document { subjects, .. } => subjects,
            RosterFile::Subjects(subjects) => subjects,
        };
        debug!(path = %self.path.display(), count = subjects.len(), "read roster");
        Ok(subjects)
    }

    async fn alert_backlog(&self) -> Result<Vec<AlertEvent>> {
        if let Some(path) = &self.alerts_path {
            let content = Self::read(path).await?;
            return serde_json::from_str(&content).map_err(|e| {
                MonitorError::Roster(format!("parse error: {}: {}", path.display(), e))
            });
        }
        match self.load().await? {
            RosterFile::Document { alerts, .. } => Ok(alerts),
            RosterFile::Subjects(_) => Ok(Vec::new()),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vitalwatch_types::{Severity, SubjectStatus};

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_file_roster_document() {
        let file = write(
            r#"{
                "patients": [
                    {"id": "patient_001", "name": "John Doe", "age": 58, "room": "ICU-101",
                     "condition": "Hypertension", "status": "critical", "connected": true},
                    {"id": "patient_003", "name": "Robert Johnson", "status": "monitoring"}
                ],
                "alerts": [
                    {"id": 1, "patient_id": "patient_001", "type": "heart_rate",
                     "message": "Heart rate above threshold: 118 bpm", "severity": "high",
                     "timestamp": "2024-01-15T10:30:00", "acknowledged": false}
                ]
            }"#,
        );
        let roster = FileRoster::new(file.path());

        let subjects = roster.subjects().await.unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].display_name, "John Doe");
        assert_eq!(subjects[0].status, SubjectStatus::Critical);
        assert_eq!(subjects[0].metadata["room"], "ICU-101");
        assert_eq!(subjects[0].metadata["age"], "58");
        assert_eq!(subjects[0].metadata["connected"], "true");
        assert!(subjects[1].metadata.is_empty());
        assert_eq!(subjects[1].status, SubjectStatus::Guarded);

        let alerts = roster.alert_backlog().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "1");
        assert_eq!(alerts[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_file_roster_bare_array() {
        let file = write(r#"[{"id": "s1", "name": "John Doe"}]"#);
        let roster = FileRoster::new(file.path());

        assert_eq!(roster.subjects().await.unwrap().len(), 1);
        assert!(roster.alert_backlog().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_roster_separate_alerts() {
        let roster_file = write(r#"[{"id": "s1", "name": "John Doe"}]"#);
        let alerts_file = write(
            r#"[{"id": 2, "patient_id": "s1", "type": "blood_pressure",
                 "severity": "medium", "timestamp": "2024-01-15T10:30:00",
                 "acknowledged": true}]"#,
        );
        let roster = FileRoster::new(roster_file.path()).with_alerts(alerts_file.path());

        let alerts = roster.alert_backlog().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].acknowledged);
    }

    #[tokio::test]
    async fn test_file_roster_errors() {
        let roster = FileRoster::new("/nonexistent/roster.json");
        let err = roster.subjects().await.unwrap_err();
        assert!(matches!(err, MonitorError::Roster(msg) if msg.starts_with("read error")));

        let file = write("not json");
        let roster = FileRoster::new(file.path());
        let err = roster.subjects().await.unwrap_err();
        assert!(matches!(err, MonitorError::Roster(msg) if msg.starts_with("parse error")));
    }

    #[tokio::test]
    async fn test_static_roster() {
        let roster = StaticRoster::new(vec![Subject::new("s1", "John Doe")]).with_alerts(vec![
            AlertEvent::new(
                "a1",
                "s1",
                "spo2",
                Severity::Medium,
                vitalwatch_types::Timestamp::from_millis(0),
            ),
        ]);
        assert_eq!(roster.subjects().await.unwrap()[0].id, "s1");
        assert_eq!(roster.alert_backlog().await.unwrap().len(), 1);
        assert_eq!(roster.description(), "static");
    }
}
