//! Owned snapshot of monitor state for rendering and export.

use serde::Serialize;

use vitalwatch_types::{AlertEvent, Subject, VitalsSnapshot};

use crate::connection::ConnectionState;

/// Events that were received but not applied, by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorCounters {
    /// Inbound events dispatched.
    pub events: u64,
    /// Vitals at or before the subject's newest observation.
    pub stale_vitals: u64,
    /// Vitals for a subject other than the selection.
    pub foreign_vitals: u64,
    /// Waveform samples that arrived with stale or foreign vitals.
    pub dropped_waveform: u64,
    /// Alerts whose id was already in the feed.
    pub duplicate_alerts: u64,
    /// Alerts pushed out by the retention limit.
    pub evicted_alerts: u64,
    /// Status events for a subject other than the selection.
    pub ignored_status: u64,
}

/// Everything a renderer needs, copied out under one lock.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorView {
    pub connection: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub selected: Option<Subject>,
    pub subjects: Vec<Subject>,
    /// Latest vitals for the selection; every reading unknown until data arrives.
    pub vitals: Option<VitalsSnapshot>,
    pub waveform: Vec<f64>,
    /// Newest first.
    pub alerts: Vec<AlertEvent>,
    pub unread_alerts: usize,
    pub tracking_requested: Option<String>,
    pub tracking_active: bool,
    pub counters: MonitorCounters,
}

impl MonitorView {
    /// One-line status suitable for a log line.
    pub fn summary(&self) -> String {
        let subject = self
            .selected
            .as_ref()
            .map(|s| format!("{} ({}, {})", s.display_name, s.id, s.status))
            .unwrap_or_else(|| "none".to_string());

        let mut line = format!(
            "[{}] subject: {} tracking: {}",
            self.connection.label(),
            subject,
            if self.tracking_active { "on" } else { "off" },
        );

        if let Some(vitals) = &self.vitals {
            line.push_str(&format!(
                " HR {} BP {} SpO2 {} RR {} T {}",
                vitals.heart_rate, vitals.blood_pressure, vitals.spo2,
                vitals.respiration_rate, vitals.temperature,
            ));
        }

        line.push_str(&format!(
            " alerts: {} ({} unread)",
            self.alerts.len(),
            self.unread_alerts
        ));
        if let Some(err) = &self.last_error {
            line.push_str(&format!(" last error: {err}"));
        }
        line
    }
}
