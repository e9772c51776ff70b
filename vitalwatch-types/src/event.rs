//! Events exchanged with the monitoring service.
//!
//! These are the decoded forms; the envelope and line framing live with the
//! connection that carries them.

use crate::{AlertEvent, SubjectStatus, VitalsSnapshot};

/// One subject's vitals plus any waveform samples that arrived with them.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsFrame {
    pub vitals: VitalsSnapshot,
    /// Waveform samples (e.g. one ECG lead) in arrival order. May be empty.
    pub waveform: Vec<f64>,
}

impl VitalsFrame {
    pub fn new(vitals: VitalsSnapshot) -> Self {
        Self {
            vitals,
            waveform: Vec::new(),
        }
    }

    pub fn with_waveform(mut self, samples: impl IntoIterator<Item = f64>) -> Self {
        self.waveform = samples.into_iter().collect();
        self
    }

    /// The subject these vitals belong to.
    pub fn subject_id(&self) -> &str {
        &self.vitals.subject_id
    }
}

/// Server-reported tracking state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackingStatus {
    pub active: bool,

    /// Subject the status refers to. Older services omit it, in which case it
    /// refers to whatever the client has selected.
    #[cfg_attr(
        feature = "serde",
        serde(default, alias = "patient_id", skip_serializing_if = "Option::is_none")
    )]
    pub subject_id: Option<String>,

    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub message: Option<String>,
}

impl TrackingStatus {
    pub fn new(active: bool) -> Self {
        Self {
            active,
            subject_id: None,
            message: None,
        }
    }

    pub fn for_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }
}

/// An event received from the monitoring service.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Server acknowledged the connection.
    Connected { message: Option<String> },
    /// Vitals for one or more subjects.
    Vitals(Vec<VitalsFrame>),
    /// Tracking started or stopped.
    Status(TrackingStatus),
    /// A new alert.
    Alert(AlertEvent),
    /// A subject's clinical status changed.
    SubjectStatus {
        subject_id: String,
        status: SubjectStatus,
    },
    /// Server acknowledged a subject switch.
    SubjectSelected { subject_id: String },
}

impl InboundEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::Connected { .. } => "connected",
            InboundEvent::Vitals(_) => "live_vitals",
            InboundEvent::Status(_) => "monitoring_status",
            InboundEvent::Alert(_) => "alert",
            InboundEvent::SubjectStatus { .. } => "subject_status",
            InboundEvent::SubjectSelected { .. } => "subject_selected",
        }
    }
}

/// A command sent to the monitoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    StartTracking { subject_id: String },
    StopTracking,
    SelectSubject { subject_id: String },
}

impl OutboundCommand {
    /// The wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundCommand::StartTracking { .. } => "start_tracking",
            OutboundCommand::StopTracking => "stop_tracking",
            OutboundCommand::SelectSubject { .. } => "select_subject",
        }
    }

    /// The subject this command is bound to, if any.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            OutboundCommand::StartTracking { subject_id }
            | OutboundCommand::SelectSubject { subject_id } => Some(subject_id),
            OutboundCommand::StopTracking => None,
        }
    }
}
