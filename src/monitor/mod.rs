//! The telemetry monitor: four stores, one tracking controller, one lock.
//!
//! ## Submodules
//!
//! - [`registry`]: roster and current selection ([`SubjectRegistry`])
//! - [`waveform`]: fixed-capacity waveform FIFO ([`WaveformBuffer`])
//! - [`vitals`]: latest vitals per subject with a monotonic-time guard ([`VitalsStore`])
//! - [`alerts`]: deduplicated alert feed, newest first ([`AlertFeed`])
//! - [`tracking`]: start/stop intent vs. server status ([`TrackingController`])
//!
//! ## Data Flow
//!
//! ```text
//! EventStream ──▶ Monitor::run() ──▶ Monitor::apply(event)
//!                                          │  (single mutex)
//!        select / start / stop / ack ──────┤
//!                                          ├──▶ SubjectRegistry
//!                                          ├──▶ TrackingController
//!                                          ├──▶ VitalsStore + WaveformBuffer
//!                                          └──▶ AlertFeed
//!                                                   │
//!                              Monitor::view() ◀────┘  (owned, read-only copy)
//! ```
//!
//! Every mutation, whether from the network or from the operator, takes the
//! same lock, so all stores observe events in one order.

pub mod alerts;
pub mod registry;
pub mod tracking;
pub mod vitals;
pub mod waveform;
mod view;

pub use alerts::AlertFeed;
pub use registry::{Selection, SubjectRegistry};
pub use tracking::{StatusOutcome, TrackingController};
pub use view::{MonitorCounters, MonitorView};
pub use vitals::{VitalsStore, VitalsUpdate};
pub use waveform::WaveformBuffer;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use vitalwatch_types::{
    AlertEvent, InboundEvent, OutboundCommand, Subject, TrackingStatus, VitalsFrame,
};

use crate::connection::{CommandSink, ConnectionState, EventStream};
use crate::error::{MonitorError, Result};
use crate::roster::RosterSource;

/// Store sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    pub waveform_capacity: usize,
    pub alert_retention: usize,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            waveform_capacity: waveform::DEFAULT_CAPACITY,
            alert_retention: alerts::DEFAULT_RETENTION,
        }
    }
}

#[derive(Debug)]
struct MonitorState {
    registry: SubjectRegistry,
    tracking: TrackingController,
    vitals: VitalsStore,
    waveform: WaveformBuffer,
    alerts: AlertFeed,
    counters: MonitorCounters,
}

impl MonitorState {
    /// Bind the data stores to the current selection after it changed.
    fn on_selection_changed(&mut self) {
        let selected = self.registry.selected_id().map(str::to_string);
        self.waveform.rebind(selected.as_deref());
        if let Some(id) = selected.as_deref() {
            self.vitals.clear(id);
        }
        self.tracking.selection_changed();
    }

    fn apply_vitals(&mut self, frames: Vec<VitalsFrame>) {
        for VitalsFrame { vitals, waveform } in frames {
            let subject_id = vitals.subject_id.clone();
            match self.vitals.update(self.registry.selected_id(), vitals) {
                VitalsUpdate::Applied => {
                    if !waveform.is_empty() && !self.waveform.append(&subject_id, &waveform) {
                        self.counters.dropped_waveform += waveform.len() as u64;
                    }
                }
                VitalsUpdate::Stale => {
                    debug!(subject = %subject_id, "dropping stale vitals");
                    self.counters.stale_vitals += 1;
                    self.counters.dropped_waveform += waveform.len() as u64;
                }
                VitalsUpdate::NotSelected => {
                    self.counters.foreign_vitals += 1;
                    self.counters.dropped_waveform += waveform.len() as u64;
                }
            }
        }
    }

    fn apply_status(&mut self, status: &TrackingStatus) {
        match self.tracking.apply_status(self.registry.selected_id(), status) {
            StatusOutcome::Applied => info!(active = status.active, "tracking status changed"),
            StatusOutcome::Duplicate => debug!(active = status.active, "duplicate tracking status"),
            StatusOutcome::Ignored => {
                debug!(subject = ?status.subject_id, "ignoring status for unselected subject");
                self.counters.ignored_status += 1;
            }
        }
    }

    fn ingest_alert(&mut self, alert: AlertEvent) {
        let id = alert.id.clone();
        if self.alerts.ingest(alert) {
            debug!(alert = %id, "alert ingested");
        } else {
            self.counters.duplicate_alerts += 1;
        }
    }
}

/// The real-time telemetry monitor.
///
/// Cheap to clone; clones share state. Operator calls and the event
/// dispatcher may run on different tasks or threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use vitalwatch::connection::{MemoryConnector, StreamConnection};
/// use vitalwatch::{Monitor, MonitorError, MonitorOptions};
/// use vitalwatch_types::Subject;
///
/// let connection = StreamConnection::new(Arc::new(MemoryConnector::new()), Duration::from_secs(1));
/// let monitor = Monitor::new(Arc::new(connection.handle()), MonitorOptions::default());
///
/// monitor.load_subjects(vec![Subject::new("s1", "John Doe")]);
/// monitor.select("s1").unwrap();
///
/// // Not connected yet.
/// assert_eq!(monitor.start_tracking("s1"), Err(MonitorError::NotConnected));
/// assert!(!monitor.view().tracking_active);
/// ```
#[derive(Clone)]
pub struct Monitor {
    state: Arc<Mutex<MonitorState>>,
    sink: Arc<dyn CommandSink>,
}

impl Monitor {
    pub fn new(sink: Arc<dyn CommandSink>, options: MonitorOptions) -> Self {
        let state = MonitorState {
            registry: SubjectRegistry::new(),
            tracking: TrackingController::new(),
            vitals: VitalsStore::new(),
            waveform: WaveformBuffer::new(options.waveform_capacity),
            alerts: AlertFeed::new(options.alert_retention),
            counters: MonitorCounters::default(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            sink,
        }
    }

    /// Replace the roster. Returns the number of subjects.
    ///
    /// If the selected subject is no longer listed the selection is cleared
    /// and the data stores reset.
    pub fn load_subjects(&self, subjects: Vec<Subject>) -> usize {
        let mut state = self.state.lock();
        if state.registry.replace(subjects) {
            info!("selected subject left the roster, clearing selection");
            state.on_selection_changed();
        }
        state.registry.len()
    }

    /// Load the roster and alert backlog from a collaborator.
    pub async fn load_roster(&self, source: &dyn RosterSource) -> Result<usize> {
        let subjects = source.subjects().await?;
        let backlog = source.alert_backlog().await?;
        info!(
            source = source.description(),
            subjects = subjects.len(),
            alerts = backlog.len(),
            "roster loaded"
        );
        let count = self.load_subjects(subjects);
        self.ingest_backlog(backlog);
        Ok(count)
    }

    /// Feed backlog alerts through the same idempotent path as stream alerts.
    pub fn ingest_backlog(&self, alerts: Vec<AlertEvent>) {
        let mut state = self.state.lock();
        for alert in alerts {
            state.ingest_alert(alert);
        }
    }

    /// Select the subject to observe.
    ///
    /// Switching to a different subject resets the waveform buffer, clears
    /// the new subject's vitals to unknown and drops tracking state. This
    /// works while disconnected; when connected the service is told too.
    pub fn select(&self, subject_id: &str) -> Result<Selection> {
        let mut state = self.state.lock();
        let selection = state.registry.select(subject_id)?;
        if selection == Selection::Changed {
            info!(subject = subject_id, "subject selected");
            state.on_selection_changed();
            if self.sink.connection_state() == ConnectionState::Connected {
                let command = OutboundCommand::SelectSubject {
                    subject_id: subject_id.to_string(),
                };
                if let Err(e) = self.sink.send(command) {
                    warn!(error = %e, "failed to announce subject selection");
                }
            }
        }
        Ok(selection)
    }

    /// Ask the service to start tracking a subject.
    ///
    /// Requires a live connection. The subject becomes the selection if it
    /// was not already. `tracking_active` stays false until the service acks.
    ///
    /// Both commands are queued before any local state changes, so a
    /// rejected send leaves the selection and the stores untouched.
    pub fn start_tracking(&self, subject_id: &str) -> Result<()> {
        if self.sink.connection_state() != ConnectionState::Connected {
            return Err(MonitorError::NotConnected);
        }
        let mut state = self.state.lock();
        if !state.registry.contains(subject_id) {
            return Err(MonitorError::UnknownSubject(subject_id.to_string()));
        }
        if state.registry.is_selected(subject_id) {
            return state.tracking.start(self.sink.as_ref(), subject_id);
        }

        self.sink.send(OutboundCommand::SelectSubject {
            subject_id: subject_id.to_string(),
        })?;
        let mut tracking = TrackingController::new();
        tracking.start(self.sink.as_ref(), subject_id)?;

        state.registry.select(subject_id)?;
        info!(subject = subject_id, "subject selected for tracking");
        state.on_selection_changed();
        state.tracking = tracking;
        Ok(())
    }

    /// Stop tracking. Takes effect locally at once.
    pub fn stop_tracking(&self) -> Result<()> {
        self.state.lock().tracking.stop(self.sink.as_ref())
    }

    /// Acknowledge an alert.
    pub fn acknowledge(&self, alert_id: &str) -> Result<()> {
        self.state.lock().alerts.acknowledge(alert_id)
    }

    /// Apply a tracking ack from any channel.
    ///
    /// The stream's status event and the companion REST surface both land
    /// here, so whichever arrives first wins and the other is a no-op.
    pub fn apply_tracking_ack(&self, status: &TrackingStatus) {
        self.state.lock().apply_status(status);
    }

    /// Apply one inbound event.
    pub fn apply(&self, event: InboundEvent) {
        let mut state = self.state.lock();
        state.counters.events += 1;
        match event {
            InboundEvent::Connected { message } => {
                info!(
                    greeting = message.as_deref().unwrap_or_default(),
                    "service acknowledged connection"
                );
            }
            InboundEvent::Vitals(frames) => state.apply_vitals(frames),
            InboundEvent::Status(status) => state.apply_status(&status),
            InboundEvent::Alert(alert) => state.ingest_alert(alert),
            InboundEvent::SubjectStatus { subject_id, status } => {
                if state.registry.set_status(&subject_id, status) {
                    debug!(subject = %subject_id, %status, "subject status updated");
                } else {
                    debug!(subject = %subject_id, "status for unknown subject");
                }
            }
            InboundEvent::SubjectSelected { subject_id } => {
                if !state.registry.is_selected(&subject_id) {
                    debug!(subject = %subject_id, "stale selection ack");
                }
            }
        }
    }

    /// Consume an event stream until it ends.
    ///
    /// This is the single dispatcher for a connection: events are applied
    /// strictly in arrival order. When the stream ends the tracking flag is
    /// dropped, since nothing is live without a link.
    pub async fn run(&self, mut events: EventStream) {
        while let Some(event) = events.recv().await {
            self.apply(event);
        }
        self.connection_lost();
    }

    /// Mark the link as gone. Data stores are left as they are.
    pub fn connection_lost(&self) {
        self.state.lock().tracking.connection_lost();
    }

    /// Commands that restore the operator's intent on a fresh connection.
    pub fn resume_commands(&self) -> Vec<OutboundCommand> {
        let state = self.state.lock();
        let mut commands = Vec::new();
        if let Some(subject_id) = state.registry.selected_id() {
            commands.push(OutboundCommand::SelectSubject {
                subject_id: subject_id.to_string(),
            });
        }
        commands.extend(state.tracking.resume_command());
        commands
    }

    /// Re-send [`resume_commands`](Monitor::resume_commands) over the sink.
    pub fn resume(&self) {
        for command in self.resume_commands() {
            let name = command.name();
            if let Err(e) = self.sink.send(command) {
                warn!(command = name, error = %e, "failed to resume");
            }
        }
    }

    /// An owned, read-only copy of everything the rendering layer needs.
    pub fn view(&self) -> MonitorView {
        let state = self.state.lock();
        let selected = state.registry.selected().cloned();
        let vitals = selected
            .as_ref()
            .map(|s| state.vitals.latest_or_unknown(&s.id));

        let mut counters = state.counters.clone();
        counters.evicted_alerts = state.alerts.evicted();

        MonitorView {
            connection: self.sink.connection_state(),
            last_error: self.sink.last_error().map(|e| e.to_string()),
            selected,
            subjects: state.registry.subjects().as_ref().clone(),
            vitals,
            waveform: state.waveform.to_vec(),
            alerts: state.alerts.iter().cloned().collect(),
            unread_alerts: state.alerts.unread_count(),
            tracking_requested: state.tracking.requested_subject().map(str::to_string),
            tracking_active: state.tracking.is_active(),
            counters,
        }
    }

    /// Server-confirmed tracking state.
    pub fn tracking_active(&self) -> bool {
        self.state.lock().tracking.is_active()
    }

    /// Id of the selected subject.
    pub fn selected_id(&self) -> Option<String> {
        self.state.lock().registry.selected_id().map(str::to_string)
    }

    /// Current waveform contents, oldest first.
    pub fn waveform(&self) -> Vec<f64> {
        self.state.lock().waveform.to_vec()
    }

    /// Alerts not yet acknowledged.
    pub fn unread_alerts(&self) -> usize {
        self.state.lock().alerts.unread_count()
    }

    /// Drop counters.
    pub fn counters(&self) -> MonitorCounters {
        let state = self.state.lock();
        let mut counters = state.counters.clone();
        counters.evicted_alerts = state.alerts.evicted();
        counters
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("selected", &self.selected_id())
            .field("connection", &self.sink.connection_state())
            .finish()
    }
}
