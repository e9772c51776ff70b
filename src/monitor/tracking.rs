//! Tracking controller: local intent reconciled with server status.

use vitalwatch_types::{OutboundCommand, TrackingStatus};

use crate::connection::{CommandSink, ConnectionState};
use crate::error::{MonitorError, Result};

/// What happened to an inbound status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// `active` changed.
    Applied,
    /// Same as the current state; a second ack from another channel lands here.
    Duplicate,
    /// For a subject other than the selected one, or nothing is selected.
    Ignored,
}

/// Start/stop intent and the server-confirmed `active` flag.
///
/// `active` only becomes true when the server says so. Stopping takes
/// effect locally right away.
#[derive(Debug, Clone, Default)]
pub struct TrackingController {
    requested: Option<String>,
    active: bool,
}

impl TrackingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subject the operator asked to track, if any.
    pub fn requested_subject(&self) -> Option<&str> {
        self.requested.as_deref()
    }

    /// Server-confirmed tracking state.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ask the server to start tracking `subject_id`.
    ///
    /// Fails with `NotConnected` unless the link is up; `active` is left
    /// alone until a status event confirms.
    pub fn start(&mut self, sink: &dyn CommandSink, subject_id: &str) -> Result<()> {
        if sink.connection_state() != ConnectionState::Connected {
            return Err(MonitorError::NotConnected);
        }
        sink.send(OutboundCommand::StartTracking {
            subject_id: subject_id.to_string(),
        })?;
        self.requested = Some(subject_id.to_string());
        Ok(())
    }

    /// Stop tracking.
    ///
    /// Local state is cleared regardless of the link. The stop command is
    /// only sent while connected; a send failure is returned.
    pub fn stop(&mut self, sink: &dyn CommandSink) -> Result<()> {
        self.requested = None;
        self.active = false;
        if sink.connection_state() == ConnectionState::Connected {
            sink.send(OutboundCommand::StopTracking)?;
        }
        Ok(())
    }

    /// Reconcile a server-reported status.
    ///
    /// A status without a subject refers to the selection. The server's word
    /// also updates intent: an inactive status clears it, an active one
    /// adopts the subject.
    pub fn apply_status(&mut self, selected: Option<&str>, status: &TrackingStatus) -> StatusOutcome {
        let Some(selected) = selected else {
            return StatusOutcome::Ignored;
        };
        if status.subject_id.as_deref().is_some_and(|id| id != selected) {
            return StatusOutcome::Ignored;
        }

        if status.active {
            self.requested = Some(selected.to_string());
        } else {
            self.requested = None;
        }

        if self.active == status.active {
            return StatusOutcome::Duplicate;
        }
        self.active = status.active;
        StatusOutcome::Applied
    }

    /// The selection moved to another subject.
    pub fn selection_changed(&mut self) {
        self.requested = None;
        self.active = false;
    }

    /// The link dropped; nothing is streaming until the server re-acks.
    pub fn connection_lost(&mut self) {
        self.active = false;
    }

    /// Command to restore intent after a reconnect.
    pub fn resume_command(&self) -> Option<OutboundCommand> {
        self.requested
            .as_ref()
            .map(|subject_id| OutboundCommand::StartTracking {
                subject_id: subject_id.clone(),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records commands; state is settable.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub state: Mutex<ConnectionState>,
        pub sent: Mutex<Vec<OutboundCommand>>,
        /// Total commands accepted before sends fail as a full queue.
        pub capacity: Mutex<Option<usize>>,
    }

    impl RecordingSink {
        pub(crate) fn connected() -> Self {
            let sink = Self::default();
            *sink.state.lock() = ConnectionState::Connected;
            sink
        }
    }

    impl CommandSink for RecordingSink {
        fn connection_state(&self) -> ConnectionState {
            *self.state.lock()
        }

        fn send(&self, command: OutboundCommand) -> Result<()> {
            if self.connection_state() != ConnectionState::Connected {
                return Err(MonitorError::NotConnected);
            }
            let mut sent = self.sent.lock();
            if self.capacity.lock().is_some_and(|cap| sent.len() >= cap) {
                return Err(MonitorError::Transport("outbound queue full".to_string()));
            }
            sent.push(command);
            Ok(())
        }
    }

    #[test]
    fn test_start_requires_connection() {
        let sink = RecordingSink::default();
        let mut tracking = TrackingController::new();

        assert_eq!(tracking.start(&sink, "s1"), Err(MonitorError::NotConnected));
        assert!(!tracking.is_active());
        assert_eq!(tracking.requested_subject(), None);
        assert!(sink.sent.lock().is_empty());
    }

    #[test]
    fn test_start_waits_for_ack() {
        let sink = RecordingSink::connected();
        let mut tracking = TrackingController::new();

        tracking.start(&sink, "s1").unwrap();
        assert!(!tracking.is_active());
        assert_eq!(tracking.requested_subject(), Some("s1"));
        assert_eq!(
            sink.sent.lock().as_slice(),
            &[OutboundCommand::StartTracking {
                subject_id: "s1".to_string()
            }]
        );

        let ack = TrackingStatus::new(true).for_subject("s1");
        assert_eq!(tracking.apply_status(Some("s1"), &ack), StatusOutcome::Applied);
        assert!(tracking.is_active());
    }

    #[test]
    fn test_status_for_other_subject_is_ignored() {
        let mut tracking = TrackingController::new();
        tracking.apply_status(Some("s1"), &TrackingStatus::new(true));

        let stale = TrackingStatus::new(false).for_subject("s2");
        assert_eq!(tracking.apply_status(Some("s1"), &stale), StatusOutcome::Ignored);
        assert!(tracking.is_active());

        assert_eq!(
            tracking.apply_status(None, &TrackingStatus::new(true)),
            StatusOutcome::Ignored
        );
    }

    #[test]
    fn test_second_ack_is_idempotent() {
        let mut tracking = TrackingController::new();
        let ack = TrackingStatus::new(true);
        assert_eq!(tracking.apply_status(Some("s1"), &ack), StatusOutcome::Applied);
        assert_eq!(tracking.apply_status(Some("s1"), &ack), StatusOutcome::Duplicate);
        assert!(tracking.is_active());
    }

    #[test]
    fn test_stop_is_immediate() {
        let sink = RecordingSink::connected();
        let mut tracking = TrackingController::new();
        tracking.start(&sink, "s1").unwrap();
        tracking.apply_status(Some("s1"), &TrackingStatus::new(true));

        tracking.stop(&sink).unwrap();
        assert!(!tracking.is_active());
        assert_eq!(tracking.resume_command(), None);
        assert_eq!(sink.sent.lock().last(), Some(&OutboundCommand::StopTracking));
    }

    #[test]
    fn test_stop_while_disconnected_clears_locally() {
        let sink = RecordingSink::default();
        let mut tracking = TrackingController::new();
        tracking.apply_status(Some("s1"), &TrackingStatus::new(true));

        assert_eq!(tracking.stop(&sink), Ok(()));
        assert!(!tracking.is_active());
        assert!(sink.sent.lock().is_empty());
    }

    #[test]
    fn test_connection_lost_keeps_intent() {
        let sink = RecordingSink::connected();
        let mut tracking = TrackingController::new();
        tracking.start(&sink, "s1").unwrap();
        tracking.apply_status(Some("s1"), &TrackingStatus::new(true));

        tracking.connection_lost();
        assert!(!tracking.is_active());
        assert_eq!(
            tracking.resume_command(),
            Some(OutboundCommand::StartTracking {
                subject_id: "s1".to_string()
            })
        );
    }

    #[test]
    fn test_server_stop_clears_intent() {
        let sink = RecordingSink::connected();
        let mut tracking = TrackingController::new();
        tracking.start(&sink, "s1").unwrap();

        assert_eq!(
            tracking.apply_status(Some("s1"), &TrackingStatus::new(false)),
            StatusOutcome::Duplicate
        );
        assert_eq!(tracking.requested_subject(), None);
    }
}
