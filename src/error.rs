//! Error types for the monitor.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while operating the monitor.
///
/// Stale or duplicate data is not an error; it is dropped and counted in
/// [`MonitorCounters`](crate::monitor::MonitorCounters).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// A command was issued while the connection was not `Connected`.
    #[error("not connected to the monitoring service")]
    NotConnected,

    /// The subject id is not in the registry.
    #[error("unknown subject: {0}")]
    UnknownSubject(String),

    /// The alert id is not in the feed.
    #[error("unknown alert: {0}")]
    UnknownAlert(String),

    /// Network or handshake failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The roster or alert backlog could not be loaded.
    #[error("roster error: {0}")]
    Roster(String),
}

impl MonitorError {
    /// True for failures of the link itself, as opposed to rejected commands.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MonitorError::Transport(_) | MonitorError::HandshakeTimeout(_)
        )
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Codec(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = MonitorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            MonitorError::UnknownSubject("s9".to_string()).to_string(),
            "unknown subject: s9"
        );
        assert_eq!(
            MonitorError::NotConnected.to_string(),
            "not connected to the monitoring service"
        );
    }

    #[test]
    fn test_is_transport() {
        assert!(MonitorError::Transport("reset".to_string()).is_transport());
        assert!(MonitorError::HandshakeTimeout(Duration::from_secs(5)).is_transport());
        assert!(!MonitorError::NotConnected.is_transport());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(MonitorError::from(io), MonitorError::Transport(_)));
    }
}
