//! Keeps a monitor connected across link failures.

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::{Backoff, CommandSink, StreamConnection};
use crate::error::{MonitorError, Result};
use crate::monitor::Monitor;

/// Drives a [`StreamConnection`] and feeds its events to a [`Monitor`].
///
/// Each cycle opens the link, restores the operator's selection and
/// tracking intent, then runs the monitor's dispatcher until the event
/// stream ends. Failed attempts back off per the [`Backoff`] policy; a
/// successful connection resets the attempt count.
#[derive(Debug)]
pub struct Supervisor {
    connection: StreamConnection,
    monitor: Monitor,
    backoff: Backoff,
    shutdown: watch::Receiver<bool>,
    track_on_connect: Option<String>,
}

impl Supervisor {
    /// `monitor` should send through `connection.handle()`.
    pub fn new(
        connection: StreamConnection,
        monitor: Monitor,
        backoff: Backoff,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connection,
            monitor,
            backoff,
            shutdown,
            track_on_connect: None,
        }
    }

    /// Start tracking this subject once the first connection is up.
    pub fn track_on_connect(mut self, subject_id: impl Into<String>) -> Self {
        self.track_on_connect = Some(subject_id.into());
        self
    }

    /// Run until shutdown is signalled or retries are exhausted.
    ///
    /// Returns the last connection error when giving up.
    pub async fn run(mut self) -> Result<()> {
        let mut attempt = 0u32;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let opened = tokio::select! {
                result = self.connection.open() => result,
                _ = stopped(&mut self.shutdown) => break,
            };

            let last_error = match opened {
                Ok(events) => {
                    attempt = 0;
                    self.monitor.resume();
                    if let Some(subject_id) = self.track_on_connect.take() {
                        if let Err(e) = self.monitor.start_tracking(&subject_id) {
                            warn!(subject = %subject_id, error = %e, "could not start tracking");
                        }
                    }

                    tokio::select! {
                        _ = self.monitor.run(events) => {}
                        _ = stopped(&mut self.shutdown) => break,
                    }
                    self.connection.handle().last_error()
                }
                Err(e) => Some(e),
            };

            let Some(delay) = self.backoff.delay(attempt) else {
                let err = last_error.unwrap_or(MonitorError::NotConnected);
                error!(attempts = attempt, error = %err, "giving up on connection");
                self.connection.close();
                return Err(err);
            };
            attempt += 1;
            info!(delay_ms = delay.as_millis() as u64, attempt, "reconnecting");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut self.shutdown) => break,
            }
        }

        self.connection.close();
        self.monitor.connection_lost();
        info!("supervisor stopped");
        Ok(())
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
