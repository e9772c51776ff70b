//! # vitalwatch
//!
//! A real-time telemetry client for a bedside monitoring service.
//!
//! The crate keeps a persistent connection to the service, lets an operator
//! pick one subject from a roster and start or stop live tracking, and
//! maintains the latest vitals, a rolling waveform and an alert feed for
//! whatever is on screen.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Supervisor (reconnect + backoff)                            │
//! │  ┌──────────────────┐  EventStream  ┌──────────────────────┐ │
//! │  │ StreamConnection │──────────────▶│ Monitor              │ │
//! │  │  (NDJSON codec)  │◀──────────────│  registry  tracking  │ │
//! │  └────────┬─────────┘ OutboundCmd   │  vitals    waveform  │ │
//! │           │                         │  alerts              │ │
//! │     Connector (TCP | memory)        └──────────┬───────────┘ │
//! │                                                ▼             │
//! │                                         MonitorView          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`connection`]**: transport link, wire codec, connection state and
//!   the reconnect [`Supervisor`](connection::Supervisor)
//! - **[`monitor`]**: the stores, the tracking controller and the single
//!   event dispatcher
//! - **[`roster`]**: roster and alert backlog sources
//! - **[`config`]**: layered configuration
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Connect to the default endpoint and track a subject
//! vitalwatch --subject patient_001
//!
//! # Custom endpoint, roster file, and export the final state
//! vitalwatch --connect monitor.local:5001 --roster roster.json --export state.json
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::io::AsyncWriteExt;
//! use vitalwatch::connection::{MemoryConnector, StreamConnection};
//! use vitalwatch::{Monitor, MonitorOptions};
//! use vitalwatch_types::Subject;
//!
//! # tokio_test::block_on(async {
//! let connector = Arc::new(MemoryConnector::new());
//! let mut server = connector.push();
//!
//! let mut connection = StreamConnection::new(connector, Duration::from_secs(1));
//! let monitor = Monitor::new(Arc::new(connection.handle()), MonitorOptions::default());
//! monitor.load_subjects(vec![Subject::new("patient_001", "John Doe")]);
//! monitor.select("patient_001").unwrap();
//!
//! let events = connection.open().await.unwrap();
//! server
//!     .write_all(b"{\"event\":\"live_vitals\",\"data\":{\"patient_001\":{\"heart_rate\":72,\"timestamp\":\"2024-01-15T10:30:00\"}}}\n")
//!     .await
//!     .unwrap();
//! drop(server);
//!
//! monitor.run(events).await;
//! let view = monitor.view();
//! assert_eq!(view.vitals.unwrap().heart_rate.value(), Some(&72.0));
//! # });
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod monitor;
pub mod roster;

pub use config::MonitorConfig;
pub use connection::{ConnectionState, StreamConnection, Supervisor};
pub use error::{MonitorError, Result};
pub use monitor::{Monitor, MonitorCounters, MonitorOptions, MonitorView};
pub use roster::{FileRoster, RosterSource, StaticRoster};
