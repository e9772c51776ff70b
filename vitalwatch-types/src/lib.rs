//! # vitalwatch-types
//!
//! Core types for real-time vitals telemetry. This crate defines the data
//! model shared by the monitoring client and anything that produces or
//! replays its event stream.
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde, including the lenient forms the
//!   monitoring service emits (naive timestamps, `"120/80"` blood pressure,
//!   numeric alert ids, placeholder readings)
//!
//! ## Example
//!
//! ```rust
//! use vitalwatch_types::{Reading, Timestamp, VitalsSnapshot};
//!
//! let earlier = VitalsSnapshot::unknown("patient_001", Timestamp::from_millis(1_000))
//!     .with_heart_rate(72.0)
//!     .with_spo2(98.0);
//!
//! let mut later = VitalsSnapshot::unknown("patient_001", Timestamp::from_millis(2_000))
//!     .with_spo2(97.0);
//! later.heart_rate = Reading::Placeholder;
//!
//! let merged = later.merged_over(&earlier);
//! assert_eq!(merged.heart_rate, Reading::Value(72.0));
//! assert_eq!(merged.spo2, Reading::Value(97.0));
//! ```

mod alert;
mod event;
mod subject;
mod timestamp;
mod vitals;

pub use alert::*;
pub use event::*;
pub use subject::*;
pub use timestamp::*;
pub use vitals::*;
