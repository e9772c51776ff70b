//! Line codec for the monitoring service protocol.
//!
//! Every frame is one JSON envelope terminated by `\n`:
//!
//! ```text
//! {"event": "live_vitals", "data": {"patient_001": {...}, "patient_002": {...}}}
//! {"event": "start_tracking", "data": {"subject_id": "patient_001"}}
//! ```

use serde::Deserialize;
use serde_json::{json, Value};

use vitalwatch_types::{
    AlertEvent, InboundEvent, OutboundCommand, SubjectStatus, TrackingStatus, VitalsFrame,
    VitalsSnapshot,
};

use crate::error::{MonitorError, Result};

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ConnectedData {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubjectStatusData {
    #[serde(alias = "patient_id")]
    subject_id: String,
    status: SubjectStatus,
}

#[derive(Debug, Deserialize)]
struct SubjectSelectedData {
    #[serde(alias = "patient_id")]
    subject_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct WaveformData {
    #[serde(default, alias = "ecg_lead")]
    waveform: Vec<f64>,
}

/// Decode one line into an inbound event.
///
/// Returns `Ok(None)` for well-formed envelopes with an event name this
/// client does not handle.
pub fn decode(line: &str) -> Result<Option<InboundEvent>> {
    let envelope: RawEnvelope = serde_json::from_str(line.trim())?;

    let event = match envelope.event.as_str() {
        "connected" => {
            let data: ConnectedData = from_data(envelope.data)?;
            InboundEvent::Connected {
                message: data.message,
            }
        }
        "live_vitals" | "vitals" => InboundEvent::Vitals(decode_vitals(envelope.data)?),
        "monitoring_status" | "status" => {
            InboundEvent::Status(serde_json::from_value::<TrackingStatus>(envelope.data)?)
        }
        "alert" => InboundEvent::Alert(serde_json::from_value::<AlertEvent>(envelope.data)?),
        "subject_status" => {
            let data: SubjectStatusData = serde_json::from_value(envelope.data)?;
            InboundEvent::SubjectStatus {
                subject_id: data.subject_id,
                status: data.status,
            }
        }
        "subject_selected" => {
            let data: SubjectSelectedData = serde_json::from_value(envelope.data)?;
            InboundEvent::SubjectSelected {
                subject_id: data.subject_id,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// Encode a command as a single newline-terminated line.
pub fn encode(command: &OutboundCommand) -> Result<String> {
    let data = match command {
        OutboundCommand::StartTracking { subject_id }
        | OutboundCommand::SelectSubject { subject_id } => json!({ "subject_id": subject_id }),
        OutboundCommand::StopTracking => json!({}),
    };
    let mut line = serde_json::to_string(&json!({ "event": command.name(), "data": data }))?;
    line.push('\n');
    Ok(line)
}

/// Treat a missing or null payload as an empty object.
fn from_data<T: Default + for<'de> Deserialize<'de>>(data: Value) -> Result<T> {
    if data.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(data)?)
}

/// A vitals payload is either one frame carrying its own `subject_id`, or a
/// map of frames keyed by subject id.
fn decode_vitals(data: Value) -> Result<Vec<VitalsFrame>> {
    let Value::Object(map) = data else {
        return Err(MonitorError::Codec("vitals payload must be an object".to_string()));
    };

    if map.contains_key("subject_id") || map.contains_key("patient_id") {
        return Ok(vec![decode_frame(Value::Object(map), None)?]);
    }

    map.into_iter()
        .map(|(subject_id, frame)| decode_frame(frame, Some(subject_id)))
        .collect()
}

fn decode_frame(value: Value, subject_id: Option<String>) -> Result<VitalsFrame> {
    let WaveformData { waveform } = serde_json::from_value(value.clone())?;
    let mut vitals: VitalsSnapshot = serde_json::from_value(value)?;

    if let Some(id) = subject_id {
        vitals.subject_id = id;
    }
    if vitals.subject_id.is_empty() {
        return Err(MonitorError::Codec("vitals frame has no subject".to_string()));
    }

    Ok(VitalsFrame { vitals, waveform })
}
