//! End-to-end session over an in-memory link.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use vitalwatch::connection::{ConnectionState, MemoryConnector, StreamConnection};
use vitalwatch::{Monitor, MonitorError, MonitorOptions};
use vitalwatch_types::{BloodPressure, Reading, Subject, SubjectStatus};

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_full_session() {
    let connector = Arc::new(MemoryConnector::new());
    let server = connector.push();
    let (server_read, mut server_write) = tokio::io::split(server);
    let mut commands = BufReader::new(server_read).lines();

    let mut connection = StreamConnection::new(connector, Duration::from_secs(1));
    let handle = connection.handle();
    let monitor = Monitor::new(
        Arc::new(connection.handle()),
        MonitorOptions {
            waveform_capacity: 5,
            alert_retention: 100,
        },
    );
    monitor.load_subjects(vec![
        Subject::new("patient_001", "John Doe"),
        Subject::new("patient_002", "Jane Smith"),
    ]);

    // Selecting works offline; tracking does not.
    monitor.select("patient_001").unwrap();
    assert_eq!(monitor.start_tracking("patient_001"), Err(MonitorError::NotConnected));

    let events = connection.open().await.unwrap();
    let dispatcher = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run(events).await }
    });

    monitor.start_tracking("patient_001").unwrap();
    let line = commands.next_line().await.unwrap().unwrap();
    let command: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(command["event"], "start_tracking");
    assert_eq!(command["data"]["subject_id"], "patient_001");
    assert!(!monitor.tracking_active());

    let frames = [
        r#"{"event":"connected","data":{"status":"connected","message":"Connected to live monitoring"}}"#,
        r#"{"event":"monitoring_status","data":{"active":true,"message":"Live monitoring started"}}"#,
        r#"{"event":"live_vitals","data":{
            "patient_001":{"heart_rate":72,"blood_pressure":"120/80","oxygen_saturation":98,
                           "respiratory_rate":16,"temperature":36.8,"ecg_lead":[0.1,0.2,0.3],
                           "timestamp":"2024-01-15T10:30:00"},
            "patient_002":{"heart_rate":90,"ecg_lead":[9.9],"timestamp":"2024-01-15T10:30:00"}}}"#,
        r#"this is not json"#,
        r#"{"event":"live_vitals","data":{"patient_001":{"heart_rate":"--","blood_pressure":"122/81",
            "oxygen_saturation":97,"ecg_lead":[0.4,0.5,0.6],"timestamp":"2024-01-15T10:30:01"}}}"#,
        r#"{"event":"live_vitals","data":{"patient_001":{"heart_rate":40,"ecg_lead":[7.7],
            "timestamp":"2024-01-15T10:29:59"}}}"#,
        r#"{"event":"alert","data":{"id":1,"patient_id":"patient_001","type":"heart_rate",
            "message":"Heart rate above threshold: 118 bpm","severity":"high",
            "timestamp":"2024-01-15T10:30:02","acknowledged":false}}"#,
        r#"{"event":"alert","data":{"id":1,"patient_id":"patient_001","type":"heart_rate",
            "severity":"high","timestamp":"2024-01-15T10:30:02"}}"#,
        r#"{"event":"subject_status","data":{"subject_id":"patient_001","status":"critical"}}"#,
    ];
    for frame in frames {
        // One frame per line.
        let compact = frame.replace('\n', " ");
        server_write.write_all(compact.as_bytes()).await.unwrap();
        server_write.write_all(b"\n").await.unwrap();
    }
    server_write.flush().await.unwrap();

    wait_until(|| monitor.counters().events >= 8).await;

    let view = monitor.view();
    assert_eq!(view.connection, ConnectionState::Connected);
    assert!(view.tracking_active);
    assert_eq!(view.selected.as_ref().unwrap().status, SubjectStatus::Critical);

    let vitals = view.vitals.unwrap();
    assert_eq!(vitals.heart_rate, Reading::Value(72.0));
    assert_eq!(vitals.blood_pressure, Reading::Value(BloodPressure::new(122.0, 81.0)));
    assert_eq!(vitals.spo2, Reading::Value(97.0));
    assert_eq!(vitals.respiration_rate, Reading::Absent);

    assert_eq!(view.waveform, vec![0.2, 0.3, 0.4, 0.5, 0.6]);
    assert_eq!(view.alerts.len(), 1);
    assert_eq!(view.unread_alerts, 1);
    assert_eq!(view.counters.stale_vitals, 1);
    assert_eq!(view.counters.foreign_vitals, 1);
    assert_eq!(view.counters.duplicate_alerts, 1);
    assert_eq!(handle.status().malformed_frames, 1);

    monitor.acknowledge("1").unwrap();
    assert_eq!(monitor.unread_alerts(), 0);

    // Switching subjects resets the stores.
    monitor.select("patient_002").unwrap();
    let line = commands.next_line().await.unwrap().unwrap();
    let command: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(command["event"], "select_subject");
    assert!(!monitor.tracking_active());
    assert_eq!(monitor.waveform(), vec![0.0; 5]);

    // Peer goes away: the dispatcher ends, the data stays.
    drop(server_write);
    drop(commands);
    dispatcher.await.unwrap();

    wait_until(|| handle.state() == ConnectionState::Disconnected).await;
    let view = monitor.view();
    assert!(!view.tracking_active);
    assert_eq!(view.alerts.len(), 1);
    assert!(view.last_error.is_some());
    assert_eq!(monitor.stop_tracking(), Ok(()));
}
