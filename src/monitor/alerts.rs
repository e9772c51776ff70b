//! Alert feed: ordered, deduplicated, with acknowledgment state.

use std::collections::{HashSet, VecDeque};

use vitalwatch_types::AlertEvent;

use crate::error::{MonitorError, Result};

/// Default number of alerts retained.
pub const DEFAULT_RETENTION: usize = 500;

/// Ordered collection of alerts, newest first.
///
/// Order is arrival order, not `raised_at`: the newest arrival is always at
/// index 0. Ids are unique among stored alerts. When the feed is over its
/// retention limit the oldest arrival is evicted.
#[derive(Debug, Clone)]
pub struct AlertFeed {
    alerts: VecDeque<AlertEvent>,
    ids: HashSet<String>,
    retention: usize,
    evicted: u64,
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl AlertFeed {
    pub fn new(retention: usize) -> Self {
        Self {
            alerts: VecDeque::new(),
            ids: HashSet::new(),
            retention: retention.max(1),
            evicted: 0,
        }
    }

    /// Insert an alert unless one with the same id is already stored.
    ///
    /// Returns true if the alert was inserted.
    pub fn ingest(&mut self, alert: AlertEvent) -> bool {
        if self.ids.contains(&alert.id) {
            return false;
        }
        self.ids.insert(alert.id.clone());
        self.alerts.push_front(alert);

        while self.alerts.len() > self.retention {
            if let Some(oldest) = self.alerts.pop_back() {
                self.ids.remove(&oldest.id);
                self.evicted += 1;
            }
        }
        true
    }

    /// Mark an alert as acknowledged. Acknowledging twice is a no-op.
    pub fn acknowledge(&mut self, alert_id: &str) -> Result<()> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| MonitorError::UnknownAlert(alert_id.to_string()))?;
        alert.acknowledged = true;
        Ok(())
    }

    pub fn get(&self, alert_id: &str) -> Option<&AlertEvent> {
        self.alerts.iter().find(|a| a.id == alert_id)
    }

    /// Alerts not yet acknowledged.
    pub fn unread_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.acknowledged).count()
    }

    /// Iterate newest first.
    pub fn iter(&self) -> impl Iterator<Item = &AlertEvent> {
        self.alerts.iter()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Alerts removed by the retention limit.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
