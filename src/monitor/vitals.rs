//! Latest vitals per subject, with a monotonic-time guard.

use std::collections::HashMap;

use vitalwatch_types::{Timestamp, VitalsSnapshot};

/// What happened to an inbound snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalsUpdate {
    /// Stored (merged over the previous snapshot, if any).
    Applied,
    /// Not newer than what was already seen for this subject.
    Stale,
    /// For a subject other than the selected one.
    NotSelected,
}

/// One live snapshot per subject.
///
/// Each subject also has a high-water mark: the newest `observed_at` ever
/// applied. Clearing a subject forgets its readings but keeps the mark, so
/// replays of old frames stay stale.
#[derive(Debug, Clone, Default)]
pub struct VitalsStore {
    snapshots: HashMap<String, VitalsSnapshot>,
    high_water: HashMap<String, Timestamp>,
}

impl VitalsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a snapshot if it is for `selected` and strictly newer than
    /// anything seen for that subject.
    pub fn update(&mut self, selected: Option<&str>, snapshot: VitalsSnapshot) -> VitalsUpdate {
        if selected != Some(snapshot.subject_id.as_str()) {
            return VitalsUpdate::NotSelected;
        }

        if let Some(seen) = self.high_water.get(&snapshot.subject_id) {
            if snapshot.observed_at <= *seen {
                return VitalsUpdate::Stale;
            }
        }

        self.high_water
            .insert(snapshot.subject_id.clone(), snapshot.observed_at);
        let merged = match self.snapshots.get(&snapshot.subject_id) {
            Some(previous) => snapshot.merged_over(previous),
            None => snapshot,
        };
        self.snapshots.insert(merged.subject_id.clone(), merged);
        VitalsUpdate::Applied
    }

    /// Forget the readings for a subject; it reads as unknown until new data arrives.
    pub fn clear(&mut self, subject_id: &str) {
        self.snapshots.remove(subject_id);
    }

    /// Latest snapshot for a subject, if any data has been applied since the last clear.
    pub fn latest(&self, subject_id: &str) -> Option<&VitalsSnapshot> {
        self.snapshots.get(subject_id)
    }

    /// Latest snapshot, or an all-unknown one.
    pub fn latest_or_unknown(&self, subject_id: &str) -> VitalsSnapshot {
        self.latest(subject_id).cloned().unwrap_or_else(|| {
            let observed_at = self.high_water.get(subject_id).copied().unwrap_or_default();
            VitalsSnapshot::unknown(subject_id, observed_at)
        })
    }
}
