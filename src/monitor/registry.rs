//! Subject registry: the roster and the current selection.

use std::sync::Arc;

use vitalwatch_types::{Subject, SubjectStatus};

use crate::error::{MonitorError, Result};

/// Outcome of a successful selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The subject was already selected.
    Unchanged,
    /// A different subject is now selected.
    Changed,
}

/// Known subjects plus the currently selected one.
///
/// The roster is held behind an `Arc` and replaced wholesale, so a reader
/// holding [`subjects`](SubjectRegistry::subjects) never sees a partial list.
#[derive(Debug, Clone, Default)]
pub struct SubjectRegistry {
    subjects: Arc<Vec<Subject>>,
    selected: Option<String>,
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster.
    ///
    /// The selection survives if the selected id is still listed; otherwise
    /// it is cleared and `true` is returned.
    pub fn replace(&mut self, subjects: Vec<Subject>) -> bool {
        self.subjects = Arc::new(subjects);
        let dropped = self
            .selected
            .as_deref()
            .is_some_and(|id| self.get(id).is_none());
        if dropped {
            self.selected = None;
        }
        dropped
    }

    /// The current roster.
    pub fn subjects(&self) -> Arc<Vec<Subject>> {
        self.subjects.clone()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Select a subject by id.
    pub fn select(&mut self, id: &str) -> Result<Selection> {
        if !self.contains(id) {
            return Err(MonitorError::UnknownSubject(id.to_string()));
        }
        if self.selected.as_deref() == Some(id) {
            return Ok(Selection::Unchanged);
        }
        self.selected = Some(id.to_string());
        Ok(Selection::Changed)
    }

    /// Id of the selected subject.
    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected subject.
    pub fn selected(&self) -> Option<&Subject> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.as_deref() == Some(id)
    }

    /// Apply an inbound status change. Returns false for unknown subjects.
    pub fn set_status(&mut self, id: &str, status: SubjectStatus) -> bool {
        let Some(index) = self.subjects.iter().position(|s| s.id == id) else {
            return false;
        };
        if self.subjects[index].status != status {
            Arc::make_mut(&mut self.subjects)[index].status = status;
        }
        true
    }
}
