use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use query::ControlSource;
use shared::domain::Control;
use thiserror::Error;

mod admin;
pub mod seed;
mod sqlite;

pub use admin::{
    display_name_from_email, seed_audit_logs, seed_users, AdminStore, InMemoryAdminStore,
    NewAuditLog, PENDING_DESIGNATION, ROOT_USER_ID,
};
pub use sqlite::SqliteAdminStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("duplicate ControlId '{0}'")]
    DuplicateControlId(String),
}

/// Immutable view of the control collection plus an id index.
#[derive(Debug, Default)]
pub struct ControlSnapshot {
    controls: Vec<Control>,
    index: HashMap<String, usize>,
}

impl ControlSnapshot {
    pub fn new(controls: Vec<Control>) -> Result<Self, StoreError> {
        let mut index = HashMap::with_capacity(controls.len());
        for (position, control) in controls.iter().enumerate() {
            if index.insert(control.control_id.clone(), position).is_some() {
                return Err(StoreError::DuplicateControlId(control.control_id.clone()));
            }
        }
        Ok(Self { controls, index })
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn get(&self, control_id: &str) -> Option<&Control> {
        self.index
            .get(control_id)
            .and_then(|&position| self.controls.get(position))
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

impl ControlSource for ControlSnapshot {
    fn controls(&self) -> &[Control] {
        &self.controls
    }

    fn find(&self, id: &str) -> Option<&Control> {
        self.get(id)
    }
}

/// Process-lifetime holder of the current [`ControlSnapshot`].
///
/// Readers clone the inner `Arc` and then work lock-free; `replace` swaps in a
/// whole new snapshot. A reader racing a replacement sees either the old or the
/// new collection, never a mix.
#[derive(Clone, Default)]
pub struct ControlStore {
    current: Arc<RwLock<Arc<ControlSnapshot>>>,
}

impl ControlStore {
    pub fn new(controls: Vec<Control>) -> Result<Self, StoreError> {
        let snapshot = ControlSnapshot::new(controls)?;
        Ok(Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        })
    }

    pub fn snapshot(&self) -> Arc<ControlSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replaces the collection wholesale. On error the previous snapshot stays.
    pub fn replace(&self, controls: Vec<Control>) -> Result<usize, StoreError> {
        let snapshot = Arc::new(ControlSnapshot::new(controls)?);
        let count = snapshot.len();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
        tracing::info!(count, "control snapshot replaced");
        Ok(count)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
