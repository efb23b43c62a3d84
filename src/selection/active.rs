//! In-process registry of running selections.
//!
//! At most one plan may run against a backend at a time. The registry hands
//! out a guard per backend; the slot frees itself when the guard drops.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Backend name → run id of the selection currently holding it.
#[derive(Debug, Clone, Default)]
pub struct ActivePlans {
    running: Arc<DashMap<String, Uuid>>,
}

impl ActivePlans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `backend` for `run_id`, or return the run already holding it.
    pub fn acquire(&self, backend: &str, run_id: Uuid) -> Result<ActiveGuard, Uuid> {
        match self.running.entry(backend.to_string()) {
            Entry::Occupied(held) => Err(*held.get()),
            Entry::Vacant(slot) => {
                slot.insert(run_id);
                Ok(ActiveGuard {
                    running: self.running.clone(),
                    backend: backend.to_string(),
                    run_id,
                })
            }
        }
    }
}

/// Holds a backend's slot. Releases it when dropped.
#[derive(Debug)]
pub struct ActiveGuard {
    running: Arc<DashMap<String, Uuid>>,
    backend: String,
    run_id: Uuid,
}

impl ActiveGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.running
            .remove_if(&self.backend, |_, holder| *holder == self.run_id);
        tracing::trace!(backend = %self.backend, run_id = %self.run_id, "selection slot released");
    }
}
