// src/exec/registry.rs

//! Best-effort record of live process groups.
//!
//! Entries are back-references (label -> pid) used only to reap leftovers
//! when the suite exits on a fault or an interrupt. Ownership of a process
//! always stays with its [`ManagedProcess`](crate::exec::ManagedProcess).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<BTreeMap<String, u32>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, u32>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, label: &str, pid: u32) {
        debug!(label, pid, "registering process");
        self.entries().insert(label.to_string(), pid);
    }

    pub fn forget(&self, label: &str) {
        if self.entries().remove(label).is_some() {
            debug!(label, "forgot process");
        }
    }

    pub fn pid_of(&self, label: &str) -> Option<u32> {
        self.entries().get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Kill every registered process group and clear the registry.
    /// Returns how many entries were reaped.
    pub fn reap_all(&self) -> usize {
        let drained: Vec<(String, u32)> = std::mem::take(&mut *self.entries()).into_iter().collect();
        for (label, pid) in &drained {
            warn!(label = %label, pid, "reaping leftover process group");
            crate::exec::process::kill_group_now(*pid);
        }
        drained.len()
    }
}
