use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinHandle;

use crate::types::VmRecord;

/// In-memory source of truth for one fleet: VM records plus the handle of
/// each VM's monitor task. One instance per fleet, constructed and injected
/// by the manager; nothing here is process-global.
#[derive(Clone)]
pub struct FleetRegistry {
    vms: Arc<RwLock<HashMap<String, VmRecord>>>,
    monitors: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self {
            vms: Arc::new(RwLock::new(HashMap::new())),
            monitors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn insert(&self, vm: VmRecord) {
        let mut vms = self.vms.write().unwrap();
        vms.insert(vm.id.clone(), vm);
    }

    pub fn get(&self, vm_id: &str) -> Option<VmRecord> {
        let vms = self.vms.read().unwrap();
        vms.get(vm_id).cloned()
    }

    /// Apply a mutation to a record under the write lock. Returns the
    /// updated record, or None if the id is unknown.
    pub fn update<F>(&self, vm_id: &str, f: F) -> Option<VmRecord>
    where
        F: FnOnce(&mut VmRecord),
    {
        let mut vms = self.vms.write().unwrap();
        let vm = vms.get_mut(vm_id)?;
        f(vm);
        Some(vm.clone())
    }

    pub fn remove(&self, vm_id: &str) -> Option<VmRecord> {
        let mut vms = self.vms.write().unwrap();
        vms.remove(vm_id)
    }

    pub fn list_by_round(&self, round_id: &str) -> Vec<VmRecord> {
        let vms = self.vms.read().unwrap();
        let mut matches: Vec<VmRecord> = vms
            .values()
            .filter(|vm| vm.round_id == round_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    /// Track the monitor task for a VM. At most one handle exists per id:
    /// attaching over an existing one aborts the old task first.
    pub fn attach_monitor(&self, vm_id: &str, handle: JoinHandle<()>) {
        let mut monitors = self.monitors.lock().unwrap();
        if let Some(old) = monitors.insert(vm_id.to_string(), handle) {
            old.abort();
        }
    }

    pub fn detach_monitor(&self, vm_id: &str) {
        let mut monitors = self.monitors.lock().unwrap();
        if let Some(handle) = monitors.remove(vm_id) {
            handle.abort();
        }
    }

    pub fn has_monitor(&self, vm_id: &str) -> bool {
        let monitors = self.monitors.lock().unwrap();
        monitors.contains_key(vm_id)
    }
}

impl Default for FleetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
