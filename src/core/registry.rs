//! The switch registry collaborator seam.
//!
//! The engine never owns the set of known switches; the enclosing controller
//! does. It reaches that registry only through [`SwitchRegistry`], which is
//! deliberately narrow: create-or-fetch on discovery, fetch by id, nothing
//! else. A process-local [`MemoryRegistry`] is provided for tests and
//! single-binary deployments.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use super::types::{ConnectionId, DatapathId, PortDescriptor, SwitchDescriptor};

/// A live switch known to the registry.
///
/// Interior mutability keeps the handle shareable between the connection
/// task that feeds it and consumers that read it.
#[derive(Debug)]
pub struct SwitchRecord {
    dpid: DatapathId,
    inner: Mutex<SwitchState>,
}

#[derive(Debug)]
struct SwitchState {
    connection: ConnectionId,
    descriptor: Option<SwitchDescriptor>,
    ports: Vec<PortDescriptor>,
    last_seen: Instant,
}

impl SwitchRecord {
    /// Create a record for a switch first seen on `connection`.
    pub fn new(dpid: DatapathId, connection: ConnectionId) -> Self {
        Self {
            dpid,
            inner: Mutex::new(SwitchState {
                connection,
                descriptor: None,
                ports: Vec::new(),
                last_seen: Instant::now(),
            }),
        }
    }

    /// Datapath identifier.
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Connection currently backing this switch.
    pub fn connection(&self) -> ConnectionId {
        self.lock().connection
    }

    /// Features last reported by the switch, if any.
    pub fn descriptor(&self) -> Option<SwitchDescriptor> {
        self.lock().descriptor.clone()
    }

    /// Ports last reported by the switch.
    pub fn ports(&self) -> Vec<PortDescriptor> {
        self.lock().ports.clone()
    }

    /// When traffic was last seen from the switch.
    pub fn last_seen(&self) -> Instant {
        self.lock().last_seen
    }

    /// Record a fresh features interpretation.
    pub fn update_features(&self, descriptor: &SwitchDescriptor) {
        let mut state = self.lock();
        if !descriptor.ports.is_empty() {
            state.ports = descriptor.ports.clone();
        }
        state.descriptor = Some(descriptor.clone());
        state.last_seen = Instant::now();
    }

    /// Record ports reported out-of-band (port-description reply).
    pub fn update_ports(&self, ports: Vec<PortDescriptor>) {
        let mut state = self.lock();
        state.ports = ports;
        state.last_seen = Instant::now();
    }

    /// Refresh the last-seen timestamp.
    pub fn update_last_seen(&self) {
        self.lock().last_seen = Instant::now();
    }

    /// Rebind the switch to a new connection (switch reconnected).
    pub fn rebind(&self, connection: ConnectionId) {
        self.lock().connection = connection;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SwitchState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registry of switches, owned by the enclosing controller.
pub trait SwitchRegistry: Send + Sync {
    /// Fetch the switch for `dpid`, creating it bound to `connection` if it
    /// is not yet known. A known switch is rebound to the new connection.
    fn get_or_create_switch(
        &self,
        dpid: DatapathId,
        connection: ConnectionId,
    ) -> Arc<SwitchRecord>;

    /// Fetch a switch by datapath id.
    fn get_switch_by_id(&self, dpid: DatapathId) -> Option<Arc<SwitchRecord>>;
}

/// Process-local [`SwitchRegistry`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    switches: RwLock<HashMap<DatapathId, Arc<SwitchRecord>>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known switches.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no switch is known yet.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<DatapathId, Arc<SwitchRecord>>> {
        self.switches
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SwitchRegistry for MemoryRegistry {
    fn get_or_create_switch(
        &self,
        dpid: DatapathId,
        connection: ConnectionId,
    ) -> Arc<SwitchRecord> {
        let mut switches = self
            .switches
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = switches
            .entry(dpid)
            .or_insert_with(|| Arc::new(SwitchRecord::new(dpid, connection)));
        record.rebind(connection);
        Arc::clone(record)
    }

    fn get_switch_by_id(&self, dpid: DatapathId) -> Option<Arc<SwitchRecord>> {
        self.read().get(&dpid).cloned()
    }
}
