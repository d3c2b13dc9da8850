//! In-memory platform used by the integration tests.
//!
//! Holds one datacenter `DC1` with datastore `ds-01`, a VM `Folder/VM1`
//! (`vm-42`) and a few networks. Every call is recorded by name.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use vcon_vsphere::error::{VsphereError, VsphereResult};
use vcon_vsphere::platform::Platform;
use vcon_vsphere::session::{Session, SessionOptions};
use vcon_vsphere::types::*;

pub const DC: &str = "DC1";
pub const DATASTORE: &str = "ds-01";
pub const VM_PATH: &str = "Folder/VM1";

pub fn vm_ref() -> ManagedObjectReference {
    ManagedObjectReference::vm("vm-42")
}

pub fn network_ref(id: &str) -> ManagedObjectReference {
    ManagedObjectReference::new("Network", id)
}

/// A vmxnet3 adapter attached to the standard port group `network`.
pub fn nic(key: i32, network: &str) -> VirtualDevice {
    VirtualDevice::from_json(json!({
        "_typeName": "VirtualVmxnet3",
        "key": key,
        "deviceInfo": {"label": format!("Network adapter {}", key - 3999), "summary": network},
        "backing": {"_typeName": "VirtualEthernetCardNetworkBackingInfo", "deviceName": network},
        "macAddress": format!("00:50:56:00:00:{:02x}", key - 3999),
    }))
}

#[derive(Debug)]
pub struct FakeState {
    pub objects: HashMap<String, ManagedObjectReference>,
    pub names: HashMap<ManagedObjectReference, String>,
    pub inventory_paths: HashMap<ManagedObjectReference, String>,
    pub power_state: VmPowerState,
    pub annotation: String,
    pub networks: Vec<ManagedObjectReference>,
    pub devices: Vec<VirtualDevice>,
    pub summary: VmSummaryConfig,
    pub guest: GuestInfo,
    pub snapshot: SnapshotInfo,

    /// Adapter keys whose edit task fails
    pub failing_device_edits: HashSet<i32>,
    /// Networks whose backing cannot be derived
    pub unsupported_networks: HashSet<ManagedObjectReference>,
    /// Polls answering `running` before a task settles
    pub running_polls: u32,
    /// Delay of every `task_info` call
    pub task_info_delay: Option<Duration>,
    /// Overrides the outcome of every task
    pub task_error: Option<String>,

    pub calls: Vec<String>,
    pub annotations: Vec<String>,
    pub reconfigures: Vec<(Option<u32>, Option<u64>)>,
    pub edited_devices: Vec<VirtualDevice>,
    pub clones: Vec<(String, ManagedObjectReference, ManagedObjectReference)>,
    pub renames: Vec<String>,
    pub moves: Vec<ManagedObjectReference>,
    pub snapshots_created: Vec<String>,
    tasks: HashMap<String, (u32, TaskState)>,
    next_task: u32,
}

pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert("/DC1".into(), ManagedObjectReference::new("Datacenter", "datacenter-2"));
        objects.insert(
            "/DC1/datastore/ds-01".into(),
            ManagedObjectReference::new("Datastore", "datastore-11"),
        );
        objects.insert("/DC1/vm/Folder/VM1".into(), vm_ref());
        objects.insert("/DC1/vm/Folder".into(), ManagedObjectReference::new("Folder", "group-v3"));
        objects.insert("/DC1/vm/Archive".into(), ManagedObjectReference::new("Folder", "group-v9"));
        objects.insert("/DC1/network/Old".into(), network_ref("network-1"));
        objects.insert("/DC1/network/New".into(), network_ref("network-2"));
        objects.insert(
            "/DC1/host/Cluster/Resources/Gold".into(),
            ManagedObjectReference::new("ResourcePool", "resgroup-20"),
        );

        let mut names = HashMap::new();
        names.insert(network_ref("network-1"), "Old".to_string());
        names.insert(network_ref("network-2"), "New".to_string());

        let mut inventory_paths = HashMap::new();
        inventory_paths.insert(vm_ref(), "/DC1/vm/Folder/VM1".to_string());

        Self {
            state: Mutex::new(FakeState {
                objects,
                names,
                inventory_paths,
                power_state: VmPowerState::PoweredOff,
                annotation: String::new(),
                networks: vec![network_ref("network-1")],
                devices: vec![nic(4000, "Old")],
                summary: VmSummaryConfig { num_cpu: 2, memory_size_mb: 4096 },
                guest: GuestInfo::default(),
                snapshot: SnapshotInfo::default(),
                failing_device_edits: HashSet::new(),
                unsupported_networks: HashSet::new(),
                running_polls: 0,
                task_info_delay: None,
                task_error: None,
                calls: Vec::new(),
                annotations: Vec::new(),
                reconfigures: Vec::new(),
                edited_devices: Vec::new(),
                clones: Vec::new(),
                renames: Vec::new(),
                moves: Vec::new(),
                snapshots_created: Vec::new(),
                tasks: HashMap::new(),
                next_task: 1,
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Calls recorded so far, excluding task polls.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.iter().filter(|c| *c != "task_info").cloned().collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str) -> MutexGuard<'_, FakeState> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        state
    }

    fn submit(state: &mut FakeState, outcome: TaskState) -> VsphereResult<TaskHandle> {
        let id = format!("task-{}", state.next_task);
        state.next_task += 1;
        let outcome = match &state.task_error {
            Some(message) => TaskState::Error { localized_message: message.clone() },
            None => outcome,
        };
        state.tasks.insert(id.clone(), (state.running_polls, outcome));
        Ok(TaskHandle(ManagedObjectReference::task(id)))
    }

    fn ok() -> TaskState {
        TaskState::Success(TaskResult::Void)
    }
}

pub async fn session(platform: FakePlatform) -> Session<FakePlatform> {
    session_with(platform, Duration::from_secs(30)).await
}

pub async fn session_with(platform: FakePlatform, timeout: Duration) -> Session<FakePlatform> {
    let options = SessionOptions { timeout, poll_interval: Duration::from_millis(50) };
    Session::establish(platform, DC, DATASTORE, options).await.unwrap()
}

#[async_trait]
impl Platform for FakePlatform {
    async fn find_by_inventory_path(
        &self,
        path: &str,
    ) -> VsphereResult<Option<ManagedObjectReference>> {
        Ok(self.record("find_by_inventory_path").objects.get(path).cloned())
    }

    async fn default_resource_pool(
        &self,
        _datacenter: &ManagedObjectReference,
    ) -> VsphereResult<ManagedObjectReference> {
        self.record("default_resource_pool");
        Ok(ManagedObjectReference::new("ResourcePool", "resgroup-8"))
    }

    async fn retrieve_vm_properties(
        &self,
        _vm: &ManagedObjectReference,
        properties: &[VmProperty],
    ) -> VsphereResult<VmProperties> {
        let state = self.record("retrieve_vm_properties");
        let mut out = VmProperties::default();
        for p in properties {
            match p {
                VmProperty::Annotation => out.annotation = Some(state.annotation.clone()),
                VmProperty::Network => out.networks = Some(state.networks.clone()),
                VmProperty::Summary => out.summary = Some(state.summary.clone()),
                VmProperty::Snapshot => out.snapshot = Some(state.snapshot.clone()),
            }
        }
        Ok(out)
    }

    async fn object_names(
        &self,
        objects: &[ManagedObjectReference],
    ) -> VsphereResult<Vec<String>> {
        let state = self.record("object_names");
        objects
            .iter()
            .map(|o| {
                state
                    .names
                    .get(o)
                    .cloned()
                    .ok_or_else(|| VsphereError::not_found(format!("no name for {o}")))
            })
            .collect()
    }

    async fn inventory_path(&self, object: &ManagedObjectReference) -> VsphereResult<String> {
        let state = self.record("inventory_path");
        state
            .inventory_paths
            .get(object)
            .cloned()
            .ok_or_else(|| VsphereError::not_found(format!("no path for {object}")))
    }

    async fn power_state(&self, _vm: &ManagedObjectReference) -> VsphereResult<VmPowerState> {
        Ok(self.record("power_state").power_state)
    }

    async fn guest_info(&self, _vm: &ManagedObjectReference) -> VsphereResult<GuestInfo> {
        Ok(self.record("guest_info").guest.clone())
    }

    async fn devices(&self, _vm: &ManagedObjectReference) -> VsphereResult<Vec<VirtualDevice>> {
        Ok(self.record("devices").devices.clone())
    }

    async fn network_backing(
        &self,
        network: &ManagedObjectReference,
    ) -> VsphereResult<BackingInfo> {
        let state = self.record("network_backing");
        if state.unsupported_networks.contains(network) {
            return Err(VsphereError::other(format!("unsupported network type of {network}")));
        }
        let name = state
            .names
            .get(network)
            .cloned()
            .ok_or_else(|| VsphereError::not_found(format!("no network {network}")))?;
        Ok(BackingInfo::Network { device_name: name, network: Some(network.clone()) })
    }

    async fn reconfigure(
        &self,
        _vm: &ManagedObjectReference,
        num_cpus: Option<u32>,
        memory_mb: Option<u64>,
        annotation: Option<String>,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("reconfigure");
        match annotation {
            Some(a) => state.annotations.push(a),
            None => state.reconfigures.push((num_cpus, memory_mb)),
        }
        Self::submit(&mut state, Self::ok())
    }

    async fn edit_device(
        &self,
        _vm: &ManagedObjectReference,
        device: &VirtualDevice,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("edit_device");
        let outcome = if state.failing_device_edits.contains(&device.key) {
            TaskState::Error {
                localized_message: format!("Invalid configuration for device '{}'.", device.key),
            }
        } else {
            state.edited_devices.push(device.clone());
            Self::ok()
        };
        Self::submit(&mut state, outcome)
    }

    async fn clone_vm(
        &self,
        _vm: &ManagedObjectReference,
        folder: &ManagedObjectReference,
        name: &str,
        _datastore: &ManagedObjectReference,
        pool: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("clone_vm");
        state.clones.push((name.to_string(), folder.clone(), pool.clone()));
        let created = ManagedObjectReference::vm("vm-100");
        Self::submit(&mut state, TaskState::Success(TaskResult::Reference(created)))
    }

    async fn destroy(&self, _vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        let mut state = self.record("destroy");
        Self::submit(&mut state, Self::ok())
    }

    async fn power_on(&self, _vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        let mut state = self.record("power_on");
        state.power_state = VmPowerState::PoweredOn;
        Self::submit(&mut state, Self::ok())
    }

    async fn power_off(&self, _vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        let mut state = self.record("power_off");
        state.power_state = VmPowerState::PoweredOff;
        Self::submit(&mut state, Self::ok())
    }

    async fn suspend(&self, _vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        let mut state = self.record("suspend");
        state.power_state = VmPowerState::Suspended;
        Self::submit(&mut state, Self::ok())
    }

    async fn rename(&self, _vm: &ManagedObjectReference, name: &str) -> VsphereResult<TaskHandle> {
        let mut state = self.record("rename");
        state.renames.push(name.to_string());
        Self::submit(&mut state, Self::ok())
    }

    async fn move_into_folder(
        &self,
        folder: &ManagedObjectReference,
        _vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("move_into_folder");
        state.moves.push(folder.clone());
        Self::submit(&mut state, Self::ok())
    }

    async fn create_snapshot(
        &self,
        _vm: &ManagedObjectReference,
        name: &str,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("create_snapshot");
        state.snapshots_created.push(name.to_string());
        let created = ManagedObjectReference::snapshot("snapshot-77");
        Self::submit(&mut state, TaskState::Success(TaskResult::Reference(created)))
    }

    async fn remove_snapshot(
        &self,
        _snapshot: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("remove_snapshot");
        Self::submit(&mut state, Self::ok())
    }

    async fn remove_all_snapshots(
        &self,
        _vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("remove_all_snapshots");
        Self::submit(&mut state, Self::ok())
    }

    async fn revert_to_current_snapshot(
        &self,
        _vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("revert_to_current_snapshot");
        Self::submit(&mut state, Self::ok())
    }

    async fn revert_to_snapshot(
        &self,
        _snapshot: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let mut state = self.record("revert_to_snapshot");
        Self::submit(&mut state, Self::ok())
    }

    async fn task_info(&self, task: &TaskHandle) -> VsphereResult<TaskState> {
        let delay = self.record("task_info").task_info_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        let (pending, outcome) = state
            .tasks
            .get_mut(&task.0.value)
            .ok_or_else(|| VsphereError::not_found(format!("no task {}", task.0)))?;
        if *pending > 0 {
            *pending -= 1;
            return Ok(TaskState::Running);
        }
        Ok(outcome.clone())
    }
}
