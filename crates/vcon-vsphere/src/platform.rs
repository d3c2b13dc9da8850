//! The boundary between the orchestration core and the virtualization host.
//!
//! Every remote interaction goes through [`Platform`]. The core never
//! interprets references beyond comparing and rendering them; lookups
//! answer `None` for "not found" and task submissions answer a
//! [`TaskHandle`] that is polled through [`Platform::task_info`].

use async_trait::async_trait;

use crate::error::VsphereResult;
use crate::types::*;

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    // ── Lookups ─────────────────────────────────────────────────────

    /// Resolve a full inventory path (`/DC/vm/Folder/VM`).
    async fn find_by_inventory_path(
        &self,
        path: &str,
    ) -> VsphereResult<Option<ManagedObjectReference>>;

    /// The root resource pool of the datacenter's first compute resource.
    async fn default_resource_pool(
        &self,
        datacenter: &ManagedObjectReference,
    ) -> VsphereResult<ManagedObjectReference>;

    /// One batched retrieval of the requested VM properties.
    async fn retrieve_vm_properties(
        &self,
        vm: &ManagedObjectReference,
        properties: &[VmProperty],
    ) -> VsphereResult<VmProperties>;

    /// Names of the given objects, in order.
    async fn object_names(
        &self,
        objects: &[ManagedObjectReference],
    ) -> VsphereResult<Vec<String>>;

    /// Full inventory path of an object, datacenter prefix included.
    async fn inventory_path(&self, object: &ManagedObjectReference) -> VsphereResult<String>;

    async fn power_state(&self, vm: &ManagedObjectReference) -> VsphereResult<VmPowerState>;

    async fn guest_info(&self, vm: &ManagedObjectReference) -> VsphereResult<GuestInfo>;

    // ── Devices / networks ──────────────────────────────────────────

    async fn devices(&self, vm: &ManagedObjectReference) -> VsphereResult<Vec<VirtualDevice>>;

    /// The backing descriptor an adapter needs to attach to `network`.
    async fn network_backing(
        &self,
        network: &ManagedObjectReference,
    ) -> VsphereResult<BackingInfo>;

    // ── Task submissions ────────────────────────────────────────────

    /// Reconfigure hardware / annotation. `None` fields are not sent.
    async fn reconfigure(
        &self,
        vm: &ManagedObjectReference,
        num_cpus: Option<u32>,
        memory_mb: Option<u64>,
        annotation: Option<String>,
    ) -> VsphereResult<TaskHandle>;

    async fn edit_device(
        &self,
        vm: &ManagedObjectReference,
        device: &VirtualDevice,
    ) -> VsphereResult<TaskHandle>;

    async fn clone_vm(
        &self,
        vm: &ManagedObjectReference,
        folder: &ManagedObjectReference,
        name: &str,
        datastore: &ManagedObjectReference,
        pool: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle>;

    async fn destroy(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle>;

    async fn power_on(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle>;

    async fn power_off(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle>;

    async fn suspend(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle>;

    async fn rename(&self, vm: &ManagedObjectReference, name: &str) -> VsphereResult<TaskHandle>;

    async fn move_into_folder(
        &self,
        folder: &ManagedObjectReference,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle>;

    /// Standard snapshot: no memory, no quiescing.
    async fn create_snapshot(
        &self,
        vm: &ManagedObjectReference,
        name: &str,
    ) -> VsphereResult<TaskHandle>;

    /// Remove one snapshot (children kept, disks consolidated).
    async fn remove_snapshot(
        &self,
        snapshot: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle>;

    /// Remove every snapshot (disks consolidated).
    async fn remove_all_snapshots(
        &self,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle>;

    /// Revert to the current snapshot without powering on.
    async fn revert_to_current_snapshot(
        &self,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle>;

    /// Revert to `snapshot` without powering on.
    async fn revert_to_snapshot(
        &self,
        snapshot: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle>;

    // ── Tasks ───────────────────────────────────────────────────────

    async fn task_info(&self, task: &TaskHandle) -> VsphereResult<TaskState>;
}
