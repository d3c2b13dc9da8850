//! VM snapshot management.

use std::future::Future;

use log::info;

use crate::deadline::Deadline;
use crate::error::{VsphereError, VsphereResult};
use crate::platform::Platform;
use crate::resolver::VirtualMachine;
use crate::session::Session;
use crate::types::*;

/// Snapshots matching `name`, by id, by node name, or by `/`-separated
/// path of names from a root.
pub fn find_in_tree<'t>(roots: &'t [SnapshotTree], name: &str) -> Vec<&'t ManagedObjectReference> {
    fn walk<'t>(
        nodes: &'t [SnapshotTree],
        parent: &str,
        name: &str,
        found: &mut Vec<&'t ManagedObjectReference>,
    ) {
        for node in nodes {
            let path = if parent.is_empty() {
                node.name.clone()
            } else {
                format!("{parent}/{}", node.name)
            };
            if node.snapshot.value == name || node.name == name || path == name {
                found.push(&node.snapshot);
            }
            walk(&node.child_snapshot_list, &path, name, found);
        }
    }

    let mut found = Vec::new();
    walk(roots, "", name, &mut found);
    found
}

/// Snapshot operations on a VM.
pub struct SnapshotManager<'a, P> {
    session: &'a Session<P>,
}

impl<'a, P: Platform> SnapshotManager<'a, P> {
    pub fn new(session: &'a Session<P>) -> Self {
        Self { session }
    }

    async fn submit<T: crate::task::TaskOutput>(
        &self,
        deadline: &Deadline,
        call: impl Future<Output = VsphereResult<TaskHandle>>,
    ) -> VsphereResult<T> {
        let submission = deadline.run(call).await;
        self.session.finish_task(deadline, submission).await
    }

    async fn snapshot_info(
        &self,
        deadline: &Deadline,
        vm: &VirtualMachine,
    ) -> VsphereResult<SnapshotInfo> {
        if let Some(info) = vm.properties().and_then(|p| p.snapshot.clone()) {
            return Ok(info);
        }
        let props = deadline
            .run(
                self.session
                    .platform()
                    .retrieve_vm_properties(&vm.reference, &[VmProperty::Snapshot]),
            )
            .await?;
        Ok(props.snapshot.unwrap_or_default())
    }

    /// Resolve a snapshot of `vm`. With `by_ref`, `name` is the raw id.
    pub async fn find_snapshot(
        &self,
        vm: &VirtualMachine,
        name: &str,
        by_ref: bool,
    ) -> VsphereResult<ManagedObjectReference> {
        if by_ref {
            return Ok(ManagedObjectReference::snapshot(name));
        }

        let deadline = self.session.deadline();
        let result: VsphereResult<ManagedObjectReference> = async {
            let info = self.snapshot_info(&deadline, vm).await?;
            if info.root_snapshot_list.is_empty() {
                return Err(VsphereError::not_found("No snapshots for this VM"));
            }
            match find_in_tree(&info.root_snapshot_list, name).as_slice() {
                [] => Err(VsphereError::not_found(format!("Snapshot '{name}' not found"))),
                [one] => Ok((*one).clone()),
                many => Err(VsphereError::other(format!(
                    "'{name}' resolves to {} snapshots",
                    many.len()
                ))),
            }
        }
        .await;
        result.map_err(|e| e.during("find snapshot"))
    }

    /// Take a snapshot without memory or quiescing.
    pub async fn create(
        &self,
        vm: &VirtualMachine,
        name: &str,
    ) -> VsphereResult<ManagedObjectReference> {
        let deadline = self.session.deadline();
        info!("creating snapshot '{name}' of {}", vm.reference);
        self.submit(&deadline, self.session.platform().create_snapshot(&vm.reference, name))
            .await
            .map_err(|e| e.during("create snapshot"))
    }

    /// The VM's snapshot forest, roots first.
    pub async fn list(&self, vm: &VirtualMachine) -> VsphereResult<Vec<Snapshot>> {
        let deadline = self.session.deadline();
        let info = self
            .snapshot_info(&deadline, vm)
            .await
            .map_err(|e| e.during("list snapshots"))?;
        Ok(info.root_snapshot_list.iter().map(Snapshot::from).collect())
    }

    /// Remove one snapshot, keeping its children.
    pub async fn remove(&self, snapshot: &ManagedObjectReference) -> VsphereResult<()> {
        let deadline = self.session.deadline();
        self.submit(&deadline, self.session.platform().remove_snapshot(snapshot))
            .await
            .map_err(|e| e.during("remove snapshot"))
    }

    pub async fn remove_all(&self, vm: &VirtualMachine) -> VsphereResult<()> {
        let deadline = self.session.deadline();
        self.submit(&deadline, self.session.platform().remove_all_snapshots(&vm.reference))
            .await
            .map_err(|e| e.during("remove all snapshots"))
    }

    /// Revert to the current snapshot. The VM is not powered on.
    pub async fn revert(&self, vm: &VirtualMachine) -> VsphereResult<()> {
        let deadline = self.session.deadline();
        self.submit(&deadline, self.session.platform().revert_to_current_snapshot(&vm.reference))
            .await
            .map_err(|e| e.during("revert to current snapshot"))
    }

    pub async fn revert_to(&self, snapshot: &ManagedObjectReference) -> VsphereResult<()> {
        let deadline = self.session.deadline();
        self.submit(&deadline, self.session.platform().revert_to_snapshot(snapshot))
            .await
            .map_err(|e| e.during("revert to snapshot"))
    }
}

/// Output record for a freshly created snapshot.
pub fn report_snapshot(name: &str, snapshot: &ManagedObjectReference) -> Snapshot {
    Snapshot {
        name: name.to_string(),
        reference: snapshot.value.clone(),
        children: Vec::new(),
    }
}
