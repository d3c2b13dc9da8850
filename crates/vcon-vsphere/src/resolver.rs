//! Turning a user-supplied target into a VM handle.

use log::debug;

use crate::error::{VsphereError, VsphereResult};
use crate::platform::Platform;
use crate::session::Session;
use crate::types::{ManagedObjectReference, VmProperties, VmProperty};

/// A resolved VM, with the properties fetched at resolve time (if any).
///
/// The property snapshot is never refreshed; operations that depend on
/// live state query it again.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub reference: ManagedObjectReference,
    pub properties: Option<VmProperties>,
}

impl VirtualMachine {
    pub fn from_reference(reference: ManagedObjectReference) -> Self {
        Self { reference, properties: None }
    }

    pub fn properties(&self) -> Option<&VmProperties> {
        self.properties.as_ref()
    }
}

pub struct VmResolver<'a, P> {
    session: &'a Session<P>,
}

impl<'a, P: Platform> VmResolver<'a, P> {
    pub fn new(session: &'a Session<P>) -> Self {
        Self { session }
    }

    /// Resolve `path` (or, with `path_is_ref`, the raw VM id) and fetch
    /// `properties` in one batched call when any are requested.
    pub async fn find_vm(
        &self,
        path: &str,
        path_is_ref: bool,
        properties: &[VmProperty],
    ) -> VsphereResult<VirtualMachine> {
        let deadline = self.session.deadline();
        let platform = self.session.platform();

        let result = async {
            let reference = if path_is_ref {
                ManagedObjectReference::vm(path)
            } else {
                let inventory = self.session.paths().to_inventory(path);
                debug!("looking up VM at {inventory}");
                deadline
                    .run(platform.find_by_inventory_path(&inventory))
                    .await?
                    .ok_or_else(|| {
                        VsphereError::not_found(format!("Failed to find VM with path '{path}'"))
                    })?
            };

            let properties = if properties.is_empty() {
                None
            } else {
                let props = deadline
                    .run(platform.retrieve_vm_properties(&reference, properties))
                    .await
                    .map_err(|e| e.context("While fetching VM properties"))?;
                Some(props)
            };

            Ok::<_, VsphereError>(VirtualMachine { reference, properties })
        }
        .await;

        result.map_err(|e| e.during("find VM"))
    }
}
