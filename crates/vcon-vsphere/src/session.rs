//! An explicitly constructed, authenticated session.
//!
//! Every manager borrows the [`Session`]; there is no process-wide
//! connection state.

use std::time::Duration;

use log::info;

use crate::deadline::Deadline;
use crate::error::{VsphereError, VsphereResult};
use crate::inventory::InventoryPaths;
use crate::platform::Platform;
use crate::resolver::VmResolver;
use crate::snapshot::SnapshotManager;
use crate::task::{finish_task, TaskOutput};
use crate::types::{ManagedObjectReference, TaskHandle, VsphereConfig};
use crate::vm::VmManager;
use crate::vsphere::VsphereClient;

/// Timing knobs shared by every operation of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Deadline of one operation
    pub timeout: Duration,
    /// Pause between task / guest polls
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datacenter {
    pub name: String,
    pub reference: ManagedObjectReference,
}

pub struct Session<P> {
    platform: P,
    datacenter: Datacenter,
    datastore: ManagedObjectReference,
    options: SessionOptions,
}

impl<P: Platform> Session<P> {
    /// Resolve the datacenter and datastore every operation is scoped to.
    ///
    /// Any failure, timeouts included, is reported as a connection failure.
    pub async fn establish(
        platform: P,
        datacenter: &str,
        datastore: &str,
        options: SessionOptions,
    ) -> VsphereResult<Self> {
        let deadline = Deadline::start(options.timeout);
        let paths = InventoryPaths::new(datacenter);

        let resolved = async {
            let dc = deadline
                .run(platform.find_by_inventory_path(&paths.datacenter()))
                .await?
                .ok_or_else(|| {
                    VsphereError::not_found(format!(
                        "Failed to find data center with name '{datacenter}'"
                    ))
                })?;
            let ds = deadline
                .run(platform.find_by_inventory_path(&paths.datastore(datastore)))
                .await?
                .ok_or_else(|| {
                    VsphereError::not_found(format!(
                        "Failed to find data store with name '{datastore}'"
                    ))
                })?;
            Ok::<_, VsphereError>((dc, ds))
        }
        .await;

        let (dc, ds) = resolved.map_err(|e| {
            VsphereError::connection(e.during("establish connection to vSphere").message)
        })?;

        info!("using datacenter {datacenter} ({dc}) and datastore {datastore} ({ds})");
        Ok(Self {
            platform,
            datacenter: Datacenter {
                name: datacenter.to_string(),
                reference: dc,
            },
            datastore: ds,
            options,
        })
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn datacenter(&self) -> &Datacenter {
        &self.datacenter
    }

    pub fn datastore(&self) -> &ManagedObjectReference {
        &self.datastore
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn paths(&self) -> InventoryPaths<'_> {
        InventoryPaths::new(&self.datacenter.name)
    }

    /// Open the deadline scope of one operation.
    pub fn deadline(&self) -> Deadline {
        Deadline::start(self.options.timeout)
    }

    /// Wait for a submitted task within `deadline`.
    pub async fn finish_task<T: TaskOutput>(
        &self,
        deadline: &Deadline,
        submission: VsphereResult<TaskHandle>,
    ) -> VsphereResult<T> {
        finish_task(&self.platform, deadline, self.options.poll_interval, submission).await
    }

    pub fn resolver(&self) -> VmResolver<'_, P> {
        VmResolver::new(self)
    }

    pub fn vms(&self) -> VmManager<'_, P> {
        VmManager::new(self)
    }

    pub fn snapshots(&self) -> SnapshotManager<'_, P> {
        SnapshotManager::new(self)
    }
}

impl Session<VsphereClient> {
    /// Log in with `config` and establish the session.
    pub async fn connect(config: &VsphereConfig, options: SessionOptions) -> VsphereResult<Self> {
        let mut client = VsphereClient::new(config)?;
        let deadline = Deadline::start(options.timeout);
        deadline.run(client.login()).await.map_err(|e| {
            VsphereError::connection(e.during("establish connection to vSphere").message)
        })?;
        Self::establish(client, &config.datacenter, &config.datastore, options).await
    }

    /// End the session on the host.
    pub async fn close(mut self) -> VsphereResult<()> {
        self.platform.logout().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VsphereErrorKind;
    use crate::platform::MockPlatform;

    fn options() -> SessionOptions {
        SessionOptions { timeout: Duration::from_secs(5), ..Default::default() }
    }

    #[tokio::test]
    async fn establish_resolves_datacenter_and_datastore() {
        let mut platform = MockPlatform::new();
        platform
            .expect_find_by_inventory_path()
            .withf(|p| p == "/DC1")
            .returning(|_| Ok(Some(ManagedObjectReference::new("Datacenter", "datacenter-2"))));
        platform
            .expect_find_by_inventory_path()
            .withf(|p| p == "/DC1/datastore/ds-01")
            .returning(|_| Ok(Some(ManagedObjectReference::new("Datastore", "datastore-11"))));

        let session = Session::establish(platform, "DC1", "ds-01", options()).await.unwrap();
        assert_eq!(session.datacenter().name, "DC1");
        assert_eq!(session.datacenter().reference.value, "datacenter-2");
        assert_eq!(session.datastore().value, "datastore-11");
        assert_eq!(session.paths().to_inventory("VM"), "/DC1/vm/VM");
    }

    #[tokio::test]
    async fn missing_datastore_is_a_connection_failure() {
        let mut platform = MockPlatform::new();
        platform
            .expect_find_by_inventory_path()
            .withf(|p| p == "/DC1")
            .returning(|_| Ok(Some(ManagedObjectReference::new("Datacenter", "datacenter-2"))));
        platform
            .expect_find_by_inventory_path()
            .returning(|_| Ok(None));

        let err = Session::establish(platform, "DC1", "nope", options()).await.err().unwrap();
        assert_eq!(err.kind, VsphereErrorKind::ConnectionError);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "Got error while attempting to establish connection to vSphere: \
             Failed to find data store with name 'nope'"
        );
    }

    #[test]
    fn default_options() {
        let o = SessionOptions::default();
        assert_eq!(o.timeout, Duration::from_secs(30));
        assert_eq!(o.poll_interval, Duration::from_millis(500));
    }
}
