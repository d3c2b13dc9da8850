//! Rewiring network adapters onto another network.
//!
//! Every ethernet card attached to the VM's current (first) network is
//! moved onto the requested one. Edits are independent: a failed edit is
//! recorded and the loop carries on, except when the deadline elapses.

use log::{info, warn};
use serde::Serialize;

use crate::deadline::Deadline;
use crate::error::{VsphereError, VsphereResult};
use crate::platform::Platform;
use crate::resolver::VirtualMachine;
use crate::session::Session;
use crate::types::{BackingInfo, ManagedObjectReference, VirtualDevice, VmProperty};

/// An adapter whose edit failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEditFailure {
    pub device_key: i32,
    pub label: Option<String>,
    pub error: String,
}

/// What a network change did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkChangeReport {
    pub from: String,
    pub to: String,
    /// Keys of adapters moved onto the new network
    pub rewired: Vec<i32>,
    pub failed: Vec<DeviceEditFailure>,
}

impl NetworkChangeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Adapters attached to the network described by `current`.
pub fn adapters_on<'d>(
    devices: &'d [VirtualDevice],
    current: &BackingInfo,
) -> Vec<&'d VirtualDevice> {
    devices
        .iter()
        .filter(|d| d.is_ethernet_card())
        .filter(|d| d.backing.as_ref().is_some_and(|b| b.same_network(current)))
        .collect()
}

/// Adapters attached to `network`, judged from each adapter's own backing.
///
/// Used when no backing descriptor can be derived for the network (for
/// example an opaque network); adapters whose backing type is unknown are
/// matched on their device summary.
pub fn adapters_attached_to<'d>(
    devices: &'d [VirtualDevice],
    network: &ManagedObjectReference,
    name: &str,
) -> Vec<&'d VirtualDevice> {
    devices
        .iter()
        .filter(|d| d.is_ethernet_card())
        .filter(|d| match &d.backing {
            Some(BackingInfo::Network { device_name, network: attached }) => {
                attached.as_ref() == Some(network) || device_name == name
            }
            Some(BackingInfo::DistributedPort { portgroup_key, .. }) => {
                *portgroup_key == network.value
            }
            _ => d.summary() == Some(name),
        })
        .collect()
}

pub struct NetworkReconfigurer<'a, P> {
    session: &'a Session<P>,
    deadline: &'a Deadline,
}

impl<'a, P: Platform> NetworkReconfigurer<'a, P> {
    pub fn new(session: &'a Session<P>, deadline: &'a Deadline) -> Self {
        Self { session, deadline }
    }

    /// Move the VM onto `network`. `None` when it is already there.
    pub async fn apply(
        &self,
        vm: &VirtualMachine,
        network: &str,
    ) -> VsphereResult<Option<NetworkChangeReport>> {
        let (current, current_name) = self.current_network(vm).await?;
        if current_name == network {
            info!("VM {} already on network '{network}'", vm.reference);
            return Ok(None);
        }

        let platform = self.session.platform();
        let requested = self
            .deadline
            .run(platform.find_by_inventory_path(&self.session.paths().network(network)))
            .await?
            .ok_or_else(|| {
                VsphereError::not_found(format!("Failed to find requested network '{network}'"))
            })?;

        let target = self
            .deadline
            .run(platform.network_backing(&requested))
            .await
            .map_err(|e| e.context(format!("While getting backing of network '{network}'")))?;
        let old = match self.deadline.run(platform.network_backing(&current)).await {
            Ok(old) => Some(old),
            Err(e) if e.is_deadline() => return Err(e),
            Err(e) => {
                warn!(
                    "No backing for network '{current_name}' ({e}); \
                     matching adapters by their own backing"
                );
                None
            }
        };
        let devices = self
            .deadline
            .run(platform.devices(&vm.reference))
            .await
            .map_err(|e| e.context("While listing VM devices"))?;

        let mut report = NetworkChangeReport {
            from: current_name,
            to: network.to_string(),
            ..Default::default()
        };

        let adapters = match &old {
            Some(old) => adapters_on(&devices, old),
            None => adapters_attached_to(&devices, &current, &report.from),
        };

        for device in adapters {
            let edited = device.with_backing(&target);
            let submission = self.deadline.run(platform.edit_device(&vm.reference, &edited)).await;
            match self.session.finish_task::<()>(self.deadline, submission).await {
                Ok(()) => report.rewired.push(device.key),
                Err(e) if e.is_deadline() => return Err(e),
                Err(e) => {
                    warn!(
                        "Failed to move adapter {} ({}) onto '{network}': {e}",
                        device.key,
                        device.label.as_deref().unwrap_or("unlabelled")
                    );
                    report.failed.push(DeviceEditFailure {
                        device_key: device.key,
                        label: device.label.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(Some(report))
    }

    /// The VM's first network and its name.
    async fn current_network(
        &self,
        vm: &VirtualMachine,
    ) -> VsphereResult<(ManagedObjectReference, String)> {
        let platform = self.session.platform();
        let networks = match vm.properties().and_then(|p| p.networks.clone()) {
            Some(networks) => networks,
            None => self
                .deadline
                .run(platform.retrieve_vm_properties(&vm.reference, &[VmProperty::Network]))
                .await?
                .networks
                .unwrap_or_default(),
        };

        let first = networks
            .into_iter()
            .next()
            .ok_or_else(|| VsphereError::other(format!("VM {} has no network", vm.reference)))?;
        let name = self
            .deadline
            .run(platform.object_names(std::slice::from_ref(&first)))
            .await
            .map_err(|e| e.context("While getting current network name"))?
            .into_iter()
            .next()
            .ok_or_else(|| VsphereError::not_found(format!("No name for network {first}")))?;
        Ok((first, name))
    }
}
