//! VM lifecycle verbs.
//!
//! Each verb opens one deadline scope, issues its remote calls through it,
//! and classifies the outcome at the edge with [`VsphereError::during`].

use std::future::Future;

use log::{info, warn};
use serde::Serialize;

use crate::deadline::Deadline;
use crate::devices::{NetworkChangeReport, NetworkReconfigurer};
use crate::error::{VsphereError, VsphereResult};
use crate::platform::Platform;
use crate::resolver::VirtualMachine;
use crate::session::Session;
use crate::types::*;

/// What `configure` changed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureOutcome {
    /// CPU and/or memory were reconfigured
    pub hardware_changed: bool,
    /// Present when adapters were moved to another network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkChangeReport>,
}

/// Annotation text to submit for a note.
pub fn compose_note(existing: &str, note: &str, overwrite: bool) -> String {
    if overwrite || existing.is_empty() {
        note.to_string()
    } else {
        format!("{existing}\n\n{note}")
    }
}

/// High-level VM operations backed by a [`Session`].
pub struct VmManager<'a, P> {
    session: &'a Session<P>,
}

impl<'a, P: Platform> VmManager<'a, P> {
    pub fn new(session: &'a Session<P>) -> Self {
        Self { session }
    }

    fn platform(&self) -> &P {
        self.session.platform()
    }

    /// Run `op` inside a fresh deadline scope and classify its failure.
    async fn scoped<T, F, Fut>(&self, action: &str, op: F) -> VsphereResult<T>
    where
        F: FnOnce(Deadline) -> Fut,
        Fut: Future<Output = VsphereResult<T>>,
    {
        op(self.session.deadline()).await.map_err(|e| e.during(action))
    }

    async fn submit(
        &self,
        deadline: &Deadline,
        call: impl Future<Output = VsphereResult<TaskHandle>>,
    ) -> VsphereResult<()> {
        let submission = deadline.run(call).await;
        self.session.finish_task(deadline, submission).await
    }

    // ── State ───────────────────────────────────────────────────────

    /// Live power state.
    pub async fn power_state(&self, vm: &VirtualMachine) -> VsphereResult<VmPowerState> {
        self.scoped("get power state of VM", |deadline| async move {
            deadline.run(self.platform().power_state(&vm.reference)).await
        })
        .await
    }

    /// Fail with a precondition error unless the VM is powered off.
    pub async fn require_powered_off(&self, vm: &VirtualMachine, message: &str) -> VsphereResult<()> {
        match self.power_state(vm).await? {
            VmPowerState::PoweredOff => Ok(()),
            _ => Err(VsphereError::precondition(message)),
        }
    }

    // ── Clone / Configure / Destroy ─────────────────────────────────

    /// Clone `vm` as `name` into folder `destination` on the session's
    /// datastore. An empty `resource_pool` selects the default pool.
    pub async fn clone(
        &self,
        vm: &VirtualMachine,
        name: &str,
        destination: &str,
        resource_pool: &str,
    ) -> VsphereResult<VirtualMachine> {
        let platform = self.platform();
        let paths = self.session.paths();

        self.scoped("clone VM", |deadline| async move {
            let pool = match resource_pool {
                "" => {
                    deadline
                        .run(platform.default_resource_pool(&self.session.datacenter().reference))
                        .await
                }
                named => deadline
                    .run(platform.find_by_inventory_path(&paths.resource_pool(named)))
                    .await
                    .and_then(|found| {
                        found.ok_or_else(|| VsphereError::not_found("no such resource pool"))
                    }),
            }
            .map_err(|e| e.context(format!("While getting resource pool named '{resource_pool}'")))?;

            let folder = deadline
                .run(platform.find_by_inventory_path(&paths.to_inventory(destination)))
                .await?
                .ok_or_else(|| {
                    VsphereError::not_found(format!("Failed to find folder '{destination}'"))
                })?;

            info!("cloning {} as '{name}' into '{destination}'", vm.reference);
            let submission = deadline
                .run(platform.clone_vm(
                    &vm.reference,
                    &folder,
                    name,
                    self.session.datastore(),
                    &pool,
                ))
                .await;
            let created: ManagedObjectReference = self
                .session
                .finish_task(&deadline, submission)
                .await
                .map_err(|e| e.context("Error while cloning"))?;

            Ok(VirtualMachine::from_reference(created))
        })
        .await
    }

    /// Apply a sparse configuration patch. Absent fields are left as is;
    /// an empty patch makes no remote calls.
    pub async fn configure(
        &self,
        vm: &VirtualMachine,
        config: &VirtualMachineConfiguration,
    ) -> VsphereResult<ConfigureOutcome> {
        if config.is_empty() {
            return Ok(ConfigureOutcome::default());
        }

        self.scoped("reconfigure VM", |deadline| async move {
            let mut outcome = ConfigureOutcome::default();

            if config.cpus.is_some() || config.memory.is_some() {
                self.submit(
                    &deadline,
                    self.platform().reconfigure(&vm.reference, config.cpus, config.memory, None),
                )
                .await
                .map_err(|e| e.context("While changing CPU / memory"))?;
                outcome.hardware_changed = true;
            }

            if let Some(network) = &config.network {
                outcome.network = NetworkReconfigurer::new(self.session, &deadline)
                    .apply(vm, network)
                    .await
                    .map_err(|e| e.context("While changing network"))?;
            }

            Ok(outcome)
        })
        .await
    }

    /// Destroy a powered-off VM.
    pub async fn destroy(&self, vm: &VirtualMachine) -> VsphereResult<()> {
        self.scoped("destroy VM", |deadline| async move {
            let state = deadline
                .run(self.platform().power_state(&vm.reference))
                .await
                .map_err(|e| e.context("While getting power state"))?;
            if state != VmPowerState::PoweredOff {
                return Err(VsphereError::precondition("Cannot destroy a VM that is not powered off"));
            }
            self.submit(&deadline, self.platform().destroy(&vm.reference)).await
        })
        .await
    }

    // ── Power ───────────────────────────────────────────────────────

    /// Power on and wait until the guest reports an IP address.
    pub async fn ensure_on(&self, vm: &VirtualMachine) -> VsphereResult<String> {
        self.scoped("power on VM", |deadline| async move {
            self.submit(&deadline, self.platform().power_on(&vm.reference)).await?;
            let ip = self
                .wait_for_ip(&deadline, &vm.reference)
                .await
                .map_err(|e| e.context("While waiting for an IP address"))?;
            info!("VM {} is up at {ip}", vm.reference);
            Ok(ip)
        })
        .await
    }

    pub async fn ensure_off(&self, vm: &VirtualMachine) -> VsphereResult<()> {
        self.scoped("power off VM", |deadline| async move {
            self.submit(&deadline, self.platform().power_off(&vm.reference)).await
        })
        .await
    }

    pub async fn suspend(&self, vm: &VirtualMachine) -> VsphereResult<()> {
        self.scoped("suspend VM", |deadline| async move {
            self.submit(&deadline, self.platform().suspend(&vm.reference)).await
        })
        .await
    }

    async fn wait_for_ip(
        &self,
        deadline: &Deadline,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<String> {
        loop {
            let guest = deadline.run(self.platform().guest_info(vm)).await?;
            if let Some(ip) = guest.ip_address.filter(|ip| !ip.is_empty()) {
                return Ok(ip);
            }
            deadline.sleep(self.session.options().poll_interval).await?;
        }
    }

    async fn wait_for_addresses(
        &self,
        deadline: &Deadline,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<Vec<String>> {
        loop {
            let addresses = deadline.run(self.platform().guest_info(vm)).await?.addresses();
            if !addresses.is_empty() {
                return Ok(addresses);
            }
            deadline.sleep(self.session.options().poll_interval).await?;
        }
    }

    // ── Note / Relocate ─────────────────────────────────────────────

    /// Set or append to the VM's annotation.
    ///
    /// Appending needs the annotation in the VM's property snapshot
    /// (resolve with [`VmProperty::Annotation`]).
    pub async fn assign_note(
        &self,
        vm: &VirtualMachine,
        note: &str,
        overwrite: bool,
    ) -> VsphereResult<()> {
        let existing = match vm.properties().and_then(|p| p.annotation.as_deref()) {
            Some(existing) => existing,
            None if overwrite => "",
            None => {
                return Err(VsphereError::other(
                    "Cannot append a note: the VM annotation was not fetched",
                ))
            }
        };
        let annotation = compose_note(existing, note, overwrite);

        self.scoped("assign note to VM", |deadline| async move {
            self.submit(
                &deadline,
                self.platform().reconfigure(&vm.reference, None, None, Some(annotation)),
            )
            .await
        })
        .await
    }

    /// Rename and/or move into another folder within one deadline.
    ///
    /// The destination folder is resolved before any task is submitted, so
    /// an unknown folder leaves the VM untouched.
    pub async fn relocate(
        &self,
        vm: &VirtualMachine,
        name: Option<&str>,
        destination: Option<&str>,
    ) -> VsphereResult<()> {
        let platform = self.platform();
        self.scoped("relocate VM", |deadline| async move {
            let folder = match destination {
                Some(destination) => {
                    let path = self.session.paths().to_inventory(destination);
                    let folder = deadline
                        .run(platform.find_by_inventory_path(&path))
                        .await?
                        .ok_or_else(|| {
                            VsphereError::not_found(format!("Failed to find folder '{destination}'"))
                        })?;
                    Some((destination, folder))
                }
                None => None,
            };

            if let Some(name) = name {
                self.submit(&deadline, platform.rename(&vm.reference, name))
                    .await
                    .map_err(|e| e.context(format!("While renaming to '{name}'")))?;
            }
            if let Some((destination, folder)) = folder {
                self.submit(&deadline, platform.move_into_folder(&folder, &vm.reference))
                    .await
                    .map_err(|e| e.context(format!("While moving to '{destination}'")))?;
            }
            Ok(())
        })
        .await
    }

    // ── Report ──────────────────────────────────────────────────────

    /// Live report of the VM. Gathering stops at the first failure, which
    /// is logged; whatever was collected up to that point is returned.
    pub async fn report(&self, vm: &VirtualMachine) -> VirtualMachineInfo {
        let mut info = VirtualMachineInfo {
            reference: vm.reference.value.clone(),
            ..Default::default()
        };
        let deadline = self.session.deadline();
        if let Err(e) = self.fill_report(&deadline, vm, &mut info).await {
            warn!("{}", e.during("report VM"));
        }
        info
    }

    async fn fill_report(
        &self,
        deadline: &Deadline,
        vm: &VirtualMachine,
        info: &mut VirtualMachineInfo,
    ) -> VsphereResult<()> {
        let platform = self.platform();

        let state = deadline.run(platform.power_state(&vm.reference)).await?;
        info.is_running = state != VmPowerState::PoweredOff;
        if info.is_running {
            info.ips = self.wait_for_addresses(deadline, &vm.reference).await?;
        }

        let inventory = deadline.run(platform.inventory_path(&vm.reference)).await?;
        info.path = self.session.paths().to_logical(&inventory);

        let props = match vm.properties() {
            Some(p) if p.summary.is_some() && p.networks.is_some() => p.clone(),
            _ => {
                deadline
                    .run(platform.retrieve_vm_properties(
                        &vm.reference,
                        &[VmProperty::Summary, VmProperty::Network],
                    ))
                    .await?
            }
        };
        if let Some(summary) = &props.summary {
            info.configuration.cpus = Some(summary.num_cpu);
            info.configuration.memory = Some(summary.memory_size_mb);
        }
        if let Some(first) = props.networks.as_ref().and_then(|n| n.first()) {
            let names = deadline
                .run(platform.object_names(std::slice::from_ref(first)))
                .await?;
            info.configuration.network = names.into_iter().next();
        }
        Ok(())
    }
}
