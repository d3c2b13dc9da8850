//! Shared types for vSphere VM orchestration.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for connecting to a vCenter / ESXi host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfig {
    /// vCenter or ESXi hostname / IP (e.g. "vcenter.lab.local")
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "administrator@vsphere.local")
    pub username: String,
    /// Password
    pub password: String,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// Datacenter every path is resolved against
    pub datacenter: String,
    /// Datastore clones are placed on
    pub datastore: String,
    /// Deadline for each operation, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// VI/JSON API release segment (e.g. "8.0.1.0")
    #[serde(default = "default_release")]
    pub release: String,
}

fn default_port() -> u16 { 443 }
fn default_timeout() -> u64 { 30 }
fn default_release() -> String { "8.0.1.0".to_string() }

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 443,
            username: String::new(),
            password: String::new(),
            insecure: false,
            datacenter: String::new(),
            datastore: String::new(),
            timeout_secs: 30,
            release: default_release(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Managed object references
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque reference to an object on the host (VM, snapshot, folder, ...).
///
/// Serialises with the `_typeName` discriminator the VI/JSON API expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ManagedObjectReference {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self { kind: kind.into(), value: value.into() }
    }

    pub fn vm(value: impl Into<String>) -> Self {
        Self::new("VirtualMachine", value)
    }

    pub fn snapshot(value: impl Into<String>) -> Self {
        Self::new("VirtualMachineSnapshot", value)
    }

    pub fn task(value: impl Into<String>) -> Self {
        Self::new("Task", value)
    }
}

impl Serialize for ManagedObjectReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ManagedObjectReference", 3)?;
        s.serialize_field("_typeName", "ManagedObjectReference")?;
        s.serialize_field("type", &self.kind)?;
        s.serialize_field("value", &self.value)?;
        s.end()
    }
}

impl std::fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Power State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum VmPowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    #[default]
    #[serde(other)]
    Unknown,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM property snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Properties that can be eager-fetched when resolving a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmProperty {
    Annotation,
    Network,
    Summary,
    Snapshot,
}

impl VmProperty {
    /// Property path on the `VirtualMachine` managed object.
    pub fn path(self) -> &'static str {
        match self {
            Self::Annotation => "config.annotation",
            Self::Network => "network",
            Self::Summary => "summary",
            Self::Snapshot => "snapshot",
        }
    }
}

/// Properties fetched once at resolve time. Never refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VmProperties {
    pub annotation: Option<String>,
    pub networks: Option<Vec<ManagedObjectReference>>,
    pub summary: Option<VmSummaryConfig>,
    pub snapshot: Option<SnapshotInfo>,
}

/// CPU / memory part of the VM summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSummaryConfig {
    #[serde(default)]
    pub num_cpu: u32,
    #[serde(default, rename = "memorySizeMB")]
    pub memory_size_mb: u64,
}

/// The VM's `snapshot` property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    #[serde(default)]
    pub current_snapshot: Option<ManagedObjectReference>,
    #[serde(default)]
    pub root_snapshot_list: Vec<SnapshotTree>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTree {
    pub snapshot: ManagedObjectReference,
    pub name: String,
    #[serde(default)]
    pub child_snapshot_list: Vec<SnapshotTree>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Configuration patch / reports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sparse hardware patch: an absent field is left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachineConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    /// Memory size in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl VirtualMachineConfiguration {
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.memory.is_none() && self.network.is_none()
    }
}

/// Reporting view assembled from live queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInfo {
    pub configuration: VirtualMachineConfiguration,
    pub ips: Vec<String>,
    pub is_running: bool,
    pub path: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// A node in a VM's snapshot tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Snapshot>,
}

impl From<&SnapshotTree> for Snapshot {
    fn from(tree: &SnapshotTree) -> Self {
        Self {
            name: tree.name.clone(),
            reference: tree.snapshot.value.clone(),
            children: tree.child_snapshot_list.iter().map(Snapshot::from).collect(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle to a submitted host-side task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle(pub ManagedObjectReference);

/// Raw payload of a successful task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Void,
    Reference(ManagedObjectReference),
    Value(Value),
}

impl TaskResult {
    pub fn from_json(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Void,
            Some(v) if v.get("_typeName").and_then(Value::as_str) == Some("ManagedObjectReference") => {
                match serde_json::from_value(v.clone()) {
                    Ok(moref) => Self::Reference(moref),
                    Err(_) => Self::Value(v),
                }
            }
            Some(v) => Self::Value(v),
        }
    }
}

/// State of a task as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Queued,
    Running,
    Success(TaskResult),
    Error { localized_message: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Guest
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Subset of the VM's `guest` property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestInfo {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub net: Vec<GuestNicInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestNicInfo {
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Vec<String>,
}

impl GuestInfo {
    /// Every address reported across the guest's NICs.
    pub fn addresses(&self) -> Vec<String> {
        self.net.iter().flat_map(|n| n.ip_address.iter().cloned()).collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Virtual devices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `VirtualEthernetCard` subtypes.
pub const ETHERNET_CARD_TYPES: &[&str] = &[
    "VirtualE1000",
    "VirtualE1000e",
    "VirtualPCNet32",
    "VirtualVmxnet",
    "VirtualVmxnet2",
    "VirtualVmxnet3",
    "VirtualVmxnet3Vrdma",
    "VirtualSriovEthernetCard",
];

/// What a network adapter is attached to.
#[derive(Debug, Clone, PartialEq)]
pub enum BackingInfo {
    /// Standard switch port group, matched by name
    Network {
        device_name: String,
        network: Option<ManagedObjectReference>,
    },
    /// Distributed switch port group
    DistributedPort {
        switch_uuid: String,
        portgroup_key: String,
    },
    Other(Value),
}

impl BackingInfo {
    pub fn from_json(value: &Value) -> Self {
        let type_name = value.get("_typeName").and_then(Value::as_str).unwrap_or_default();
        match type_name {
            "VirtualEthernetCardNetworkBackingInfo" => Self::Network {
                device_name: value
                    .get("deviceName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                network: value
                    .get("network")
                    .and_then(|n| serde_json::from_value(n.clone()).ok()),
            },
            "VirtualEthernetCardDistributedVirtualPortBackingInfo" => {
                let port = value.get("port").cloned().unwrap_or(Value::Null);
                let field = |name: &str| {
                    port.get(name).and_then(Value::as_str).unwrap_or_default().to_string()
                };
                Self::DistributedPort {
                    switch_uuid: field("switchUuid"),
                    portgroup_key: field("portgroupKey"),
                }
            }
            _ => Self::Other(value.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Network { device_name, network } => {
                let mut v = json!({
                    "_typeName": "VirtualEthernetCardNetworkBackingInfo",
                    "deviceName": device_name,
                });
                if let Some(n) = network {
                    v["network"] = json!(n);
                }
                v
            }
            Self::DistributedPort { switch_uuid, portgroup_key } => json!({
                "_typeName": "VirtualEthernetCardDistributedVirtualPortBackingInfo",
                "port": {
                    "_typeName": "DistributedVirtualSwitchPortConnection",
                    "switchUuid": switch_uuid,
                    "portgroupKey": portgroup_key,
                },
            }),
            Self::Other(v) => v.clone(),
        }
    }

    /// Whether both descriptors attach to the same network.
    pub fn same_network(&self, other: &BackingInfo) -> bool {
        match (self, other) {
            (Self::Network { device_name: a, .. }, Self::Network { device_name: b, .. }) => a == b,
            (
                Self::DistributedPort { switch_uuid: sa, portgroup_key: pa },
                Self::DistributedPort { switch_uuid: sb, portgroup_key: pb },
            ) => sa == sb && pa == pb,
            _ => false,
        }
    }
}

/// A virtual device as listed in the VM's hardware.
///
/// The raw JSON is kept so an edit sends the device back unchanged apart
/// from the fields we touch.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualDevice {
    pub key: i32,
    pub type_name: String,
    pub label: Option<String>,
    pub backing: Option<BackingInfo>,
    raw: Value,
}

impl VirtualDevice {
    pub fn from_json(raw: Value) -> Self {
        let key = raw.get("key").and_then(Value::as_i64).unwrap_or_default() as i32;
        let type_name = raw
            .get("_typeName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let label = raw
            .pointer("/deviceInfo/label")
            .and_then(Value::as_str)
            .map(str::to_string);
        let backing = raw.get("backing").filter(|b| !b.is_null()).map(BackingInfo::from_json);
        Self { key, type_name, label, backing, raw }
    }

    pub fn is_ethernet_card(&self) -> bool {
        ETHERNET_CARD_TYPES.contains(&self.type_name.as_str())
    }

    /// Copy of this device attached to `backing`.
    pub fn with_backing(&self, backing: &BackingInfo) -> Self {
        let mut raw = self.raw.clone();
        raw["backing"] = backing.to_json();
        Self {
            key: self.key,
            type_name: self.type_name.clone(),
            label: self.label.clone(),
            backing: Some(backing.clone()),
            raw,
        }
    }

    pub fn as_json(&self) -> &Value {
        &self.raw
    }

    /// The host's one-line description; for adapters, the network name.
    pub fn summary(&self) -> Option<&str> {
        self.raw.pointer("/deviceInfo/summary").and_then(Value::as_str)
    }
}
