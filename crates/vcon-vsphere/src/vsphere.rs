//! vSphere VI/JSON API client with session-based authentication.
//!
//! Communicates with vCenter / ESXi via
//! `https://{host}:{port}/sdk/vim25/{release}/{Type}/{id}/{method|property}`.
//! Manages the session lifecycle (login / logout through the
//! `SessionManager`) and implements [`Platform`] on top of typed helpers.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::{VsphereError, VsphereResult};
use crate::platform::Platform;
use crate::types::*;

const SESSION_HEADER: &str = "vmware-api-session-id";

/// Upper bound on parent hops when rebuilding an inventory path.
const MAX_INVENTORY_DEPTH: usize = 64;

/// Well-known managers from the service instance content.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceContent {
    root_folder: ManagedObjectReference,
    property_collector: ManagedObjectReference,
    search_index: ManagedObjectReference,
    session_manager: ManagedObjectReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResult {
    #[serde(default)]
    objects: Vec<ObjectContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectContent {
    obj: ManagedObjectReference,
    #[serde(default)]
    prop_set: Vec<DynamicProperty>,
}

#[derive(Debug, Deserialize)]
struct DynamicProperty {
    name: String,
    #[serde(default)]
    val: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmRuntime {
    #[serde(default)]
    power_state: VmPowerState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_name: &'a str,
    password: &'a str,
}

/// vSphere VI/JSON API client.
pub struct VsphereClient {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    content: Option<ServiceContent>,
    config: VsphereConfig,
}

impl VsphereClient {
    /// Build a new client from config (does NOT create a session yet).
    pub fn new(config: &VsphereConfig) -> VsphereResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| VsphereError::connection(format!("Failed to build HTTP client: {e}")))?;

        let host = Url::parse(&format!("https://{}:{}/", config.host, config.port))
            .map_err(|e| VsphereError::connection(format!("Invalid host '{}': {e}", config.host)))?;
        let base_url = format!("{host}sdk/vim25/{}", config.release);

        Ok(Self {
            client,
            base_url,
            session_id: None,
            content: None,
            config: config.clone(),
        })
    }

    /// Base URL for API calls.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Session management ──────────────────────────────────────────

    /// Fetch the service content and log in through the session manager.
    pub async fn login(&mut self) -> VsphereResult<()> {
        let url = format!("{}/ServiceInstance/ServiceInstance/content", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let resp = Self::check_status(resp).await?;
        let content: ServiceContent = Self::parse_response(resp).await?;

        let url = format!(
            "{}/SessionManager/{}/Login",
            self.base_url, content.session_manager.value
        );
        let resp = self
            .client
            .post(&url)
            .json(&LoginRequest {
                user_name: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VsphereError::connection(format!(
                "Login failed ({}): {}",
                status.as_u16(),
                fault_message(&body)
            )));
        }

        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| VsphereError::connection("Login response carried no session id"))?;

        debug!("logged in to {} as {}", self.config.host, self.config.username);
        self.session_id = Some(session_id);
        self.content = Some(content);
        Ok(())
    }

    /// End the current session. Failures are only logged.
    pub async fn logout(&mut self) -> VsphereResult<()> {
        if let (Some(sid), Some(content)) = (self.session_id.as_deref(), self.content.as_ref()) {
            let url = format!(
                "{}/SessionManager/{}/Logout",
                self.base_url, content.session_manager.value
            );
            if let Err(e) = self.client.post(&url).header(SESSION_HEADER, sid).send().await {
                warn!("logout from {} failed: {e}", self.config.host);
            }
        }
        self.session_id = None;
        Ok(())
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    fn require_session(&self) -> VsphereResult<&str> {
        self.session_id
            .as_deref()
            .ok_or_else(|| VsphereError::connection("Not logged in: no active session"))
    }

    fn content(&self) -> VsphereResult<&ServiceContent> {
        self.content
            .as_ref()
            .ok_or_else(|| VsphereError::connection("Not logged in: no service content"))
    }

    fn object_url(&self, object: &ManagedObjectReference, member: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, object.kind, object.value, member)
    }

    /// GET a single property of a managed object.
    pub async fn get_property<T: DeserializeOwned>(
        &self,
        object: &ManagedObjectReference,
        property: &str,
    ) -> VsphereResult<T> {
        let sid = self.require_session()?;
        let resp = self
            .client
            .get(self.object_url(object, property))
            .header(SESSION_HEADER, sid)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST a method invocation with a JSON body.
    pub async fn invoke<B: Serialize, T: DeserializeOwned>(
        &self,
        object: &ManagedObjectReference,
        method: &str,
        body: &B,
    ) -> VsphereResult<T> {
        let sid = self.require_session()?;
        let resp = self
            .client
            .post(self.object_url(object, method))
            .header(SESSION_HEADER, sid)
            .json(body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// Invoke a `*_Task` method and hand back the task reference.
    async fn invoke_task<B: Serialize>(
        &self,
        object: &ManagedObjectReference,
        method: &str,
        body: &B,
    ) -> VsphereResult<TaskHandle> {
        let task: ManagedObjectReference = self.invoke(object, method, body).await?;
        debug!("{method} on {object} submitted as {task}");
        Ok(TaskHandle(task))
    }

    async fn retrieve(&self, spec: Value) -> VsphereResult<Vec<ObjectContent>> {
        let collector = self.content()?.property_collector.clone();
        let body = json!({
            "specSet": [spec],
            "options": { "_typeName": "RetrieveOptions" },
        });
        let result: Option<RetrieveResult> =
            self.invoke(&collector, "RetrievePropertiesEx", &body).await?;
        Ok(result.map(|r| r.objects).unwrap_or_default())
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn check_status(resp: Response) -> VsphereResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        let fault_type = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("_typeName").and_then(Value::as_str).map(str::to_string));
        let message = fault_message(&body);

        match (status, fault_type.as_deref()) {
            (StatusCode::UNAUTHORIZED, _) | (_, Some("NotAuthenticated")) => Err(
                VsphereError::connection(format!("Session expired or invalid: {message}")),
            ),
            (StatusCode::NOT_FOUND, _) | (_, Some("ManagedObjectNotFound")) => {
                Err(VsphereError::not_found(format!("Object not found: {message}")))
            }
            _ => Err(VsphereError::api(code, format!("API error {code}: {message}"))),
        }
    }

    async fn parse_response<T: DeserializeOwned>(resp: Response) -> VsphereResult<T> {
        let text = resp
            .text()
            .await
            .map_err(|e| VsphereError::parse(format!("Failed to read response body: {e}")))?;

        if text.is_empty() {
            // Void methods and unset properties answer with an empty body
            return serde_json::from_str("null").map_err(|e| {
                VsphereError::parse(format!("Cannot deserialise empty response: {e}"))
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            VsphereError::parse(format!(
                "JSON parse error: {e} (body: {})",
                &text[..floor_char_boundary(&text, 500)]
            ))
        })
    }
}

/// Human-readable part of a fault body.
fn fault_message(body: &str) -> String {
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    for key in ["localizedMessage", "message"] {
        if let Some(m) = v.get(key).and_then(Value::as_str).filter(|m| !m.is_empty()) {
            return m.to_string();
        }
    }
    if let Some(m) = v
        .pointer("/faultMessage/0/message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    {
        return m.to_string();
    }
    v.get("_typeName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// `ArrayOfManagedObjectReference` arrives either wrapped or bare.
fn morefs_from_json(value: &Value) -> Vec<ManagedObjectReference> {
    let list = value.get("_value").unwrap_or(value);
    serde_json::from_value(list.clone()).unwrap_or_default()
}

fn vm_properties_from(
    requested: &[VmProperty],
    props: Vec<DynamicProperty>,
) -> VsphereResult<VmProperties> {
    // Unset properties are omitted from the answer; requested ones still
    // count as fetched.
    let mut out = VmProperties::default();
    for p in requested {
        match p {
            VmProperty::Annotation => out.annotation = Some(String::new()),
            VmProperty::Network => out.networks = Some(Vec::new()),
            VmProperty::Snapshot => out.snapshot = Some(SnapshotInfo::default()),
            VmProperty::Summary => {}
        }
    }

    for prop in props {
        match prop.name.as_str() {
            "config.annotation" => {
                out.annotation = Some(prop.val.as_str().unwrap_or_default().to_string());
            }
            "network" => out.networks = Some(morefs_from_json(&prop.val)),
            "summary" => {
                let config = prop.val.get("config").cloned().unwrap_or(Value::Null);
                out.summary = Some(serde_json::from_value(config)?);
            }
            "snapshot" => out.snapshot = Some(serde_json::from_value(prop.val)?),
            other => debug!("ignoring unrequested property {other}"),
        }
    }
    Ok(out)
}

fn task_state_from(info: &Value) -> VsphereResult<TaskState> {
    let state = info.get("state").and_then(Value::as_str).unwrap_or_default();
    match state {
        "queued" => Ok(TaskState::Queued),
        "running" => Ok(TaskState::Running),
        "success" => Ok(TaskState::Success(TaskResult::from_json(info.get("result").cloned()))),
        "error" => {
            let localized_message = info
                .pointer("/error/localizedMessage")
                .and_then(Value::as_str)
                .unwrap_or("Task failed without a message")
                .to_string();
            Ok(TaskState::Error { localized_message })
        }
        other => Err(VsphereError::parse(format!("Unknown task state '{other}'"))),
    }
}

#[async_trait]
impl Platform for VsphereClient {
    async fn find_by_inventory_path(
        &self,
        path: &str,
    ) -> VsphereResult<Option<ManagedObjectReference>> {
        let index = self.content()?.search_index.clone();
        let body = json!({ "inventoryPath": path.trim_end_matches('/') });
        self.invoke(&index, "FindByInventoryPath", &body).await
    }

    async fn default_resource_pool(
        &self,
        datacenter: &ManagedObjectReference,
    ) -> VsphereResult<ManagedObjectReference> {
        let host_folder: ManagedObjectReference =
            self.get_property(datacenter, "hostFolder").await?;
        let mut pending = vec![host_folder];

        while let Some(folder) = pending.pop() {
            let children: Vec<ManagedObjectReference> =
                self.get_property(&folder, "childEntity").await?;
            for child in children {
                match child.kind.as_str() {
                    "ComputeResource" | "ClusterComputeResource" => {
                        return self.get_property(&child, "resourcePool").await;
                    }
                    "Folder" => pending.push(child),
                    _ => {}
                }
            }
        }
        Err(VsphereError::not_found(format!(
            "No compute resource with a resource pool under datacenter {datacenter}"
        )))
    }

    async fn retrieve_vm_properties(
        &self,
        vm: &ManagedObjectReference,
        properties: &[VmProperty],
    ) -> VsphereResult<VmProperties> {
        let path_set: Vec<&str> = properties.iter().map(|p| p.path()).collect();
        let spec = json!({
            "_typeName": "PropertyFilterSpec",
            "propSet": [{ "_typeName": "PropertySpec", "type": "VirtualMachine", "pathSet": path_set }],
            "objectSet": [{ "_typeName": "ObjectSpec", "obj": vm }],
        });
        let objects = self.retrieve(spec).await?;
        let props = objects
            .into_iter()
            .find(|o| &o.obj == vm)
            .map(|o| o.prop_set)
            .ok_or_else(|| VsphereError::not_found(format!("VM {vm} not found")))?;
        vm_properties_from(properties, props)
    }

    async fn object_names(
        &self,
        objects: &[ManagedObjectReference],
    ) -> VsphereResult<Vec<String>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let mut kinds: Vec<&str> = objects.iter().map(|o| o.kind.as_str()).collect();
        kinds.sort_unstable();
        kinds.dedup();

        let prop_set: Vec<Value> = kinds
            .iter()
            .map(|k| json!({ "_typeName": "PropertySpec", "type": k, "pathSet": ["name"] }))
            .collect();
        let object_set: Vec<Value> = objects
            .iter()
            .map(|o| json!({ "_typeName": "ObjectSpec", "obj": o }))
            .collect();
        let spec = json!({
            "_typeName": "PropertyFilterSpec",
            "propSet": prop_set,
            "objectSet": object_set,
        });

        let mut names: HashMap<ManagedObjectReference, String> = HashMap::new();
        for content in self.retrieve(spec).await? {
            if let Some(name) = content
                .prop_set
                .iter()
                .find(|p| p.name == "name")
                .and_then(|p| p.val.as_str())
            {
                names.insert(content.obj.clone(), name.to_string());
            }
        }

        objects
            .iter()
            .map(|o| {
                names
                    .get(o)
                    .cloned()
                    .ok_or_else(|| VsphereError::not_found(format!("No name for object {o}")))
            })
            .collect()
    }

    async fn inventory_path(&self, object: &ManagedObjectReference) -> VsphereResult<String> {
        let mut segments = Vec::new();
        let mut current = object.clone();

        for _ in 0..MAX_INVENTORY_DEPTH {
            let parent: Option<ManagedObjectReference> =
                self.get_property(&current, "parent").await?;
            // The root folder has no parent and is not part of the path
            let Some(parent) = parent else {
                segments.reverse();
                return Ok(format!("/{}", segments.join("/")));
            };
            let name: String = self.get_property(&current, "name").await?;
            segments.push(name);
            current = parent;
        }
        Err(VsphereError::other(format!(
            "Inventory path of {object} is deeper than {MAX_INVENTORY_DEPTH} levels"
        )))
    }

    async fn power_state(&self, vm: &ManagedObjectReference) -> VsphereResult<VmPowerState> {
        let runtime: VmRuntime = self.get_property(vm, "runtime").await?;
        Ok(runtime.power_state)
    }

    async fn guest_info(&self, vm: &ManagedObjectReference) -> VsphereResult<GuestInfo> {
        let guest: Option<GuestInfo> = self.get_property(vm, "guest").await?;
        Ok(guest.unwrap_or_default())
    }

    async fn devices(&self, vm: &ManagedObjectReference) -> VsphereResult<Vec<VirtualDevice>> {
        let config: Value = self.get_property(vm, "config").await?;
        let devices = config
            .pointer("/hardware/device")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(devices.into_iter().map(VirtualDevice::from_json).collect())
    }

    async fn network_backing(
        &self,
        network: &ManagedObjectReference,
    ) -> VsphereResult<BackingInfo> {
        match network.kind.as_str() {
            "Network" => {
                let name: String = self.get_property(network, "name").await?;
                Ok(BackingInfo::Network {
                    device_name: name,
                    network: Some(network.clone()),
                })
            }
            "DistributedVirtualPortgroup" => {
                let config: Value = self.get_property(network, "config").await?;
                let portgroup_key = config
                    .get("key")
                    .and_then(Value::as_str)
                    .unwrap_or(&network.value)
                    .to_string();
                let switch: ManagedObjectReference = config
                    .get("distributedVirtualSwitch")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()?
                    .ok_or_else(|| {
                        VsphereError::parse(format!("Port group {network} has no switch"))
                    })?;
                let switch_uuid: String = self.get_property(&switch, "uuid").await?;
                Ok(BackingInfo::DistributedPort {
                    switch_uuid,
                    portgroup_key,
                })
            }
            other => Err(VsphereError::other(format!(
                "Cannot attach adapters to network type {other}"
            ))),
        }
    }

    async fn reconfigure(
        &self,
        vm: &ManagedObjectReference,
        num_cpus: Option<u32>,
        memory_mb: Option<u64>,
        annotation: Option<String>,
    ) -> VsphereResult<TaskHandle> {
        let mut spec = json!({ "_typeName": "VirtualMachineConfigSpec" });
        if let Some(cpus) = num_cpus {
            spec["numCPUs"] = json!(cpus);
        }
        if let Some(memory) = memory_mb {
            spec["memoryMB"] = json!(memory);
        }
        if let Some(annotation) = annotation {
            spec["annotation"] = json!(annotation);
        }
        self.invoke_task(vm, "ReconfigVM_Task", &json!({ "spec": spec })).await
    }

    async fn edit_device(
        &self,
        vm: &ManagedObjectReference,
        device: &VirtualDevice,
    ) -> VsphereResult<TaskHandle> {
        let body = json!({
            "spec": {
                "_typeName": "VirtualMachineConfigSpec",
                "deviceChange": [{
                    "_typeName": "VirtualDeviceConfigSpec",
                    "operation": "edit",
                    "device": device.as_json(),
                }],
            }
        });
        self.invoke_task(vm, "ReconfigVM_Task", &body).await
    }

    async fn clone_vm(
        &self,
        vm: &ManagedObjectReference,
        folder: &ManagedObjectReference,
        name: &str,
        datastore: &ManagedObjectReference,
        pool: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let body = json!({
            "folder": folder,
            "name": name,
            "spec": {
                "_typeName": "VirtualMachineCloneSpec",
                "location": {
                    "_typeName": "VirtualMachineRelocateSpec",
                    "datastore": datastore,
                    "folder": folder,
                    "pool": pool,
                },
                "template": false,
                "powerOn": false,
            }
        });
        self.invoke_task(vm, "CloneVM_Task", &body).await
    }

    async fn destroy(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        self.invoke_task(vm, "Destroy_Task", &json!({})).await
    }

    async fn power_on(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        self.invoke_task(vm, "PowerOnVM_Task", &json!({})).await
    }

    async fn power_off(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        self.invoke_task(vm, "PowerOffVM_Task", &json!({})).await
    }

    async fn suspend(&self, vm: &ManagedObjectReference) -> VsphereResult<TaskHandle> {
        self.invoke_task(vm, "SuspendVM_Task", &json!({})).await
    }

    async fn rename(&self, vm: &ManagedObjectReference, name: &str) -> VsphereResult<TaskHandle> {
        self.invoke_task(vm, "Rename_Task", &json!({ "newName": name })).await
    }

    async fn move_into_folder(
        &self,
        folder: &ManagedObjectReference,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        self.invoke_task(folder, "MoveIntoFolder_Task", &json!({ "list": [vm] })).await
    }

    async fn create_snapshot(
        &self,
        vm: &ManagedObjectReference,
        name: &str,
    ) -> VsphereResult<TaskHandle> {
        let body = json!({ "name": name, "description": "", "memory": false, "quiesce": false });
        self.invoke_task(vm, "CreateSnapshot_Task", &body).await
    }

    async fn remove_snapshot(
        &self,
        snapshot: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let body = json!({ "removeChildren": false, "consolidate": true });
        self.invoke_task(snapshot, "RemoveSnapshot_Task", &body).await
    }

    async fn remove_all_snapshots(
        &self,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        self.invoke_task(vm, "RemoveAllSnapshots_Task", &json!({ "consolidate": true })).await
    }

    async fn revert_to_current_snapshot(
        &self,
        vm: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let body = json!({ "suppressPowerOn": true });
        self.invoke_task(vm, "RevertToCurrentSnapshot_Task", &body).await
    }

    async fn revert_to_snapshot(
        &self,
        snapshot: &ManagedObjectReference,
    ) -> VsphereResult<TaskHandle> {
        let body = json!({ "suppressPowerOn": true });
        self.invoke_task(snapshot, "RevertToSnapshot_Task", &body).await
    }

    async fn task_info(&self, task: &TaskHandle) -> VsphereResult<TaskState> {
        let info: Value = self.get_property(&task.0, "info").await?;
        task_state_from(&info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VsphereConfig {
        VsphereConfig {
            host: "vcenter.lab.local".into(),
            username: "administrator@vsphere.local".into(),
            password: "secret".into(),
            datacenter: "DC1".into(),
            datastore: "ds-01".into(),
            ..Default::default()
        }
    }

    #[test]
    fn base_url_targets_vi_json_release() {
        let client = VsphereClient::new(&config()).unwrap();
        assert_eq!(client.base_url(), "https://vcenter.lab.local/sdk/vim25/8.0.1.0");
        assert!(client.session_id.is_none());
    }

    #[test]
    fn base_url_keeps_custom_port() {
        let client = VsphereClient::new(&VsphereConfig { port: 8443, ..config() }).unwrap();
        assert_eq!(client.base_url(), "https://vcenter.lab.local:8443/sdk/vim25/8.0.1.0");
    }

    #[test]
    fn invalid_host_is_a_connection_error() {
        let err = VsphereClient::new(&VsphereConfig { host: "bad host".into(), ..config() })
            .err()
            .unwrap();
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn calls_without_session_fail() {
        let client = VsphereClient::new(&config()).unwrap();
        let err = client.power_state(&ManagedObjectReference::vm("vm-1")).await.unwrap_err();
        assert_eq!(err.kind, crate::error::VsphereErrorKind::ConnectionError);
    }

    #[test]
    fn fault_message_prefers_localized_text() {
        let body = r#"{"_typeName":"InvalidState","localizedMessage":"The operation is not allowed in the current state."}"#;
        assert_eq!(fault_message(body), "The operation is not allowed in the current state.");
        assert_eq!(fault_message(r#"{"_typeName":"InvalidLogin"}"#), "InvalidLogin");
        assert_eq!(fault_message("plain text"), "plain text");
    }

    #[test]
    fn requested_but_unset_properties_count_as_fetched() {
        let props = vec![DynamicProperty {
            name: "summary".into(),
            val: json!({"config": {"numCpu": 2, "memorySizeMB": 2048}}),
        }];
        let out = vm_properties_from(
            &[VmProperty::Annotation, VmProperty::Summary, VmProperty::Network],
            props,
        )
        .unwrap();
        assert_eq!(out.annotation.as_deref(), Some(""));
        assert_eq!(out.networks, Some(vec![]));
        assert_eq!(out.summary, Some(VmSummaryConfig { num_cpu: 2, memory_size_mb: 2048 }));
        assert!(out.snapshot.is_none());
    }

    #[test]
    fn network_property_accepts_wrapped_arrays() {
        let wrapped = json!({
            "_typeName": "ArrayOfManagedObjectReference",
            "_value": [{"_typeName": "ManagedObjectReference", "type": "Network", "value": "network-7"}]
        });
        assert_eq!(
            morefs_from_json(&wrapped),
            vec![ManagedObjectReference::new("Network", "network-7")]
        );
    }

    #[test]
    fn task_states_parse() {
        assert_eq!(task_state_from(&json!({"state": "running"})).unwrap(), TaskState::Running);
        let done = json!({
            "state": "success",
            "result": {"_typeName": "ManagedObjectReference", "type": "VirtualMachine", "value": "vm-9"}
        });
        assert_eq!(
            task_state_from(&done).unwrap(),
            TaskState::Success(TaskResult::Reference(ManagedObjectReference::vm("vm-9")))
        );
        let failed = json!({"state": "error", "error": {"localizedMessage": "Insufficient disk space."}});
        assert_eq!(
            task_state_from(&failed).unwrap(),
            TaskState::Error { localized_message: "Insufficient disk space.".into() }
        );
        assert!(task_state_from(&json!({"state": "exploded"})).is_err());
    }

    #[test]
    fn body_excerpt_respects_char_boundaries() {
        let s = "é".repeat(400);
        let cut = floor_char_boundary(&s, 500);
        assert!(s.is_char_boundary(cut));
        assert!(cut <= 500);
    }
}
