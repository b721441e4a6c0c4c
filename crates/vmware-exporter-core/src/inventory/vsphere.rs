//! vSphere client speaking the VI/JSON API (`/sdk/vim25/{release}`).
//!
//! One session per `connect()`:
//! - `ServiceInstance/content` for the root folder and manager references
//! - `SessionManager/Login`, session id carried in `vmware-api-session-id`
//! - a container view per listed type, `summary` fetched per object
//! - `SessionManager/Logout` on close

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    DatastoreSnapshot, DiskSnapshot, HostSnapshot, InventoryClient, InventoryError,
    InventorySession, ResourceKind, VmSnapshot,
};

const SESSION_HEADER: &str = "vmware-api-session-id";

/// Maximum number of per-object requests in flight within one listing.
const FETCH_CONCURRENCY: usize = 8;

/// Longest error body quoted in an error message.
const MAX_ERROR_BODY: usize = 256;

/// Connection settings for [`VsphereClient`].
#[derive(Debug, Clone)]
pub struct VsphereConfig {
    /// Host name or URL of the ESXi host or vCenter server.
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// VI/JSON API release in the URL path.
    pub api_release: String,
    /// Accept self-signed or otherwise invalid certificates.
    pub insecure: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl VsphereConfig {
    pub const DEFAULT_API_RELEASE: &'static str = "8.0.1.0";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            api_release: Self::DEFAULT_API_RELEASE.to_string(),
            insecure: false,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Endpoint as a URL; `https://` is assumed when no scheme is given.
    pub fn endpoint_url(&self) -> Result<Url, InventoryError> {
        let raw = self.endpoint.trim().trim_end_matches('/');
        if raw.is_empty() {
            return Err(InventoryError::connection("empty endpoint"));
        }
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        let mut url = Url::parse(&with_scheme)
            .map_err(|e| InventoryError::connection(format!("invalid endpoint {raw}: {e}")))?;
        if url.host_str().is_none() {
            return Err(InventoryError::connection(format!("endpoint {raw} has no host")));
        }
        // `https://vc/sdk` is the usual SOAP-style form; the API root is appended later.
        let path = url.path().trim_end_matches('/').to_owned();
        match path.as_str() {
            "" => {}
            "/sdk" => url.set_path(""),
            other => {
                return Err(InventoryError::connection(format!(
                    "endpoint {raw} has unexpected path {other}, expected none or /sdk"
                )));
            }
        }
        Ok(url)
    }

    /// Root of the VI/JSON API, without a trailing slash.
    pub fn base_url(&self) -> Result<String, InventoryError> {
        let url = self.endpoint_url()?;
        let root = url.as_str().trim_end_matches('/');
        Ok(format!("{root}/sdk/vim25/{}", self.api_release))
    }
}

/// Inventory client backed by a vSphere endpoint.
pub struct VsphereClient {
    http: reqwest::Client,
    base: String,
    endpoint_host: String,
    config: VsphereConfig,
}

impl VsphereClient {
    pub fn new(config: VsphereConfig) -> Result<Self, InventoryError> {
        let base = config.base_url()?;
        let endpoint_host = config
            .endpoint_url()?
            .host_str()
            .unwrap_or_default()
            .to_string();
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()
            .map_err(|e| InventoryError::connection(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base,
            endpoint_host,
            config,
        })
    }

    /// Host part of the endpoint; used as the `host_name` label of datastores and VMs.
    pub fn endpoint_host(&self) -> &str {
        &self.endpoint_host
    }
}

#[async_trait]
impl InventoryClient for VsphereClient {
    async fn connect(&self) -> Result<Box<dyn InventorySession>, InventoryError> {
        let content: ServiceContent = send_json(
            self.http
                .get(format!("{}/ServiceInstance/ServiceInstance/content", self.base)),
        )
        .await
        .map_err(InventoryError::Connection)?;

        let response = self
            .http
            .post(format!(
                "{}/SessionManager/{}/Login",
                self.base, content.session_manager.value
            ))
            .json(&LoginRequest {
                user_name: &self.config.username,
                password: &self.config.password,
            })
            .send()
            .await
            .map_err(|e| InventoryError::connection(e.to_string()))?;
        let response = check_status(response)
            .await
            .map_err(InventoryError::Connection)?;
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| InventoryError::connection("login response carries no session id"))?;

        debug!(endpoint = %self.endpoint_host, "session established");
        Ok(Box::new(VsphereSession {
            http: self.http.clone(),
            base: self.base.clone(),
            endpoint_host: self.endpoint_host.clone(),
            session_id,
            content,
        }))
    }
}

struct VsphereSession {
    http: reqwest::Client,
    base: String,
    endpoint_host: String,
    session_id: String,
    content: ServiceContent,
}

impl VsphereSession {
    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}/{path}", self.base))
            .header(SESSION_HEADER, &self.session_id)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/{path}", self.base))
            .header(SESSION_HEADER, &self.session_id)
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, InventoryError> {
        send_json(self.get(path))
            .await
            .map_err(|e| InventoryError::retrieval(format!("{path}: {e}")))
    }

    /// Lists every object of `kind` below the root folder.
    async fn list_refs(&self, kind: ResourceKind) -> Result<Vec<ManagedObjectRef>, InventoryError> {
        let view: ManagedObjectRef = send_json(
            self.post(&format!(
                "ViewManager/{}/CreateContainerView",
                self.content.view_manager.value
            ))
            .json(&CreateContainerViewRequest {
                container: MoRefBody::of(&self.content.root_folder),
                types: [kind.type_name()],
                recursive: true,
            }),
        )
        .await
        .map_err(|e| InventoryError::retrieval(format!("CreateContainerView: {e}")))?;

        let refs = self
            .fetch::<Vec<ManagedObjectRef>>(&format!("ContainerView/{}/view", view.value))
            .await;

        if let Err(e) = send_empty(self.post(&format!("ContainerView/{}/DestroyView", view.value))).await
        {
            warn!(view = %view.value, error = %e, "DestroyView failed");
        }
        refs
    }

    /// Fetches one property of every object of `kind`.
    async fn fetch_all<T: DeserializeOwned + Send>(
        &self,
        kind: ResourceKind,
        property: &str,
    ) -> Result<Vec<(ManagedObjectRef, T)>, InventoryError> {
        let refs = self.list_refs(kind).await?;
        futures::stream::iter(refs)
            .map(|moref| async move {
                let value = self
                    .fetch::<T>(&format!("{}/{}/{property}", kind.type_name(), moref.value))
                    .await?;
                Ok::<_, InventoryError>((moref, value))
            })
            .buffered(FETCH_CONCURRENCY)
            .try_collect()
            .await
    }

    async fn host_disks(&self, host: &ManagedObjectRef) -> Result<Vec<DiskSnapshot>, InventoryError> {
        let managers: HostConfigManager = self
            .fetch(&format!("HostSystem/{}/configManager", host.value))
            .await?;
        let Some(storage) = managers.storage_system else {
            return Ok(Vec::new());
        };
        let info: HostStorageDeviceInfo = self
            .fetch(&format!("HostStorageSystem/{}/storageDeviceInfo", storage.value))
            .await?;
        Ok(disk_snapshots(info))
    }
}

#[async_trait]
impl InventorySession for VsphereSession {
    async fn list_hosts(&mut self) -> Result<Vec<HostSnapshot>, InventoryError> {
        let summaries: Vec<(ManagedObjectRef, HostListSummary)> =
            self.fetch_all(ResourceKind::Host, "summary").await?;
        let mut hosts = Vec::with_capacity(summaries.len());
        for (moref, summary) in summaries {
            let disks = self.host_disks(&moref).await?;
            hosts.push(host_snapshot(summary, disks));
        }
        Ok(hosts)
    }

    async fn list_datastores(&mut self) -> Result<Vec<DatastoreSnapshot>, InventoryError> {
        let summaries: Vec<(ManagedObjectRef, DatastoreSummary)> =
            self.fetch_all(ResourceKind::Datastore, "summary").await?;
        Ok(summaries
            .into_iter()
            .map(|(_, s)| datastore_snapshot(s, &self.endpoint_host))
            .collect())
    }

    async fn list_vms(&mut self) -> Result<Vec<VmSnapshot>, InventoryError> {
        let summaries: Vec<(ManagedObjectRef, VirtualMachineSummary)> =
            self.fetch_all(ResourceKind::VirtualMachine, "summary").await?;
        Ok(summaries
            .into_iter()
            .map(|(_, s)| vm_snapshot(s, &self.endpoint_host))
            .collect())
    }

    async fn close(self: Box<Self>) {
        let path = format!("SessionManager/{}/Logout", self.content.session_manager.value);
        match send_empty(self.post(&path)).await {
            Ok(()) => debug!(endpoint = %self.endpoint_host, "session closed"),
            Err(e) => warn!(endpoint = %self.endpoint_host, error = %e, "logout failed"),
        }
    }
}

// ============================================================
// HTTP helpers
// ============================================================

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    Err(format!("HTTP {status}: {body}"))
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, String> {
    let response = request.send().await.map_err(|e| e.to_string())?;
    let response = check_status(response).await?;
    response.json::<T>().await.map_err(|e| e.to_string())
}

async fn send_empty(request: RequestBuilder) -> Result<(), String> {
    let response = request.send().await.map_err(|e| e.to_string())?;
    check_status(response).await.map(|_| ())
}

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Clone, Deserialize)]
struct ManagedObjectRef {
    value: String,
}

#[derive(Serialize)]
struct MoRefBody<'a> {
    #[serde(rename = "_typeName")]
    type_name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

impl<'a> MoRefBody<'a> {
    fn of(folder: &'a ManagedObjectRef) -> Self {
        Self {
            type_name: "ManagedObjectReference",
            kind: "Folder",
            value: &folder.value,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceContent {
    root_folder: ManagedObjectRef,
    session_manager: ManagedObjectRef,
    view_manager: ManagedObjectRef,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_name: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CreateContainerViewRequest<'a> {
    container: MoRefBody<'a>,
    #[serde(rename = "type")]
    types: [&'static str; 1],
    recursive: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostListSummary {
    hardware: HostHardwareSummary,
    runtime: HostRuntimeInfo,
    config: HostConfigSummary,
    #[serde(default)]
    quick_stats: HostQuickStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostHardwareSummary {
    cpu_mhz: i32,
    num_cpu_cores: i16,
    memory_size: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostRuntimeInfo {
    power_state: String,
    #[serde(default)]
    boot_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct HostConfigSummary {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HostQuickStats {
    overall_cpu_usage: i64,
    overall_memory_usage: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostConfigManager {
    #[serde(default)]
    storage_system: Option<ManagedObjectRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct HostStorageDeviceInfo {
    scsi_lun: Vec<ScsiLun>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScsiLun {
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    canonical_name: Option<String>,
    #[serde(default)]
    operational_state: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatastoreSummary {
    name: String,
    capacity: i64,
    free_space: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualMachineSummary {
    config: VmConfigSummary,
    runtime: VmRuntimeInfo,
    #[serde(default)]
    quick_stats: VmQuickStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmConfigSummary {
    name: String,
    #[serde(default)]
    num_cpu: i32,
    #[serde(default, rename = "memorySizeMB")]
    memory_size_mb: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VmRuntimeInfo {
    #[serde(default)]
    boot_time: Option<DateTime<Utc>>,
    #[serde(default)]
    max_cpu_usage: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VmQuickStats {
    overall_cpu_usage: i64,
    guest_memory_usage: i64,
}

// ============================================================
// Wire → snapshot
// ============================================================

fn host_snapshot(summary: HostListSummary, disks: Vec<DiskSnapshot>) -> HostSnapshot {
    HostSnapshot {
        name: summary.config.name,
        power_state: summary.runtime.power_state,
        boot_time: summary.runtime.boot_time,
        cpu_mhz: summary.hardware.cpu_mhz,
        cpu_cores: summary.hardware.num_cpu_cores,
        cpu_usage_mhz: summary.quick_stats.overall_cpu_usage,
        memory_bytes: summary.hardware.memory_size,
        memory_usage_mib: summary.quick_stats.overall_memory_usage,
        disks,
    }
}

/// LUNs without any name are skipped: they cannot be labelled.
fn disk_snapshots(info: HostStorageDeviceInfo) -> Vec<DiskSnapshot> {
    info.scsi_lun
        .into_iter()
        .filter_map(|lun| {
            let device = lun.device_name.or(lun.canonical_name)?;
            Some(DiskSnapshot {
                device,
                operational_state: lun.operational_state,
            })
        })
        .collect()
}

fn datastore_snapshot(summary: DatastoreSummary, endpoint_host: &str) -> DatastoreSnapshot {
    DatastoreSnapshot {
        name: summary.name,
        host_name: endpoint_host.to_string(),
        capacity: summary.capacity,
        free_space: summary.free_space,
    }
}

fn vm_snapshot(summary: VirtualMachineSummary, endpoint_host: &str) -> VmSnapshot {
    VmSnapshot {
        name: summary.config.name,
        host_name: endpoint_host.to_string(),
        boot_time: summary.runtime.boot_time,
        num_cpu: summary.config.num_cpu,
        cpu_capacity_mhz: summary.runtime.max_cpu_usage,
        cpu_usage_mhz: summary.quick_stats.overall_cpu_usage,
        memory_mib: summary.config.memory_size_mb,
        memory_usage_mib: summary.quick_stats.guest_memory_usage,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const HOST_SUMMARY: &str = r#"{
        "_typeName": "HostListSummary",
        "host": {"_typeName": "ManagedObjectReference", "type": "HostSystem", "value": "host-12"},
        "hardware": {
            "_typeName": "HostHardwareSummary",
            "vendor": "Dell Inc.",
            "model": "PowerEdge R640",
            "memorySize": 137438953472,
            "cpuModel": "Intel(R) Xeon(R) Gold 6148",
            "cpuMhz": 2400,
            "numCpuPkgs": 2,
            "numCpuCores": 16,
            "numCpuThreads": 32
        },
        "runtime": {
            "_typeName": "HostRuntimeInfo",
            "connectionState": "connected",
            "powerState": "poweredOn",
            "bootTime": "2024-01-15T08:00:00.000Z"
        },
        "config": {"_typeName": "HostConfigSummary", "name": "esx01.lab.local", "port": 443},
        "quickStats": {
            "_typeName": "HostListSummaryQuickStats",
            "overallCpuUsage": 5230,
            "overallMemoryUsage": 4096,
            "uptime": 86400
        }
    }"#;

    #[test]
    fn test_endpoint_without_scheme_gets_https() {
        let config = VsphereConfig::new("vcenter.lab.local", "u", "p");
        assert_eq!(
            config.base_url().unwrap(),
            "https://vcenter.lab.local/sdk/vim25/8.0.1.0"
        );
    }

    #[test]
    fn test_endpoint_with_scheme_and_trailing_slash() {
        let mut config = VsphereConfig::new("http://10.0.0.5:8989/", "u", "p");
        config.api_release = "8.0.2.0".into();
        assert_eq!(config.base_url().unwrap(), "http://10.0.0.5:8989/sdk/vim25/8.0.2.0");
    }

    #[test]
    fn test_endpoint_with_sdk_path() {
        for endpoint in ["https://vc.lab.local/sdk", "https://vc.lab.local/sdk/", "vc.lab.local/sdk"] {
            let config = VsphereConfig::new(endpoint, "u", "p");
            assert_eq!(
                config.base_url().unwrap(),
                "https://vc.lab.local/sdk/vim25/8.0.1.0",
                "endpoint {endpoint}"
            );
        }
    }

    #[test]
    fn test_endpoint_with_other_path_rejected() {
        let config = VsphereConfig::new("https://vc.lab.local/api", "u", "p");
        assert!(matches!(config.base_url(), Err(InventoryError::Connection(_))));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let config = VsphereConfig::new("  ", "u", "p");
        assert!(matches!(config.base_url(), Err(InventoryError::Connection(_))));
    }

    #[test]
    fn test_client_reports_endpoint_host() {
        let client = VsphereClient::new(VsphereConfig::new("https://vc.lab.local:443", "u", "p"))
            .unwrap();
        assert_eq!(client.endpoint_host(), "vc.lab.local");
    }

    #[test]
    fn test_host_summary_decoding() {
        let summary: HostListSummary = serde_json::from_str(HOST_SUMMARY).unwrap();
        let host = host_snapshot(summary, Vec::new());

        assert_eq!(host.name, "esx01.lab.local");
        assert_eq!(host.power_state, "poweredOn");
        assert_eq!(host.boot_time.map(|t| t.timestamp()), Some(1_705_305_600));
        assert_eq!(host.cpu_mhz, 2400);
        assert_eq!(host.cpu_cores, 16);
        assert_eq!(host.cpu_usage_mhz, 5230);
        assert_eq!(host.memory_bytes, 137_438_953_472);
        assert_eq!(host.memory_usage_mib, 4096);
    }

    #[test]
    fn test_host_summary_without_boot_time_or_stats() {
        let json = r#"{
            "hardware": {"cpuMhz": 2100, "numCpuCores": 8, "memorySize": 1024},
            "runtime": {"powerState": "poweredOff"},
            "config": {"name": "esx02"}
        }"#;
        let summary: HostListSummary = serde_json::from_str(json).unwrap();
        let host = host_snapshot(summary, Vec::new());
        assert_eq!(host.boot_time, None);
        assert_eq!(host.cpu_usage_mhz, 0);
        assert_eq!(host.memory_usage_mib, 0);
    }

    #[test]
    fn test_host_summary_missing_hardware_fails() {
        let json = r#"{"runtime": {"powerState": "poweredOn"}, "config": {"name": "esx03"}}"#;
        assert!(serde_json::from_str::<HostListSummary>(json).is_err());
    }

    #[test]
    fn test_storage_device_info_decoding() {
        let json = r#"{
            "_typeName": "HostStorageDeviceInfo",
            "scsiLun": [
                {"_typeName": "HostScsiDisk", "deviceName": "/vmfs/devices/disks/naa.1",
                 "canonicalName": "naa.1", "operationalState": ["ok"]},
                {"_typeName": "ScsiLun", "canonicalName": "mpx.vmhba32:C0:T0:L0",
                 "operationalState": ["ok", "degraded"]},
                {"_typeName": "ScsiLun", "operationalState": ["ok"]}
            ]
        }"#;
        let info: HostStorageDeviceInfo = serde_json::from_str(json).unwrap();
        let disks = disk_snapshots(info);

        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].device, "/vmfs/devices/disks/naa.1");
        assert_eq!(disks[1].device, "mpx.vmhba32:C0:T0:L0");
        assert_eq!(disks[1].operational_state, vec!["ok", "degraded"]);
    }

    #[test]
    fn test_datastore_summary_decoding() {
        let json = r#"{
            "_typeName": "DatastoreSummary",
            "datastore": {"_typeName": "ManagedObjectReference", "type": "Datastore", "value": "datastore-15"},
            "name": "datastore1",
            "url": "ds:///vmfs/volumes/5f1c/",
            "capacity": 2199023255552,
            "freeSpace": 1099511627776,
            "accessible": true,
            "type": "VMFS"
        }"#;
        let summary: DatastoreSummary = serde_json::from_str(json).unwrap();
        let ds = datastore_snapshot(summary, "vc.lab.local");
        assert_eq!(ds.name, "datastore1");
        assert_eq!(ds.host_name, "vc.lab.local");
        assert_eq!(ds.capacity, 2_199_023_255_552);
        assert_eq!(ds.free_space, 1_099_511_627_776);
    }

    #[test]
    fn test_vm_summary_decoding() {
        let json = r#"{
            "_typeName": "VirtualMachineSummary",
            "runtime": {
                "_typeName": "VirtualMachineRuntimeInfo",
                "host": {"_typeName": "ManagedObjectReference", "type": "HostSystem", "value": "host-12"},
                "powerState": "poweredOn",
                "bootTime": "2024-01-15T08:00:00Z",
                "maxCpuUsage": 9600
            },
            "config": {
                "_typeName": "VirtualMachineConfigSummary",
                "name": "web-01",
                "memorySizeMB": 8192,
                "numCpu": 4
            },
            "quickStats": {
                "_typeName": "VirtualMachineQuickStats",
                "overallCpuUsage": 1200,
                "guestMemoryUsage": 2048
            }
        }"#;
        let summary: VirtualMachineSummary = serde_json::from_str(json).unwrap();
        let vm = vm_snapshot(summary, "vc.lab.local");
        assert_eq!(vm.name, "web-01");
        assert_eq!(vm.host_name, "vc.lab.local");
        assert_eq!(vm.boot_time.map(|t| t.timestamp()), Some(1_705_305_600));
        assert_eq!(vm.num_cpu, 4);
        assert_eq!(vm.cpu_capacity_mhz, 9600);
        assert_eq!(vm.cpu_usage_mhz, 1200);
        assert_eq!(vm.memory_mib, 8192);
        assert_eq!(vm.memory_usage_mib, 2048);
    }

    #[test]
    fn test_vm_summary_missing_name_fails() {
        let json = r#"{"config": {"numCpu": 2}, "runtime": {}}"#;
        assert!(serde_json::from_str::<VirtualMachineSummary>(json).is_err());
    }

    #[test]
    fn test_create_container_view_body() {
        let root = ManagedObjectRef {
            value: "group-d1".into(),
        };
        let body = CreateContainerViewRequest {
            container: MoRefBody::of(&root),
            types: [ResourceKind::Datastore.type_name()],
            recursive: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "container": {"_typeName": "ManagedObjectReference", "type": "Folder", "value": "group-d1"},
                "type": ["Datastore"],
                "recursive": true
            })
        );
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_endpoint_is_connection_error() {
        let mut config = VsphereConfig::new("http://127.0.0.1:9", "u", "p");
        config.timeout = Duration::from_secs(2);
        let client = VsphereClient::new(config).unwrap();
        let err = match client.connect().await {
            Err(e) => e,
            Ok(_) => panic!("connect to a closed port succeeded"),
        };
        assert!(matches!(err, InventoryError::Connection(_)));
    }

    // ============================================================
    // In-process endpoint
    // ============================================================

    mod fake {
        use std::sync::{Arc, Mutex};

        use axum::Json;
        use axum::Router;
        use axum::body::Bytes;
        use axum::extract::State;
        use axum::http::{HeaderMap, Method, StatusCode, Uri};
        use axum::response::{IntoResponse, Response};
        use serde_json::{Value, json};

        use super::super::{SESSION_HEADER, VsphereClient, VsphereConfig};
        use super::HOST_SUMMARY;

        const API_ROOT: &str = "/sdk/vim25/8.0.1.0";
        pub(super) const SESSION_ID: &str = "abc";

        /// One request seen by the endpoint: method, path below the API root, session header.
        pub(super) type Seen = (String, String, Option<String>);

        #[derive(Default)]
        pub(super) struct Endpoint {
            pub(super) fail_view: bool,
            pub(super) fail_summary: bool,
            pub(super) seen: Mutex<Vec<Seen>>,
        }

        impl Endpoint {
            pub(super) fn seen(&self) -> Vec<Seen> {
                self.seen.lock().unwrap().clone()
            }

            pub(super) fn paths(&self) -> Vec<String> {
                self.seen().into_iter().map(|(_, path, _)| path).collect()
            }
        }

        pub(super) async fn start(endpoint: Arc<Endpoint>, password: &str) -> VsphereClient {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let app = Router::new().fallback(handle).with_state(endpoint);
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            VsphereClient::new(VsphereConfig::new(format!("http://{addr}"), "monitor", password))
                .unwrap()
        }

        async fn handle(
            State(endpoint): State<Arc<Endpoint>>,
            method: Method,
            uri: Uri,
            headers: HeaderMap,
            body: Bytes,
        ) -> Response {
            let path = uri.path().strip_prefix(API_ROOT).unwrap_or(uri.path()).to_owned();
            let session = headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            endpoint
                .seen
                .lock()
                .unwrap()
                .push((method.to_string(), path.clone(), session.clone()));

            let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            match (method.as_str(), segments.as_slice()) {
                ("GET", ["ServiceInstance", "ServiceInstance", "content"]) => Json(json!({
                    "_typeName": "ServiceContent",
                    "rootFolder": {"type": "Folder", "value": "group-d1"},
                    "sessionManager": {"type": "SessionManager", "value": "SessionManager"},
                    "viewManager": {"type": "ViewManager", "value": "ViewManager"}
                }))
                .into_response(),
                ("POST", ["SessionManager", "SessionManager", "Login"]) => {
                    let login: Value = serde_json::from_slice(&body).unwrap_or_default();
                    if login["userName"] == "monitor" && login["password"] == "secret" {
                        ([(SESSION_HEADER, SESSION_ID)], Json(json!({"userName": "monitor"})))
                            .into_response()
                    } else {
                        (StatusCode::INTERNAL_SERVER_ERROR, "InvalidLogin").into_response()
                    }
                }
                _ if session.as_deref() != Some(SESSION_ID) => {
                    StatusCode::UNAUTHORIZED.into_response()
                }
                ("POST", ["ViewManager", "ViewManager", "CreateContainerView"]) => {
                    let request: Value = serde_json::from_slice(&body).unwrap_or_default();
                    let kind = request["type"][0].as_str().unwrap_or("Unknown");
                    Json(json!({"type": "ContainerView", "value": format!("view-{kind}")}))
                        .into_response()
                }
                ("GET", ["ContainerView", view, "view"]) => {
                    if endpoint.fail_view {
                        return (StatusCode::INTERNAL_SERVER_ERROR, "view failed").into_response();
                    }
                    let refs = match *view {
                        "view-HostSystem" => json!([{"type": "HostSystem", "value": "host-1"}]),
                        "view-Datastore" => json!([{"type": "Datastore", "value": "datastore-1"}]),
                        "view-VirtualMachine" => json!([
                            {"type": "VirtualMachine", "value": "vm-1"},
                            {"type": "VirtualMachine", "value": "vm-2"}
                        ]),
                        _ => json!([]),
                    };
                    Json(refs).into_response()
                }
                ("POST", ["ContainerView", _, "DestroyView"])
                | ("POST", ["SessionManager", "SessionManager", "Logout"]) => {
                    StatusCode::NO_CONTENT.into_response()
                }
                ("GET", [_, _, "summary"]) if endpoint.fail_summary => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "summary failed").into_response()
                }
                ("GET", ["HostSystem", "host-1", "summary"]) => {
                    Json(serde_json::from_str::<Value>(HOST_SUMMARY).unwrap()).into_response()
                }
                ("GET", ["HostSystem", "host-1", "configManager"]) => Json(json!({
                    "storageSystem": {"type": "HostStorageSystem", "value": "storageSystem-1"}
                }))
                .into_response(),
                ("GET", ["HostStorageSystem", "storageSystem-1", "storageDeviceInfo"]) => {
                    Json(json!({
                        "scsiLun": [
                            {"deviceName": "/vmfs/devices/disks/naa.1", "operationalState": ["ok"]},
                            {"canonicalName": "naa.2", "operationalState": ["ok", "degraded"]}
                        ]
                    }))
                    .into_response()
                }
                ("GET", ["Datastore", "datastore-1", "summary"]) => Json(json!({
                    "name": "datastore1",
                    "capacity": 2199023255552_i64,
                    "freeSpace": 1099511627776_i64
                }))
                .into_response(),
                ("GET", ["VirtualMachine", id, "summary"]) => Json(json!({
                    "config": {"name": format!("{id}.lab.local"), "numCpu": 2, "memorySizeMB": 4096},
                    "runtime": {"maxCpuUsage": 4800},
                    "quickStats": {"overallCpuUsage": 100, "guestMemoryUsage": 512}
                }))
                .into_response(),
                _ => StatusCode::NOT_FOUND.into_response(),
            }
        }
    }

    fn seen(method: &str, path: &str, session: Option<&str>) -> fake::Seen {
        (method.to_owned(), path.to_owned(), session.map(str::to_owned))
    }

    #[tokio::test]
    async fn test_session_flow_for_datastores() {
        let endpoint = Arc::new(fake::Endpoint::default());
        let client = fake::start(endpoint.clone(), "secret").await;

        let mut session = client.connect().await.unwrap();
        let datastores = session.list_datastores().await.unwrap();
        session.close().await;

        assert_eq!(
            datastores,
            vec![DatastoreSnapshot {
                name: "datastore1".into(),
                host_name: "127.0.0.1".into(),
                capacity: 2_199_023_255_552,
                free_space: 1_099_511_627_776,
            }]
        );

        let sid = Some(fake::SESSION_ID);
        assert_eq!(
            endpoint.seen(),
            vec![
                seen("GET", "/ServiceInstance/ServiceInstance/content", None),
                seen("POST", "/SessionManager/SessionManager/Login", None),
                seen("POST", "/ViewManager/ViewManager/CreateContainerView", sid),
                seen("GET", "/ContainerView/view-Datastore/view", sid),
                seen("POST", "/ContainerView/view-Datastore/DestroyView", sid),
                seen("GET", "/Datastore/datastore-1/summary", sid),
                seen("POST", "/SessionManager/SessionManager/Logout", sid),
            ]
        );
    }

    #[tokio::test]
    async fn test_host_listing_fetches_disks_through_storage_system() {
        let endpoint = Arc::new(fake::Endpoint::default());
        let client = fake::start(endpoint.clone(), "secret").await;

        let mut session = client.connect().await.unwrap();
        let hosts = session.list_hosts().await.unwrap();
        session.close().await;

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name, "esx01.lab.local");
        assert_eq!(hosts[0].cpu_cores, 16);
        assert_eq!(
            hosts[0].disks,
            vec![
                DiskSnapshot {
                    device: "/vmfs/devices/disks/naa.1".into(),
                    operational_state: vec!["ok".into()],
                },
                DiskSnapshot {
                    device: "naa.2".into(),
                    operational_state: vec!["ok".into(), "degraded".into()],
                },
            ]
        );

        let paths = endpoint.paths();
        let pos = |p: &str| paths.iter().position(|x| x == p).unwrap();
        assert!(
            pos("/HostSystem/host-1/summary") < pos("/HostSystem/host-1/configManager")
        );
        assert!(
            pos("/HostSystem/host-1/configManager")
                < pos("/HostStorageSystem/storageSystem-1/storageDeviceInfo")
        );
    }

    #[tokio::test]
    async fn test_vm_listing_keeps_view_order() {
        let endpoint = Arc::new(fake::Endpoint::default());
        let client = fake::start(endpoint.clone(), "secret").await;

        let mut session = client.connect().await.unwrap();
        let vms = session.list_vms().await.unwrap();
        session.close().await;

        let names: Vec<&str> = vms.iter().map(|vm| vm.name.as_str()).collect();
        assert_eq!(names, ["vm-1.lab.local", "vm-2.lab.local"]);
        assert_eq!(vms[0].host_name, "127.0.0.1");
        assert_eq!(vms[0].cpu_capacity_mhz, 4800);
        assert_eq!(vms[1].memory_usage_mib, 512);
    }

    #[tokio::test]
    async fn test_failed_view_listing_still_destroys_view() {
        let endpoint = Arc::new(fake::Endpoint {
            fail_view: true,
            ..Default::default()
        });
        let client = fake::start(endpoint.clone(), "secret").await;

        let mut session = client.connect().await.unwrap();
        let err = session.list_datastores().await.unwrap_err();
        session.close().await;

        assert!(matches!(err, InventoryError::Retrieval(_)));
        let paths = endpoint.paths();
        assert_eq!(
            &paths[3..],
            [
                "/ContainerView/view-Datastore/view",
                "/ContainerView/view-Datastore/DestroyView",
                "/SessionManager/SessionManager/Logout",
            ]
        );
    }

    #[tokio::test]
    async fn test_summary_server_error_is_retrieval_error() {
        let endpoint = Arc::new(fake::Endpoint {
            fail_summary: true,
            ..Default::default()
        });
        let client = fake::start(endpoint.clone(), "secret").await;

        let mut session = client.connect().await.unwrap();
        let err = session.list_datastores().await.unwrap_err();
        session.close().await;

        match err {
            InventoryError::Retrieval(msg) => {
                assert!(msg.contains("Datastore/datastore-1/summary"), "{msg}");
                assert!(msg.contains("500"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            endpoint.paths().last().map(String::as_str),
            Some("/SessionManager/SessionManager/Logout")
        );
    }

    #[tokio::test]
    async fn test_rejected_login_is_connection_error() {
        let endpoint = Arc::new(fake::Endpoint::default());
        let client = fake::start(endpoint.clone(), "wrong").await;

        let err = match client.connect().await {
            Err(e) => e,
            Ok(_) => panic!("login with a wrong password succeeded"),
        };
        assert!(matches!(err, InventoryError::Connection(_)));
        assert_eq!(
            endpoint.paths(),
            [
                "/ServiceInstance/ServiceInstance/content",
                "/SessionManager/SessionManager/Login",
            ]
        );
    }
}
