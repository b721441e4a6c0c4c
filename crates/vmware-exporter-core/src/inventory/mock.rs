//! In-memory inventory for tests and local runs without a platform.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::{
    DatastoreSnapshot, DiskSnapshot, HostSnapshot, InventoryClient, InventoryError,
    InventorySession, ResourceKind, VmSnapshot,
};

#[derive(Default)]
struct MockData {
    hosts: Vec<HostSnapshot>,
    datastores: Vec<DatastoreSnapshot>,
    vms: Vec<VmSnapshot>,
    fail_connect: bool,
    failing: HashSet<ResourceKind>,
    stalled: HashSet<ResourceKind>,
}

#[derive(Default)]
struct MockState {
    data: Mutex<MockData>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl MockState {
    fn data(&self) -> MutexGuard<'_, MockData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Inventory client serving fixed snapshots.
///
/// Clones share state, so a test can keep a handle and change data or inject
/// failures between refresh cycles.
#[derive(Clone, Default)]
pub struct MockInventory {
    state: Arc<MockState>,
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(self, hosts: Vec<HostSnapshot>) -> Self {
        self.set_hosts(hosts);
        self
    }

    pub fn with_datastores(self, datastores: Vec<DatastoreSnapshot>) -> Self {
        self.set_datastores(datastores);
        self
    }

    pub fn with_vms(self, vms: Vec<VmSnapshot>) -> Self {
        self.set_vms(vms);
        self
    }

    pub fn set_hosts(&self, hosts: Vec<HostSnapshot>) {
        self.state.data().hosts = hosts;
    }

    pub fn set_datastores(&self, datastores: Vec<DatastoreSnapshot>) {
        self.state.data().datastores = datastores;
    }

    pub fn set_vms(&self, vms: Vec<VmSnapshot>) {
        self.state.data().vms = vms;
    }

    /// Makes every subsequent `connect` fail.
    pub fn fail_connect(&self, fail: bool) {
        self.state.data().fail_connect = fail;
    }

    /// Makes listing objects of `kind` fail.
    pub fn fail_retrieval(&self, kind: ResourceKind, fail: bool) {
        let mut data = self.state.data();
        if fail {
            data.failing.insert(kind);
        } else {
            data.failing.remove(&kind);
        }
    }

    /// Makes listing objects of `kind` never complete.
    pub fn stall(&self, kind: ResourceKind, stall: bool) {
        let mut data = self.state.data();
        if stall {
            data.stalled.insert(kind);
        } else {
            data.stalled.remove(&kind);
        }
    }

    /// Number of successful `connect` calls so far.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of sessions closed so far.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// A small cluster: two hosts, two datastores, three VMs.
    pub fn typical_cluster() -> Self {
        let boot = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).single();
        Self::new()
            .with_hosts(vec![
                HostSnapshot {
                    name: "esx01.lab.local".into(),
                    power_state: "poweredOn".into(),
                    boot_time: boot,
                    cpu_mhz: 2400,
                    cpu_cores: 16,
                    cpu_usage_mhz: 5230,
                    memory_bytes: 137_438_953_472,
                    memory_usage_mib: 4096,
                    disks: vec![
                        DiskSnapshot {
                            device: "/vmfs/devices/disks/naa.600508b1001c4d41".into(),
                            operational_state: vec!["ok".into()],
                        },
                        DiskSnapshot {
                            device: "/vmfs/devices/disks/naa.600508b1001c4d42".into(),
                            operational_state: vec!["ok".into(), "degraded".into()],
                        },
                    ],
                },
                HostSnapshot {
                    name: "esx02.lab.local".into(),
                    power_state: "standBy".into(),
                    boot_time: None,
                    cpu_mhz: 2100,
                    cpu_cores: 8,
                    cpu_usage_mhz: 0,
                    memory_bytes: 68_719_476_736,
                    memory_usage_mib: 0,
                    disks: Vec::new(),
                },
            ])
            .with_datastores(vec![
                DatastoreSnapshot {
                    name: "datastore1".into(),
                    host_name: "vcenter.lab.local".into(),
                    capacity: 2_199_023_255_552,
                    free_space: 1_099_511_627_776,
                },
                DatastoreSnapshot {
                    name: "nfs-backup".into(),
                    host_name: "vcenter.lab.local".into(),
                    capacity: 10_995_116_277_760,
                    free_space: 5_497_558_138_880,
                },
            ])
            .with_vms(vec![
                VmSnapshot {
                    name: "web-01".into(),
                    host_name: "vcenter.lab.local".into(),
                    boot_time: boot,
                    num_cpu: 4,
                    cpu_capacity_mhz: 9600,
                    cpu_usage_mhz: 1200,
                    memory_mib: 8192,
                    memory_usage_mib: 2048,
                },
                VmSnapshot {
                    name: "db-01".into(),
                    host_name: "vcenter.lab.local".into(),
                    boot_time: boot,
                    num_cpu: 8,
                    cpu_capacity_mhz: 19200,
                    cpu_usage_mhz: 6400,
                    memory_mib: 32768,
                    memory_usage_mib: 24576,
                },
                VmSnapshot {
                    name: "template-ubuntu".into(),
                    host_name: "vcenter.lab.local".into(),
                    boot_time: None,
                    num_cpu: 2,
                    cpu_capacity_mhz: 0,
                    cpu_usage_mhz: 0,
                    memory_mib: 4096,
                    memory_usage_mib: 0,
                },
            ])
    }
}

#[async_trait]
impl InventoryClient for MockInventory {
    async fn connect(&self) -> Result<Box<dyn InventorySession>, InventoryError> {
        if self.state.data().fail_connect {
            return Err(InventoryError::connection("mock: authentication refused"));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
}

impl MockSession {
    async fn fetch<T: Clone>(
        &self,
        kind: ResourceKind,
        select: impl FnOnce(&MockData) -> &Vec<T>,
    ) -> Result<Vec<T>, InventoryError> {
        let result = {
            let data = self.state.data();
            if data.stalled.contains(&kind) {
                None
            } else if data.failing.contains(&kind) {
                Some(Err(InventoryError::retrieval(format!(
                    "mock: {} query failed",
                    kind.type_name()
                ))))
            } else {
                Some(Ok(select(&data).clone()))
            }
        };
        match result {
            Some(result) => result,
            None => futures::future::pending().await,
        }
    }
}

#[async_trait]
impl InventorySession for MockSession {
    async fn list_hosts(&mut self) -> Result<Vec<HostSnapshot>, InventoryError> {
        self.fetch(ResourceKind::Host, |d| &d.hosts).await
    }

    async fn list_datastores(&mut self) -> Result<Vec<DatastoreSnapshot>, InventoryError> {
        self.fetch(ResourceKind::Datastore, |d| &d.datastores).await
    }

    async fn list_vms(&mut self) -> Result<Vec<VmSnapshot>, InventoryError> {
        self.fetch(ResourceKind::VirtualMachine, |d| &d.vms).await
    }

    async fn close(self: Box<Self>) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
