//! Access to the virtualization platform's object inventory.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐  connect()  ┌──────────────────────┐
//! │  InventoryClient   │ ──────────► │   InventorySession   │
//! │  (trait)           │             │  list_hosts()        │
//! └─────────┬──────────┘             │  list_datastores()   │
//!           │                        │  list_vms()          │
//!    ┌──────┴───────┐                │  close()             │
//!    │              │                └──────────────────────┘
//! ┌──▼──────────┐ ┌─▼─────────────┐
//! │VsphereClient│ │ MockInventory │
//! │ (VI/JSON)   │ │ (Testing)     │
//! └─────────────┘ └───────────────┘
//! ```
//!
//! Every refresh cycle opens its own session and closes it when done.

pub mod mock;
pub mod vsphere;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use mock::MockInventory;
pub use vsphere::{VsphereClient, VsphereConfig};

/// Errors reported by an inventory client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InventoryError {
    /// The session could not be established or authenticated.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An object query failed or returned an undecodable payload.
    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

impl InventoryError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }
}

/// Resource types collected on every refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Host,
    Datastore,
    VirtualMachine,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Host,
        ResourceKind::Datastore,
        ResourceKind::VirtualMachine,
    ];

    /// Managed object type name on the platform.
    pub fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Host => "HostSystem",
            ResourceKind::Datastore => "Datastore",
            ResourceKind::VirtualMachine => "VirtualMachine",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ResourceKind::Host => 0,
            ResourceKind::Datastore => 1,
            ResourceKind::VirtualMachine => 2,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Host => "host",
            ResourceKind::Datastore => "datastore",
            ResourceKind::VirtualMachine => "vm",
        };
        f.write_str(s)
    }
}

/// A SCSI device attached to a host.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSnapshot {
    pub device: String,
    /// Operational state strings as reported by the platform ("ok", "degraded", ...).
    pub operational_state: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub name: String,
    pub power_state: String,
    pub boot_time: Option<DateTime<Utc>>,
    /// Per-core CPU frequency, MHz.
    pub cpu_mhz: i32,
    pub cpu_cores: i16,
    /// Overall CPU usage, MHz.
    pub cpu_usage_mhz: i64,
    /// Physical memory, bytes.
    pub memory_bytes: i64,
    /// Overall memory usage, MiB.
    pub memory_usage_mib: i64,
    pub disks: Vec<DiskSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatastoreSnapshot {
    pub name: String,
    pub host_name: String,
    /// Bytes.
    pub capacity: i64,
    /// Bytes.
    pub free_space: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VmSnapshot {
    pub name: String,
    pub host_name: String,
    pub boot_time: Option<DateTime<Utc>>,
    pub num_cpu: i32,
    /// CPU capacity, MHz.
    pub cpu_capacity_mhz: i64,
    /// CPU usage, MHz.
    pub cpu_usage_mhz: i64,
    /// Configured memory, MiB.
    pub memory_mib: i64,
    /// Guest memory usage, MiB.
    pub memory_usage_mib: i64,
}

/// Opens authenticated sessions against the platform.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn InventorySession>, InventoryError>;
}

/// An authenticated session. Each list call is a single bounded fetch of all
/// objects of that type.
#[async_trait]
pub trait InventorySession: Send {
    async fn list_hosts(&mut self) -> Result<Vec<HostSnapshot>, InventoryError>;

    async fn list_datastores(&mut self) -> Result<Vec<DatastoreSnapshot>, InventoryError>;

    async fn list_vms(&mut self) -> Result<Vec<VmSnapshot>, InventoryError>;

    /// Ends the session. Failures are logged by the implementation.
    async fn close(self: Box<Self>);
}
