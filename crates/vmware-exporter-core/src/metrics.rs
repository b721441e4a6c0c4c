//! Exported gauge families.
//!
//! Names and label keys are part of the exporter's wire contract and must not
//! change between releases.

use crate::registry::{MetricRegistry, RegistryError};

pub const HOST_LABELS: &[&str] = &["host_name"];
pub const DISK_LABELS: &[&str] = &["host_name", "device"];
pub const DATASTORE_LABELS: &[&str] = &["ds_name", "host_name"];
pub const VM_LABELS: &[&str] = &["vm_name", "host_name"];

pub const HOST_POWER_STATE: &str = "vmware_host_power_state";
pub const HOST_BOOT_TIMESTAMP: &str = "vmware_host_boot_timestamp_seconds";
pub const HOST_CPU_MAX: &str = "vmware_host_cpu_max";
pub const HOST_CPU_USAGE: &str = "vmware_host_cpu_usage";
pub const HOST_MEMORY_MAX: &str = "vmware_host_memory_max";
pub const HOST_MEMORY_USAGE: &str = "vmware_host_memory_usage";
pub const HOST_DISK_OK: &str = "vmware_host_disk_ok";

pub const DATASTORE_CAPACITY: &str = "vmware_datastore_capacity_size";
pub const DATASTORE_FREESPACE: &str = "vmware_datastore_freespace_size";

pub const VM_BOOT_TIMESTAMP: &str = "vmware_vm_boot_timestamp_seconds";
pub const VM_CPU_AVAILABLE: &str = "vmware_vm_cpu_avaleblemhz";
pub const VM_CPU_USAGE: &str = "vmware_vm_cpu_usagemhz";
pub const VM_NUM_CPU: &str = "vmware_vm_num_cpu";
pub const VM_MEM_AVAILABLE: &str = "vmware_vm_mem_avaleble";
pub const VM_MEM_USAGE: &str = "vmware_vm_mem_usage";

/// Descriptor of one gauge family.
#[derive(Debug, Clone, Copy)]
pub struct GaugeDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// All families exported by the collectors, in registration order.
pub const CATALOG: &[GaugeDesc] = &[
    GaugeDesc {
        name: HOST_POWER_STATE,
        help: "poweredOn 1, poweredOff 2, standBy 3, other 0",
        labels: HOST_LABELS,
    },
    GaugeDesc {
        name: HOST_BOOT_TIMESTAMP,
        help: "Uptime host",
        labels: HOST_LABELS,
    },
    GaugeDesc {
        name: HOST_CPU_MAX,
        help: "CPU total",
        labels: HOST_LABELS,
    },
    GaugeDesc {
        name: HOST_CPU_USAGE,
        help: "CPU Usage",
        labels: HOST_LABELS,
    },
    GaugeDesc {
        name: HOST_MEMORY_MAX,
        help: "Memory max",
        labels: HOST_LABELS,
    },
    GaugeDesc {
        name: HOST_MEMORY_USAGE,
        help: "Memory Usage",
        labels: HOST_LABELS,
    },
    GaugeDesc {
        name: HOST_DISK_OK,
        help: "Disk is working normally",
        labels: DISK_LABELS,
    },
    GaugeDesc {
        name: DATASTORE_CAPACITY,
        help: "Datastore total",
        labels: DATASTORE_LABELS,
    },
    GaugeDesc {
        name: DATASTORE_FREESPACE,
        help: "Datastore free",
        labels: DATASTORE_LABELS,
    },
    GaugeDesc {
        name: VM_BOOT_TIMESTAMP,
        help: "VMWare VM boot time in seconds",
        labels: VM_LABELS,
    },
    GaugeDesc {
        name: VM_CPU_AVAILABLE,
        help: "VMWare VM usage CPU",
        labels: VM_LABELS,
    },
    GaugeDesc {
        name: VM_CPU_USAGE,
        help: "VMWare VM usage CPU",
        labels: VM_LABELS,
    },
    GaugeDesc {
        name: VM_NUM_CPU,
        help: "Available number of cores",
        labels: VM_LABELS,
    },
    GaugeDesc {
        name: VM_MEM_AVAILABLE,
        help: "Available memory",
        labels: VM_LABELS,
    },
    GaugeDesc {
        name: VM_MEM_USAGE,
        help: "Usage memory",
        labels: VM_LABELS,
    },
];

/// Registers the whole catalog. Must run once before the first refresh.
pub fn register_all(registry: &mut MetricRegistry) -> Result<(), RegistryError> {
    for desc in CATALOG {
        registry.register(desc.name, desc.help, desc.labels)?;
    }
    Ok(())
}
