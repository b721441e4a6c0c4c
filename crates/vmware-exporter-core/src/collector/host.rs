//! Host samples: power, boot time, CPU, memory and per-disk health.

use super::convert::{
    boot_time_seconds, disk_health, mib_to_bytes, power_state_value, total_cpu_capacity,
};
use crate::inventory::HostSnapshot;
use crate::metrics::{
    HOST_BOOT_TIMESTAMP, HOST_CPU_MAX, HOST_CPU_USAGE, HOST_DISK_OK, HOST_MEMORY_MAX,
    HOST_MEMORY_USAGE, HOST_POWER_STATE,
};
use crate::registry::MetricSample;

pub fn host_samples(host: &HostSnapshot) -> Vec<MetricSample> {
    let name = host.name.as_str();
    let mut samples = vec![
        MetricSample::new(HOST_POWER_STATE, [name], power_state_value(&host.power_state)),
        MetricSample::new(HOST_BOOT_TIMESTAMP, [name], boot_time_seconds(host.boot_time)),
        MetricSample::new(
            HOST_CPU_MAX,
            [name],
            total_cpu_capacity(host.cpu_mhz, host.cpu_cores),
        ),
        MetricSample::new(HOST_CPU_USAGE, [name], host.cpu_usage_mhz as f64),
        MetricSample::new(HOST_MEMORY_MAX, [name], host.memory_bytes as f64),
        MetricSample::new(HOST_MEMORY_USAGE, [name], mib_to_bytes(host.memory_usage_mib)),
    ];
    samples.extend(host.disks.iter().map(|disk| {
        MetricSample::new(
            HOST_DISK_OK,
            [name, disk.device.as_str()],
            disk_health(&disk.operational_state),
        )
    }));
    samples
}
