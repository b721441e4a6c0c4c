//! Virtual machine samples. CPU figures are exported in Hz, memory usage in bytes;
//! configured memory stays in MiB.

use super::convert::{boot_time_seconds, mhz_to_hz, mib_to_bytes};
use crate::inventory::VmSnapshot;
use crate::metrics::{
    VM_BOOT_TIMESTAMP, VM_CPU_AVAILABLE, VM_CPU_USAGE, VM_MEM_AVAILABLE, VM_MEM_USAGE,
    VM_NUM_CPU,
};
use crate::registry::MetricSample;

pub fn vm_samples(vm: &VmSnapshot) -> Vec<MetricSample> {
    let labels = [vm.name.as_str(), vm.host_name.as_str()];
    vec![
        MetricSample::new(VM_BOOT_TIMESTAMP, labels, boot_time_seconds(vm.boot_time)),
        MetricSample::new(VM_CPU_AVAILABLE, labels, mhz_to_hz(vm.cpu_capacity_mhz)),
        MetricSample::new(VM_CPU_USAGE, labels, mhz_to_hz(vm.cpu_usage_mhz)),
        MetricSample::new(VM_NUM_CPU, labels, f64::from(vm.num_cpu)),
        MetricSample::new(VM_MEM_AVAILABLE, labels, vm.memory_mib as f64),
        MetricSample::new(VM_MEM_USAGE, labels, mib_to_bytes(vm.memory_usage_mib)),
    ]
}
