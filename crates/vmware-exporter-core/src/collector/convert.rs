//! Value conversions shared by the resource mappers.

use chrono::{DateTime, Utc};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;
const HZ_PER_MHZ: f64 = 1000.0 * 1000.0;

/// poweredOn → 1, poweredOff → 2, standBy → 3, anything else → 0.
pub fn power_state_value(state: &str) -> f64 {
    match state {
        "poweredOn" => 1.0,
        "poweredOff" => 2.0,
        "standBy" => 3.0,
        _ => 0.0,
    }
}

/// Total CPU capacity in MHz. The product is taken in the integer domain.
pub fn total_cpu_capacity(cpu_mhz: i32, cores: i16) -> f64 {
    (i64::from(cpu_mhz) * i64::from(cores)) as f64
}

/// Unix seconds of the boot time, 0 when the platform reports none.
pub fn boot_time_seconds(boot_time: Option<DateTime<Utc>>) -> f64 {
    boot_time.map_or(0.0, |t| t.timestamp() as f64)
}

/// 1 when every operational state is "ok" (including no states at all), 0 otherwise.
pub fn disk_health<S: AsRef<str>>(operational_state: &[S]) -> f64 {
    if operational_state.iter().all(|s| s.as_ref() == "ok") {
        1.0
    } else {
        0.0
    }
}

pub fn mib_to_bytes(mib: i64) -> f64 {
    mib as f64 * BYTES_PER_MIB
}

pub fn mhz_to_hz(mhz: i64) -> f64 {
    mhz as f64 * HZ_PER_MHZ
}
