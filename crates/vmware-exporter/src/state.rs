//! Shared application state and the process allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use vmware_exporter_core::refresh::Refresher;
use vmware_exporter_core::registry::MetricRegistry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) refresher: Arc<Refresher>,
    /// Path the exposition handler is mounted on, linked from the landing page.
    pub(crate) telemetry_path: Arc<str>,
}

impl AppState {
    pub(crate) fn new(refresher: Refresher, telemetry_path: &str) -> Self {
        Self {
            refresher: Arc::new(refresher),
            telemetry_path: Arc::from(telemetry_path),
        }
    }

    pub(crate) fn registry(&self) -> &MetricRegistry {
        self.refresher.registry()
    }
}
