//! vmware-exporter-core: collection engine for the VMware exporter.
//!
//! Provides:
//! - `registry`: gauge registry with fixed label schemas and text rendering
//! - `metrics`: the catalog of exported gauge families
//! - `inventory`: platform client contract, vSphere VI/JSON client, mock inventory
//! - `collector`: host, datastore and VM collectors (inventory → samples)
//! - `refresh`: fire-and-forget refresh orchestration behind a `Spawner`

pub mod collector;
pub mod inventory;
pub mod metrics;
pub mod refresh;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_util;

/// Crate version, reported by the server at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
