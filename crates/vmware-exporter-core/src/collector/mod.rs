//! Resource collectors.
//!
//! A collector run opens a session, fetches every object of one resource type,
//! maps the objects to samples and writes them into the registry. Mapping is
//! pure and completes before the first write, so a run that fails at connect or
//! query time leaves the previous values of that resource type in place.
//!
//! Failures never propagate: they are logged and reported through
//! [`CollectOutcome::Failed`].

pub mod convert;
pub mod datastore;
pub mod host;
pub mod vm;

use thiserror::Error;
use tracing::{debug, warn};

use crate::inventory::{InventoryClient, InventoryError, ResourceKind};
use crate::registry::{MetricRegistry, MetricSample, RegistryError};

pub use datastore::datastore_samples;
pub use host::host_samples;
pub use vm::vm_samples;

/// Why a collector run did not update its gauges.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("connect: {0}")]
    Connection(InventoryError),

    #[error("retrieve: {0}")]
    Retrieval(InventoryError),

    /// A sample was rejected by the registry; earlier samples of the run were written.
    #[error("write: {0}")]
    Write(#[from] RegistryError),
}

/// Result of one collector run.
#[derive(Debug)]
pub enum CollectOutcome {
    Updated { objects: usize, samples: usize },
    Failed(CollectError),
}

impl CollectOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, CollectOutcome::Updated { .. })
    }
}

/// Runs the collector for `kind` once.
pub async fn collect(
    kind: ResourceKind,
    client: &dyn InventoryClient,
    registry: &MetricRegistry,
) -> CollectOutcome {
    let outcome = match fetch_samples(kind, client).await {
        Ok((objects, samples)) => match write_samples(registry, &samples) {
            Ok(()) => CollectOutcome::Updated {
                objects,
                samples: samples.len(),
            },
            Err(e) => CollectOutcome::Failed(e.into()),
        },
        Err(e) => CollectOutcome::Failed(e),
    };

    match &outcome {
        CollectOutcome::Updated { objects, samples } => {
            debug!(resource = %kind, objects, samples, "collection completed");
        }
        CollectOutcome::Failed(e) => {
            warn!(resource = %kind, error = %e, "collection failed");
        }
    }
    outcome
}

async fn fetch_samples(
    kind: ResourceKind,
    client: &dyn InventoryClient,
) -> Result<(usize, Vec<MetricSample>), CollectError> {
    let mut session = client.connect().await.map_err(CollectError::Connection)?;

    let fetched = match kind {
        ResourceKind::Host => session
            .list_hosts()
            .await
            .map(|hosts| (hosts.len(), hosts.iter().flat_map(host_samples).collect())),
        ResourceKind::Datastore => session.list_datastores().await.map(|datastores| {
            (
                datastores.len(),
                datastores.iter().flat_map(datastore_samples).collect(),
            )
        }),
        ResourceKind::VirtualMachine => session
            .list_vms()
            .await
            .map(|vms| (vms.len(), vms.iter().flat_map(vm_samples).collect())),
    };

    session.close().await;
    fetched.map_err(CollectError::Retrieval)
}

fn write_samples(registry: &MetricRegistry, samples: &[MetricSample]) -> Result<(), RegistryError> {
    for sample in samples {
        registry.apply(sample)?;
    }
    Ok(())
}
