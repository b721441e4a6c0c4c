//! Refresh orchestration.
//!
//! A trigger launches one collector task per resource type and returns
//! immediately. Tasks are handed to a [`Spawner`], so the server runs them on
//! the tokio runtime while tests queue them and drive them to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tracing::debug;

use crate::collector::{self, CollectOutcome};
use crate::inventory::{InventoryClient, ResourceKind};
use crate::registry::MetricRegistry;

/// Runs detached background tasks.
pub trait Spawner: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Spawns onto the current tokio runtime. Must be used from within a runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}

type InFlight = Arc<[AtomicBool; 3]>;

/// Marks a resource type as in flight until dropped.
struct InFlightGuard {
    flags: InFlight,
    kind: ResourceKind,
}

impl InFlightGuard {
    fn acquire(flags: &InFlight, kind: ResourceKind) -> Option<Self> {
        flags[kind.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flags: flags.clone(),
                kind,
            })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flags[self.kind.index()].store(false, Ordering::Release);
    }
}

/// Fires the host, datastore and VM collectors.
pub struct Refresher {
    client: Arc<dyn InventoryClient>,
    registry: Arc<MetricRegistry>,
    spawner: Arc<dyn Spawner>,
    in_flight: Option<InFlight>,
}

impl Refresher {
    pub fn new(
        client: Arc<dyn InventoryClient>,
        registry: Arc<MetricRegistry>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        Self {
            client,
            registry,
            spawner,
            in_flight: None,
        }
    }

    /// With single-flight enabled, a trigger skips every resource type whose
    /// previous collection has not finished yet.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(|| Arc::new(std::array::from_fn(|_| AtomicBool::new(false))));
        self
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Starts one refresh cycle without waiting for it.
    pub fn trigger(&self) {
        for kind in ResourceKind::ALL {
            let guard = match &self.in_flight {
                Some(flags) => match InFlightGuard::acquire(flags, kind) {
                    Some(guard) => Some(guard),
                    None => {
                        debug!(resource = %kind, "collection still in flight, skipping");
                        continue;
                    }
                },
                None => None,
            };

            let client = self.client.clone();
            let registry = self.registry.clone();
            self.spawner.spawn(Box::pin(async move {
                let _guard = guard;
                debug!(resource = %kind, "start collect");
                let outcome = collector::collect(kind, client.as_ref(), &registry).await;
                debug!(
                    resource = %kind,
                    updated = matches!(outcome, CollectOutcome::Updated { .. }),
                    "end collect"
                );
            }));
        }
    }
}
