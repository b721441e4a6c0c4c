//! Gauge registry shared by the collectors and the exposition handler.
//!
//! Every gauge family is registered once at startup with a fixed, ordered list
//! of label keys. After that the registry is only written through [`MetricRegistry::set`],
//! which overwrites the value of a single label tuple, and read through
//! [`MetricRegistry::render`], which produces the Prometheus text format.
//!
//! Registration takes `&mut self`, so the family map is immutable once the
//! registry is shared behind an `Arc`; writes go straight to the lock-free
//! `prometheus` gauges and need no registry-level lock.

use std::collections::HashMap;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::error;

/// Content type of [`MetricRegistry::render`] output.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Errors raised by registration and writes.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A family was registered twice with different label keys.
    #[error("gauge {name} already registered with labels {registered:?}, requested {requested:?}")]
    SchemaConflict {
        name: String,
        registered: Vec<String>,
        requested: Vec<String>,
    },

    /// A write targeted a family that was never registered.
    #[error("gauge {0} is not registered")]
    Unregistered(String),

    /// A write supplied the wrong number of label values.
    #[error("gauge {name} expects {expected} label values, got {got}")]
    LabelMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// Rejected by the underlying prometheus registry (invalid name, label, ...).
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// One value destined for one label tuple of one gauge family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    /// Label values, in the order of the family's label keys.
    pub labels: Vec<String>,
    pub value: f64,
}

impl MetricSample {
    pub fn new<I, S>(name: &'static str, labels: I, value: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name,
            labels: labels.into_iter().map(Into::into).collect(),
            value,
        }
    }
}

struct GaugeFamily {
    label_keys: Vec<String>,
    gauges: GaugeVec,
}

/// Set of registered gauge families.
pub struct MetricRegistry {
    registry: Registry,
    families: HashMap<String, GaugeFamily>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            families: HashMap::new(),
        }
    }

    /// Registers a gauge family.
    ///
    /// Registering the same name again is a no-op when the label keys are
    /// identical and a [`RegistryError::SchemaConflict`] otherwise.
    pub fn register(
        &mut self,
        name: &str,
        help: &str,
        label_keys: &[&str],
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.families.get(name) {
            if existing.label_keys.iter().map(String::as_str).eq(label_keys.iter().copied()) {
                return Ok(());
            }
            return Err(RegistryError::SchemaConflict {
                name: name.to_owned(),
                registered: existing.label_keys.clone(),
                requested: label_keys.iter().map(|k| (*k).to_owned()).collect(),
            });
        }

        let gauges = GaugeVec::new(Opts::new(name, help), label_keys)?;
        self.registry.register(Box::new(gauges.clone()))?;
        self.families.insert(
            name.to_owned(),
            GaugeFamily {
                label_keys: label_keys.iter().map(|k| (*k).to_owned()).collect(),
                gauges,
            },
        );
        Ok(())
    }

    /// Returns the label keys of a registered family.
    pub fn label_keys(&self, name: &str) -> Option<&[String]> {
        self.families.get(name).map(|f| f.label_keys.as_slice())
    }

    /// Overwrites the value stored for `label_values` in family `name`.
    pub fn set(&self, name: &str, label_values: &[&str], value: f64) -> Result<(), RegistryError> {
        let family = self
            .families
            .get(name)
            .ok_or_else(|| RegistryError::Unregistered(name.to_owned()))?;
        if family.label_keys.len() != label_values.len() {
            return Err(RegistryError::LabelMismatch {
                name: name.to_owned(),
                expected: family.label_keys.len(),
                got: label_values.len(),
            });
        }
        family
            .gauges
            .get_metric_with_label_values(label_values)?
            .set(value);
        Ok(())
    }

    /// Writes a single sample.
    pub fn apply(&self, sample: &MetricSample) -> Result<(), RegistryError> {
        let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
        self.set(sample.name, &labels, sample.value)
    }

    /// Renders every populated label tuple in the Prometheus text format.
    ///
    /// Families are ordered by name and tuples by label values. Families that
    /// were never written produce no output at all.
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&families, &mut buf) {
            error!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
