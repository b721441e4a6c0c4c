//! Datastore samples: capacity and free space.

use crate::inventory::DatastoreSnapshot;
use crate::metrics::{DATASTORE_CAPACITY, DATASTORE_FREESPACE};
use crate::registry::MetricSample;

pub fn datastore_samples(ds: &DatastoreSnapshot) -> Vec<MetricSample> {
    let labels = [ds.name.as_str(), ds.host_name.as_str()];
    vec![
        MetricSample::new(DATASTORE_CAPACITY, labels, ds.capacity as f64),
        MetricSample::new(DATASTORE_FREESPACE, labels, ds.free_space as f64),
    ]
}
