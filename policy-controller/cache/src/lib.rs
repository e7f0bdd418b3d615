//! Guards the policy engine's data store.
//!
//! All additions and removals of synced objects flow through a
//! [`CacheManagerTracker`], which serializes access to the store and records
//! per-object sync outcomes in a [`SyncMetricsCache`]. The cache is reported
//! to Prometheus via [`SyncMetrics`].
//!
//! The [`WatchRegistry`] exposes which kinds currently have a watch so that
//! readiness expectations for unwatched kinds can be abandoned.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod metrics;
mod registry;
mod store;
mod tracker;

pub use self::{
    metrics::{SyncMetrics, SyncMetricsCache, SyncReporter, SyncStatus, Tags},
    registry::WatchRegistry,
    store::{Change, DataStore, ObjectKey, StoreError},
    tracker::{sync_metric_key, CacheManagerTracker, DataClient},
};
