use crate::metrics::{SyncMetricsCache, SyncReporter, SyncStatus, Tags};
use parking_lot::RwLock;
use policy_sync_k8s_api::{gvk_of, DynamicObject};
use std::sync::Arc;

/// Mutates the policy engine's data store.
pub trait DataClient {
    type Response;
    type Error;

    fn add_data(&self, obj: &DynamicObject) -> Result<Self::Response, Self::Error>;

    fn remove_data(&self, obj: &DynamicObject) -> Result<Self::Response, Self::Error>;
}

/// Serializes all mutations of the policy engine's data store and keeps the
/// sync metrics cache in step with their outcomes.
///
/// Every operation holds the tracker's lock for its whole duration: store
/// mutations and metrics updates take the write lock, while reporting takes
/// the read lock. Operations must not be called while a tracker operation is
/// already in progress on the same thread.
#[derive(Debug)]
pub struct CacheManagerTracker<C> {
    inner: RwLock<Inner<C>>,
}

#[derive(Debug)]
struct Inner<C> {
    client: C,
    metrics: Arc<SyncMetricsCache>,
}

/// Builds the key under which an object's sync status is tracked.
pub fn sync_metric_key(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}", namespace.unwrap_or_default(), name)
}

// === impl CacheManagerTracker ===

impl<C: DataClient> CacheManagerTracker<C> {
    pub fn new(client: C, metrics: Arc<SyncMetricsCache>) -> Self {
        Self {
            inner: RwLock::new(Inner { client, metrics }),
        }
    }

    /// Adds an object to the data store.
    ///
    /// If the store rejects the object and a key is provided, the key is
    /// tagged with an error status. The store's result is returned as-is.
    pub fn add_data(
        &self,
        obj: &DynamicObject,
        sync_metric_key: Option<&str>,
    ) -> Result<C::Response, C::Error> {
        let inner = self.inner.write();
        let res = inner.client.add_data(obj);
        if res.is_err() {
            if let Some(key) = sync_metric_key {
                let kind = gvk_of(obj).map(|gvk| gvk.kind).unwrap_or_default();
                tracing::debug!(%key, %kind, "Failed to add data");
                inner.metrics.add_object(key, Tags::new(kind, SyncStatus::Error));
            }
        }
        res
    }

    /// Removes an object from the data store.
    ///
    /// When the removal succeeds and a key is provided, the key's metrics
    /// entry is dropped. A failed removal leaves the entry in place. The
    /// store's result is returned as-is.
    pub fn remove_data(
        &self,
        obj: &DynamicObject,
        sync_metric_key: Option<&str>,
    ) -> Result<C::Response, C::Error> {
        let inner = self.inner.write();
        let res = inner.client.remove_data(obj);
        if res.is_ok() {
            if let Some(key) = sync_metric_key {
                inner.metrics.delete_object(key);
            }
        }
        res
    }

    pub fn report_sync_metrics(&self, reporter: &impl SyncReporter) {
        self.inner.read().metrics.report_sync(reporter);
    }

    pub fn add_object_for_sync_metrics(&self, sync_metric_key: &str, tags: Tags) {
        self.inner.write().metrics.add_object(sync_metric_key, tags);
    }

    pub fn add_kind_for_sync_metrics(&self, kind: &str) {
        self.inner.write().metrics.add_kind(kind);
    }
}

impl<C: DataClient + ?Sized> DataClient for Arc<C> {
    type Response = C::Response;
    type Error = C::Error;

    fn add_data(&self, obj: &DynamicObject) -> Result<Self::Response, Self::Error> {
        (**self).add_data(obj)
    }

    fn remove_data(&self, obj: &DynamicObject) -> Result<Self::Response, Self::Error> {
        (**self).remove_data(obj)
    }
}
