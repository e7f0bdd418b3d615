use crate::{
    cache::{sync_metric_key, CacheManagerTracker, DataStore, SyncStatus, Tags, WatchRegistry},
    k8s::{self, watcher, ResourceExt, WatchStreamExt},
    readiness::Tracker,
    status::FinalizerStatus,
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use futures::prelude::*;
use policy_sync_core::{Gvk, WatchSet};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{info_span, Instrument};

pub type SyncCache = CacheManagerTracker<Arc<DataStore>>;

/// Starts the watch task for a kind.
///
/// The task must consume its [`DiscoveryReport`] before it begins syncing.
pub trait SpawnWatch {
    fn spawn_watch(&self, gvk: Gvk, report: DiscoveryReport) -> JoinHandle<()>;
}

/// Watches a kind through the dynamic API, feeding the data store.
#[derive(Clone)]
pub struct DynamicWatch {
    client: k8s::Client,
    cache: Arc<SyncCache>,
    tracker: Arc<Tracker>,
}

/// Runs one watch per desired kind.
///
/// The watch registry and the replica's finalizer status always reflect the
/// kinds whose watches have actually started. When a kind stops being
/// desired, its objects are removed from the data store.
pub struct WatchManager<S = DynamicWatch> {
    spawn: S,
    store: Arc<DataStore>,
    cache: Arc<SyncCache>,
    registry: Arc<WatchRegistry>,
    status: FinalizerStatus,
    watches: HashMap<Gvk, Running>,
    next_id: u64,
    startup: Startup,
}

#[derive(Debug)]
struct Running {
    id: u64,
    task: JoinHandle<()>,
}

/// Reports the outcome of a watch's discovery to its manager.
#[derive(Debug)]
pub struct DiscoveryReport {
    id: u64,
    gvk: Gvk,
    tx: mpsc::UnboundedSender<Discovered>,
}

#[derive(Debug)]
struct Discovered {
    id: u64,
    gvk: Gvk,
    served: bool,
}

/// Tracks the first batch of watches so that the registry is only marked
/// started once every initially desired kind has been discovered, found
/// unavailable, or stopped.
#[derive(Debug, Default)]
struct Startup {
    configured: bool,
    pending: HashSet<Gvk>,
    done: bool,
}

// === impl DynamicWatch ===

impl DynamicWatch {
    pub fn new(client: k8s::Client, cache: Arc<SyncCache>, tracker: Arc<Tracker>) -> Self {
        Self {
            client,
            cache,
            tracker,
        }
    }
}

impl SpawnWatch for DynamicWatch {
    fn spawn_watch(&self, gvk: Gvk, report: DiscoveryReport) -> JoinHandle<()> {
        let span = info_span!("watch", %gvk);
        tokio::spawn(
            watch_kind(
                self.client.clone(),
                gvk,
                self.cache.clone(),
                self.tracker.clone(),
                report,
            )
            .instrument(span),
        )
    }
}

// === impl DiscoveryReport ===

impl DiscoveryReport {
    pub fn gvk(&self) -> &Gvk {
        &self.gvk
    }

    pub fn served(self) {
        self.send(true)
    }

    pub fn unavailable(self) {
        self.send(false)
    }

    fn send(self, served: bool) {
        let _ = self.tx.send(Discovered {
            id: self.id,
            gvk: self.gvk,
            served,
        });
    }
}

// === impl WatchManager ===

impl<S: SpawnWatch> WatchManager<S> {
    pub fn new(
        spawn: S,
        store: Arc<DataStore>,
        cache: Arc<SyncCache>,
        registry: Arc<WatchRegistry>,
        status: FinalizerStatus,
    ) -> Self {
        Self {
            spawn,
            store,
            cache,
            registry,
            status,
            watches: HashMap::new(),
            next_id: 0,
            startup: Startup::default(),
        }
    }

    pub async fn run(mut self, mut desired: watch::Receiver<WatchSet>, drain: drain::Watch) {
        let (discovered_tx, mut discovered_rx) = mpsc::unbounded_channel();

        tokio::pin! {
            let shutdown = drain.signaled();
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::debug!("Shutdown signaled");
                    break;
                }

                res = desired.changed() => {
                    if res.is_err() {
                        tracing::debug!("Sync configuration index dropped");
                        break;
                    }
                    let kinds = desired.borrow_and_update().clone();
                    self.reconcile(&kinds, &discovered_tx).await;
                }

                Some(discovered) = discovered_rx.recv() => self.discovered(discovered),
            }
        }

        for (_, Running { task, .. }) in self.watches.drain() {
            task.abort();
        }
    }

    async fn reconcile(
        &mut self,
        desired: &WatchSet,
        discovered_tx: &mpsc::UnboundedSender<Discovered>,
    ) {
        let running = self.watches.keys().cloned().collect::<WatchSet>();
        let (start, stop) = plan(&running, desired);

        for gvk in stop {
            if let Some(Running { task, .. }) = self.watches.remove(&gvk) {
                task.abort();
                // The task must not sync objects after they are purged.
                let _ = task.await;
            }
            if self.registry.unwatch(&gvk) {
                tracing::info!(%gvk, "Stopped watch");
            }
            self.startup.resolved(&gvk);
            self.purge(&gvk);
        }

        for gvk in start.iter() {
            let id = self.next_id;
            self.next_id += 1;
            let report = DiscoveryReport {
                id,
                gvk: gvk.clone(),
                tx: discovered_tx.clone(),
            };
            let task = self.spawn.spawn_watch(gvk.clone(), report);
            self.watches.insert(gvk.clone(), Running { id, task });
        }

        self.startup.configured(start);
        self.maybe_start();
        self.status.observe(&self.registry.watched());
    }

    fn discovered(&mut self, Discovered { id, gvk, served }: Discovered) {
        // Reports from stopped or restarted watches are stale.
        if self.watches.get(&gvk).map(|running| running.id) != Some(id) {
            return;
        }

        if served {
            if self.registry.watch(gvk.clone()) {
                tracing::info!(%gvk, "Started watch");
            }
        } else {
            // Forget the finished task so that a later configuration retries
            // the kind.
            self.watches.remove(&gvk);
        }
        self.startup.resolved(&gvk);

        self.maybe_start();
        self.status.observe(&self.registry.watched());
    }

    /// Removes a kind's objects, and their sync metrics, from the data store.
    fn purge(&self, gvk: &Gvk) {
        let objects = self.store.objects_of(gvk);
        if objects.is_empty() {
            return;
        }
        tracing::info!(%gvk, objects = objects.len(), "Removing unwatched data");
        for obj in objects {
            remove(&self.cache, gvk, obj);
        }
    }

    fn maybe_start(&mut self) {
        if self.startup.ready() {
            tracing::debug!(kinds = self.registry.watched().len(), "Watches started");
            self.registry.start();
        }
    }
}

/// Returns the kinds to start and stop so that `running` becomes `desired`.
fn plan(running: &WatchSet, desired: &WatchSet) -> (Vec<Gvk>, Vec<Gvk>) {
    (desired.difference(running), running.difference(desired))
}

// === impl Startup ===

impl Startup {
    fn configured(&mut self, started: Vec<Gvk>) {
        if self.configured {
            return;
        }
        self.configured = true;
        self.pending.extend(started);
    }

    fn resolved(&mut self, gvk: &Gvk) {
        self.pending.remove(gvk);
    }

    /// Returns true exactly once: when the initial batch has resolved.
    fn ready(&mut self) -> bool {
        if self.done || !self.configured || !self.pending.is_empty() {
            return false;
        }
        self.done = true;
        true
    }
}

async fn watch_kind(
    client: k8s::Client,
    gvk: Gvk,
    cache: Arc<SyncCache>,
    tracker: Arc<Tracker>,
    report: DiscoveryReport,
) {
    let (resource, _) =
        match k8s::discovery::pinned_kind(&client, &k8s::to_group_version_kind(&gvk)).await {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(%error, "Kind is not served; skipping watch");
                report.unavailable();
                return;
            }
        };
    report.served();
    cache.add_kind_for_sync_metrics(&gvk.kind);

    let api = k8s::Api::<k8s::DynamicObject>::all_with(client, &resource);
    let events = watcher::watcher(api, watcher::Config::default()).default_backoff();
    tokio::pin!(events);

    let types = k8s::TypeMeta {
        api_version: resource.api_version.clone(),
        kind: resource.kind.clone(),
    };
    while let Some(event) = events.next().await {
        match event {
            Ok(watcher::Event::Apply(obj)) | Ok(watcher::Event::InitApply(obj)) => {
                add(&cache, &gvk, with_types(obj, &types));
            }
            Ok(watcher::Event::Delete(obj)) => remove(&cache, &gvk, with_types(obj, &types)),
            Ok(watcher::Event::Init) => tracing::debug!("Listing"),
            Ok(watcher::Event::InitDone) => {
                tracing::debug!("Listed");
                tracker.observe_data(&gvk);
            }
            Err(error) => tracing::warn!(%error, "Watch failed"),
        }
    }
}

fn add(cache: &SyncCache, gvk: &Gvk, obj: k8s::DynamicObject) {
    let key = object_key(gvk, &obj);
    match cache.add_data(&obj, Some(&key)) {
        Ok(change) => {
            tracing::trace!(%key, ?change, "Synced");
            cache.add_object_for_sync_metrics(&key, Tags::new(&gvk.kind, SyncStatus::Active));
        }
        Err(error) => tracing::warn!(%key, %error, "Failed to sync"),
    }
}

fn remove(cache: &SyncCache, gvk: &Gvk, obj: k8s::DynamicObject) {
    let key = object_key(gvk, &obj);
    match cache.remove_data(&obj, Some(&key)) {
        Ok(change) => tracing::trace!(%key, ?change, "Removed"),
        Err(error) => tracing::warn!(%key, %error, "Failed to remove"),
    }
}

/// List responses may omit each item's type.
fn with_types(mut obj: k8s::DynamicObject, types: &k8s::TypeMeta) -> k8s::DynamicObject {
    if obj.types.is_none() {
        obj.types = Some(types.clone());
    }
    obj
}

/// Objects of different kinds may share a name, so keys are qualified by kind.
fn object_key(gvk: &Gvk, obj: &k8s::DynamicObject) -> String {
    format!(
        "{}/{}",
        gvk,
        sync_metric_key(obj.namespace().as_deref(), &obj.name_any())
    )
}
