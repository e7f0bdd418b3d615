use crate::{
    cache::{CacheManagerTracker, DataStore, SyncMetrics, SyncMetricsCache, WatchRegistry},
    k8s, readiness, status, ConfigIndex, DynamicWatch, SyncCache, WatchManager,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::{sync::watch, time::Duration};
use tracing::{info_span, Instrument};

const METRICS_REPORT_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[clap(
    name = "policy-sync",
    about = "Syncs cluster data into the policy engine"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "policy_sync=info,warn",
        env = "POLICY_SYNC_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Namespace of the `Config` resource and this replica's status.
    #[clap(long, default_value = "policy-sync-system")]
    controller_namespace: String,

    /// Name of the `Config` resource that lists the kinds to sync.
    #[clap(long, default_value = "config")]
    config_name: String,

    /// Identifies this replica; names its `ConfigPodStatus`.
    #[clap(long, env = "POD_NAME")]
    pod_name: String,

    /// How often unsatisfiable readiness expectations are pruned.
    #[clap(long, default_value = "3000")]
    expectations_interval_ms: u64,

    #[clap(long, default_value = "5000")]
    patch_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            controller_namespace,
            config_name,
            pod_name,
            expectations_interval_ms,
            patch_timeout_ms,
        } = self;

        let mut prom = <Registry>::default();
        let sync_prom = prom.sub_registry_with_prefix("policy_sync");
        let sync_metrics = SyncMetrics::register(sync_prom);
        let status_metrics = status::ControllerMetrics::register(sync_prom);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let tracker = Arc::new(readiness::Tracker::default());
        let registry = Arc::new(WatchRegistry::default());
        let store = Arc::new(DataStore::default());
        let cache: Arc<SyncCache> = Arc::new(CacheManagerTracker::new(
            store.clone(),
            Arc::new(SyncMetricsCache::default()),
        ));

        // Watch the sync configuration. The index seeds readiness
        // expectations and publishes the kinds to watch.
        let (config_index, desired) = ConfigIndex::shared(&config_name, tracker.clone());
        let configs = runtime.watch_namespaced::<k8s::Config>(
            controller_namespace.clone(),
            k8s::watcher::Config::default().fields(&format!("metadata.name={config_name}")),
        );
        tokio::spawn(
            kubert::index::namespaced(config_index, configs).instrument(info_span!("configs")),
        );

        // Publish this replica's finalizer status as its watches change.
        let (updates_tx, updates_rx) = watch::channel(None);
        let finalizers =
            status::FinalizerStatus::new(&pod_name, &controller_namespace, &config_name, updates_tx);
        let status_controller = status::Controller::new(
            runtime.client(),
            updates_rx,
            Duration::from_millis(patch_timeout_ms),
            status_metrics,
        );
        tokio::spawn(
            status_controller
                .run()
                .instrument(info_span!("status_controller")),
        );

        let watches = WatchManager::new(
            DynamicWatch::new(runtime.client(), cache.clone(), tracker.clone()),
            store,
            cache.clone(),
            registry.clone(),
            finalizers,
        );
        tokio::spawn(
            watches
                .run(desired, runtime.shutdown_handle())
                .instrument(info_span!("watches")),
        );

        let pruner = readiness::ExpectationsPruner::new(
            tracker,
            registry,
            Duration::from_millis(expectations_interval_ms),
        );
        tokio::spawn(
            pruner
                .run(runtime.shutdown_handle())
                .instrument(info_span!("expectations")),
        );

        tokio::spawn(
            report_sync_metrics(cache, sync_metrics, runtime.shutdown_handle())
                .instrument(info_span!("sync_metrics")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn report_sync_metrics(cache: Arc<SyncCache>, metrics: SyncMetrics, drain: drain::Watch) {
    let mut ticks = tokio::time::interval(METRICS_REPORT_PERIOD);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tokio::pin! {
        let shutdown = drain.signaled();
    }

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            _ = ticks.tick() => cache.report_sync_metrics(&metrics),
        }
    }
}
