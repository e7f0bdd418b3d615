use crate::Update;
use policy_sync_core::POLICY_SYNC_CONTROLLER_NAME;
use policy_sync_k8s_api::{self as k8s, ConfigPodStatus, Resource};
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use tokio::{sync::watch, time};

const RETRY_BACKOFF: time::Duration = time::Duration::from_secs(1);

/// Applies published `ConfigPodStatus` updates.
pub struct Controller {
    client: k8s::Client,
    updates: watch::Receiver<Option<Update>>,
    patch_timeout: time::Duration,
    metrics: ControllerMetrics,
}

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    patch_succeeded: Counter,
    patch_failed: Counter,
    patch_timeout: Counter,
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patch_succeeded = Counter::default();
        prom.register(
            "patch_succeeded",
            "Count of successful status patches",
            patch_succeeded.clone(),
        );

        let patch_failed = Counter::default();
        prom.register(
            "patch_failed",
            "Count of failed status patches",
            patch_failed.clone(),
        );

        let patch_timeout = Counter::default();
        prom.register(
            "patch_timeout",
            "Count of status patches that timed out",
            patch_timeout.clone(),
        );

        Self {
            patch_succeeded,
            patch_failed,
            patch_timeout,
        }
    }
}

// === impl Controller ===

impl Controller {
    pub fn new(
        client: k8s::Client,
        updates: watch::Receiver<Option<Update>>,
        patch_timeout: time::Duration,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            client,
            updates,
            patch_timeout,
            metrics,
        }
    }

    /// Applies the latest update until the update channel closes.
    ///
    /// A failed update is retried after a backoff unless a newer update
    /// arrives first, in which case the newer update supersedes it.
    pub async fn run(mut self) {
        while self.updates.changed().await.is_ok() {
            loop {
                let update = self.updates.borrow_and_update().clone();
                let Some(update) = update else { break };
                if self.patch(&update).await {
                    break;
                }

                tokio::select! {
                    res = self.updates.changed() => {
                        if res.is_err() {
                            return;
                        }
                    }
                    _ = time::sleep(RETRY_BACKOFF) => {}
                }
            }
        }
        tracing::debug!("Status update channel closed");
    }

    async fn patch(&self, update: &Update) -> bool {
        let Update {
            namespace, name, ..
        } = update;
        match time::timeout(self.patch_timeout, self.apply(update)).await {
            Ok(Ok(())) => {
                self.metrics.patch_succeeded.inc();
                tracing::debug!(%namespace, %name, "Patched ConfigPodStatus");
                true
            }
            Ok(Err(error)) => {
                self.metrics.patch_failed.inc();
                tracing::error!(%namespace, %name, %error, "Failed to patch ConfigPodStatus");
                false
            }
            Err(_) => {
                self.metrics.patch_timeout.inc();
                tracing::error!(%namespace, %name, timeout = ?self.patch_timeout, "ConfigPodStatus patch timed out");
                false
            }
        }
    }

    async fn apply(&self, update: &Update) -> Result<(), k8s::Error> {
        let api = k8s::Api::<ConfigPodStatus>::namespaced(self.client.clone(), &update.namespace);
        let params = k8s::PatchParams::apply(POLICY_SYNC_CONTROLLER_NAME).force();

        // The status subresource can only be patched once the object exists.
        api.patch(
            &update.name,
            &params,
            &k8s::Patch::Apply(make_object(update)),
        )
        .await?;
        api.patch_status(
            &update.name,
            &params,
            &k8s::Patch::Apply(make_status(update)),
        )
        .await?;
        Ok(())
    }
}

pub(crate) fn make_object(update: &Update) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": ConfigPodStatus::api_version(&()),
        "kind": ConfigPodStatus::kind(&()),
        "metadata": {
            "name": update.name,
            "namespace": update.namespace,
            "labels": update.labels,
        },
        "spec": {},
    })
}

pub(crate) fn make_status(update: &Update) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": ConfigPodStatus::api_version(&()),
        "kind": ConfigPodStatus::kind(&()),
        "status": update.status,
    })
}
