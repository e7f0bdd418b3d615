use crate::{
    k8s::{self, ResourceExt},
    readiness::Tracker,
};
use parking_lot::RwLock;
use policy_sync_core::{DataExpectations, WatchSet};
use std::sync::Arc;
use tokio::sync::watch;

/// Indexes the controller's `Config` resource, publishing the set of kinds to
/// sync.
///
/// The first matching `Config` seeds the readiness tracker's data
/// expectations. Later changes only update the desired watch set; kinds that
/// stop being watched have their expectations pruned.
#[derive(Debug)]
pub struct ConfigIndex {
    name: String,
    tracker: Arc<Tracker>,
    desired: watch::Sender<WatchSet>,
}

pub type SharedIndex = Arc<RwLock<ConfigIndex>>;

// === impl ConfigIndex ===

impl ConfigIndex {
    pub fn shared(
        name: impl ToString,
        tracker: Arc<Tracker>,
    ) -> (SharedIndex, watch::Receiver<WatchSet>) {
        let (desired, rx) = watch::channel(WatchSet::new());
        let index = Self {
            name: name.to_string(),
            tracker,
            desired,
        };
        (Arc::new(RwLock::new(index)), rx)
    }

    fn publish(&self, kinds: WatchSet) {
        self.desired.send_if_modified(|desired| {
            if *desired == kinds {
                return false;
            }
            tracing::info!(kinds = kinds.len(), "Updated sync configuration");
            *desired = kinds;
            true
        });
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Config> for ConfigIndex {
    fn apply(&mut self, config: k8s::Config) {
        if config.name_unchecked() != self.name {
            return;
        }

        let kinds = config.sync_only();
        if !self.tracker.data_populated() {
            for gvk in kinds.iter() {
                self.tracker.expect_data(gvk.clone());
            }
            self.tracker.populate_data();
            tracing::debug!(kinds = kinds.len(), "Registered data expectations");
        }
        self.publish(kinds);
    }

    fn delete(&mut self, _namespace: String, name: String) {
        if name != self.name {
            return;
        }
        tracing::info!(%name, "Sync configuration deleted");
        self.publish(WatchSet::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubert::index::IndexNamespacedResource;
    use policy_sync_core::Gvk;
    use pretty_assertions::assert_eq;

    fn mk_config(name: &str, kinds: &[(&str, &str)]) -> k8s::Config {
        let mut config = k8s::Config::new(
            name,
            k8s::ConfigSpec {
                sync: Some(k8s::SyncSpec {
                    sync_only: kinds
                        .iter()
                        .map(|(group, kind)| k8s::GvkRef {
                            group: group.to_string(),
                            version: "v1".to_string(),
                            kind: kind.to_string(),
                        })
                        .collect(),
                }),
            },
        );
        config.metadata.namespace = Some("policy-sync-system".to_string());
        config
    }

    #[test]
    fn first_config_seeds_expectations() {
        let tracker = Arc::new(Tracker::default());
        let (index, rx) = ConfigIndex::shared("config", tracker.clone());

        index
            .write()
            .apply(mk_config("config", &[("apps", "Deployment"), ("", "Pod")]));
        assert!(tracker.data_populated());
        assert_eq!(
            tracker.data_gvks(),
            vec![Gvk::new("", "v1", "Pod"), Gvk::new("apps", "v1", "Deployment")]
        );
        assert_eq!(rx.borrow().items(), tracker.data_gvks());

        // Subsequent configurations change what is watched, not what is
        // expected.
        index.write().apply(mk_config("config", &[("", "Pod")]));
        assert_eq!(rx.borrow().items(), vec![Gvk::new("", "v1", "Pod")]);
        assert_eq!(tracker.data_gvks().len(), 2);
    }

    #[test]
    fn ignores_other_configs() {
        let tracker = Arc::new(Tracker::default());
        let (index, rx) = ConfigIndex::shared("config", tracker.clone());

        index.write().apply(mk_config("other", &[("", "Pod")]));
        assert!(!tracker.data_populated());
        assert!(rx.borrow().is_empty());

        index.write().apply(mk_config("config", &[("", "Pod")]));
        index
            .write()
            .delete("policy-sync-system".to_string(), "other".to_string());
        assert_eq!(rx.borrow().len(), 1);
    }

    #[test]
    fn deletion_clears_desired_kinds() {
        let tracker = Arc::new(Tracker::default());
        let (index, mut rx) = ConfigIndex::shared("config", tracker.clone());

        index.write().apply(mk_config("config", &[("", "Pod")]));
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        // Reapplying an unchanged configuration does not notify watchers.
        index.write().apply(mk_config("config", &[("", "Pod")]));
        assert!(!rx.has_changed().unwrap());

        index
            .write()
            .delete("policy-sync-system".to_string(), "config".to_string());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow().is_empty());
        assert_eq!(tracker.data_gvks(), vec![Gvk::new("", "v1", "Pod")]);
    }
}
