use policy_sync_core::WatchSet;
use policy_sync_k8s_api::{labels, ByPod, GvkRef};
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Tracks the finalizer status last published by this replica.
///
/// Updates are published on a watch channel: only the latest status matters,
/// so an update that has not yet been applied is replaced by a newer one.
#[derive(Debug)]
pub struct FinalizerStatus {
    id: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    published: Option<Vec<GvkRef>>,
    updates: watch::Sender<Option<Update>>,
}

/// A request to write a replica's `ConfigPodStatus`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub status: ByPod,
}

// === impl FinalizerStatus ===

impl FinalizerStatus {
    pub fn new(
        id: impl ToString,
        namespace: impl ToString,
        config: &str,
        updates: watch::Sender<Option<Update>>,
    ) -> Self {
        let id = id.to_string();
        Self {
            labels: labels::pod_status(&id, config),
            id,
            namespace: namespace.to_string(),
            published: None,
            updates,
        }
    }

    /// Returns the most recently published status, if any.
    pub fn by_pod(&self) -> Option<ByPod> {
        self.published.as_ref().map(|all_finalizers| ByPod {
            id: self.id.clone(),
            all_finalizers: all_finalizers.clone(),
        })
    }

    /// Publishes a status update if the watched kinds differ from those last
    /// published. Returns true if an update was published.
    pub fn observe(&mut self, watched: &WatchSet) -> bool {
        let all_finalizers = watched
            .items()
            .into_iter()
            .map(GvkRef::from)
            .collect::<Vec<_>>();
        if self.published.as_ref() == Some(&all_finalizers) {
            return false;
        }

        let update = Update {
            namespace: self.namespace.clone(),
            name: self.id.clone(),
            labels: self.labels.clone(),
            status: ByPod {
                id: self.id.clone(),
                all_finalizers: all_finalizers.clone(),
            },
        };
        if self.updates.send_replace(Some(update)).is_some() {
            tracing::debug!(id = %self.id, "Superseded a pending finalizer status");
        }
        tracing::debug!(id = %self.id, kinds = all_finalizers.len(), "Published finalizer status");
        self.published = Some(all_finalizers);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use policy_sync_core::Gvk;
    use pretty_assertions::assert_eq;

    fn gvk_ref(group: &str, version: &str, kind: &str) -> GvkRef {
        GvkRef {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    fn mk_status() -> (FinalizerStatus, watch::Receiver<Option<Update>>) {
        let (tx, rx) = watch::channel(None);
        let status = FinalizerStatus::new("policy-sync-0", "policy-sync-system", "config", tx);
        (status, rx)
    }

    fn latest(rx: &mut watch::Receiver<Option<Update>>) -> Option<Update> {
        if !rx.has_changed().unwrap() {
            return None;
        }
        rx.borrow_and_update().clone()
    }

    #[test]
    fn publishes_sorted_finalizers() {
        let (mut status, mut rx) = mk_status();
        assert_eq!(status.by_pod(), None);

        let watched = [
            Gvk::new("apps", "v1", "Deployment"),
            Gvk::new("", "v1", "Namespace"),
        ]
        .into_iter()
        .collect::<WatchSet>();
        assert!(status.observe(&watched));

        let expected = ByPod {
            id: "policy-sync-0".to_string(),
            all_finalizers: vec![
                gvk_ref("", "v1", "Namespace"),
                gvk_ref("apps", "v1", "Deployment"),
            ],
        };
        assert_eq!(
            latest(&mut rx),
            Some(Update {
                namespace: "policy-sync-system".to_string(),
                name: "policy-sync-0".to_string(),
                labels: btreemap! {
                    labels::POD_LABEL.to_string() => "policy-sync-0".to_string(),
                    labels::CONFIG_LABEL.to_string() => "config".to_string(),
                },
                status: expected.clone(),
            })
        );
        assert_eq!(status.by_pod(), Some(expected));
    }

    #[test]
    fn publishes_only_changes() {
        let (mut status, mut rx) = mk_status();

        let mut watched = [Gvk::new("", "v1", "Namespace")]
            .into_iter()
            .collect::<WatchSet>();
        assert!(status.observe(&watched));
        assert!(!status.observe(&watched.clone()));
        assert!(latest(&mut rx).is_some());
        assert!(latest(&mut rx).is_none());

        watched.add(Some(Gvk::new("", "v1", "Pod")));
        assert!(status.observe(&watched));
        assert_eq!(latest(&mut rx).unwrap().status.all_finalizers.len(), 2);

        // An empty watch set is a change, too: no finalizers remain required.
        assert!(status.observe(&WatchSet::new()));
        assert!(latest(&mut rx).unwrap().status.all_finalizers.is_empty());
    }

    #[test]
    fn unapplied_status_is_superseded() {
        let (mut status, mut rx) = mk_status();

        let first = [Gvk::new("", "v1", "Namespace")]
            .into_iter()
            .collect::<WatchSet>();
        let second = [Gvk::new("", "v1", "Pod")].into_iter().collect::<WatchSet>();

        // Neither update has been consumed; the controller only ever sees the
        // current status, with nothing lost or left stale.
        assert!(status.observe(&first));
        assert!(status.observe(&second));
        assert_eq!(
            status.by_pod().unwrap().all_finalizers,
            vec![gvk_ref("", "v1", "Pod")]
        );
        assert_eq!(
            latest(&mut rx).unwrap().status.all_finalizers,
            vec![gvk_ref("", "v1", "Pod")]
        );
        assert!(latest(&mut rx).is_none());
    }

    #[test]
    fn publishes_without_a_controller() {
        let (mut status, rx) = mk_status();
        drop(rx);

        let watched = [Gvk::new("", "v1", "Namespace")]
            .into_iter()
            .collect::<WatchSet>();
        assert!(status.observe(&watched));
        assert!(status.by_pod().is_some());
    }
}
