//! Combines replicas' finalizer reports.
//!
//! A finalizer for a kind must remain while *any* live replica requires it,
//! so [`union`] is the set to keep; [`intersection`] is the set every replica
//! agrees on. Reports from replicas that no longer exist must be discarded
//! with [`prune`] before combining, or their kinds would be held forever.

use ahash::AHashSet as HashSet;
use policy_sync_core::{Gvk, WatchSet};
use policy_sync_k8s_api::ByPod;

/// Returns every kind required by at least one replica.
pub fn union<'p>(pods: impl IntoIterator<Item = &'p ByPod>) -> WatchSet {
    pods.into_iter()
        .flat_map(|pod| pod.all_finalizers.iter().cloned().map(Gvk::from))
        .collect()
}

/// Returns the kinds required by every replica. Empty when there are no
/// replicas.
pub fn intersection<'p>(pods: impl IntoIterator<Item = &'p ByPod>) -> WatchSet {
    let mut pods = pods.into_iter();
    let mut common = match pods.next() {
        Some(pod) => finalizers(pod),
        None => return WatchSet::new(),
    };
    for pod in pods {
        let kinds = finalizers(pod);
        for gvk in common.difference(&kinds) {
            common.remove(&gvk);
        }
    }
    common
}

/// Drops the reports of replicas that are not live.
pub fn prune(pods: Vec<ByPod>, live: &HashSet<String>) -> Vec<ByPod> {
    pods.into_iter()
        .filter(|pod| {
            let keep = live.contains(&pod.id);
            if !keep {
                tracing::debug!(id = %pod.id, "Pruning status of departed replica");
            }
            keep
        })
        .collect()
}

fn finalizers(pod: &ByPod) -> WatchSet {
    pod.all_finalizers.iter().cloned().map(Gvk::from).collect()
}
