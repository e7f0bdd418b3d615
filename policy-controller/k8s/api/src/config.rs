use crate::GvkRef;
use kube::CustomResource;
use policy_sync_core::{Gvk, WatchSet};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configures which kinds of resources are synced into the policy engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "config.policy-sync.io",
    version = "v1alpha1",
    kind = "Config",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncSpec {
    #[serde(default)]
    pub sync_only: Vec<GvkRef>,
}

// === impl Config ===

impl Config {
    /// Returns the set of kinds this configuration asks to sync.
    pub fn sync_only(&self) -> WatchSet {
        self.spec
            .sync
            .iter()
            .flat_map(|sync| sync.sync_only.iter().cloned().map(Gvk::from))
            .collect()
    }
}
