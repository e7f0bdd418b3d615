use crate::GvkRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reports a single controller replica's view of the sync configuration.
///
/// Each replica owns exactly one of these, named after the replica, so that
/// replicas never contend on a shared status field.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "status.policy-sync.io",
    version = "v1beta1",
    kind = "ConfigPodStatus",
    namespaced,
    status = "ByPod"
)]
pub struct ConfigPodStatusSpec {}

/// The kinds for which a replica requires a cleanup finalizer to remain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ByPod {
    pub id: String,
    #[serde(default)]
    pub all_finalizers: Vec<GvkRef>,
}
