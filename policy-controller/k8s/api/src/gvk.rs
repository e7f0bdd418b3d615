use kube::{api::DynamicObject, core::GroupVersionKind};
use policy_sync_core::Gvk;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// References a kind of resource in a custom resource's spec or status.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema,
)]
pub struct GvkRef {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

pub fn to_group_version_kind(gvk: &Gvk) -> GroupVersionKind {
    GroupVersionKind::gvk(&gvk.group, &gvk.version, &gvk.kind)
}

pub fn from_group_version_kind(gvk: &GroupVersionKind) -> Gvk {
    Gvk::new(&gvk.group, &gvk.version, &gvk.kind)
}

/// Reads an object's kind from its `apiVersion` and `kind`.
pub fn gvk_of(obj: &DynamicObject) -> Option<Gvk> {
    let types = obj.types.as_ref()?;
    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", types.api_version.as_str()),
    };
    Some(Gvk::new(group, version, &types.kind))
}

// === impl GvkRef ===

impl From<Gvk> for GvkRef {
    fn from(Gvk { group, version, kind }: Gvk) -> Self {
        Self {
            group,
            version,
            kind,
        }
    }
}

impl From<GvkRef> for Gvk {
    fn from(GvkRef { group, version, kind }: GvkRef) -> Self {
        Self {
            group,
            version,
            kind,
        }
    }
}
