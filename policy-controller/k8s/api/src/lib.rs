#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod config;
mod gvk;
pub mod labels;
pub mod status;

pub use self::{
    config::{Config, ConfigSpec, SyncSpec},
    gvk::{from_group_version_kind, gvk_of, to_group_version_kind, GvkRef},
    status::{ByPod, ConfigPodStatus, ConfigPodStatusSpec},
};
pub use k8s_openapi::api::{
    self,
    core::v1::{Namespace, Pod},
};
pub use kube::{
    api::{Api, DynamicObject, ObjectMeta, Patch, PatchParams, ResourceExt},
    core::{ApiResource, GroupVersionKind, TypeMeta},
    discovery,
    runtime::{watcher, WatchStreamExt},
    Client, Error, Resource,
};
