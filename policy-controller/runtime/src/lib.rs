#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use policy_sync_cache as cache;
pub use policy_sync_core as core;
pub use policy_sync_k8s_api as k8s;
pub use policy_sync_k8s_status as status;
pub use policy_sync_readiness as readiness;

mod args;
mod config_index;
mod watches;

pub use self::{
    args::Args,
    config_index::{ConfigIndex, SharedIndex},
    watches::{DiscoveryReport, DynamicWatch, SpawnWatch, SyncCache, WatchManager},
};
