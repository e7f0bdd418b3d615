//! Publishes each controller replica's finalizer requirements.
//!
//! Every replica owns a `ConfigPodStatus` object, named after the replica,
//! whose status lists the kinds for which that replica still requires a
//! cleanup finalizer: the kinds it is currently watching. A cluster-level
//! reconciler combines these reports (see [`aggregate`]) to decide when it is
//! safe to drop a finalizer.
//!
//! The [`FinalizerStatus`] index observes the replica's watch set and
//! publishes an [`Update`] whenever it changes; the [`Controller`] applies the
//! latest update to the API server.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod aggregate;
mod controller;
mod index;

pub use self::{
    controller::{Controller, ControllerMetrics},
    index::{FinalizerStatus, Update},
};
