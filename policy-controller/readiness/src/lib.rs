//! Readiness tracking for synced data.
//!
//! The controller does not report ready until the data it expects to sync
//! has been observed. Some expectations can never be met; e.g. a kind named
//! in the sync configuration that the cluster does not serve is never
//! watched. The [`ExpectationsPruner`] periodically abandons expectations for
//! kinds that are not being watched, so readiness is not blocked forever.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod pruner;
mod tracker;

pub use self::{pruner::ExpectationsPruner, tracker::Tracker};
