#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod gvk;
pub mod requirements;
mod watch;

pub use self::{
    gvk::Gvk,
    requirements::{EquivalenceSet, GvkClause, SyncRequirements},
    watch::WatchSet,
};

pub const POLICY_SYNC_CONTROLLER_NAME: &str = "policy-sync.io/controller";

/// Tracks which kinds' data the controller is waiting on before it reports
/// ready.
pub trait DataExpectations {
    /// Returns true once every expectation has been met. This never reverts.
    fn satisfied(&self) -> bool;

    /// Returns true once data expectations have been registered.
    fn data_populated(&self) -> bool;

    /// Returns the kinds whose data is still expected.
    fn data_gvks(&self) -> Vec<Gvk>;

    /// Stops waiting on data for the given kind.
    ///
    /// Cancelling a kind that is already cancelled, satisfied, or unknown has
    /// no effect.
    fn cancel_data(&self, gvk: &Gvk);
}

/// Describes which kinds are currently being watched.
pub trait WatchedKinds {
    /// Returns true once the watch subsystem has begun operating.
    fn started(&self) -> bool;

    fn watched_gvks(&self) -> Vec<Gvk>;
}

impl<T: DataExpectations + ?Sized> DataExpectations for std::sync::Arc<T> {
    fn satisfied(&self) -> bool {
        (**self).satisfied()
    }

    fn data_populated(&self) -> bool {
        (**self).data_populated()
    }

    fn data_gvks(&self) -> Vec<Gvk> {
        (**self).data_gvks()
    }

    fn cancel_data(&self, gvk: &Gvk) {
        (**self).cancel_data(gvk)
    }
}

impl<T: WatchedKinds + ?Sized> WatchedKinds for std::sync::Arc<T> {
    fn started(&self) -> bool {
        (**self).started()
    }

    fn watched_gvks(&self) -> Vec<Gvk> {
        (**self).watched_gvks()
    }
}
