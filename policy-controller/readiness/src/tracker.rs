use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use policy_sync_core::{DataExpectations, Gvk};

/// Tracks the data kinds the controller expects to sync before it is ready.
#[derive(Debug, Default)]
pub struct Tracker {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    populated: bool,
    satisfied: bool,
    data: HashMap<Gvk, Expectation>,
}

#[derive(Debug, Default)]
struct Expectation {
    observed: bool,
}

// === impl Tracker ===

impl Tracker {
    /// Registers an expectation that data of the given kind will sync.
    pub fn expect_data(&self, gvk: Gvk) {
        self.state.write().data.entry(gvk).or_default();
    }

    /// Marks the given kind's data as synced. Unexpected kinds are ignored.
    pub fn observe_data(&self, gvk: &Gvk) {
        if let Some(exp) = self.state.write().data.get_mut(gvk) {
            exp.observed = true;
        }
    }

    /// Indicates that all data expectations have been registered.
    pub fn populate_data(&self) {
        self.state.write().populated = true;
    }

    /// Returns the expected kinds that have not yet been observed.
    pub fn unsatisfied_gvks(&self) -> Vec<Gvk> {
        let mut gvks = self
            .state
            .read()
            .data
            .iter()
            .filter(|(_, exp)| !exp.observed)
            .map(|(gvk, _)| gvk.clone())
            .collect::<Vec<_>>();
        gvks.sort();
        gvks
    }
}

impl DataExpectations for Tracker {
    fn satisfied(&self) -> bool {
        if self.state.read().satisfied {
            return true;
        }

        let mut state = self.state.write();
        if state.populated && state.data.values().all(|exp| exp.observed) {
            if !state.satisfied {
                tracing::info!(kinds = state.data.len(), "Data expectations satisfied");
            }
            state.satisfied = true;
        }
        state.satisfied
    }

    fn data_populated(&self) -> bool {
        self.state.read().populated
    }

    fn data_gvks(&self) -> Vec<Gvk> {
        let mut gvks = self.state.read().data.keys().cloned().collect::<Vec<_>>();
        gvks.sort();
        gvks
    }

    fn cancel_data(&self, gvk: &Gvk) {
        if self.state.write().data.remove(gvk).is_some() {
            tracing::debug!(%gvk, "Cancelled data expectation");
        }
    }
}
