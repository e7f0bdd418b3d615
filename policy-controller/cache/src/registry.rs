use parking_lot::RwLock;
use policy_sync_core::{Gvk, WatchSet, WatchedKinds};

/// Records which kinds currently have an active watch.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    started: bool,
    watched: WatchSet,
}

// === impl WatchRegistry ===

impl WatchRegistry {
    /// Marks the watch subsystem as operating. Kinds are only considered
    /// unwatched after this has been called.
    pub fn start(&self) {
        self.state.write().started = true;
    }

    /// Records a watch for the given kind, returning true if it is new.
    pub fn watch(&self, gvk: Gvk) -> bool {
        let mut state = self.state.write();
        let added = !state.watched.contains(&gvk);
        state.watched.add(Some(gvk));
        added
    }

    /// Forgets the watch for the given kind, returning true if it existed.
    pub fn unwatch(&self, gvk: &Gvk) -> bool {
        self.state.write().watched.remove(gvk)
    }

    pub fn watched(&self) -> WatchSet {
        self.state.read().watched.clone()
    }
}

impl WatchedKinds for WatchRegistry {
    fn started(&self) -> bool {
        self.state.read().started
    }

    fn watched_gvks(&self) -> Vec<Gvk> {
        self.state.read().watched.items()
    }
}
