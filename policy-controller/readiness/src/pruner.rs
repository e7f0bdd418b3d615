use policy_sync_core::{DataExpectations, Gvk, WatchSet, WatchedKinds};
use tokio::time;

/// Cancels data expectations for kinds that are not being watched.
///
/// Runs until the tracker is satisfied or the process begins shutting down.
/// Once stopped, a pruner cannot be restarted.
#[derive(Debug)]
pub struct ExpectationsPruner<T, W> {
    tracker: T,
    watches: W,
    interval: time::Duration,
}

// === impl ExpectationsPruner ===

impl<T, W> ExpectationsPruner<T, W>
where
    T: DataExpectations,
    W: WatchedKinds,
{
    pub const DEFAULT_INTERVAL: time::Duration = time::Duration::from_secs(3);

    pub fn new(tracker: T, watches: W, interval: time::Duration) -> Self {
        Self {
            tracker,
            watches,
            interval,
        }
    }

    pub async fn run(self, drain: drain::Watch) {
        let mut ticks = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tokio::pin! {
            let shutdown = drain.signaled();
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::debug!("Shutdown signaled");
                    return;
                }

                _ = ticks.tick() => {}
            }

            if self.tracker.satisfied() {
                tracing::debug!("Expectations satisfied");
                return;
            }

            // Until expectations are registered and watches have started, an
            // unwatched kind may simply not have been watched yet.
            if !self.tracker.data_populated() || !self.watches.started() {
                continue;
            }

            self.prune_unwatched();
        }
    }

    /// Cancels the expectation of every expected kind that is not watched,
    /// returning the cancelled kinds.
    pub fn prune_unwatched(&self) -> Vec<Gvk> {
        let watched = self.watches.watched_gvks().into_iter().collect::<WatchSet>();
        let expected = self.tracker.data_gvks().into_iter().collect::<WatchSet>();

        let unwatched = expected.difference(&watched);
        for gvk in &unwatched {
            tracing::info!(%gvk, "Cancelling expectation for unwatched kind");
            self.tracker.cancel_data(gvk);
        }
        unwatched
    }
}

#[cfg(test)]
mod tests;
