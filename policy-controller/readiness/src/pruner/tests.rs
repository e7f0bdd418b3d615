use super::*;
use crate::Tracker;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

const INTERVAL: time::Duration = time::Duration::from_secs(3);

/// Records cancellations without acting on them, so an unwatched kind is
/// cancelled again on every tick.
#[derive(Default)]
struct FakeTracker {
    populated: AtomicBool,
    /// The number of `satisfied` checks that report false before it reports true.
    unsatisfied_checks: Option<usize>,
    checks: AtomicUsize,
    expected: Vec<Gvk>,
    cancelled: Mutex<Vec<Gvk>>,
}

#[derive(Default)]
struct FakeWatches {
    started: AtomicBool,
    watched: Vec<Gvk>,
}

impl DataExpectations for FakeTracker {
    fn satisfied(&self) -> bool {
        let checks = self.checks.fetch_add(1, Ordering::SeqCst);
        self.unsatisfied_checks.is_some_and(|n| checks >= n)
    }

    fn data_populated(&self) -> bool {
        self.populated.load(Ordering::SeqCst)
    }

    fn data_gvks(&self) -> Vec<Gvk> {
        self.expected.clone()
    }

    fn cancel_data(&self, gvk: &Gvk) {
        self.cancelled.lock().push(gvk.clone());
    }
}

impl WatchedKinds for FakeWatches {
    fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn watched_gvks(&self) -> Vec<Gvk> {
        self.watched.clone()
    }
}

fn deployment() -> Gvk {
    Gvk::new("apps", "v1", "Deployment")
}

fn pod() -> Gvk {
    Gvk::new("", "v1", "Pod")
}

fn scenario() -> (Arc<FakeTracker>, Arc<FakeWatches>) {
    let tracker = Arc::new(FakeTracker {
        populated: true.into(),
        expected: vec![deployment(), pod()],
        ..Default::default()
    });
    let watches = Arc::new(FakeWatches {
        started: true.into(),
        watched: vec![pod()],
    });
    (tracker, watches)
}

#[test]
fn prunes_expected_but_unwatched() {
    let (tracker, watches) = scenario();
    let pruner = ExpectationsPruner::new(tracker.clone(), watches, INTERVAL);
    assert_eq!(pruner.prune_unwatched(), vec![deployment()]);
    assert_eq!(*tracker.cancelled.lock(), vec![deployment()]);
}

#[tokio::test(start_paused = true)]
async fn cancels_once_per_tick() {
    let (tracker, watches) = scenario();
    let (signal, drain) = drain::channel();
    let task = tokio::spawn(ExpectationsPruner::new(tracker.clone(), watches, INTERVAL).run(drain));

    // Nothing happens before the first tick.
    time::sleep(INTERVAL / 2).await;
    assert!(tracker.cancelled.lock().is_empty());

    // Ticks fire at 3s, 6s, and 9s.
    time::sleep(time::Duration::from_secs(10) - INTERVAL / 2).await;
    assert_eq!(
        *tracker.cancelled.lock(),
        vec![deployment(), deployment(), deployment()]
    );

    signal.drain().await;
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stops_when_satisfied() {
    let (tracker, watches) = scenario();
    let tracker = Arc::new(FakeTracker {
        unsatisfied_checks: Some(4),
        populated: true.into(),
        expected: tracker.expected.clone(),
        ..Default::default()
    });
    let (_signal, drain) = drain::channel();

    ExpectationsPruner::new(tracker.clone(), watches, INTERVAL)
        .run(drain)
        .await;

    assert_eq!(tracker.cancelled.lock().len(), 4);
    assert_eq!(tracker.checks.load(Ordering::SeqCst), 5);

    // No further cancellations after the pruner stops.
    time::sleep(INTERVAL * 10).await;
    assert_eq!(tracker.cancelled.lock().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn skips_until_populated() {
    let (tracker, watches) = scenario();
    tracker.populated.store(false, Ordering::SeqCst);
    let (signal, drain) = drain::channel();
    let task = tokio::spawn(
        ExpectationsPruner::new(tracker.clone(), watches.clone(), INTERVAL).run(drain),
    );

    time::sleep(INTERVAL * 10 + INTERVAL / 2).await;
    assert_eq!(tracker.checks.load(Ordering::SeqCst), 10);
    assert!(tracker.cancelled.lock().is_empty());

    tracker.populated.store(true, Ordering::SeqCst);
    time::sleep(INTERVAL).await;
    assert_eq!(*tracker.cancelled.lock(), vec![deployment()]);

    signal.drain().await;
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn skips_until_watches_started() {
    let (tracker, watches) = scenario();
    watches.started.store(false, Ordering::SeqCst);
    let (signal, drain) = drain::channel();
    let task = tokio::spawn(
        ExpectationsPruner::new(tracker.clone(), watches.clone(), INTERVAL).run(drain),
    );

    time::sleep(INTERVAL * 10 + INTERVAL / 2).await;
    assert!(tracker.cancelled.lock().is_empty());

    watches.started.store(true, Ordering::SeqCst);
    time::sleep(INTERVAL).await;
    assert_eq!(*tracker.cancelled.lock(), vec![deployment()]);

    signal.drain().await;
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stops_on_shutdown() {
    let (tracker, watches) = scenario();
    let (signal, drain) = drain::channel();
    let task = tokio::spawn(
        ExpectationsPruner::new(tracker.clone(), watches, time::Duration::from_secs(3600))
            .run(drain),
    );

    tokio::task::yield_now().await;
    signal.drain().await;
    task.await.unwrap();

    assert_eq!(tracker.checks.load(Ordering::SeqCst), 0);
    assert!(tracker.cancelled.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn readiness_tracker_converges() {
    let tracker = Arc::new(Tracker::default());
    tracker.expect_data(deployment());
    tracker.expect_data(pod());
    tracker.populate_data();
    tracker.observe_data(&pod());

    let watches = Arc::new(FakeWatches {
        started: true.into(),
        watched: vec![pod()],
    });
    let (_signal, drain) = drain::channel();

    // The first tick cancels the unwatched Deployment expectation; the second
    // finds the tracker satisfied and stops.
    ExpectationsPruner::new(tracker.clone(), watches, INTERVAL)
        .run(drain)
        .await;

    assert_eq!(tracker.data_gvks(), vec![pod()]);
    assert!(tracker.satisfied());
}
