use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{family::Family, gauge::Gauge},
    registry::Registry,
};
use std::fmt;

/// The sync state of a single object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    Active,
    Error,
}

/// Identifies the bucket an object is counted in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tags {
    pub kind: String,
    pub status: SyncStatus,
}

/// Receives the aggregate sync counts computed by [`SyncMetricsCache`].
pub trait SyncReporter {
    fn report_sync(&self, tags: &Tags, count: i64);

    fn report_last_sync(&self, at: DateTime<Utc>);
}

/// Tracks the sync status of every object the controller has attempted to
/// sync, keyed by an opaque per-object key.
#[derive(Debug, Default)]
pub struct SyncMetricsCache {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, Tags>,
    known_kinds: HashSet<String>,
}

/// Exports sync counts as Prometheus gauges.
#[derive(Clone, Debug)]
pub struct SyncMetrics {
    sync: Family<SyncLabels, Gauge>,
    last_run_time: Gauge,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SyncLabels {
    kind: String,
    status: String,
}

// === impl SyncStatus ===

impl SyncStatus {
    pub const ALL: [SyncStatus; 2] = [SyncStatus::Active, SyncStatus::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Tags ===

impl Tags {
    pub fn new(kind: impl ToString, status: SyncStatus) -> Self {
        Self {
            kind: kind.to_string(),
            status,
        }
    }
}

// === impl SyncMetricsCache ===

impl SyncMetricsCache {
    /// Records the tags for an object, replacing any prior entry. The object's
    /// kind becomes known.
    pub fn add_object(&self, key: impl ToString, tags: Tags) {
        let mut inner = self.inner.lock();
        inner.known_kinds.insert(tags.kind.clone());
        inner.objects.insert(key.to_string(), tags);
    }

    pub fn delete_object(&self, key: &str) -> Option<Tags> {
        self.inner.lock().objects.remove(key)
    }

    pub fn get_tags(&self, key: &str) -> Option<Tags> {
        self.inner.lock().objects.get(key).cloned()
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.inner.lock().objects.contains_key(key)
    }

    /// Registers a kind so that it is reported even when no objects of that
    /// kind are tracked.
    pub fn add_kind(&self, kind: impl ToString) {
        self.inner.lock().known_kinds.insert(kind.to_string());
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.objects.clear();
        inner.known_kinds.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().objects.is_empty()
    }

    /// Reports a count for every known kind and status, then the report time.
    pub fn report_sync(&self, reporter: &impl SyncReporter) {
        let inner = self.inner.lock();

        let mut totals = HashMap::<&Tags, i64>::new();
        for tags in inner.objects.values() {
            *totals.entry(tags).or_default() += 1;
        }

        for kind in inner.known_kinds.iter() {
            for status in SyncStatus::ALL {
                let tags = Tags::new(kind, status);
                let count = totals.get(&tags).copied().unwrap_or(0);
                reporter.report_sync(&tags, count);
            }
        }

        reporter.report_last_sync(Utc::now());
    }
}

// === impl SyncMetrics ===

impl SyncMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let sync = Family::default();
        prom.register(
            "sync",
            "Count of objects synced into the policy engine, by kind and status",
            sync.clone(),
        );

        let last_run_time = Gauge::default();
        prom.register(
            "sync_last_run_time",
            "Unix time at which sync counts were last reported",
            last_run_time.clone(),
        );

        Self {
            sync,
            last_run_time,
        }
    }
}

impl SyncReporter for SyncMetrics {
    fn report_sync(&self, tags: &Tags, count: i64) {
        self.sync
            .get_or_create(&SyncLabels {
                kind: tags.kind.clone(),
                status: tags.status.to_string(),
            })
            .set(count);
    }

    fn report_last_sync(&self, at: DateTime<Utc>) {
        self.last_run_time.set(at.timestamp());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[derive(Default)]
    struct Recorded {
        counts: Mutex<HashMap<Tags, i64>>,
        last: Mutex<Option<DateTime<Utc>>>,
    }

    impl SyncReporter for Recorded {
        fn report_sync(&self, tags: &Tags, count: i64) {
            self.counts.lock().insert(tags.clone(), count);
        }

        fn report_last_sync(&self, at: DateTime<Utc>) {
            *self.last.lock() = Some(at);
        }
    }

    #[test]
    fn reports_counts_for_known_kinds() {
        let cache = SyncMetricsCache::default();
        cache.add_object("ns-0/pod-0", Tags::new("Pod", SyncStatus::Active));
        cache.add_object("ns-0/pod-1", Tags::new("Pod", SyncStatus::Active));
        cache.add_object("ns-0/pod-2", Tags::new("Pod", SyncStatus::Error));
        cache.add_kind("Namespace");

        let recorded = Recorded::default();
        cache.report_sync(&recorded);

        let counts = recorded.counts.lock();
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&Tags::new("Pod", SyncStatus::Active)], 2);
        assert_eq!(counts[&Tags::new("Pod", SyncStatus::Error)], 1);
        assert_eq!(counts[&Tags::new("Namespace", SyncStatus::Active)], 0);
        assert_eq!(counts[&Tags::new("Namespace", SyncStatus::Error)], 0);
        assert!(recorded.last.lock().is_some());
    }

    #[test]
    fn add_replaces_and_delete_removes() {
        let cache = SyncMetricsCache::default();
        cache.add_object("ns-0/pod-0", Tags::new("Pod", SyncStatus::Error));
        cache.add_object("ns-0/pod-0", Tags::new("Pod", SyncStatus::Active));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get_tags("ns-0/pod-0"),
            Some(Tags::new("Pod", SyncStatus::Active))
        );

        assert!(cache.delete_object("ns-0/pod-0").is_some());
        assert!(cache.delete_object("ns-0/pod-0").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn reset_forgets_kinds() {
        let cache = SyncMetricsCache::default();
        cache.add_object("ns-0/pod-0", Tags::new("Pod", SyncStatus::Active));
        cache.reset();

        let recorded = Recorded::default();
        cache.report_sync(&recorded);
        assert!(recorded.counts.lock().is_empty());
    }

    #[test]
    fn exports_gauges() {
        let mut prom = Registry::default();
        let metrics = SyncMetrics::register(&mut prom);

        let cache = SyncMetricsCache::default();
        cache.add_object("ns-0/pod-0", Tags::new("Pod", SyncStatus::Active));
        cache.add_object("ns-0/pod-1", Tags::new("Pod", SyncStatus::Active));
        cache.report_sync(&metrics);

        let mut text = String::new();
        encode(&mut text, &prom).unwrap();
        assert!(
            text.contains(r#"sync{kind="Pod",status="active"} 2"#),
            "{text}"
        );
        assert!(
            text.contains(r#"sync{kind="Pod",status="error"} 0"#),
            "{text}"
        );
        assert!(text.contains("sync_last_run_time "), "{text}");
    }
}
