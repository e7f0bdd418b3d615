use crate::Gvk;
use ahash::AHashSet as HashSet;

/// A deduplicated set of resource kinds.
///
/// Used to compare the kinds that are actually watched against the kinds
/// that some component expects to be synced. Iteration order is unspecified;
/// use [`WatchSet::items`] for a stable view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchSet(HashSet<Gvk>);

// === impl WatchSet ===

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, gvks: impl IntoIterator<Item = Gvk>) {
        self.0.extend(gvks);
    }

    /// Removes the given kind, returning true if it was present.
    pub fn remove(&mut self, gvk: &Gvk) -> bool {
        self.0.remove(gvk)
    }

    /// Adds every kind in `other` to this set.
    pub fn union(&mut self, other: &WatchSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Returns each kind in this set that is not in `other`.
    pub fn difference(&self, other: &WatchSet) -> Vec<Gvk> {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn contains(&self, gvk: &Gvk) -> bool {
        self.0.contains(gvk)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gvk> {
        self.0.iter()
    }

    /// Returns a sorted snapshot of the set's kinds.
    pub fn items(&self) -> Vec<Gvk> {
        let mut items = self.0.iter().cloned().collect::<Vec<_>>();
        items.sort();
        items
    }
}

impl FromIterator<Gvk> for WatchSet {
    fn from_iter<T: IntoIterator<Item = Gvk>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Gvk> for WatchSet {
    fn extend<T: IntoIterator<Item = Gvk>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}
