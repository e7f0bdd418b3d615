use crate::tracker::DataClient;
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use policy_sync_core::Gvk;
use policy_sync_k8s_api::{gvk_of, DynamicObject, ResourceExt};

/// An in-memory copy of the cluster data the policy engine evaluates against.
#[derive(Debug, Default)]
pub struct DataStore {
    objects: RwLock<HashMap<ObjectKey, DynamicObject>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub gvk: Gvk,
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Created,
    Replaced,
    Removed,
    Absent,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object {0} has no apiVersion or kind")]
    MissingType(String),

    #[error("object of kind {0} has no name")]
    MissingName(Gvk),
}

// === impl DataStore ===

impl DataStore {
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.objects.read().get(key).cloned()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Returns the number of stored objects of the given kind.
    pub fn count(&self, gvk: &Gvk) -> usize {
        self.objects
            .read()
            .keys()
            .filter(|key| key.gvk == *gvk)
            .count()
    }

    /// Returns a snapshot of the stored objects of the given kind.
    pub fn objects_of(&self, gvk: &Gvk) -> Vec<DynamicObject> {
        self.objects
            .read()
            .iter()
            .filter(|(key, _)| key.gvk == *gvk)
            .map(|(_, obj)| obj.clone())
            .collect()
    }
}

impl DataClient for DataStore {
    type Response = Change;
    type Error = StoreError;

    fn add_data(&self, obj: &DynamicObject) -> Result<Change, StoreError> {
        let key = ObjectKey::of(obj)?;
        let mut obj = obj.clone();
        obj.metadata.managed_fields = None;
        match self.objects.write().insert(key, obj) {
            Some(_) => Ok(Change::Replaced),
            None => Ok(Change::Created),
        }
    }

    fn remove_data(&self, obj: &DynamicObject) -> Result<Change, StoreError> {
        let key = ObjectKey::of(obj)?;
        match self.objects.write().remove(&key) {
            Some(_) => Ok(Change::Removed),
            None => Ok(Change::Absent),
        }
    }
}

// === impl ObjectKey ===

impl ObjectKey {
    pub fn of(obj: &DynamicObject) -> Result<Self, StoreError> {
        let gvk = gvk_of(obj).ok_or_else(|| StoreError::MissingType(obj.name_any()))?;
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or_else(|| StoreError::MissingName(gvk.clone()))?;
        Ok(Self {
            gvk,
            namespace: obj.namespace(),
            name,
        })
    }
}
