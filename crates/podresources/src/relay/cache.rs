//! Pod metadata cache.

use core::fmt;

use dashmap::DashMap;
use nri_stub::PodSandbox;

/// `namespace/name` of a pod.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PodKey(String);

impl PodKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self(format!("{namespace}/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&PodSandbox> for PodKey {
    fn from(pod: &PodSandbox) -> Self {
        Self::new(&pod.namespace, &pod.name)
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialized pod objects keyed by [`PodKey`].
///
/// Writers to the same key are serialized by the map's shard lock, so an
/// insert that returned is visible to every later lookup of that key.
#[derive(Debug, Default)]
pub struct PodMetadataCache {
    entries: DashMap<PodKey, String>,
}

impl PodMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `metadata` for `key`, returning the entry it replaced.
    pub fn insert(&self, key: PodKey, metadata: String) -> Option<String> {
        self.entries.insert(key, metadata)
    }

    pub fn get(&self, key: &PodKey) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, key: &PodKey) -> Option<String> {
        self.entries.remove(key).map(|(_, metadata)| metadata)
    }

    pub fn contains(&self, key: &PodKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
