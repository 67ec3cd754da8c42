use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use crate::core::Result;

/// Read-through in-memory mapping from entity key to hydrated entity.
///
/// One mutex per cache instance; reads are legal from any thread and see the
/// last completed write. Mutation is only performed from inside storage
/// tasks — that is a convention of the entity managers, not something the
/// cache enforces. Entries always reflect rows that exist in storage; nothing
/// is cached speculatively.
///
/// Read accessors (`get`, `len`, `values`) treat a poisoned mutex as an empty
/// cache, so after a worker panic they serve misses; mutating methods surface
/// [`StoreError::LockError`](crate::core::StoreError) instead.
pub struct EntityCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> EntityCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.entries.lock()?.insert(key, value);
        Ok(())
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        Ok(self.entries.lock()?.remove(key))
    }

    pub fn clear(&self) -> Result<()> {
        self.entries.lock()?.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a batch under one lock acquisition: either every entry lands
    /// or none does. Used after a batched storage write commits.
    pub fn put_all(&self, rows: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        self.entries.lock()?.extend(rows);
        Ok(())
    }

    /// Drop the whole mapping and rebuild it from freshly loaded rows.
    pub fn replace_all(&self, rows: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        let mut entries = self.entries.lock()?;
        entries.clear();
        entries.extend(rows);
        Ok(())
    }

    /// The get-or-create idiom: a hit returns the cached value, a miss runs
    /// `loader` (a storage query or insert), caches its result under `key`
    /// and returns it. Two transient candidates with the same derived key
    /// resolve to the same cached entity.
    pub fn refresh_or_load<F>(&self, key: K, loader: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }

        let value = loader()?;
        self.entries.lock()?.insert(key, value.clone());
        Ok(value)
    }

    /// Snapshot of the current values, for bulk write-back (flush).
    pub fn values(&self) -> Vec<V> {
        self.entries
            .lock()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Update an entry in place if present. Returns whether it was.
    pub fn update<F>(&self, key: &K, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut V),
    {
        let mut entries = self.entries.lock()?;
        match entries.get_mut(key) {
            Some(value) => {
                apply(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<K, V> Default for EntityCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
