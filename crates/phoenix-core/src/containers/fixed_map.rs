//! Fixed-capacity ordered map and set.
//!
//! Both are linear-scan structures: the engine's key sets are small (blocks
//! per buffer, archetypes per world) and a flat scan beats a hash table at
//! those sizes while keeping iteration order deterministic (insertion
//! order).

use serde::{Deserialize, Serialize};

use super::fixed_vec::FixedVec;

// ---------------------------------------------------------------------------
// FixedMap
// ---------------------------------------------------------------------------

/// Insertion-ordered map with capacity fixed at construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedMap<K, V> {
    entries: FixedVec<(K, V)>,
}

impl<K: PartialEq, V> FixedMap<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FixedVec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Insert or replace. Returns `false` when the map is full and the key
    /// is not already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        for (k, v) in self.entries.iter_mut() {
            if *k == key {
                *v = value;
                return true;
            }
        }
        self.entries.push((key, value))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        self.entries.swap_remove(index).map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        self.entries.iter_mut().map(|(k, v)| (&*k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

// ---------------------------------------------------------------------------
// FixedSet
// ---------------------------------------------------------------------------

/// Insertion-ordered set with capacity fixed at construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedSet<T> {
    items: FixedVec<T>,
}

impl<T: PartialEq> FixedSet<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: FixedVec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Insert if absent. Returns `true` if the value is in the set on exit.
    pub fn insert(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return true;
        }
        self.items.push(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.items.iter().any(|v| v == value)
    }

    pub fn remove(&mut self, value: &T) -> bool {
        if let Some(index) = self.items.iter().position(|v| v == value) {
            self.items.swap_remove(index);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_insert_get_replace() {
        let mut m = FixedMap::with_capacity(2);
        assert!(m.insert("a", 1));
        assert!(m.insert("b", 2));
        assert_eq!(m.get(&"a"), Some(&1));
        // Replacement works even when full.
        assert!(m.insert("a", 10));
        assert_eq!(m.get(&"a"), Some(&10));
        // A new key does not fit.
        assert!(!m.insert("c", 3));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn map_remove() {
        let mut m = FixedMap::with_capacity(4);
        m.insert(1u32, "one");
        m.insert(2, "two");
        assert_eq!(m.remove(&1), Some("one"));
        assert_eq!(m.remove(&1), None);
        assert!(!m.contains_key(&1));
        assert!(m.contains_key(&2));
    }

    #[test]
    fn set_deduplicates() {
        let mut s = FixedSet::with_capacity(4);
        assert!(s.insert(5));
        assert!(s.insert(5));
        assert_eq!(s.len(), 1);
        assert!(s.contains(&5));
        assert!(s.remove(&5));
        assert!(!s.remove(&5));
        assert!(s.is_empty());
    }

    #[test]
    fn set_capacity_bound() {
        let mut s = FixedSet::with_capacity(1);
        assert!(s.insert(1));
        assert!(!s.insert(2));
        assert!(s.insert(1));
    }
}
