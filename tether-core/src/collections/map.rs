//! Observable map.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::content::ContentLinks;
use crate::error::Result;
use crate::id::ObservableId;
use crate::listener::{CollectionListener, InvalidationListener, ListenerKey};
use crate::observable::{Observable, Value};
use crate::registry::CollectionListeners;

use super::{ContentChange, ObservableCollection};

/// Change of the entry under one key.
///
/// An addition has only `added`, a removal only `removed`, and a
/// replacement both.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapChange<K, V> {
    prior_len: usize,
    key: K,
    removed: Option<V>,
    added: Option<V>,
}

impl<K, V> MapChange<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Value that was mapped before the change.
    pub fn removed(&self) -> Option<&V> {
        self.removed.as_ref()
    }

    /// Value mapped after the change.
    pub fn added(&self) -> Option<&V> {
        self.added.as_ref()
    }

    pub fn was_added(&self) -> bool {
        self.added.is_some()
    }

    pub fn was_removed(&self) -> bool {
        self.removed.is_some()
    }
}

impl<K: Value, V: Value> ContentChange for MapChange<K, V> {
    fn prior_len(&self) -> usize {
        self.prior_len
    }
}

struct MapCore<K: Value + Eq + Hash, V: Value> {
    id: ObservableId,
    entries: Mutex<IndexMap<K, V>>,
    listeners: CollectionListeners<MapChange<K, V>>,
    links: ContentLinks,
}

/// An insertion-ordered map that reports changes per key.
pub struct ObservableMap<K: Value + Eq + Hash, V: Value> {
    core: Arc<MapCore<K, V>>,
}

/// Non-owning handle to an [`ObservableMap`].
pub struct WeakMap<K: Value + Eq + Hash, V: Value> {
    core: Weak<MapCore<K, V>>,
}

impl<K: Value + Eq + Hash, V: Value> Clone for WeakMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<K: Value + Eq + Hash, V: Value> ObservableMap<K, V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            core: Arc::new(MapCore {
                id: ObservableId::new(),
                entries: Mutex::new(IndexMap::new()),
                listeners: CollectionListeners::new(),
                links: ContentLinks::new(),
            }),
        }
    }

    pub fn id(&self) -> ObservableId {
        self.core.id
    }

    pub fn len(&self) -> usize {
        self.core.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.entries.lock().is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.core.entries.lock().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.core.entries.lock().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.core.entries.lock().keys().cloned().collect()
    }

    /// Values in insertion order.
    pub fn values(&self) -> Vec<V> {
        self.core.entries.lock().values().cloned().collect()
    }

    /// Copy of the entries in insertion order.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.core
            .entries
            .lock()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Map `key` to `value`, returning the previous value.
    ///
    /// Replacing a value with an equal one fires nothing.
    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        let (previous, change) = {
            let mut entries = self.core.entries.lock();
            let prior_len = entries.len();
            let previous = entries.insert(key.clone(), value.clone());
            let change = (previous.as_ref() != Some(&value)).then(|| MapChange {
                prior_len,
                key,
                removed: previous.clone(),
                added: Some(value),
            });
            (previous, change)
        };
        self.fire_all(change)?;
        Ok(previous)
    }

    /// Remove the entry under `key`, returning its value.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        let (removed, change) = {
            let mut entries = self.core.entries.lock();
            let prior_len = entries.len();
            match entries.shift_remove_entry(key) {
                Some((key, value)) => (
                    Some(value.clone()),
                    Some(MapChange {
                        prior_len,
                        key,
                        removed: Some(value),
                        added: None,
                    }),
                ),
                None => (None, None),
            }
        };
        self.fire_all(change)?;
        Ok(removed)
    }

    /// Insert every entry of `iter`.
    pub fn extend(&self, iter: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        for (key, value) in iter {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Remove every entry, firing one removal per entry.
    pub fn clear(&self) -> Result<()> {
        let removed = std::mem::take(&mut *self.core.entries.lock());
        let prior_len = removed.len();
        let changes = removed
            .into_iter()
            .enumerate()
            .map(|(index, (key, value))| MapChange {
                prior_len: prior_len - index,
                key,
                removed: Some(value),
                added: None,
            });
        self.fire_all(changes)
    }

    /// Keep only the entries for which `keep` returns true. Returns how
    /// many were removed.
    pub fn retain(&self, keep: impl Fn(&K, &V) -> bool) -> Result<usize> {
        let doomed: Vec<K> = self
            .to_vec()
            .into_iter()
            .filter(|(key, value)| !keep(key, value))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in &doomed {
            if self.remove(key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.invalidation_listener_count()
    }

    pub fn change_listener_count(&self) -> usize {
        self.core.listeners.change_listener_count()
    }

    fn fire_all(&self, changes: impl IntoIterator<Item = MapChange<K, V>>) -> Result<()> {
        for change in changes {
            self.core.listeners.fire(self, &change)?;
        }
        Ok(())
    }
}

impl<K: Value + Eq + Hash, V: Value> Default for ObservableMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Value + Eq + Hash, V: Value> FromIterator<(K, V)> for ObservableMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        map.core.entries.lock().extend(iter);
        map
    }
}

impl<K: Value + Eq + Hash, V: Value> Clone for ObservableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K: Value + Eq + Hash, V: Value> PartialEq for ObservableMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.core.id == other.core.id
    }
}

impl<K, V> fmt::Debug for ObservableMap<K, V>
where
    K: Value + Eq + Hash + fmt::Debug,
    V: Value + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.core.entries.lock().iter()).finish()
    }
}

impl<K: Value + Eq + Hash, V: Value> Observable for ObservableMap<K, V> {
    fn observable_id(&self) -> ObservableId {
        self.core.id
    }

    fn add_listener(&self, listener: InvalidationListener) {
        self.core.listeners.add_listener(listener);
    }

    fn remove_listener(&self, listener: &InvalidationListener) {
        self.core.listeners.remove_listener(listener);
    }
}

impl<K: Value + Eq + Hash, V: Value> ObservableCollection for ObservableMap<K, V> {
    type Change = MapChange<K, V>;
    type Weak = WeakMap<K, V>;

    fn len(&self) -> usize {
        ObservableMap::len(self)
    }

    fn content_eq(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }
        let mine = self.core.entries.lock().clone();
        let theirs = other.core.entries.lock().clone();
        mine == theirs
    }

    fn replace_content(&self, other: &Self) -> Result<()> {
        let snapshot = other.to_vec();
        self.clear()?;
        self.extend(snapshot)
    }

    fn replay(&self, change: &MapChange<K, V>) -> Result<()> {
        match &change.added {
            Some(value) => self.insert(change.key.clone(), value.clone())?,
            None => self.remove(&change.key)?,
        };
        Ok(())
    }

    fn add_change_listener(&self, listener: CollectionListener<MapChange<K, V>>) {
        self.core.listeners.add_change_listener(listener);
    }

    fn remove_change_listener(&self, listener: &CollectionListener<MapChange<K, V>>) {
        self.core.listeners.remove_change_listener(listener);
    }

    fn remove_keyed_listener(&self, key: &ListenerKey) -> bool {
        self.core.listeners.remove_keyed(key)
    }

    fn has_keyed_listener(&self, key: &ListenerKey) -> bool {
        self.core.listeners.has_keyed(key)
    }

    fn content_links(&self) -> &ContentLinks {
        &self.core.links
    }

    fn downgrade(&self) -> WeakMap<K, V> {
        WeakMap {
            core: Arc::downgrade(&self.core),
        }
    }

    fn upgrade(weak: &WeakMap<K, V>) -> Option<Self> {
        weak.core.upgrade().map(|core| Self { core })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_additions_and_replacements() {
        let map = ObservableMap::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        map.add_change_listener(CollectionListener::new(move |change: &MapChange<&'static str, i32>| {
            seen_clone.lock().push(change.clone());
            Ok(())
        }));

        assert_eq!(map.insert("a", 1).unwrap(), None);
        assert_eq!(map.insert("a", 1).unwrap(), Some(1));
        assert_eq!(map.insert("a", 2).unwrap(), Some(1));
        assert_eq!(map.remove(&"a").unwrap(), Some(2));
        assert_eq!(map.remove(&"a").unwrap(), None);

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].was_added() && !seen[0].was_removed());
        assert_eq!((seen[1].removed(), seen[1].added()), (Some(&1), Some(&2)));
        assert_eq!(seen[1].prior_len(), 1);
        assert!(seen[2].was_removed() && !seen[2].was_added());
    }

    #[test]
    fn retain_removes_matching_entries() {
        let map: ObservableMap<i32, i32> = (0..6).map(|k| (k, k * k)).collect();
        assert_eq!(map.retain(|_, value| value % 2 == 0).unwrap(), 3);
        assert_eq!(map.keys(), vec![0, 2, 4]);
        assert_eq!(map.values(), vec![0, 4, 16]);
    }

    #[test]
    fn replay_mirrors_changes() {
        let source: ObservableMap<&'static str, i32> = ObservableMap::new();
        let mirror: ObservableMap<&'static str, i32> = ObservableMap::new();
        let target = mirror.clone();
        source.add_change_listener(CollectionListener::new(move |change: &MapChange<&'static str, i32>| {
            target.replay(change)
        }));

        source.insert("x", 1).unwrap();
        source.insert("y", 2).unwrap();
        source.insert("x", 3).unwrap();
        source.remove(&"y").unwrap();

        assert!(mirror.content_eq(&source));
        assert_eq!(mirror.to_vec(), vec![("x", 3)]);
    }
}
