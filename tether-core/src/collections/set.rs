//! Observable set.
//!
//! Backed by an `IndexSet`, so iteration follows insertion order and
//! mirrors built by content bindings list their elements in the same order
//! as the source.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::content::ContentLinks;
use crate::error::Result;
use crate::id::ObservableId;
use crate::listener::{CollectionListener, InvalidationListener, ListenerKey};
use crate::observable::{Observable, Value};
use crate::registry::CollectionListeners;

use super::{ContentChange, ObservableCollection};

/// What happened to one element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SetEdit<E> {
    Added(E),
    Removed(E),
}

/// A single-element set change. Bulk operations fire one per element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetChange<E> {
    prior_len: usize,
    edit: SetEdit<E>,
}

impl<E> SetChange<E> {
    pub fn edit(&self) -> &SetEdit<E> {
        &self.edit
    }

    /// The added element, if this change is an addition.
    pub fn added(&self) -> Option<&E> {
        match &self.edit {
            SetEdit::Added(item) => Some(item),
            SetEdit::Removed(_) => None,
        }
    }

    /// The removed element, if this change is a removal.
    pub fn removed(&self) -> Option<&E> {
        match &self.edit {
            SetEdit::Removed(item) => Some(item),
            SetEdit::Added(_) => None,
        }
    }
}

impl<E: Value> ContentChange for SetChange<E> {
    fn prior_len(&self) -> usize {
        self.prior_len
    }
}

struct SetCore<E: Value + Eq + Hash> {
    id: ObservableId,
    items: Mutex<IndexSet<E>>,
    listeners: CollectionListeners<SetChange<E>>,
    links: ContentLinks,
}

/// An insertion-ordered set that reports additions and removals.
pub struct ObservableSet<E: Value + Eq + Hash> {
    core: Arc<SetCore<E>>,
}

/// Non-owning handle to an [`ObservableSet`].
pub struct WeakSet<E: Value + Eq + Hash> {
    core: Weak<SetCore<E>>,
}

impl<E: Value + Eq + Hash> Clone for WeakSet<E> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<E: Value + Eq + Hash> ObservableSet<E> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            core: Arc::new(SetCore {
                id: ObservableId::new(),
                items: Mutex::new(IndexSet::new()),
                listeners: CollectionListeners::new(),
                links: ContentLinks::new(),
            }),
        }
    }

    pub fn id(&self) -> ObservableId {
        self.core.id
    }

    pub fn len(&self) -> usize {
        self.core.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.items.lock().is_empty()
    }

    pub fn contains(&self, item: &E) -> bool {
        self.core.items.lock().contains(item)
    }

    /// Copy of the elements in insertion order.
    pub fn to_vec(&self) -> Vec<E> {
        self.core.items.lock().iter().cloned().collect()
    }

    /// Add `item`. Returns false, firing nothing, if it was already present.
    pub fn insert(&self, item: E) -> Result<bool> {
        let change = {
            let mut items = self.core.items.lock();
            let prior_len = items.len();
            items.insert(item.clone()).then(|| SetChange {
                prior_len,
                edit: SetEdit::Added(item),
            })
        };
        self.fire_all(change)
    }

    /// Remove `item`. Returns false, firing nothing, if it was absent.
    pub fn remove(&self, item: &E) -> Result<bool> {
        let change = {
            let mut items = self.core.items.lock();
            let prior_len = items.len();
            items.shift_take(item).map(|removed| SetChange {
                prior_len,
                edit: SetEdit::Removed(removed),
            })
        };
        self.fire_all(change)
    }

    /// Add every element of `iter`. Returns how many were new.
    pub fn extend(&self, iter: impl IntoIterator<Item = E>) -> Result<usize> {
        let changes: Vec<SetChange<E>> = {
            let mut items = self.core.items.lock();
            iter.into_iter()
                .filter_map(|item| {
                    let prior_len = items.len();
                    items.insert(item.clone()).then(|| SetChange {
                        prior_len,
                        edit: SetEdit::Added(item),
                    })
                })
                .collect()
        };
        let added = changes.len();
        self.fire_all(changes)?;
        Ok(added)
    }

    /// Remove every element, firing one removal per element.
    pub fn clear(&self) -> Result<()> {
        let removed = std::mem::take(&mut *self.core.items.lock());
        let prior_len = removed.len();
        let changes = removed.into_iter().enumerate().map(|(index, item)| SetChange {
            prior_len: prior_len - index,
            edit: SetEdit::Removed(item),
        });
        self.fire_all(changes)?;
        Ok(())
    }

    /// Keep only the elements for which `keep` returns true. Returns how
    /// many were removed.
    pub fn retain(&self, keep: impl Fn(&E) -> bool) -> Result<usize> {
        let doomed: Vec<E> = self.to_vec().into_iter().filter(|item| !keep(item)).collect();
        let changes: Vec<SetChange<E>> = {
            let mut items = self.core.items.lock();
            doomed
                .into_iter()
                .filter_map(|item| {
                    let prior_len = items.len();
                    items.shift_take(&item).map(|removed| SetChange {
                        prior_len,
                        edit: SetEdit::Removed(removed),
                    })
                })
                .collect()
        };
        let removed = changes.len();
        self.fire_all(changes)?;
        Ok(removed)
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.invalidation_listener_count()
    }

    pub fn change_listener_count(&self) -> usize {
        self.core.listeners.change_listener_count()
    }

    /// Fire `changes` in order. Returns whether there was at least one.
    fn fire_all(&self, changes: impl IntoIterator<Item = SetChange<E>>) -> Result<bool> {
        let mut fired = false;
        for change in changes {
            self.core.listeners.fire(self, &change)?;
            fired = true;
        }
        Ok(fired)
    }
}

impl<E: Value + Eq + Hash> Default for ObservableSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Value + Eq + Hash> FromIterator<E> for ObservableSet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let set = Self::new();
        set.core.items.lock().extend(iter);
        set
    }
}

impl<E: Value + Eq + Hash> Clone for ObservableSet<E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<E: Value + Eq + Hash> PartialEq for ObservableSet<E> {
    fn eq(&self, other: &Self) -> bool {
        self.core.id == other.core.id
    }
}

impl<E: Value + Eq + Hash + fmt::Debug> fmt::Debug for ObservableSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.core.items.lock().iter()).finish()
    }
}

impl<E: Value + Eq + Hash> Observable for ObservableSet<E> {
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

impl<E: Value + Eq + Hash> ObservableCollection for ObservableSet<E> {
    type Change = SetChange<E>;
    type Weak = WeakSet<E>;

    fn len(&self) -> usize {
        ObservableSet::len(self)
    }

    fn content_eq(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }
        let mine = self.core.items.lock().clone();
        let theirs = other.core.items.lock().clone();
        mine == theirs
    }

    fn replace_content(&self, other: &Self) -> Result<()> {
        let snapshot = other.to_vec();
        self.clear()?;
        self.extend(snapshot)?;
        Ok(())
    }

    fn replay(&self, change: &SetChange<E>) -> Result<()> {
        match &change.edit {
            SetEdit::Added(item) => self.insert(item.clone())?,
            SetEdit::Removed(item) => self.remove(item)?,
        };
        Ok(())
    }

    fn add_change_listener(&self, listener: CollectionListener<SetChange<E>>) {
        self.core.listeners.add_change_listener(listener);
    }

    fn remove_change_listener(&self, listener: &CollectionListener<SetChange<E>>) {
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

    fn downgrade(&self) -> WeakSet<E> {
        WeakSet {
            core: Arc::downgrade(&self.core),
        }
    }

    fn upgrade(weak: &WeakSet<E>) -> Option<Self> {
        weak.core.upgrade().map(|core| Self { core })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(set: &ObservableSet<&'static str>) -> Arc<Mutex<Vec<SetChange<&'static str>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        set.add_change_listener(CollectionListener::new(
            move |change: &SetChange<&'static str>| {
                seen_clone.lock().push(change.clone());
                Ok(())
            },
        ));
        seen
    }

    #[test]
    fn duplicate_insert_is_silent() {
        let set = ObservableSet::new();
        let seen = record(&set);

        assert!(set.insert("a").unwrap());
        assert!(!set.insert("a").unwrap());
        assert!(set.remove(&"a").unwrap());
        assert!(!set.remove(&"a").unwrap());

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].added(), Some(&"a"));
        assert_eq!(seen[1].removed(), Some(&"a"));
        assert_eq!(seen[1].prior_len(), 1);
    }

    #[test]
    fn clear_fires_once_per_element_with_shrinking_prior_len() {
        let set: ObservableSet<&'static str> = ["x", "y", "z"].into_iter().collect();
        let seen = record(&set);

        set.clear().unwrap();
        let lens: Vec<usize> = seen.lock().iter().map(|change| change.prior_len()).collect();
        assert_eq!(lens, vec![3, 2, 1]);
        assert!(set.is_empty());
    }

    #[test]
    fn retain_and_extend_report_counts() {
        let set: ObservableSet<&'static str> = ["a", "b", "c"].into_iter().collect();
        assert_eq!(set.retain(|item| *item != "b").unwrap(), 1);
        assert_eq!(set.extend(["c", "d"]).unwrap(), 1);
        assert_eq!(set.to_vec(), vec!["a", "c", "d"]);
    }

    #[test]
    fn content_equality_ignores_order() {
        let left: ObservableSet<&'static str> = ["a", "b"].into_iter().collect();
        let right: ObservableSet<&'static str> = ["b", "a"].into_iter().collect();

        assert!(left.content_eq(&right));
        assert_ne!(left, right);
        assert_eq!(left, left.clone());
    }
}
