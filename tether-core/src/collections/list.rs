//! Observable list.

use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::content::ContentLinks;
use crate::error::{BindingError, Result};
use crate::id::ObservableId;
use crate::listener::{CollectionListener, InvalidationListener, ListenerKey};
use crate::observable::{Observable, Value};
use crate::registry::CollectionListeners;

use super::{ContentChange, ObservableCollection};

/// One step of a list change.
///
/// Positions refer to the list as it is after the preceding edits of the
/// same change have been applied.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ListEdit<E> {
    /// `removed` was taken out at `at` and `added` put in its place.
    Replaced {
        at: usize,
        removed: Vec<E>,
        added: Vec<E>,
    },
    /// The elements starting at `at` were reordered. `permutation[i]` is the
    /// new index of the element that was at `at + i`.
    Permuted {
        at: usize,
        permutation: Vec<usize>,
        reordered: Vec<E>,
    },
    /// The elements starting at `at` changed in place.
    Updated { at: usize, items: Vec<E> },
}

impl<E: Clone> ListEdit<E> {
    /// Apply this edit to `items`.
    fn apply(&self, items: &mut Vec<E>) -> Result<()> {
        let (at, width, replacement) = match self {
            Self::Replaced { at, removed, added } => (*at, removed.len(), added),
            Self::Permuted { at, reordered, .. } => (*at, reordered.len(), reordered),
            Self::Updated { at, items: updated } => (*at, updated.len(), updated),
        };
        let end = at + width;
        if end > items.len() {
            return Err(BindingError::IndexOutOfBounds {
                index: end,
                len: items.len(),
            });
        }
        items.splice(at..end, replacement.iter().cloned());
        Ok(())
    }
}

/// Everything one list mutation did.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListChange<E> {
    prior_len: usize,
    edits: Vec<ListEdit<E>>,
}

impl<E> ListChange<E> {
    /// The edits, in application order.
    pub fn edits(&self) -> &[ListEdit<E>] {
        &self.edits
    }

    /// Number of elements added across all edits.
    pub fn added_len(&self) -> usize {
        self.edits
            .iter()
            .map(|edit| match edit {
                ListEdit::Replaced { added, .. } => added.len(),
                _ => 0,
            })
            .sum()
    }

    /// Number of elements removed across all edits.
    pub fn removed_len(&self) -> usize {
        self.edits
            .iter()
            .map(|edit| match edit {
                ListEdit::Replaced { removed, .. } => removed.len(),
                _ => 0,
            })
            .sum()
    }
}

impl<E: Value> ContentChange for ListChange<E> {
    fn prior_len(&self) -> usize {
        self.prior_len
    }
}

struct ListCore<E: Value> {
    id: ObservableId,
    items: Mutex<Vec<E>>,
    listeners: CollectionListeners<ListChange<E>>,
    links: ContentLinks,
}

/// A `Vec` that reports its structural changes.
///
/// Mutators return `Err` for out-of-range positions and for failures raised
/// by listeners. Closures passed to mutators run on a snapshot, without the
/// list locked.
pub struct ObservableList<E: Value> {
    core: Arc<ListCore<E>>,
}

/// Non-owning handle to an [`ObservableList`].
pub struct WeakList<E: Value> {
    core: Weak<ListCore<E>>,
}

impl<E: Value> Clone for WeakList<E> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<E: Value> ObservableList<E> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list holding `items`.
    pub fn from_vec(items: Vec<E>) -> Self {
        Self {
            core: Arc::new(ListCore {
                id: ObservableId::new(),
                items: Mutex::new(items),
                listeners: CollectionListeners::new(),
                links: ContentLinks::new(),
            }),
        }
    }

    /// Identity of this list.
    pub fn id(&self) -> ObservableId {
        self.core.id
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.core.items.lock().len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.core.items.lock().is_empty()
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<E> {
        self.core.items.lock().get(index).cloned()
    }

    /// Copy of the elements.
    pub fn to_vec(&self) -> Vec<E> {
        self.core.items.lock().clone()
    }

    /// Whether some element equals `item`.
    pub fn contains(&self, item: &E) -> bool {
        self.core.items.lock().contains(item)
    }

    /// Position of the first element equal to `item`.
    pub fn index_of(&self, item: &E) -> Option<usize> {
        self.core.items.lock().iter().position(|candidate| candidate == item)
    }

    /// Append `item`.
    pub fn push(&self, item: E) -> Result<()> {
        self.mutate(|items| {
            let at = items.len();
            items.push(item.clone());
            Ok(((), vec![insertion(at, vec![item])]))
        })
    }

    /// Insert `item` at `index`, shifting later elements right.
    pub fn insert(&self, index: usize, item: E) -> Result<()> {
        self.insert_all(index, [item])
    }

    /// Append every element of `iter`.
    pub fn extend(&self, iter: impl IntoIterator<Item = E>) -> Result<()> {
        let added: Vec<E> = iter.into_iter().collect();
        self.mutate(|items| {
            if added.is_empty() {
                return Ok(((), Vec::new()));
            }
            let at = items.len();
            items.extend(added.iter().cloned());
            Ok(((), vec![insertion(at, added)]))
        })
    }

    /// Insert every element of `iter` at `index`.
    pub fn insert_all(&self, index: usize, iter: impl IntoIterator<Item = E>) -> Result<()> {
        let added: Vec<E> = iter.into_iter().collect();
        self.mutate(|items| {
            check_position(index, items.len())?;
            if added.is_empty() {
                return Ok(((), Vec::new()));
            }
            items.splice(index..index, added.iter().cloned());
            Ok(((), vec![insertion(index, added)]))
        })
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&self, index: usize, item: E) -> Result<E> {
        self.mutate(|items| {
            check_index(index, items.len())?;
            let old = std::mem::replace(&mut items[index], item.clone());
            let edit = ListEdit::Replaced {
                at: index,
                removed: vec![old.clone()],
                added: vec![item],
            };
            Ok((old, vec![edit]))
        })
    }

    /// Remove and return the element at `index`.
    pub fn remove(&self, index: usize) -> Result<E> {
        self.mutate(|items| {
            check_index(index, items.len())?;
            let old = items.remove(index);
            Ok((old.clone(), vec![removal(index, vec![old])]))
        })
    }

    /// Remove the elements in `range`.
    pub fn remove_range(&self, range: Range<usize>) -> Result<()> {
        self.mutate(|items| {
            if range.start > range.end {
                return Err(BindingError::InvalidArgument(format!(
                    "range start {} is after its end {}",
                    range.start, range.end
                )));
            }
            check_position(range.end, items.len())?;
            if range.is_empty() {
                return Ok(((), Vec::new()));
            }
            let at = range.start;
            let removed: Vec<E> = items.drain(range).collect();
            Ok(((), vec![removal(at, removed)]))
        })
    }

    /// Remove the first element equal to `item`. Returns whether one was found.
    pub fn remove_item(&self, item: &E) -> Result<bool> {
        self.mutate(|items| match items.iter().position(|candidate| candidate == item) {
            Some(index) => {
                let old = items.remove(index);
                Ok((true, vec![removal(index, vec![old])]))
            }
            None => Ok((false, Vec::new())),
        })
    }

    /// Remove every element.
    pub fn clear(&self) -> Result<()> {
        self.mutate(|items| {
            if items.is_empty() {
                return Ok(((), Vec::new()));
            }
            let removed = std::mem::take(items);
            Ok(((), vec![removal(0, removed)]))
        })
    }

    /// Replace the whole content with `iter`, as a single change.
    pub fn set_all(&self, iter: impl IntoIterator<Item = E>) -> Result<()> {
        let added: Vec<E> = iter.into_iter().collect();
        self.mutate(|items| {
            if items.is_empty() && added.is_empty() {
                return Ok(((), Vec::new()));
            }
            let removed = std::mem::replace(items, added.clone());
            Ok((
                (),
                vec![ListEdit::Replaced {
                    at: 0,
                    removed,
                    added,
                }],
            ))
        })
    }

    /// Keep only the elements for which `keep` returns true. Returns the
    /// number of removed elements.
    pub fn retain(&self, keep: impl Fn(&E) -> bool) -> Result<usize> {
        let snapshot = self.to_vec();
        let verdicts: Vec<bool> = snapshot.iter().map(&keep).collect();

        self.mutate(|items| {
            check_unchanged(items, &snapshot)?;

            let mut kept = Vec::with_capacity(items.len());
            let mut edits = Vec::new();
            let mut run: Vec<E> = Vec::new();
            for (item, keep) in items.drain(..).zip(&verdicts) {
                if *keep {
                    if !run.is_empty() {
                        edits.push(removal(kept.len(), std::mem::take(&mut run)));
                    }
                    kept.push(item);
                } else {
                    run.push(item);
                }
            }
            if !run.is_empty() {
                edits.push(removal(kept.len(), run));
            }

            let removed = snapshot.len() - kept.len();
            *items = kept;
            Ok((removed, edits))
        })
    }

    /// Sort by the natural order of the elements.
    pub fn sort(&self) -> Result<()>
    where
        E: Ord,
    {
        self.sort_by(E::cmp)
    }

    /// Sort with `compare`. The sort is stable; a list already in order
    /// fires nothing.
    pub fn sort_by(&self, compare: impl Fn(&E, &E) -> std::cmp::Ordering) -> Result<()> {
        let snapshot = self.to_vec();
        let mut order: Vec<usize> = (0..snapshot.len()).collect();
        order.sort_by(|&a, &b| compare(&snapshot[a], &snapshot[b]));

        if order.iter().enumerate().all(|(new, &old)| new == old) {
            return Ok(());
        }

        let mut permutation = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            permutation[old] = new;
        }
        let reordered: Vec<E> = order.iter().map(|&old| snapshot[old].clone()).collect();

        self.mutate(|items| {
            check_unchanged(items, &snapshot)?;
            *items = reordered.clone();
            Ok((
                (),
                vec![ListEdit::Permuted {
                    at: 0,
                    permutation,
                    reordered,
                }],
            ))
        })
    }

    /// Change the element at `index` in place.
    ///
    /// `update` runs on a copy of the element, without the list locked.
    /// Listeners are notified even if the element compares equal afterwards.
    pub fn update(&self, index: usize, update: impl FnOnce(&mut E)) -> Result<()> {
        let mut item = self.get(index).ok_or(BindingError::IndexOutOfBounds {
            index,
            len: self.len(),
        })?;
        update(&mut item);

        self.mutate(|items| {
            check_index(index, items.len())?;
            items[index] = item.clone();
            Ok((
                (),
                vec![ListEdit::Updated {
                    at: index,
                    items: vec![item],
                }],
            ))
        })
    }

    /// Live invalidation listeners.
    pub fn listener_count(&self) -> usize {
        self.core.listeners.invalidation_listener_count()
    }

    /// Live structural change listeners, content bindings included.
    pub fn change_listener_count(&self) -> usize {
        self.core.listeners.change_listener_count()
    }

    /// Run `edit` on the locked items, then fire the resulting change.
    ///
    /// A mutation that produces no edits fires nothing.
    fn mutate<R>(&self, edit: impl FnOnce(&mut Vec<E>) -> Result<(R, Vec<ListEdit<E>>)>) -> Result<R> {
        let (result, change) = {
            let mut items = self.core.items.lock();
            let prior_len = items.len();
            let (result, edits) = edit(&mut items)?;
            (result, (!edits.is_empty()).then_some(ListChange { prior_len, edits }))
        };

        if let Some(change) = change {
            self.core.listeners.fire(self, &change)?;
        }
        Ok(result)
    }
}

fn insertion<E>(at: usize, added: Vec<E>) -> ListEdit<E> {
    ListEdit::Replaced {
        at,
        removed: Vec::new(),
        added,
    }
}

fn removal<E>(at: usize, removed: Vec<E>) -> ListEdit<E> {
    ListEdit::Replaced {
        at,
        removed,
        added: Vec::new(),
    }
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(BindingError::IndexOutOfBounds { index, len })
    }
}

fn check_position(index: usize, len: usize) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(BindingError::IndexOutOfBounds { index, len })
    }
}

fn check_unchanged<E: PartialEq>(items: &[E], snapshot: &[E]) -> Result<()> {
    if items == snapshot {
        Ok(())
    } else {
        Err(BindingError::IllegalState(
            "list was modified while a callback was running".into(),
        ))
    }
}

impl<E: Value> Default for ObservableList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Value> From<Vec<E>> for ObservableList<E> {
    fn from(items: Vec<E>) -> Self {
        Self::from_vec(items)
    }
}

impl<E: Value> FromIterator<E> for ObservableList<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<E: Value> Clone for ObservableList<E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<E: Value> PartialEq for ObservableList<E> {
    fn eq(&self, other: &Self) -> bool {
        self.core.id == other.core.id
    }
}

impl<E: Value + fmt::Debug> fmt::Debug for ObservableList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.core.items.lock().iter()).finish()
    }
}

impl<E: Value> Observable for ObservableList<E> {
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

impl<E: Value> ObservableCollection for ObservableList<E> {
    type Change = ListChange<E>;
    type Weak = WeakList<E>;

    fn len(&self) -> usize {
        ObservableList::len(self)
    }

    fn content_eq(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }
        let mine = self.to_vec();
        mine == other.to_vec()
    }

    fn replace_content(&self, other: &Self) -> Result<()> {
        let snapshot = other.to_vec();
        self.set_all(snapshot)
    }

    fn replay(&self, change: &ListChange<E>) -> Result<()> {
        self.mutate(|items| {
            let mut next = items.clone();
            for edit in &change.edits {
                edit.apply(&mut next)?;
            }
            *items = next;
            Ok(((), change.edits.clone()))
        })
    }

    fn add_change_listener(&self, listener: CollectionListener<ListChange<E>>) {
        self.core.listeners.add_change_listener(listener);
    }

    fn remove_change_listener(&self, listener: &CollectionListener<ListChange<E>>) {
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

    fn downgrade(&self) -> WeakList<E> {
        WeakList {
            core: Arc::downgrade(&self.core),
        }
    }

    fn upgrade(weak: &WeakList<E>) -> Option<Self> {
        weak.core.upgrade().map(|core| Self { core })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn record(list: &ObservableList<i32>) -> Arc<Mutex<Vec<ListChange<i32>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        list.add_change_listener(CollectionListener::new(move |change: &ListChange<i32>| {
            seen_clone.lock().push(change.clone());
            Ok(())
        }));
        seen
    }

    #[test]
    fn push_and_insert_report_positions() {
        let list = ObservableList::from_vec(vec![1, 3]);
        let seen = record(&list);

        list.insert(1, 2).unwrap();
        list.push(4).unwrap();
        assert_eq!(list.to_vec(), vec![1, 2, 3, 4]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].prior_len(), 2);
        assert_eq!(seen[0].edits(), &[insertion(1, vec![2])]);
        assert_eq!(seen[1].edits(), &[insertion(3, vec![4])]);
    }

    #[test]
    fn out_of_range_access_fails_without_firing() {
        let list = ObservableList::from_vec(vec![1]);
        let seen = record(&list);

        assert_eq!(
            list.insert(3, 9).unwrap_err(),
            BindingError::IndexOutOfBounds { index: 3, len: 1 }
        );
        assert!(list.set(1, 9).is_err());
        assert!(list.remove(5).is_err());
        assert!(list.remove_range(0..2).is_err());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn empty_mutations_fire_nothing() {
        let list: ObservableList<i32> = ObservableList::new();
        let seen = record(&list);

        list.clear().unwrap();
        list.extend(Vec::new()).unwrap();
        list.set_all(Vec::new()).unwrap();
        list.remove_range(0..0).unwrap();
        assert!(!list.remove_item(&1).unwrap());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn retain_reports_each_removed_run() {
        let list = ObservableList::from_vec(vec![1, 2, 3, 4, 5, 6]);
        let seen = record(&list);

        let removed = list.retain(|v| *v == 1 || *v == 4).unwrap();
        assert_eq!(removed, 4);
        assert_eq!(list.to_vec(), vec![1, 4]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].edits(),
            &[removal(1, vec![2, 3]), removal(2, vec![5, 6])]
        );
        assert_eq!(seen[0].removed_len(), 4);
    }

    #[test]
    fn sort_reports_a_permutation() {
        let list = ObservableList::from_vec(vec![3, 1, 2]);
        let seen = record(&list);

        list.sort().unwrap();
        assert_eq!(list.to_vec(), vec![1, 2, 3]);

        // Already sorted: silent.
        list.sort().unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].edits(),
            &[ListEdit::Permuted {
                at: 0,
                permutation: vec![2, 0, 1],
                reordered: vec![1, 2, 3],
            }]
        );
    }

    #[test]
    fn update_fires_even_for_equal_values() {
        let list = ObservableList::from_vec(vec![10, 20]);
        let seen = record(&list);

        list.update(1, |v| *v += 1).unwrap();
        list.update(0, |_| {}).unwrap();
        assert_eq!(list.to_vec(), vec![10, 21]);
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn replay_reproduces_the_change_elsewhere() {
        let source = ObservableList::from_vec(vec![1, 2, 3, 4]);
        let mirror = ObservableList::from_vec(vec![1, 2, 3, 4]);
        let seen = record(&source);

        source.retain(|v| v % 2 == 0).unwrap();
        source.insert(1, 7).unwrap();
        source.sort().unwrap();

        for change in seen.lock().iter() {
            mirror.replay(change).unwrap();
        }
        assert_eq!(mirror.to_vec(), source.to_vec());
        assert!(mirror.content_eq(&source));
        assert_ne!(mirror, source);
    }

    #[test]
    fn replay_out_of_range_leaves_the_list_alone() {
        let source = ObservableList::from_vec(vec![1, 2, 3]);
        let short = ObservableList::from_vec(vec![1]);
        let seen = record(&source);

        source.remove(2).unwrap();
        let change = seen.lock()[0].clone();

        assert!(short.replay(&change).is_err());
        assert_eq!(short.to_vec(), vec![1]);
    }

    #[test]
    fn invalidation_listeners_fire_before_change_listeners() {
        let list = ObservableList::new();
        let order = Arc::new(AtomicI32::new(0));

        let first = order.clone();
        list.add_change_listener(CollectionListener::new(move |_: &ListChange<i32>| {
            assert_eq!(first.fetch_add(1, Ordering::SeqCst), 1);
            Ok(())
        }));
        let second = order.clone();
        list.add_listener(InvalidationListener::new(move |_| {
            assert_eq!(second.fetch_add(1, Ordering::SeqCst), 0);
            Ok(())
        }));

        list.push(1).unwrap();
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_may_mutate_the_list_it_observes() {
        let list = ObservableList::new();
        let weak = list.downgrade();
        list.add_change_listener(CollectionListener::new(move |change: &ListChange<i32>| {
            if let Some(list) = ObservableList::upgrade(&weak) {
                if change.added_len() > 0 && list.len() > 2 {
                    list.remove(0)?;
                }
            }
            Ok(())
        }));

        for value in 0..5 {
            list.push(value).unwrap();
        }
        assert_eq!(list.to_vec(), vec![3, 4]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn changes_serialize_with_their_edits() {
        let list = ObservableList::new();
        let seen = record(&list);
        list.push(1).unwrap();

        let json = serde_json::to_value(&seen.lock()[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "prior_len": 0,
                "edits": [{ "Replaced": { "at": 0, "removed": [], "added": [1] } }]
            })
        );
    }
}
