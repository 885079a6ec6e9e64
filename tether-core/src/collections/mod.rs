//! Observable Collections
//!
//! Minimal list, set and map types that report structural changes. They
//! exist so collection-valued properties have something to mirror; the
//! content binding engine only relies on the [`ObservableCollection`]
//! contract below.
//!
//! # Change events
//!
//! Every mutation that changes the collection fires once, after the lock is
//! released, with an event describing what happened. Each event records
//! `prior_len`, the length before the mutation. A mirror that is in sync has
//! exactly that length when the event arrives, which is how desynchronized
//! content bindings are detected.
//!
//! # Identity
//!
//! Handles compare equal when they share a core, just like properties.
//! Structural comparison is [`ObservableCollection::content_eq`].

mod list;
mod map;
mod set;

pub use list::{ListChange, ListEdit, ObservableList, WeakList};
pub use map::{MapChange, ObservableMap, WeakMap};
pub use set::{ObservableSet, SetChange, SetEdit, WeakSet};

use crate::content::ContentLinks;
use crate::error::Result;
use crate::listener::{CollectionListener, ListenerKey};
use crate::observable::Observable;

/// Common shape of collection change events.
pub trait ContentChange: Send + Sync + 'static {
    /// Length of the collection before the change.
    fn prior_len(&self) -> usize;
}

/// An observable collection that can take part in content bindings.
pub trait ObservableCollection: Observable + Clone + PartialEq + Send + Sync + 'static {
    /// Structural change event.
    type Change: ContentChange;

    /// Non-owning handle.
    type Weak: Clone + Send + Sync + 'static;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Structural equality.
    fn content_eq(&self, other: &Self) -> bool;

    /// Replace every element with a snapshot of `other`.
    fn replace_content(&self, other: &Self) -> Result<()>;

    /// Apply a change event recorded on another collection.
    fn replay(&self, change: &Self::Change) -> Result<()>;

    /// Register a structural change listener.
    fn add_change_listener(&self, listener: CollectionListener<Self::Change>);

    /// Remove one registration of a structural change listener.
    fn remove_change_listener(&self, listener: &CollectionListener<Self::Change>);

    /// Remove the change listeners carrying `key`.
    fn remove_keyed_listener(&self, key: &ListenerKey) -> bool;

    /// Whether a change listener carrying `key` is registered.
    fn has_keyed_listener(&self, key: &ListenerKey) -> bool;

    /// Content binding bookkeeping of this collection.
    fn content_links(&self) -> &ContentLinks;

    /// Non-owning handle.
    fn downgrade(&self) -> Self::Weak;

    /// Get the collection back from a non-owning handle.
    fn upgrade(weak: &Self::Weak) -> Option<Self>;
}
