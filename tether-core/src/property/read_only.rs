//! Read-only property pairs.
//!
//! An object that wants to expose a property without letting callers write
//! it keeps a [`ReadOnlyWrapper`] and hands out its [`ReadOnlyView`]. The
//! wrapper is an ordinary writable property; the view is a separate
//! observable with its own identity and listeners that reads through to the
//! wrapper. Whenever the wrapper fires, it re-fires on the view afterwards.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::error::ListenerResult;
use crate::id::ObservableId;
use crate::listener::{ChangeListener, InvalidationListener};
use crate::observable::{Observable, ObservableValue, ReadOnlyProperty, Value};
use crate::registry::ListenerRegistry;

use super::{Owner, Property, PropertyBuilder};

pub(crate) struct ReadOnlyCore<T: Value> {
    id: ObservableId,
    property: Property<T>,
    listeners: ListenerRegistry<T>,
}

/// Writable half of a read-only pair.
///
/// Derefs to the underlying [`Property`], so the owning code writes and
/// binds it like any other property.
pub struct ReadOnlyWrapper<T: Value> {
    core: Arc<ReadOnlyCore<T>>,
}

impl<T: Value> ReadOnlyWrapper<T> {
    /// Create an anonymous wrapper holding `value`.
    pub fn new(value: T) -> Self {
        Self::from_builder(Property::builder(), value)
    }

    /// Create a wrapper whose property is configured by `builder`.
    pub fn from_builder(builder: PropertyBuilder<T>, value: T) -> Self {
        let core = Arc::new_cyclic(|view: &Weak<ReadOnlyCore<T>>| ReadOnlyCore {
            id: ObservableId::new(),
            property: builder.build_with_companion(value, Some(Weak::clone(view))),
            listeners: ListenerRegistry::new(),
        });
        Self { core }
    }

    /// The writable property.
    pub fn property(&self) -> &Property<T> {
        &self.core.property
    }

    /// The read-only half, for handing out to callers.
    pub fn read_only_property(&self) -> ReadOnlyView<T> {
        ReadOnlyView {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Value> Deref for ReadOnlyWrapper<T> {
    type Target = Property<T>;

    fn deref(&self) -> &Property<T> {
        &self.core.property
    }
}

impl<T: Value> Clone for ReadOnlyWrapper<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Value + fmt::Debug> fmt::Debug for ReadOnlyWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyWrapper").field(&self.core.property).finish()
    }
}

/// Read-only half of a [`ReadOnlyWrapper`].
///
/// Shares owner and name with the wrapper but has its own identity, so
/// listeners registered here are independent of the wrapper's.
pub struct ReadOnlyView<T: Value> {
    core: Arc<ReadOnlyCore<T>>,
}

impl<T: Value> ReadOnlyView<T> {
    pub(crate) fn from_core(core: Arc<ReadOnlyCore<T>>) -> Self {
        Self { core }
    }

    /// Current value of the wrapper.
    pub fn get(&self) -> T {
        self.core.property.get()
    }

    /// Whether the wrapper is bound to a source.
    pub fn is_bound(&self) -> bool {
        self.core.property.is_bound()
    }

    /// Live invalidation listeners on this view.
    pub fn listener_count(&self) -> usize {
        self.core.listeners.invalidation_listener_count()
    }

    pub(crate) fn property(&self) -> &Property<T> {
        &self.core.property
    }

    pub(crate) fn fire(&self) -> ListenerResult {
        self.core.listeners.fire(self, self)
    }
}

impl<T: Value> Clone for ReadOnlyView<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Value> Observable for ReadOnlyView<T> {
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

impl<T: Value> ObservableValue<T> for ReadOnlyView<T> {
    fn get(&self) -> T {
        ReadOnlyView::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) {
        self.core.listeners.add_change_listener(self, listener);
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) {
        self.core.listeners.remove_change_listener(listener);
    }
}

impl<T: Value> ReadOnlyProperty<T> for ReadOnlyView<T> {
    fn owner(&self) -> Option<Owner> {
        self.core.property.owner()
    }

    fn name(&self) -> &str {
        self.core.property.name()
    }
}

impl<T: Value + fmt::Debug> fmt::Display for ReadOnlyView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.core.property.to_string();
        f.write_str("ReadOnly")?;
        f.write_str(&text)
    }
}

impl<T: Value + fmt::Debug> fmt::Debug for ReadOnlyView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyView")
            .field("id", &self.core.id)
            .field("property", &self.core.property)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn view_reads_through_to_the_wrapper() {
        let wrapper = ReadOnlyWrapper::new(1);
        let view = wrapper.read_only_property();

        wrapper.set(5).unwrap();
        assert_eq!(view.get(), 5);
        assert_ne!(view.observable_id(), wrapper.id());
    }

    #[test]
    fn view_listeners_fire_after_wrapper_listeners() {
        let wrapper = ReadOnlyWrapper::new(0);
        let view = wrapper.read_only_property();
        let order = Arc::new(Mutex::new(Vec::new()));

        let view_order = order.clone();
        view.add_listener(InvalidationListener::new(move |_| {
            view_order.lock().push("view");
            Ok(())
        }));
        let wrapper_order = order.clone();
        wrapper.add_listener(InvalidationListener::new(move |_| {
            wrapper_order.lock().push("wrapper");
            Ok(())
        }));

        wrapper.set(1).unwrap();
        assert_eq!(*order.lock(), vec!["wrapper", "view"]);
    }

    #[test]
    fn view_invalidations_coalesce_with_the_wrapper() {
        let wrapper = ReadOnlyWrapper::new(0);
        let view = wrapper.read_only_property();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        view.add_listener(InvalidationListener::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        wrapper.set(1).unwrap();
        wrapper.set(2).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        view.get();
        wrapper.set(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn view_change_listener_sees_values() {
        let wrapper = ReadOnlyWrapper::new(String::from("a"));
        let view = wrapper.read_only_property();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        view.add_change_listener(ChangeListener::new(move |_, old: &String, new: &String| {
            seen_clone.lock().push(format!("{old}->{new}"));
            Ok(())
        }));

        wrapper.set("b".into()).unwrap();
        assert_eq!(*seen.lock(), vec!["a->b"]);
    }

    #[test]
    fn view_shares_identity_and_can_be_a_source() {
        struct Label;
        let label = Arc::new(Label);
        let wrapper =
            ReadOnlyWrapper::from_builder(Property::builder().owner(&label).name("text"), 1);
        let view = wrapper.read_only_property();

        assert_eq!(view.name(), "text");
        assert!(view.owner().is_some());
        assert_eq!(view.to_string(), "ReadOnlyProperty [owner: Label, name: text, value: 1]");

        let follower = Property::new(0);
        follower.bind(&view).unwrap();
        wrapper.set(9).unwrap();
        assert_eq!(follower.get(), 9);
    }
}
