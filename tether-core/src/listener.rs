//! Listener Handles
//!
//! A listener is a handler plus the way it is held. Registries store
//! [`Listener`] values; the handler behind one may be owned by the registry
//! (strong) or owned elsewhere and only observed (weak).
//!
//! # Weak listeners
//!
//! Bindings must never extend the lifetime of the objects they connect. Two
//! mechanisms cover this:
//!
//! - [`Listener::weak`] holds the handler through a `Weak`. Once the caller
//!   drops the last `Arc`, the listener is expired.
//! - A handler can report [`InvalidationHandler::is_expired`] itself. The
//!   binding engines use this for handlers that hold weak references to the
//!   properties or collections they update.
//!
//! Expired listeners are pruned by the registry at the next fire pass or
//! registration, so dead entries do not pile up on long-lived sources.
//!
//! # Equality
//!
//! Removal needs a notion of "the same listener". Keyed listeners compare by
//! [`ListenerKey`] so the engines can find a binding again from its two
//! endpoints alone. Everything else compares by handler address.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::ListenerResult;
use crate::id::{unordered, ObservableId};
use crate::observable::{Observable, ObservableValue};

/// Receives invalidation notifications.
pub trait InvalidationHandler: Send + Sync + 'static {
    /// The observed value may have changed.
    fn invalidated(&self, observable: &dyn Observable) -> ListenerResult;

    /// Whether the handler can no longer do anything useful and should be
    /// removed from the registry.
    fn is_expired(&self) -> bool {
        false
    }
}

impl<F> InvalidationHandler for F
where
    F: Fn(&dyn Observable) -> ListenerResult + Send + Sync + 'static,
{
    fn invalidated(&self, observable: &dyn Observable) -> ListenerResult {
        self(observable)
    }
}

/// Receives change notifications carrying the old and the new value.
pub trait ChangeHandler<T>: Send + Sync + 'static {
    /// The value changed from `old` to `new`.
    fn changed(&self, observable: &dyn ObservableValue<T>, old: &T, new: &T) -> ListenerResult;

    /// See [`InvalidationHandler::is_expired`].
    fn is_expired(&self) -> bool {
        false
    }
}

impl<T, F> ChangeHandler<T> for F
where
    F: Fn(&dyn ObservableValue<T>, &T, &T) -> ListenerResult + Send + Sync + 'static,
{
    fn changed(&self, observable: &dyn ObservableValue<T>, old: &T, new: &T) -> ListenerResult {
        self(observable, old, new)
    }
}

/// Receives structural change events from an observable collection.
pub trait CollectionChangeHandler<C>: Send + Sync + 'static {
    /// The collection changed as described by `change`.
    fn on_changed(&self, change: &C) -> ListenerResult;

    /// See [`InvalidationHandler::is_expired`].
    fn is_expired(&self) -> bool {
        false
    }
}

impl<C, F> CollectionChangeHandler<C> for F
where
    F: Fn(&C) -> ListenerResult + Send + Sync + 'static,
{
    fn on_changed(&self, change: &C) -> ListenerResult {
        self(change)
    }
}

/// Uniform access to the expiry flag of the handler trait objects.
pub trait Expiring {
    /// Whether the handler reports itself expired.
    fn expired(&self) -> bool;
}

impl Expiring for dyn InvalidationHandler {
    fn expired(&self) -> bool {
        self.is_expired()
    }
}

impl<T: 'static> Expiring for dyn ChangeHandler<T> {
    fn expired(&self) -> bool {
        self.is_expired()
    }
}

impl<C: 'static> Expiring for dyn CollectionChangeHandler<C> {
    fn expired(&self) -> bool {
        self.is_expired()
    }
}

/// Identifies listeners installed by the binding engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKey {
    /// Bidirectional value binding between an unordered pair of properties.
    Bidirectional(ObservableId, ObservableId),
    /// One-way content mirror feeding the given target collection.
    Content(ObservableId),
    /// Bidirectional content binding between an unordered pair of collections.
    ContentBidirectional(ObservableId, ObservableId),
}

impl ListenerKey {
    /// Key for a bidirectional value binding between `a` and `b`.
    pub fn bidirectional(a: ObservableId, b: ObservableId) -> Self {
        let (lo, hi) = unordered(a, b);
        Self::Bidirectional(lo, hi)
    }

    /// Key for a bidirectional content binding between `a` and `b`.
    pub fn content_bidirectional(a: ObservableId, b: ObservableId) -> Self {
        let (lo, hi) = unordered(a, b);
        Self::ContentBidirectional(lo, hi)
    }
}

enum Slot<H: ?Sized> {
    Strong(Arc<H>),
    Weak(Weak<H>),
}

impl<H: ?Sized> Clone for Slot<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Strong(arc) => Self::Strong(Arc::clone(arc)),
            Self::Weak(weak) => Self::Weak(Weak::clone(weak)),
        }
    }
}

/// A registered (or registrable) listener.
pub struct Listener<H: ?Sized> {
    slot: Slot<H>,
    key: Option<ListenerKey>,
}

/// Listener for invalidation notifications.
pub type InvalidationListener = Listener<dyn InvalidationHandler>;

/// Listener for old/new change notifications on values of type `T`.
pub type ChangeListener<T> = Listener<dyn ChangeHandler<T>>;

/// Listener for structural change events of type `C`.
pub type CollectionListener<C> = Listener<dyn CollectionChangeHandler<C>>;

impl<H: ?Sized + Expiring> Listener<H> {
    /// Hold an already shared handler strongly.
    pub fn from_arc(handler: Arc<H>) -> Self {
        Self {
            slot: Slot::Strong(handler),
            key: None,
        }
    }

    /// Hold a handler weakly. The listener expires once every `Arc` to the
    /// handler is gone.
    pub fn from_weak(handler: Weak<H>) -> Self {
        Self {
            slot: Slot::Weak(handler),
            key: None,
        }
    }

    /// Attach an identity key.
    pub(crate) fn with_key(mut self, key: ListenerKey) -> Self {
        self.key = Some(key);
        self
    }

    /// The key, for listeners installed by the binding engines.
    pub fn key(&self) -> Option<&ListenerKey> {
        self.key.as_ref()
    }

    /// Whether this listener holds its handler weakly.
    pub fn is_weak(&self) -> bool {
        matches!(self.slot, Slot::Weak(_))
    }

    /// Get the handler if it is still alive.
    pub fn handler(&self) -> Option<Arc<H>> {
        match &self.slot {
            Slot::Strong(arc) => Some(Arc::clone(arc)),
            Slot::Weak(weak) => weak.upgrade(),
        }
    }

    /// Whether the handler is gone or reports itself expired.
    pub fn is_expired(&self) -> bool {
        match &self.slot {
            Slot::Strong(arc) => arc.expired(),
            Slot::Weak(weak) => weak.upgrade().map_or(true, |arc| arc.expired()),
        }
    }

    fn addr(&self) -> *const () {
        match &self.slot {
            Slot::Strong(arc) => Arc::as_ptr(arc) as *const (),
            Slot::Weak(weak) => weak.as_ptr() as *const (),
        }
    }
}

impl InvalidationListener {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn Observable) -> ListenerResult + Send + Sync + 'static,
    {
        Self::from_handler(f)
    }

    /// Wrap any handler, owned by the listener.
    pub fn from_handler(handler: impl InvalidationHandler) -> Self {
        Self::from_arc(Arc::new(handler) as Arc<dyn InvalidationHandler>)
    }

    /// Observe a handler owned by the caller without keeping it alive.
    pub fn weak<H: InvalidationHandler>(handler: &Arc<H>) -> Self {
        let erased: Arc<dyn InvalidationHandler> = handler.clone();
        Self::from_weak(Arc::downgrade(&erased))
    }
}

impl<T: 'static> ChangeListener<T> {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn ObservableValue<T>, &T, &T) -> ListenerResult + Send + Sync + 'static,
    {
        Self::from_handler(f)
    }

    /// Wrap any handler, owned by the listener.
    pub fn from_handler(handler: impl ChangeHandler<T>) -> Self {
        Self::from_arc(Arc::new(handler) as Arc<dyn ChangeHandler<T>>)
    }

    /// Observe a handler owned by the caller without keeping it alive.
    pub fn weak<H: ChangeHandler<T>>(handler: &Arc<H>) -> Self {
        let erased: Arc<dyn ChangeHandler<T>> = handler.clone();
        Self::from_weak(Arc::downgrade(&erased))
    }
}

impl<C: 'static> CollectionListener<C> {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&C) -> ListenerResult + Send + Sync + 'static,
    {
        Self::from_handler(f)
    }

    /// Wrap any handler, owned by the listener.
    pub fn from_handler(handler: impl CollectionChangeHandler<C>) -> Self {
        Self::from_arc(Arc::new(handler) as Arc<dyn CollectionChangeHandler<C>>)
    }

    /// Observe a handler owned by the caller without keeping it alive.
    pub fn weak<H: CollectionChangeHandler<C>>(handler: &Arc<H>) -> Self {
        let erased: Arc<dyn CollectionChangeHandler<C>> = handler.clone();
        Self::from_weak(Arc::downgrade(&erased))
    }
}

impl<H: ?Sized> Clone for Listener<H> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            key: self.key,
        }
    }
}

impl<H: ?Sized + Expiring> PartialEq for Listener<H> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.addr() == other.addr(),
            _ => false,
        }
    }
}

impl<H: ?Sized + Expiring> fmt::Debug for Listener<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("key", &self.key)
            .field("weak", &self.is_weak())
            .field("expired", &self.is_expired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag(AtomicBool);

    impl InvalidationHandler for Flag {
        fn invalidated(&self, _: &dyn Observable) -> ListenerResult {
            Ok(())
        }

        fn is_expired(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn clones_compare_equal_distinct_closures_do_not() {
        let a = InvalidationListener::new(|_| Ok(()));
        let b = InvalidationListener::new(|_| Ok(()));

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn keyed_listeners_compare_by_key() {
        let x = ObservableId::new();
        let y = ObservableId::new();

        let a = InvalidationListener::new(|_| Ok(())).with_key(ListenerKey::bidirectional(x, y));
        let b = InvalidationListener::new(|_| Ok(())).with_key(ListenerKey::bidirectional(y, x));
        let plain = InvalidationListener::new(|_| Ok(()));

        assert_eq!(a, b);
        assert_ne!(a, plain);
    }

    #[test]
    fn weak_listener_expires_with_its_handler() {
        let handler = Arc::new(Flag(AtomicBool::new(false)));
        let listener = InvalidationListener::weak(&handler);

        assert!(listener.is_weak());
        assert!(!listener.is_expired());
        assert!(listener.handler().is_some());

        drop(handler);
        assert!(listener.is_expired());
        assert!(listener.handler().is_none());
    }

    #[test]
    fn handler_can_report_itself_expired() {
        let handler = Arc::new(Flag(AtomicBool::new(false)));
        let listener = InvalidationListener::from_arc(handler.clone());

        assert!(!listener.is_expired());
        handler.0.store(true, Ordering::SeqCst);
        assert!(listener.is_expired());
    }

    #[test]
    fn weak_and_strong_views_of_one_handler_are_equal() {
        let handler = Arc::new(Flag(AtomicBool::new(false)));
        let strong = InvalidationListener::from_arc(handler.clone());
        let weak = InvalidationListener::weak(&handler);

        assert_eq!(strong, weak);
    }
}
