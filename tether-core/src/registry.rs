//! Listener Registry
//!
//! Per-instance storage and dispatch of listeners.
//!
//! # Representation
//!
//! Most observables have no listeners, and most of the rest have exactly
//! one. [`ListenerSet`] stores zero, one or many listeners and only
//! allocates a vector once a second listener arrives.
//!
//! # Fire pass
//!
//! A fire pass never iterates the live storage. It copies the current
//! listeners into a `SmallVec` under the lock, releases the lock, and then
//! calls them. Listeners may therefore add or remove listeners (including
//! themselves), set properties, or trigger nested fire passes without
//! corrupting the iteration. Removals made during a pass take effect from the
//! next pass on.
//!
//! # Change values
//!
//! Change listeners need the previous value. [`ListenerRegistry`] captures
//! the value once, when the first change listener registers, and replaces it
//! on every fire pass. One cached value serves all change listeners of the
//! instance; it is dropped again when the last change listener leaves.

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::ListenerResult;
use crate::listener::{
    ChangeHandler, ChangeListener, CollectionChangeHandler, CollectionListener, Expiring,
    InvalidationHandler, InvalidationListener, Listener, ListenerKey,
};
use crate::observable::{Observable, ObservableValue, Value};

/// Copy of a listener set taken before dispatch.
pub type Snapshot<H> = SmallVec<[Listener<H>; 4]>;

enum Slots<L> {
    Empty,
    Single(L),
    Many(Vec<L>),
}

/// Zero / single / many storage for listeners of one kind.
pub struct ListenerSet<H: ?Sized> {
    slots: Slots<Listener<H>>,
}

impl<H: ?Sized + Expiring> ListenerSet<H> {
    /// Create an empty set. Does not allocate.
    pub const fn new() -> Self {
        Self {
            slots: Slots::Empty,
        }
    }

    /// Number of registrations, expired ones included.
    pub fn len(&self) -> usize {
        match &self.slots {
            Slots::Empty => 0,
            Slots::Single(_) => 1,
            Slots::Many(listeners) => listeners.len(),
        }
    }

    /// Whether the set holds no registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a registration. Duplicates are kept.
    pub fn add(&mut self, listener: Listener<H>) {
        self.prune();
        self.slots = match std::mem::replace(&mut self.slots, Slots::Empty) {
            Slots::Empty => Slots::Single(listener),
            Slots::Single(first) => Slots::Many(vec![first, listener]),
            Slots::Many(mut listeners) => {
                listeners.push(listener);
                Slots::Many(listeners)
            }
        };
    }

    /// Remove the first registration equal to `listener`.
    pub fn remove(&mut self, listener: &Listener<H>) -> bool {
        self.remove_first(|candidate| candidate == listener)
    }

    /// Remove every registration carrying `key`.
    pub fn remove_keyed(&mut self, key: &ListenerKey) -> bool {
        let before = self.len();
        self.retain(|candidate| candidate.key() != Some(key));
        self.len() != before
    }

    /// Whether some registration equals `listener`.
    pub fn contains(&self, listener: &Listener<H>) -> bool {
        self.iter().any(|candidate| candidate == listener)
    }

    /// Whether some registration has a key matching `predicate`.
    pub fn any_key(&self, predicate: impl Fn(&ListenerKey) -> bool) -> bool {
        self.iter()
            .any(|candidate| candidate.key().is_some_and(&predicate))
    }

    /// Drop expired registrations and report how many went away.
    pub fn prune(&mut self) -> usize {
        let before = self.len();
        self.retain(|candidate| !candidate.is_expired());
        let removed = before - self.len();
        if removed > 0 {
            debug!(removed, "pruned expired listeners");
        }
        removed
    }

    /// Copy the registrations for dispatch.
    pub fn snapshot(&self) -> Snapshot<H> {
        self.iter().cloned().collect()
    }

    fn iter(&self) -> impl Iterator<Item = &Listener<H>> {
        let listeners: &[Listener<H>] = match &self.slots {
            Slots::Empty => &[],
            Slots::Single(listener) => std::slice::from_ref(listener),
            Slots::Many(listeners) => listeners,
        };
        listeners.iter()
    }

    fn remove_first(&mut self, matches: impl Fn(&Listener<H>) -> bool) -> bool {
        match &mut self.slots {
            Slots::Empty => false,
            Slots::Single(listener) => {
                if matches(listener) {
                    self.slots = Slots::Empty;
                    true
                } else {
                    false
                }
            }
            Slots::Many(listeners) => match listeners.iter().position(|l| matches(l)) {
                Some(index) => {
                    listeners.remove(index);
                    self.shrink();
                    true
                }
                None => false,
            },
        }
    }

    fn retain(&mut self, keep: impl Fn(&Listener<H>) -> bool) {
        match &mut self.slots {
            Slots::Empty => {}
            Slots::Single(listener) => {
                if !keep(listener) {
                    self.slots = Slots::Empty;
                }
            }
            Slots::Many(listeners) => {
                listeners.retain(|l| keep(l));
                self.shrink();
            }
        }
    }

    fn shrink(&mut self) {
        if let Slots::Many(listeners) = &mut self.slots {
            match listeners.len() {
                0 => self.slots = Slots::Empty,
                1 => {
                    if let Some(last) = listeners.pop() {
                        self.slots = Slots::Single(last);
                    }
                }
                _ => {}
            }
        }
    }
}

impl<H: ?Sized + Expiring> Default for ListenerSet<H> {
    fn default() -> Self {
        Self::new()
    }
}

struct RegistryState<T> {
    invalidation: ListenerSet<dyn InvalidationHandler>,
    change: ListenerSet<dyn ChangeHandler<T>>,
    /// Value last reported to change listeners. Present only while at least
    /// one change listener is registered.
    current: Option<T>,
}

impl<T> RegistryState<T> {
    fn prune(&mut self)
    where
        T: 'static,
    {
        self.invalidation.prune();
        if self.change.prune() > 0 && self.change.is_empty() {
            self.current = None;
        }
    }
}

/// Listeners of one observable value.
pub struct ListenerRegistry<T> {
    state: Mutex<RegistryState<T>>,
}

impl<T: Value> ListenerRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                invalidation: ListenerSet::new(),
                change: ListenerSet::new(),
                current: None,
            }),
        }
    }

    /// Register an invalidation listener.
    pub fn add_listener(&self, listener: InvalidationListener) {
        self.state.lock().invalidation.add(listener);
    }

    /// Remove one registration of an invalidation listener.
    pub fn remove_listener(&self, listener: &InvalidationListener) -> bool {
        self.state.lock().invalidation.remove(listener)
    }

    /// Register a change listener on `observable`.
    ///
    /// The first change listener captures the current value, so adding one
    /// may evaluate a lazy observable.
    pub fn add_change_listener(&self, observable: &dyn ObservableValue<T>, listener: ChangeListener<T>) {
        let needs_value = self.state.lock().current.is_none();
        // Read outside the lock: evaluating may run arbitrary code.
        let captured = needs_value.then(|| observable.get());

        let mut state = self.state.lock();
        if state.current.is_none() {
            state.current = captured;
        }
        state.change.add(listener);
    }

    /// Remove one registration of a change listener.
    pub fn remove_change_listener(&self, listener: &ChangeListener<T>) -> bool {
        let mut state = self.state.lock();
        let removed = state.change.remove(listener);
        if state.change.is_empty() {
            state.current = None;
        }
        removed
    }

    /// Remove every invalidation listener carrying `key`.
    pub fn remove_keyed(&self, key: &ListenerKey) -> bool {
        self.state.lock().invalidation.remove_keyed(key)
    }

    /// Whether an equal invalidation listener is registered.
    pub fn contains_listener(&self, listener: &InvalidationListener) -> bool {
        self.state.lock().invalidation.contains(listener)
    }

    /// Whether some invalidation listener has a key matching `predicate`.
    pub fn has_keyed_listener(&self, predicate: impl Fn(&ListenerKey) -> bool) -> bool {
        let mut state = self.state.lock();
        state.prune();
        state.invalidation.any_key(predicate)
    }

    /// Live invalidation listeners.
    pub fn invalidation_listener_count(&self) -> usize {
        let mut state = self.state.lock();
        state.prune();
        state.invalidation.len()
    }

    /// Live change listeners.
    pub fn change_listener_count(&self) -> usize {
        let mut state = self.state.lock();
        state.prune();
        state.change.len()
    }

    /// Notify listeners that `observable` became invalid.
    ///
    /// Invalidation listeners run first. If any change listener is
    /// registered, the value is then read once and change listeners hear
    /// about it only when it differs from the cached previous value.
    pub fn fire(&self, observable: &dyn Observable, value: &dyn ObservableValue<T>) -> ListenerResult {
        let (invalidation, change) = {
            let mut state = self.state.lock();
            state.prune();
            (state.invalidation.snapshot(), state.change.snapshot())
        };

        for listener in &invalidation {
            if listener.is_expired() {
                continue;
            }
            if let Some(handler) = listener.handler() {
                handler.invalidated(observable)?;
            }
        }

        if change.is_empty() {
            return Ok(());
        }

        let new_value = value.get();
        let old_value = {
            let mut state = self.state.lock();
            if state.change.is_empty() {
                // Every change listener left during the invalidation pass.
                state.current = None;
                return Ok(());
            }
            match state.current.replace(new_value.clone()) {
                Some(old) => old,
                None => return Ok(()),
            }
        };

        if old_value == new_value {
            return Ok(());
        }

        for listener in &change {
            if listener.is_expired() {
                continue;
            }
            if let Some(handler) = listener.handler() {
                handler.changed(value, &old_value, &new_value)?;
            }
        }
        Ok(())
    }
}

impl<T: Value> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Listeners of one observable collection: invalidation listeners plus
/// structural change listeners receiving events of type `C`.
pub struct CollectionListeners<C> {
    invalidation: Mutex<ListenerSet<dyn InvalidationHandler>>,
    change: Mutex<ListenerSet<dyn CollectionChangeHandler<C>>>,
}

impl<C: 'static> CollectionListeners<C> {
    /// Create an empty listener store.
    pub fn new() -> Self {
        Self {
            invalidation: Mutex::new(ListenerSet::new()),
            change: Mutex::new(ListenerSet::new()),
        }
    }

    /// Register an invalidation listener.
    pub fn add_listener(&self, listener: InvalidationListener) {
        self.invalidation.lock().add(listener);
    }

    /// Remove one registration of an invalidation listener.
    pub fn remove_listener(&self, listener: &InvalidationListener) -> bool {
        self.invalidation.lock().remove(listener)
    }

    /// Register a structural change listener.
    pub fn add_change_listener(&self, listener: CollectionListener<C>) {
        self.change.lock().add(listener);
    }

    /// Remove one registration of a structural change listener.
    pub fn remove_change_listener(&self, listener: &CollectionListener<C>) -> bool {
        self.change.lock().remove(listener)
    }

    /// Remove every change listener carrying `key`.
    pub fn remove_keyed(&self, key: &ListenerKey) -> bool {
        self.change.lock().remove_keyed(key)
    }

    /// Whether some change listener carries `key`.
    pub fn has_keyed(&self, key: &ListenerKey) -> bool {
        let mut set = self.change.lock();
        set.prune();
        set.any_key(|candidate| candidate == key)
    }

    /// Live invalidation listeners.
    pub fn invalidation_listener_count(&self) -> usize {
        let mut set = self.invalidation.lock();
        set.prune();
        set.len()
    }

    /// Live change listeners.
    pub fn change_listener_count(&self) -> usize {
        let mut set = self.change.lock();
        set.prune();
        set.len()
    }

    /// Dispatch `change`: invalidation listeners first, then change listeners.
    pub fn fire(&self, observable: &dyn Observable, change: &C) -> ListenerResult {
        let invalidation = {
            let mut set = self.invalidation.lock();
            set.prune();
            set.snapshot()
        };
        let listeners = {
            let mut set = self.change.lock();
            set.prune();
            set.snapshot()
        };

        for listener in &invalidation {
            if listener.is_expired() {
                continue;
            }
            if let Some(handler) = listener.handler() {
                handler.invalidated(observable)?;
            }
        }
        for listener in &listeners {
            if listener.is_expired() {
                continue;
            }
            if let Some(handler) = listener.handler() {
                handler.on_changed(change)?;
            }
        }
        Ok(())
    }
}

impl<C: 'static> Default for CollectionListeners<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
