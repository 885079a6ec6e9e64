//! Properties
//!
//! A [`Property`] is a writable, bindable observable value with an identity
//! (owner and name). It is the canonical implementation of the binding core:
//! every other writable flavor in the crate is built on top of it.
//!
//! # State
//!
//! Each property keeps:
//!
//! - a stored value, authoritative only while unbound
//! - an optional bound source; while present, reads delegate to it
//! - a `valid` flag
//! - the observer it installs on a bound source, created once and reused
//!
//! # Validity and coalescing
//!
//! `valid == true` means the last read already saw the current value. A
//! property notifies its listeners only on the transition from valid to
//! invalid, so any number of writes between two reads produce exactly one
//! invalidation. Reading clears the flag again.
//!
//! ```text
//! UNBOUND_VALID --set(new)--> UNBOUND_INVALID --get--> UNBOUND_VALID
//! UNBOUND_*     --bind------> BOUND_INVALID   --get--> BOUND_VALID
//! BOUND_VALID   --source invalidated--> BOUND_INVALID
//! BOUND_*       --unbind----> UNBOUND (value snapshotted, validity kept)
//! ```
//!
//! # Binding without retention
//!
//! The observer a property installs on its source holds the property only
//! weakly. Dropping the last handle to a bound property is enough to release
//! it; the dead observer is pruned from the source at its next fire pass.
//! [`Property::unbind`] remains the immediate way to detach.

mod adapter;
mod collection;
mod owner;
mod read_only;

pub use adapter::Numeric;
pub use collection::{
    CollectionProperty, ListProperty, MapProperty, ReadOnlyCollectionProperty, SetProperty,
};
pub use owner::Owner;
pub use read_only::{ReadOnlyView, ReadOnlyWrapper};

pub(crate) use read_only::ReadOnlyCore;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{BindingError, ListenerResult, Result};
use crate::id::ObservableId;
use crate::listener::{ChangeListener, InvalidationHandler, InvalidationListener, ListenerKey};
use crate::observable::{
    Observable, ObservableValue, ReadOnlyProperty, Value, WritableValue,
};
use crate::registry::ListenerRegistry;

use adapter::BoundSource;

/// Hook run when a property becomes invalid, before listeners are notified.
pub type InvalidatedHook<T> = Box<dyn Fn(&Property<T>) -> ListenerResult + Send + Sync>;

struct PropertyState<T: Value> {
    value: T,
    valid: bool,
    source: Option<BoundSource<T>>,
    observer: Option<InvalidationListener>,
}

pub(crate) struct PropertyCore<T: Value> {
    id: ObservableId,
    owner: Option<Owner>,
    name: String,
    state: Mutex<PropertyState<T>>,
    listeners: ListenerRegistry<T>,
    on_invalidated: Option<InvalidatedHook<T>>,
    /// Read-only half of a wrapper pair, re-fired after this property fires.
    companion: Option<Weak<ReadOnlyCore<T>>>,
}

/// A writable, bindable observable value.
///
/// Handles are cheap to clone; clones share state and identity.
///
/// # Example
///
/// ```rust,ignore
/// let width = Property::new(10);
/// let scaled = Property::new(0);
///
/// scaled.bind(&width)?;
/// width.set(25)?;
/// assert_eq!(scaled.get(), 25);
/// assert!(scaled.set(1).is_err());
/// ```
pub struct Property<T: Value> {
    core: Arc<PropertyCore<T>>,
}

/// Non-owning handle to a property.
pub struct WeakProperty<T: Value> {
    core: Weak<PropertyCore<T>>,
}

impl<T: Value> WeakProperty<T> {
    /// Get the property back if it is still alive.
    pub fn upgrade(&self) -> Option<Property<T>> {
        self.core.upgrade().map(|core| Property { core })
    }

    /// Whether the property has been dropped.
    pub fn is_gone(&self) -> bool {
        self.core.strong_count() == 0
    }
}

impl<T: Value> Clone for WeakProperty<T> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

/// Configures identity and hooks of a new property.
pub struct PropertyBuilder<T: Value> {
    owner: Option<Owner>,
    name: String,
    on_invalidated: Option<InvalidatedHook<T>>,
}

impl<T: Value> PropertyBuilder<T> {
    fn new() -> Self {
        Self {
            owner: None,
            name: String::new(),
            on_invalidated: None,
        }
    }

    /// Object the property belongs to. Held weakly.
    pub fn owner<B: Any + Send + Sync>(mut self, owner: &Arc<B>) -> Self {
        self.owner = Some(Owner::of(owner));
        self
    }

    /// Property name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Run `hook` every time the property becomes invalid, before its
    /// listeners are notified.
    pub fn on_invalidated<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Property<T>) -> ListenerResult + Send + Sync + 'static,
    {
        self.on_invalidated = Some(Box::new(hook));
        self
    }

    /// Create the property holding `value`.
    pub fn build(self, value: T) -> Property<T> {
        self.build_with_companion(value, None)
    }

    pub(crate) fn build_with_companion(
        self,
        value: T,
        companion: Option<Weak<ReadOnlyCore<T>>>,
    ) -> Property<T> {
        Property {
            core: Arc::new(PropertyCore {
                id: ObservableId::new(),
                owner: self.owner,
                name: self.name,
                state: Mutex::new(PropertyState {
                    value,
                    valid: true,
                    source: None,
                    observer: None,
                }),
                listeners: ListenerRegistry::new(),
                on_invalidated: self.on_invalidated,
                companion,
            }),
        }
    }
}

/// Observer installed on a bound source.
struct SourceObserver<T: Value> {
    target: Weak<PropertyCore<T>>,
}

impl<T: Value> InvalidationHandler for SourceObserver<T> {
    fn invalidated(&self, _: &dyn Observable) -> ListenerResult {
        match self.target.upgrade() {
            Some(core) => Property { core }.mark_invalid(),
            None => Ok(()),
        }
    }

    fn is_expired(&self) -> bool {
        self.target.strong_count() == 0
    }
}

impl<T: Value> Property<T> {
    /// Create an anonymous property holding `value`.
    pub fn new(value: T) -> Self {
        Self::builder().build(value)
    }

    /// Start configuring a property.
    pub fn builder() -> PropertyBuilder<T> {
        PropertyBuilder::new()
    }

    /// Identity of this property.
    pub fn id(&self) -> ObservableId {
        self.core.id
    }

    /// Non-owning handle.
    pub fn downgrade(&self) -> WeakProperty<T> {
        WeakProperty {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Current value.
    ///
    /// Delegates to the bound source when bound. Marks the property valid
    /// either way, so the next source change notifies listeners again.
    pub fn get(&self) -> T {
        let source = {
            let mut state = self.core.state.lock();
            state.valid = true;
            match &state.source {
                None => return state.value.clone(),
                Some(source) => source.clone(),
            }
        };
        source.get()
    }

    /// Current value without marking the property valid.
    pub(crate) fn peek(&self) -> T {
        let source = {
            let state = self.core.state.lock();
            match &state.source {
                None => return state.value.clone(),
                Some(source) => source.clone(),
            }
        };
        source.get()
    }

    /// Replace the value.
    ///
    /// Fails with [`BindingError::BoundValueSet`] while bound. Setting a
    /// value equal to the current one does nothing.
    pub fn set(&self, value: T) -> Result<()> {
        let changed = {
            let mut state = self.core.state.lock();
            if state.source.is_some() {
                None
            } else if state.value == value {
                Some(false)
            } else {
                state.value = value;
                Some(true)
            }
        };

        match changed {
            None => Err(BindingError::BoundValueSet {
                property: self.describe(),
            }),
            Some(false) => Ok(()),
            Some(true) => self.mark_invalid(),
        }
    }

    /// Set from an optional value, treating `None` as `T::default()`.
    pub fn set_nullable(&self, value: Option<T>) -> Result<()>
    where
        T: Default,
    {
        let value = value.unwrap_or_else(|| {
            debug!(property = %self.describe(), "null value coerced to the default value");
            T::default()
        });
        self.set(value)
    }

    /// Follow `source` until [`unbind`](Self::unbind) is called.
    ///
    /// Binding to the current source again does nothing. Binding to another
    /// source first unbinds from the current one. A freshly bound property
    /// is always invalidated once.
    pub fn bind<O>(&self, source: &O) -> Result<()>
    where
        O: ObservableValue<T> + Clone + 'static,
    {
        let source = source.clone();
        self.bind_source(source.observable_id(), move || {
            BoundSource::Direct(Arc::new(source))
        })
    }

    /// Follow a numeric source of another type, converting on every read.
    pub fn bind_numeric<S, O>(&self, source: &O) -> Result<()>
    where
        T: Numeric,
        S: Numeric,
        O: ObservableValue<S> + Clone + 'static,
    {
        self.bind_source(source.observable_id(), || adapter::numeric::<S, T, O>(source))
    }

    /// Follow an optional source, reading `None` as `T::default()`.
    pub fn bind_nullable<O>(&self, source: &O) -> Result<()>
    where
        T: Default,
        O: ObservableValue<Option<T>> + Clone + 'static,
    {
        self.bind_source(source.observable_id(), || adapter::nullable::<T, O>(source))
    }

    fn bind_source(
        &self,
        origin: ObservableId,
        make_source: impl FnOnce() -> BoundSource<T>,
    ) -> Result<()> {
        if origin == self.core.id {
            return Err(BindingError::InvalidArgument(format!(
                "cannot bind {} to itself",
                self.describe()
            )));
        }

        let current = self.core.state.lock().source.as_ref().map(BoundSource::origin);
        if current == Some(origin) {
            return Ok(());
        }

        self.unbind();

        let source = make_source();
        let observer = {
            let mut state = self.core.state.lock();
            state
                .observer
                .get_or_insert_with(|| {
                    InvalidationListener::from_handler(SourceObserver {
                        target: Arc::downgrade(&self.core),
                    })
                })
                .clone()
        };
        source.add_listener(observer);
        self.core.state.lock().source = Some(source);

        trace!(property = %self.describe(), source = %origin, "bound");
        self.mark_invalid()
    }

    /// Stop following the bound source.
    ///
    /// The last value of the source becomes the stored value, so the
    /// property keeps reading the same until it is set again. Does nothing
    /// when unbound.
    pub fn unbind(&self) {
        let Some(source) = self.core.state.lock().source.clone() else {
            return;
        };
        let last = source.get();

        let observer = {
            let mut state = self.core.state.lock();
            state.source = None;
            state.value = last;
            state.observer.clone()
        };
        if let Some(observer) = observer {
            source.remove_listener(&observer);
        }
        source.dispose();

        trace!(property = %self.describe(), source = %source.origin(), "unbound");
    }

    /// Whether reads are delegated to a source.
    pub fn is_bound(&self) -> bool {
        self.core.state.lock().source.is_some()
    }

    /// Whether the last read saw the current value.
    pub fn is_valid(&self) -> bool {
        self.core.state.lock().valid
    }

    /// Whether the property takes part in at least one bidirectional binding.
    pub fn is_bidirectionally_bound(&self) -> bool {
        self.core
            .listeners
            .has_keyed_listener(|key| matches!(key, ListenerKey::Bidirectional(..)))
    }

    /// Live invalidation listeners, bindings included.
    pub fn listener_count(&self) -> usize {
        self.core.listeners.invalidation_listener_count()
    }

    /// Live change listeners.
    pub fn change_listener_count(&self) -> usize {
        self.core.listeners.change_listener_count()
    }

    /// Invalidate the property and notify listeners.
    ///
    /// Runs the invalidated hook, this property's listeners, and finally the
    /// listeners of a paired read-only view. Does nothing if the property is
    /// already invalid.
    pub(crate) fn mark_invalid(&self) -> ListenerResult {
        let was_valid = std::mem::replace(&mut self.core.state.lock().valid, false);
        if !was_valid {
            return Ok(());
        }

        if let Some(hook) = &self.core.on_invalidated {
            hook(self)?;
        }
        self.core.listeners.fire(self, self)?;

        if let Some(view) = self.core.companion.as_ref().and_then(Weak::upgrade) {
            ReadOnlyView::from_core(view).fire()?;
        }
        Ok(())
    }

    pub(crate) fn registry(&self) -> &ListenerRegistry<T> {
        &self.core.listeners
    }

    /// Owner and name, without the value.
    pub(crate) fn describe(&self) -> String {
        let mut out = String::from("Property [");
        if let Some(owner) = &self.core.owner {
            out.push_str("owner: ");
            out.push_str(owner.short_type_name());
            out.push_str(", ");
        }
        if !self.core.name.is_empty() {
            out.push_str("name: ");
            out.push_str(&self.core.name);
            out.push_str(", ");
        }
        out.push_str(&self.core.id.to_string());
        out.push(']');
        out
    }
}

impl<T: Value> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Value> Observable for Property<T> {
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

impl<T: Value> ObservableValue<T> for Property<T> {
    fn get(&self) -> T {
        Property::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) {
        self.core.listeners.add_change_listener(self, listener);
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) {
        self.core.listeners.remove_change_listener(listener);
    }
}

impl<T: Value> WritableValue<T> for Property<T> {
    fn get_value(&self) -> T {
        self.get()
    }

    fn set_value(&self, value: T) -> Result<()> {
        self.set(value)
    }
}

impl<T: Value> ReadOnlyProperty<T> for Property<T> {
    fn owner(&self) -> Option<Owner> {
        self.core.owner.clone()
    }

    fn name(&self) -> &str {
        &self.core.name
    }
}

impl<T: Value + fmt::Debug> fmt::Display for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (value, source, valid) = {
            let state = self.core.state.lock();
            (state.value.clone(), state.source.clone(), state.valid)
        };

        f.write_str("Property [")?;
        if let Some(owner) = &self.core.owner {
            write!(f, "owner: {}, ", owner.short_type_name())?;
        }
        if !self.core.name.is_empty() {
            write!(f, "name: {}, ", self.core.name)?;
        }
        match source {
            Some(source) if valid => write!(f, "bound, value: {:?}]", source.get()),
            Some(_) => f.write_str("bound, invalid]"),
            None => write!(f, "value: {value:?}]"),
        }
    }
}

impl<T: Value + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("Property")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("value", &state.value)
            .field("valid", &state.valid)
            .field("bound", &state.source.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
