//! Binding Implementation
//!
//! A Binding is a lazily computed value derived from other observables.
//!
//! # How Bindings Work
//!
//! 1. At creation the binding registers an observer on every dependency and
//!    starts out invalid. Nothing is computed yet.
//!
//! 2. On access, an invalid binding runs its computation, caches the result
//!    and becomes valid.
//!
//! 3. When a dependency invalidates, the binding becomes invalid and tells
//!    its own listeners. It does not recompute.
//!
//! 4. Further dependency invalidations before the next read are absorbed:
//!    listeners hear about the first one only.
//!
//! A binding that is never read never computes. Change listeners are the
//! exception, since reporting old and new values requires the new value.
//!
//! # Lifetime
//!
//! Dependencies hold the binding's observer, and the observer holds the
//! binding weakly. A dropped binding therefore does not linger in its
//! dependencies' listener lists beyond their next fire pass. [`Binding::dispose`]
//! detaches it immediately.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::ListenerResult;
use crate::id::ObservableId;
use crate::listener::{ChangeListener, InvalidationHandler, InvalidationListener};
use crate::observable::{Observable, ObservableValue, Value};
use crate::registry::ListenerRegistry;

struct BindingState<T> {
    /// Last computed value (None if never computed).
    value: Option<T>,
    valid: bool,
    /// Bumped on every invalidation so a computation that raced with one is
    /// not cached as valid.
    generation: u64,
}

struct BindingCore<T: Value> {
    id: ObservableId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    state: Mutex<BindingState<T>>,
    dependencies: Mutex<Vec<Arc<dyn Observable>>>,
    observer: InvalidationListener,
    listeners: ListenerRegistry<T>,
}

/// Observer registered on each dependency.
struct DependencyObserver<T: Value> {
    binding: Weak<BindingCore<T>>,
}

impl<T: Value> InvalidationHandler for DependencyObserver<T> {
    fn invalidated(&self, _: &dyn Observable) -> ListenerResult {
        match self.binding.upgrade() {
            Some(core) => Binding { core }.invalidate(),
            None => Ok(()),
        }
    }

    fn is_expired(&self) -> bool {
        self.binding.strong_count() == 0
    }
}

/// A lazily computed value that tracks its dependencies.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value.
///
/// Unlike a property, a binding cannot be set; its value is whatever the
/// computation returns.
pub struct Binding<T: Value> {
    core: Arc<BindingCore<T>>,
}

impl<T: Value> Binding<T> {
    /// Create a binding over `dependencies`.
    ///
    /// The computation is not run until the first read.
    pub fn new<F>(dependencies: Vec<Arc<dyn Observable>>, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let core = Arc::new_cyclic(|weak| BindingCore {
            id: ObservableId::new(),
            compute: Box::new(compute),
            state: Mutex::new(BindingState {
                value: None,
                valid: false,
                generation: 0,
            }),
            dependencies: Mutex::new(Vec::new()),
            observer: InvalidationListener::from_handler(DependencyObserver {
                binding: Weak::clone(weak),
            }),
            listeners: ListenerRegistry::new(),
        });

        for dependency in &dependencies {
            dependency.add_listener(core.observer.clone());
        }
        *core.dependencies.lock() = dependencies;

        Self { core }
    }

    /// Get the binding's unique ID.
    pub fn id(&self) -> ObservableId {
        self.core.id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        let generation = {
            let state = self.core.state.lock();
            if state.valid {
                if let Some(value) = &state.value {
                    return value.clone();
                }
            }
            state.generation
        };

        // The computation may read other observables, so it runs unlocked.
        let value = (self.core.compute)();

        let mut state = self.core.state.lock();
        state.value = Some(value.clone());
        if state.generation == generation {
            state.valid = true;
        }
        value
    }

    /// Mark the binding invalid and notify its listeners.
    ///
    /// Does nothing if the binding is already invalid.
    pub fn invalidate(&self) -> ListenerResult {
        let was_valid = {
            let mut state = self.core.state.lock();
            state.generation = state.generation.wrapping_add(1);
            std::mem::replace(&mut state.valid, false)
        };
        if !was_valid {
            return Ok(());
        }
        self.core.listeners.fire(self, self)
    }

    /// Whether the cached value is current.
    pub fn is_valid(&self) -> bool {
        self.core.state.lock().valid
    }

    /// Check if the binding has computed a value yet.
    pub fn has_value(&self) -> bool {
        self.core.state.lock().value.is_some()
    }

    /// IDs of the observables this binding depends on.
    pub fn dependencies(&self) -> Vec<ObservableId> {
        self.core
            .dependencies
            .lock()
            .iter()
            .map(|dependency| dependency.observable_id())
            .collect()
    }

    /// Detach from every dependency.
    ///
    /// The binding keeps its last value but no longer hears about changes.
    /// Calling this twice is harmless.
    pub fn dispose(&self) {
        let dependencies = std::mem::take(&mut *self.core.dependencies.lock());
        for dependency in &dependencies {
            dependency.remove_listener(&self.core.observer);
        }
    }

    /// Get the number of invalidation listeners.
    pub fn listener_count(&self) -> usize {
        self.core.listeners.invalidation_listener_count()
    }
}

impl<T: Value> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Value> Observable for Binding<T> {
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

impl<T: Value> ObservableValue<T> for Binding<T> {
    fn get(&self) -> T {
        Binding::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) {
        self.core.listeners.add_change_listener(self, listener);
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) {
        self.core.listeners.remove_change_listener(listener);
    }
}

impl<T: Value + Debug> Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("Binding")
            .field("id", &self.core.id)
            .field("valid", &state.valid)
            .field("value", &state.value)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
