//! Observable Capabilities
//!
//! The traits every observable value in the crate implements. They are kept
//! object safe so bindings can hold heterogeneous sources behind
//! `Arc<dyn ObservableValue<T>>`.
//!
//! # Invalidation vs. change
//!
//! An invalidation listener hears "the value may have changed" and nothing
//! more; it never forces the value to be computed. A change listener gets the
//! old and the new value, which means the registry has to evaluate the
//! observable on every fire pass. Lazy values stay lazy only as long as
//! nobody asks for change notifications.

use std::sync::Arc;

use crate::binding::Binding;
use crate::error::Result;
use crate::id::ObservableId;
use crate::listener::{ChangeListener, InvalidationListener};
use crate::property::Owner;

/// Bound satisfied by every type a property can hold.
pub trait Value: Clone + PartialEq + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Something that can be invalidated.
pub trait Observable: Send + Sync {
    /// Identity of the underlying object. Clones of a handle share it.
    fn observable_id(&self) -> ObservableId;

    /// Register an invalidation listener. Registering the same listener twice
    /// makes it fire twice.
    fn add_listener(&self, listener: InvalidationListener);

    /// Remove one registration of `listener`. Unknown listeners are ignored.
    fn remove_listener(&self, listener: &InvalidationListener);
}

/// An observable holding a value of type `T`.
pub trait ObservableValue<T>: Observable {
    /// Current value. Reading a lazily computed observable validates it.
    fn get(&self) -> T;

    /// Register a change listener.
    fn add_change_listener(&self, listener: ChangeListener<T>);

    /// Remove one registration of `listener`.
    fn remove_change_listener(&self, listener: &ChangeListener<T>);
}

/// Shared, type-erased observable value.
pub type ObservableRef<T> = Arc<dyn ObservableValue<T>>;

/// Plain read/write access to a value.
pub trait WritableValue<T> {
    /// Current value.
    fn get_value(&self) -> T;

    /// Replace the value.
    fn set_value(&self, value: T) -> Result<()>;
}

/// An observable value with an identity.
pub trait ReadOnlyProperty<T>: ObservableValue<T> {
    /// The object this property belongs to, if it is still alive.
    fn owner(&self) -> Option<Owner>;

    /// The property name, possibly empty.
    fn name(&self) -> &str;

    /// Type of the declaring object, or `None` when it cannot be determined.
    fn declaring_type(&self) -> Option<&'static str> {
        self.owner().map(|owner| owner.type_name())
    }
}

/// Derivation helpers available on every cloneable observable handle.
pub trait ObservableValueExt<T: Value>: ObservableValue<T> + Clone + 'static {
    /// Derive a lazily computed value.
    ///
    /// The returned binding recomputes `f` on the first read after this
    /// observable invalidates, never earlier.
    fn map<U, F>(&self, f: F) -> Binding<U>
    where
        U: Value,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        Binding::new(vec![self.as_dependency()], move || f(&source.get()))
    }

    /// Erase the handle type.
    fn as_source(&self) -> ObservableRef<T> {
        Arc::new(self.clone())
    }

    /// Erase the handle type down to plain invalidation.
    fn as_dependency(&self) -> Arc<dyn Observable> {
        Arc::new(self.clone())
    }
}

impl<T: Value, O: ObservableValue<T> + Clone + 'static> ObservableValueExt<T> for O {}
