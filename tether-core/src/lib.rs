//! Tether Core
//!
//! Observable properties and the bindings between them.
//!
//! It implements:
//!
//! - Writable, bindable properties with lazy invalidation
//! - Unidirectional bindings that never keep their target alive
//! - Bidirectional bindings, optionally through a string converter
//! - Content bindings that keep observable collections in sync
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observable`: The capability traits every observable implements
//! - `listener`: Invalidation, change and collection listeners
//! - `registry`: Listener storage and the notification pass
//! - `property`: Properties, read-only pairs and collection-valued properties
//! - `binding`: Lazily derived values
//! - `bindings`: Ready-made comparisons and list lookups built on `binding`
//! - `bidirectional`: Two-way synchronization of properties
//! - `collections`: Observable lists, sets and maps
//! - `content`: One-way and two-way content synchronization of collections
//!
//! # Invalidation
//!
//! Writes do not push values. A property that changes is marked invalid and
//! notifies its invalidation listeners once; it stays quiet until somebody
//! reads it again. Change listeners, which need the new value, force that
//! read themselves.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_core::{bind_bidirectional, Identity, InvalidationListener, Property};
//!
//! let a = Property::new(1);
//! let b = Property::new(2);
//!
//! bind_bidirectional(&a, &b, Identity)?;
//! assert_eq!(a.get(), 2);
//!
//! b.set(5)?;
//! assert_eq!(a.get(), 5);
//!
//! a.set(7)?;
//! assert_eq!(b.get(), 7);
//! ```

pub mod bidirectional;
pub mod binding;
pub mod bindings;
pub mod collections;
pub mod content;
pub mod error;
mod guard;
pub mod id;
pub mod listener;
pub mod observable;
pub mod property;
pub mod registry;

pub use bidirectional::{
    bind_bidirectional, bind_bidirectional_with, unbind_bidirectional, BidirectionalMapping,
    Converting, DisplayFromStr, Identity, StringConverter,
};
pub use binding::Binding;
pub use collections::{
    ListChange, ListEdit, MapChange, ObservableCollection, ObservableList, ObservableMap,
    ObservableSet, SetChange, SetEdit,
};
pub use content::{
    bind_content, bind_content_bidirectional, is_content_bound, unbind_content,
    unbind_content_bidirectional,
};
pub use error::{BindingError, ConversionError, ListenerResult, Result};
pub use id::ObservableId;
pub use listener::{
    ChangeListener, CollectionListener, InvalidationListener, Listener, ListenerKey,
};
pub use observable::{
    Observable, ObservableValue, ObservableValueExt, ReadOnlyProperty, Value, WritableValue,
};
pub use property::{
    CollectionProperty, ListProperty, MapProperty, Property, PropertyBuilder,
    ReadOnlyCollectionProperty, ReadOnlyView, ReadOnlyWrapper, SetProperty, WeakProperty,
};
