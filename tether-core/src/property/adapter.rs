//! Source adapters for unidirectional binding.
//!
//! A property of type `T` can follow three shapes of source:
//!
//! - an `ObservableValue<T>`, followed directly
//! - an observable of another numeric type, widened or narrowed on every read
//! - an `ObservableValue<Option<T>>`, where `None` reads as `T::default()`
//!
//! The last two are wrapped in a [`Binding`] that observes the real source.
//! The adapter is owned by the property for exactly as long as the binding
//! lasts and is disposed on unbind, which detaches it from the real source.

use tracing::debug;

use crate::binding::Binding;
use crate::id::ObservableId;
use crate::listener::InvalidationListener;
use crate::observable::{Observable, ObservableRef, ObservableValue, ObservableValueExt, Value};

/// Primitive numeric types that convert into each other on read.
///
/// Conversions follow `as` semantics: integers wrap or sign-extend, floats
/// truncate toward zero and saturate when narrowed into integers.
pub trait Numeric: Value + Copy + Default {
    /// Whether the type holds whole numbers.
    const INTEGRAL: bool;

    /// Widen to `i128`, which holds every value of every integral type.
    fn to_i128(self) -> i128;

    /// Widen to `f64`.
    fn to_f64(self) -> f64;

    /// Narrow from `i128`.
    fn from_i128(value: i128) -> Self;

    /// Narrow from `f64`.
    fn from_f64(value: f64) -> Self;

    /// Convert to another numeric type, going through `i128` for integral
    /// sources so large integers of either sign keep their value.
    fn convert<U: Numeric>(self) -> U {
        if Self::INTEGRAL {
            U::from_i128(self.to_i128())
        } else {
            U::from_f64(self.to_f64())
        }
    }
}

macro_rules! numeric {
    ($integral:expr => $($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                const INTEGRAL: bool = $integral;

                fn to_i128(self) -> i128 {
                    self as i128
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_i128(value: i128) -> Self {
                    value as $ty
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

numeric!(true => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
numeric!(false => f32, f64);

/// What a bound property reads from.
#[derive(Clone)]
pub(crate) enum BoundSource<T: Value> {
    /// Same element type, read as is.
    Direct(ObservableRef<T>),
    /// Converting adapter around the real source `origin`.
    Adapted {
        origin: ObservableId,
        adapter: Binding<T>,
    },
}

impl<T: Value> BoundSource<T> {
    /// Identity of the observable the caller bound to.
    pub(crate) fn origin(&self) -> ObservableId {
        match self {
            Self::Direct(source) => source.observable_id(),
            Self::Adapted { origin, .. } => *origin,
        }
    }

    pub(crate) fn get(&self) -> T {
        match self {
            Self::Direct(source) => source.get(),
            Self::Adapted { adapter, .. } => adapter.get(),
        }
    }

    pub(crate) fn add_listener(&self, listener: InvalidationListener) {
        match self {
            Self::Direct(source) => source.add_listener(listener),
            Self::Adapted { adapter, .. } => adapter.add_listener(listener),
        }
    }

    pub(crate) fn remove_listener(&self, listener: &InvalidationListener) {
        match self {
            Self::Direct(source) => source.remove_listener(listener),
            Self::Adapted { adapter, .. } => adapter.remove_listener(listener),
        }
    }

    /// Release the adapter's hold on the real source.
    pub(crate) fn dispose(&self) {
        if let Self::Adapted { adapter, .. } = self {
            adapter.dispose();
        }
    }
}

/// Adapter reading a numeric source of another type.
pub(crate) fn numeric<S, T, O>(source: &O) -> BoundSource<T>
where
    S: Numeric,
    T: Numeric,
    O: ObservableValue<S> + Clone + 'static,
{
    let reader = source.clone();
    BoundSource::Adapted {
        origin: source.observable_id(),
        adapter: Binding::new(vec![source.as_dependency()], move || {
            reader.get().convert::<T>()
        }),
    }
}

/// Adapter reading an optional source, substituting `T::default()` for `None`.
pub(crate) fn nullable<T, O>(source: &O) -> BoundSource<T>
where
    T: Value + Default,
    O: ObservableValue<Option<T>> + Clone + 'static,
{
    let reader = source.clone();
    let origin = source.observable_id();
    BoundSource::Adapted {
        origin,
        adapter: Binding::new(vec![source.as_dependency()], move || {
            reader.get().unwrap_or_else(|| {
                debug!(source = %origin, "null source value coerced to the default value");
                T::default()
            })
        }),
    }
}
