//! Bidirectional Bindings
//!
//! Two properties kept equal by propagating writes both ways.
//!
//! # Structure
//!
//! One shared [`Link`] record per pair holds both endpoints weakly, the
//! mapping between their element types, the last synchronized pair of values
//! and an update flag. Each endpoint gets an invalidation listener keyed by
//! the unordered pair of ids, which is how [`unbind_bidirectional`] finds
//! exactly this pairing again from either side.
//!
//! # Propagation
//!
//! ```text
//! a.set(x) -> a fires -> link: flag free, take it
//!                        b.set(forward(x)) -> b fires -> link: flag taken, return
//!                        read b back (revalidates it), release flag
//! ```
//!
//! Each write settles in one step; the flag turns the ping-pong into a single
//! propagated update. The flag belongs to the link, so a property with
//! several bidirectional partners still fans out to all of them.
//!
//! # Failure
//!
//! If writing the peer fails, the written side is restored to the last
//! synchronized value and [`BindingError::BidirectionalUpdate`] is returned.
//! If the restore fails as well, the pairing is removed and
//! [`BindingError::BidirectionalRestore`] is returned. A converter that
//! cannot parse the written text leaves both sides as they are and returns
//! [`BindingError::Conversion`].

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{BindingError, ConversionError, ListenerResult, Result};
use crate::guard::UpdateFlag;
use crate::listener::{InvalidationHandler, InvalidationListener, ListenerKey};
use crate::observable::{Observable, Value};
use crate::property::{Property, WeakProperty};

/// Converts between text and a value of type `T`.
pub trait StringConverter<T>: Send + Sync + 'static {
    /// Render `value` as text.
    fn format(&self, value: &T) -> String;

    /// Parse text back into a value.
    fn parse(&self, text: &str) -> std::result::Result<T, ConversionError>;
}

/// Converter built on `Display` and `FromStr`.
pub struct DisplayFromStr<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> DisplayFromStr<T> {
    /// Create the converter.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for DisplayFromStr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StringConverter<T> for DisplayFromStr<T>
where
    T: Display + FromStr + 'static,
    T::Err: Display,
{
    fn format(&self, value: &T) -> String {
        value.to_string()
    }

    fn parse(&self, text: &str) -> std::result::Result<T, ConversionError> {
        text.parse().map_err(|err| ConversionError::new(text, err))
    }
}

/// Maps values between the two endpoints of a bidirectional binding.
pub trait BidirectionalMapping<A, B>: Send + Sync + 'static {
    /// Value for the second endpoint, given the first.
    fn forward(&self, first: &A) -> Result<B>;

    /// Value for the first endpoint, given the second.
    fn backward(&self, second: &B) -> Result<A>;
}

/// Both endpoints hold the same type.
pub struct Identity;

impl<T: Clone> BidirectionalMapping<T, T> for Identity {
    fn forward(&self, first: &T) -> Result<T> {
        Ok(first.clone())
    }

    fn backward(&self, second: &T) -> Result<T> {
        Ok(second.clone())
    }
}

/// First endpoint holds text, second holds values parsed by `C`.
pub struct Converting<C>(pub C);

impl<T, C> BidirectionalMapping<String, T> for Converting<C>
where
    C: StringConverter<T>,
{
    fn forward(&self, text: &String) -> Result<T> {
        Ok(self.0.parse(text)?)
    }

    fn backward(&self, value: &T) -> Result<String> {
        Ok(self.0.format(value))
    }
}

struct Link<A: Value, B: Value, M> {
    key: ListenerKey,
    first: WeakProperty<A>,
    second: WeakProperty<B>,
    mapping: M,
    updating: UpdateFlag,
    /// Values both sides agreed on after the last successful propagation.
    synced: Mutex<(A, B)>,
}

impl<A, B, M> Link<A, B, M>
where
    A: Value,
    B: Value,
    M: BidirectionalMapping<A, B>,
{
    fn first_to_second(&self, first: &Property<A>, second: &Property<B>) -> ListenerResult {
        let value = first.get();
        let mapped = self.mapping.forward(&value)?;
        match second.set(mapped) {
            Ok(()) => {
                let settled = second.get();
                *self.synced.lock() = (value, settled);
                Ok(())
            }
            Err(cause) => {
                let previous = self.synced.lock().0.clone();
                self.restore(first, previous, cause, second)
            }
        }
    }

    fn second_to_first(&self, first: &Property<A>, second: &Property<B>) -> ListenerResult {
        let value = second.get();
        let mapped = self.mapping.backward(&value)?;
        match first.set(mapped) {
            Ok(()) => {
                let settled = first.get();
                *self.synced.lock() = (settled, value);
                Ok(())
            }
            Err(cause) => {
                let previous = self.synced.lock().1.clone();
                self.restore(second, previous, cause, first)
            }
        }
    }

    /// Put `source` back to `previous` after writing `peer` failed.
    fn restore<S: Value, P: Value>(
        &self,
        source: &Property<S>,
        previous: S,
        cause: BindingError,
        peer: &Property<P>,
    ) -> ListenerResult {
        match source.set(previous) {
            Ok(()) => {
                source.get();
                warn!(source = %source.id(), peer = %peer.id(), error = %cause, "bidirectional update failed, source restored");
                Err(BindingError::BidirectionalUpdate(Box::new(cause)))
            }
            Err(restore) => {
                source.registry().remove_keyed(&self.key);
                peer.registry().remove_keyed(&self.key);
                warn!(source = %source.id(), peer = %peer.id(), error = %restore, "restoring after a failed bidirectional update failed, binding removed");
                Err(BindingError::BidirectionalRestore(Box::new(restore)))
            }
        }
    }
}

/// Listener installed on one endpoint.
struct Side<A: Value, B: Value, M> {
    link: Arc<Link<A, B, M>>,
    on_first: bool,
}

impl<A, B, M> InvalidationHandler for Side<A, B, M>
where
    A: Value,
    B: Value,
    M: BidirectionalMapping<A, B>,
{
    fn invalidated(&self, _: &dyn Observable) -> ListenerResult {
        let Some(_guard) = self.link.updating.enter() else {
            return Ok(());
        };

        let link = &self.link;
        match (link.first.upgrade(), link.second.upgrade()) {
            (Some(first), Some(second)) => {
                if self.on_first {
                    link.first_to_second(&first, &second)
                } else {
                    link.second_to_first(&first, &second)
                }
            }
            (Some(survivor), None) => {
                survivor.registry().remove_keyed(&link.key);
                Ok(())
            }
            (None, Some(survivor)) => {
                survivor.registry().remove_keyed(&link.key);
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    fn is_expired(&self) -> bool {
        self.link.first.is_gone() || self.link.second.is_gone()
    }
}

/// Keep `first` and `second` in sync through `mapping`.
///
/// `first` takes the mapped value of `second` immediately. Fails with
/// [`BindingError::InvalidArgument`] when both are the same property or the
/// pair is already bound, and with whatever error the initial write of
/// `first` produces (for example when `first` is bound).
pub fn bind_bidirectional<A, B, M>(first: &Property<A>, second: &Property<B>, mapping: M) -> Result<()>
where
    A: Value,
    B: Value,
    M: BidirectionalMapping<A, B>,
{
    if first.id() == second.id() {
        return Err(BindingError::InvalidArgument(format!(
            "cannot bind {} bidirectionally to itself",
            first.describe()
        )));
    }

    let key = ListenerKey::bidirectional(first.id(), second.id());
    if first.registry().has_keyed_listener(|candidate| *candidate == key) {
        return Err(BindingError::InvalidArgument(format!(
            "{} and {} are already bound bidirectionally",
            first.describe(),
            second.describe()
        )));
    }

    first.set(mapping.backward(&second.get())?)?;
    let synced = (first.get(), second.get());

    let link = Arc::new(Link {
        key,
        first: first.downgrade(),
        second: second.downgrade(),
        mapping,
        updating: UpdateFlag::new(),
        synced: Mutex::new(synced),
    });

    first.add_listener(
        InvalidationListener::from_handler(Side {
            link: Arc::clone(&link),
            on_first: true,
        })
        .with_key(key),
    );
    second.add_listener(InvalidationListener::from_handler(Side { link, on_first: false }).with_key(key));

    trace!(first = %first.id(), second = %second.id(), "bound bidirectionally");
    Ok(())
}

/// Remove the bidirectional binding between `a` and `b`, in either order.
///
/// Other bidirectional bindings of either property are left alone. Does
/// nothing if the pair is not bound.
pub fn unbind_bidirectional<A: Value, B: Value>(a: &Property<A>, b: &Property<B>) -> Result<()> {
    if a.id() == b.id() {
        return Err(BindingError::InvalidArgument(format!(
            "cannot unbind {} from itself",
            a.describe()
        )));
    }

    let key = ListenerKey::bidirectional(a.id(), b.id());
    let removed = a.registry().remove_keyed(&key) | b.registry().remove_keyed(&key);
    if removed {
        trace!(first = %a.id(), second = %b.id(), "unbound bidirectionally");
    }
    Ok(())
}

/// Keep a text property in sync with a typed property through `converter`.
///
/// `text` takes the formatted value of `other` immediately.
pub fn bind_bidirectional_with<T, C>(text: &Property<String>, other: &Property<T>, converter: C) -> Result<()>
where
    T: Value,
    C: StringConverter<T>,
{
    bind_bidirectional(text, other, Converting(converter))
}

impl<T: Value> Property<T> {
    /// Keep this property and `other` equal. This property takes the value
    /// of `other` immediately.
    pub fn bind_bidirectional(&self, other: &Property<T>) -> Result<()> {
        bind_bidirectional(self, other, Identity)
    }

    /// Remove the bidirectional binding with `other`.
    pub fn unbind_bidirectional(&self, other: &Property<T>) -> Result<()> {
        unbind_bidirectional(self, other)
    }
}

impl Property<String> {
    /// Keep this text property in sync with `other` through `converter`.
    pub fn bind_bidirectional_with<T, C>(&self, other: &Property<T>, converter: C) -> Result<()>
    where
        T: Value,
        C: StringConverter<T>,
    {
        bind_bidirectional_with(self, other, converter)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
