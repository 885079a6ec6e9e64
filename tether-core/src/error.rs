//! Error Types
//!
//! Every fallible operation in the crate reports a [`BindingError`]. The
//! variants follow the failure taxonomy of the binding core:
//!
//! - precondition violations (self-binding, duplicate pairs, missing values)
//! - illegal mutation of a bound property
//! - failures raised by listener callbacks, which travel back to the call
//!   that started the fire pass
//! - conversion failures in converting bidirectional bindings

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = BindingError> = std::result::Result<T, E>;

/// What a listener callback returns.
///
/// The first `Err` aborts the fire pass and is handed back to whoever
/// triggered it.
pub type ListenerResult = Result<()>;

/// Errors produced by properties, bindings and observable collections.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// `set` was called on a property whose value is delegated to a source.
    #[error("{property}: a bound value cannot be set")]
    BoundValueSet {
        /// Display form of the property.
        property: String,
    },

    /// A required value was absent (for example a collection property that
    /// currently holds no collection).
    #[error("{0} must not be null")]
    NullArgument(String),

    /// An argument violates a precondition: binding something to itself, or
    /// installing the same bidirectional pair twice.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation conflicts with a binding the endpoint already takes part in.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Positional access past the end of a list.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Length of the list at the time of the call.
        len: usize,
    },

    /// A converter could not translate a value while synchronizing a pair.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Writing the peer of a bidirectional binding failed. The property that
    /// changed was restored to its previous value.
    #[error("bidirectional binding failed, setting to the previous value: {0}")]
    BidirectionalUpdate(Box<BindingError>),

    /// Writing the peer failed and so did restoring the source. The binding
    /// has been removed from both properties.
    #[error(
        "bidirectional binding failed together with an attempt to restore the source \
         property to the previous value; removing the bidirectional binding: {0}"
    )]
    BidirectionalRestore(Box<BindingError>),

    /// Raised by user listener code.
    #[error("listener failed: {0}")]
    Listener(String),
}

impl BindingError {
    /// Convenience constructor for listener failures.
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }
}

/// A string could not be parsed into the target type (or vice versa).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {input:?}: {reason}")]
pub struct ConversionError {
    /// The text that failed to convert.
    pub input: String,
    /// Why the conversion failed.
    pub reason: String,
}

impl ConversionError {
    /// Create a new conversion error.
    pub fn new(input: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}
