//! Observable identity.
//!
//! Handles are cheap clones of a shared core, so "the same object" means
//! "the same core". Each core draws an [`ObservableId`] when it is created
//! and every clone reports that id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an observable core.
///
/// Used wherever reference identity matters: rebinding to the current
/// source, rejecting self-binding, and keying bidirectional pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservableId(u64);

impl ObservableId {
    /// Generate a new unique id.
    ///
    /// Uses an atomic counter so ids stay unique across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObservableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalize two ids into an unordered pair.
pub(crate) fn unordered(a: ObservableId, b: ObservableId) -> (ObservableId, ObservableId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
