//! Reentrancy Guard
//!
//! Bidirectional bindings write into their peer from inside a listener, and
//! the peer's write fires the binding again. Each binding record owns an
//! [`UpdateFlag`]; the propagation path enters it and any nested propagation
//! for the same record sees it taken and backs off.
//!
//! The flag is scoped to one binding record, never global, so unrelated
//! bindings keep propagating while one of them is mid-update.

use std::sync::atomic::{AtomicBool, Ordering};

/// "Currently updating" flag of one binding record.
#[derive(Debug, Default)]
pub(crate) struct UpdateFlag {
    updating: AtomicBool,
}

impl UpdateFlag {
    pub(crate) const fn new() -> Self {
        Self {
            updating: AtomicBool::new(false),
        }
    }

    /// Take the flag. Returns `None` if an update is already in flight.
    ///
    /// The flag is released when the returned guard is dropped, including
    /// during unwinding.
    pub(crate) fn enter(&self) -> Option<UpdateGuard<'_>> {
        self.updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UpdateGuard { flag: self })
    }
}

/// Guard that clears the flag when dropped.
pub(crate) struct UpdateGuard<'a> {
    flag: &'a UpdateFlag,
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.flag.updating.store(false, Ordering::Release);
    }
}
