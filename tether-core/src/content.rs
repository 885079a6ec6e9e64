//! Content Bindings
//!
//! Content binding mirrors the elements of one collection into another,
//! instead of sharing the collection itself.
//!
//! # One-way
//!
//! [`bind_content`] replaces the target's elements with a snapshot of the
//! source and installs a mirror on the source that replays every change onto
//! the target. The mirror holds the target weakly and is keyed by the
//! target's id, so each target has at most one source.
//!
//! The target must not be modified through any other path while bound. The
//! mirror checks that the target still has the length the source had before
//! each change; on mismatch it logs a warning and detaches for good rather
//! than keep applying edits to content it no longer matches.
//!
//! # Two-way
//!
//! [`bind_content_bidirectional`] installs a mirror on each side that
//! replays onto the other, sharing one update flag so a replayed change does
//! not bounce back. A collection cannot be a one-way target and a two-way
//! peer at the same time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::collections::{ContentChange, ObservableCollection};
use crate::error::{BindingError, ListenerResult, Result};
use crate::guard::UpdateFlag;
use crate::id::ObservableId;
use crate::listener::{CollectionChangeHandler, CollectionListener, ListenerKey};

/// Reports whether the collection at the other end of a link still exists.
type Liveness = Box<dyn Fn() -> bool + Send>;

fn liveness<C: ObservableCollection>(collection: &C) -> Liveness {
    let weak = collection.downgrade();
    Box::new(move || C::upgrade(&weak).is_some())
}

/// One-way link from a source, recorded on the target.
struct SourceLink {
    source: ObservableId,
    alive: Liveness,
    /// Removes the mirror from the source.
    detach: Box<dyn FnOnce() + Send>,
}

/// Two-way link to a peer, recorded on both sides.
struct PeerLink {
    peer: ObservableId,
    alive: Liveness,
}

#[derive(Default)]
struct LinkState {
    source: Option<SourceLink>,
    peers: SmallVec<[PeerLink; 2]>,
}

impl LinkState {
    /// Forget links whose other end was dropped.
    fn prune(&mut self) {
        if self.source.as_ref().is_some_and(|link| !(link.alive)()) {
            if let Some(link) = self.source.take() {
                debug!(source = %link.source, "content source dropped, link released");
            }
        }
        self.peers.retain(|link| {
            let alive = (link.alive)();
            if !alive {
                debug!(peer = %link.peer, "content peer dropped, link released");
            }
            alive
        });
    }
}

/// Content binding bookkeeping kept by every observable collection.
///
/// Links to collections that no longer exist are dropped on every query.
#[derive(Default)]
pub struct ContentLinks {
    state: Mutex<LinkState>,
}

impl ContentLinks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, LinkState> {
        let mut state = self.state.lock();
        state.prune();
        state
    }

    /// Source this collection mirrors one way, if any.
    pub fn source(&self) -> Option<ObservableId> {
        self.live().source.as_ref().map(|link| link.source)
    }

    /// Collections this one is bound to both ways.
    pub fn peers(&self) -> Vec<ObservableId> {
        self.live().peers.iter().map(|link| link.peer).collect()
    }

    fn has_peers(&self) -> bool {
        !self.live().peers.is_empty()
    }

    fn set_source(&self, link: SourceLink) {
        self.state.lock().source = Some(link);
    }

    fn take_source(&self) -> Option<SourceLink> {
        self.live().source.take()
    }

    /// Forget the link to `source` without touching the source.
    fn forget_source(&self, source: ObservableId) {
        let mut state = self.state.lock();
        if state.source.as_ref().is_some_and(|link| link.source == source) {
            state.source = None;
        }
    }

    fn add_peer(&self, peer: ObservableId, alive: Liveness) {
        self.state.lock().peers.push(PeerLink { peer, alive });
    }

    fn remove_peer(&self, peer: ObservableId) {
        self.state.lock().peers.retain(|link| link.peer != peer);
    }
}

/// Mirror installed on a one-way source.
struct ContentMirror<C: ObservableCollection> {
    source: ObservableId,
    target: C::Weak,
    disposed: AtomicBool,
}

impl<C: ObservableCollection> CollectionChangeHandler<C::Change> for ContentMirror<C> {
    fn on_changed(&self, change: &C::Change) -> ListenerResult {
        if self.disposed.load(Ordering::Acquire) {
            return Ok(());
        }
        let Some(target) = C::upgrade(&self.target) else {
            return Ok(());
        };

        if target.len() != change.prior_len() {
            warn!(
                target = %target.observable_id(),
                source = %self.source,
                expected = change.prior_len(),
                actual = target.len(),
                "content binding out of sync, detaching"
            );
            self.disposed.store(true, Ordering::Release);
            target.content_links().forget_source(self.source);
            return Ok(());
        }

        target.replay(change)
    }

    fn is_expired(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || C::upgrade(&self.target).is_none()
    }
}

/// Mirror `source` into `target` until unbound.
///
/// Fails with [`BindingError::InvalidArgument`] when both are the same
/// collection and with [`BindingError::IllegalState`] when `target` is bound
/// bidirectionally. Binding to the current source again does nothing;
/// binding to another source detaches the current one first.
pub fn bind_content<C: ObservableCollection>(target: &C, source: &C) -> Result<()> {
    let target_id = target.observable_id();
    let source_id = source.observable_id();
    if target_id == source_id {
        return Err(BindingError::InvalidArgument(format!(
            "cannot bind the content of collection {target_id} to itself"
        )));
    }

    let links = target.content_links();
    if links.has_peers() {
        return Err(BindingError::IllegalState(format!(
            "collection {target_id} is bound bidirectionally and cannot also mirror {source_id}"
        )));
    }
    match links.source() {
        Some(current) if current == source_id => return Ok(()),
        Some(_) => {
            detach_content(target);
        }
        None => {}
    }

    target.replace_content(source)?;

    let key = ListenerKey::Content(target_id);
    let mirror = Arc::new(ContentMirror::<C> {
        source: source_id,
        target: target.downgrade(),
        disposed: AtomicBool::new(false),
    });
    let handler: Arc<dyn CollectionChangeHandler<C::Change>> = mirror.clone();
    source.add_change_listener(CollectionListener::from_arc(handler).with_key(key));

    let weak_source = source.downgrade();
    links.set_source(SourceLink {
        source: source_id,
        alive: liveness(source),
        detach: Box::new(move || {
            mirror.disposed.store(true, Ordering::Release);
            if let Some(source) = C::upgrade(&weak_source) {
                source.remove_keyed_listener(&key);
            }
        }),
    });

    trace!(target = %target_id, source = %source_id, "content bound");
    Ok(())
}

/// Stop mirroring `source` into `target`.
///
/// The target keeps its current elements. Does nothing if `target` does not
/// mirror `source`.
pub fn unbind_content<C: ObservableCollection>(target: &C, source: &C) -> Result<()> {
    if target.observable_id() == source.observable_id() {
        return Err(BindingError::InvalidArgument(format!(
            "cannot unbind the content of collection {} from itself",
            target.observable_id()
        )));
    }
    if target.content_links().source() == Some(source.observable_id()) {
        detach_content(target);
    }
    Ok(())
}

/// Stop mirroring whatever `target` mirrors. Returns whether it was bound.
pub fn detach_content<C: ObservableCollection>(target: &C) -> bool {
    match target.content_links().take_source() {
        Some(link) => {
            (link.detach)();
            trace!(target = %target.observable_id(), source = %link.source, "content unbound");
            true
        }
        None => false,
    }
}

/// Whether `target` mirrors a source one way.
pub fn is_content_bound<C: ObservableCollection>(target: &C) -> bool {
    target.content_links().source().is_some()
}

/// Whether `collection` is bound bidirectionally to at least one peer.
pub fn is_content_bound_bidirectionally<C: ObservableCollection>(collection: &C) -> bool {
    collection.content_links().has_peers()
}

struct ContentPair<C: ObservableCollection> {
    key: ListenerKey,
    first_id: ObservableId,
    second_id: ObservableId,
    first: C::Weak,
    second: C::Weak,
    updating: UpdateFlag,
}

impl<C: ObservableCollection> ContentPair<C> {
    fn dissolve(&self, first: Option<&C>, second: Option<&C>) {
        if let Some(first) = first {
            first.remove_keyed_listener(&self.key);
            first.content_links().remove_peer(self.second_id);
        }
        if let Some(second) = second {
            second.remove_keyed_listener(&self.key);
            second.content_links().remove_peer(self.first_id);
        }
    }
}

/// Mirror installed on one side of a two-way content binding.
struct PairSide<C: ObservableCollection> {
    pair: Arc<ContentPair<C>>,
    on_first: bool,
}

impl<C: ObservableCollection> CollectionChangeHandler<C::Change> for PairSide<C> {
    fn on_changed(&self, change: &C::Change) -> ListenerResult {
        let Some(_guard) = self.pair.updating.enter() else {
            return Ok(());
        };

        let first = C::upgrade(&self.pair.first);
        let second = C::upgrade(&self.pair.second);
        let (Some(first), Some(second)) = (first.as_ref(), second.as_ref()) else {
            self.pair.dissolve(first.as_ref(), second.as_ref());
            return Ok(());
        };

        let peer = if self.on_first { second } else { first };
        if peer.len() != change.prior_len() {
            warn!(
                first = %self.pair.first_id,
                second = %self.pair.second_id,
                expected = change.prior_len(),
                actual = peer.len(),
                "bidirectional content binding out of sync, detaching"
            );
            self.pair.dissolve(Some(first), Some(second));
            return Ok(());
        }

        peer.replay(change)
    }

    fn is_expired(&self) -> bool {
        C::upgrade(&self.pair.first).is_none() || C::upgrade(&self.pair.second).is_none()
    }
}

/// Keep the elements of `a` and `b` equal both ways.
///
/// `a` takes the content of `b` immediately. Fails with
/// [`BindingError::InvalidArgument`] for a collection paired with itself or
/// an already bound pair, and with [`BindingError::IllegalState`] when either
/// side mirrors a source one way.
pub fn bind_content_bidirectional<C: ObservableCollection>(a: &C, b: &C) -> Result<()> {
    let (a_id, b_id) = (a.observable_id(), b.observable_id());
    if a_id == b_id {
        return Err(BindingError::InvalidArgument(format!(
            "cannot bind the content of collection {a_id} bidirectionally to itself"
        )));
    }
    for side in [a, b] {
        if let Some(source) = side.content_links().source() {
            return Err(BindingError::IllegalState(format!(
                "collection {} mirrors {source} one way and cannot also be bound bidirectionally",
                side.observable_id()
            )));
        }
    }

    let key = ListenerKey::content_bidirectional(a_id, b_id);
    if a.has_keyed_listener(&key) {
        return Err(BindingError::InvalidArgument(format!(
            "collections {a_id} and {b_id} are already bound bidirectionally"
        )));
    }

    a.replace_content(b)?;

    let pair = Arc::new(ContentPair::<C> {
        key,
        first_id: a_id,
        second_id: b_id,
        first: a.downgrade(),
        second: b.downgrade(),
        updating: UpdateFlag::new(),
    });
    a.add_change_listener(
        CollectionListener::<C::Change>::from_handler(PairSide {
            pair: Arc::clone(&pair),
            on_first: true,
        })
        .with_key(key),
    );
    b.add_change_listener(
        CollectionListener::<C::Change>::from_handler(PairSide { pair, on_first: false }).with_key(key),
    );
    a.content_links().add_peer(b_id, liveness(b));
    b.content_links().add_peer(a_id, liveness(a));

    trace!(first = %a_id, second = %b_id, "content bound bidirectionally");
    Ok(())
}

/// Remove the two-way content binding between `a` and `b`, in either order.
pub fn unbind_content_bidirectional<C: ObservableCollection>(a: &C, b: &C) -> Result<()> {
    let (a_id, b_id) = (a.observable_id(), b.observable_id());
    if a_id == b_id {
        return Err(BindingError::InvalidArgument(format!(
            "cannot unbind the content of collection {a_id} from itself"
        )));
    }

    let key = ListenerKey::content_bidirectional(a_id, b_id);
    let removed = a.remove_keyed_listener(&key) | b.remove_keyed_listener(&key);
    a.content_links().remove_peer(b_id);
    b.content_links().remove_peer(a_id);
    if removed {
        trace!(first = %a_id, second = %b_id, "content unbound bidirectionally");
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
