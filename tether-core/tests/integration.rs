//! Integration Tests for Properties and Bindings
//!
//! These tests verify that properties, bindings and collections work
//! together through the public API only.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use tether_core::{
    bind_bidirectional, bind_bidirectional_with, bind_content, unbind_bidirectional, Binding,
    BindingError, ChangeListener, DisplayFromStr, Identity, InvalidationListener, ListProperty,
    Observable, ObservableList, ObservableValue, ObservableValueExt, Property, ReadOnlyWrapper,
};

fn count_invalidations(observable: &impl Observable) -> Arc<AtomicI32> {
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    observable.add_listener(InvalidationListener::new(move |_| {
        count_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    count
}

/// The canonical two-property scenario.
#[test]
fn bidirectional_pair_follows_both_sides() {
    let a = Property::new(1);
    let b = Property::new(2);

    a.bind_bidirectional(&b).unwrap();
    assert_eq!(a.get(), 2);

    b.set(5).unwrap();
    assert_eq!(a.get(), 5);

    a.set(7).unwrap();
    assert_eq!(b.get(), 7);
}

/// Writes between two reads produce a single invalidation.
#[test]
fn writes_coalesce_until_read() {
    let property = Property::new(0);
    let count = count_invalidations(&property);

    for value in 1..=10 {
        property.set(value).unwrap();
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Setting the value it already holds is silent.
    property.get();
    property.set(10).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// A bound property reads through and refuses writes.
#[test]
fn bound_property_delegates_and_snapshots_on_unbind() {
    let source = Property::new(1);
    let target = Property::new(0);

    target.bind(&source).unwrap();
    for value in [3, 8, 13] {
        source.set(value).unwrap();
        assert_eq!(target.get(), value);
    }
    assert!(matches!(target.set(4), Err(BindingError::BoundValueSet { .. })));

    target.unbind();
    source.set(21).unwrap();
    assert_eq!(target.get(), 13);
}

/// Each write settles once; nothing oscillates.
#[test]
fn bidirectional_write_settles_once() {
    let a = Property::new(0);
    let b = Property::new(0);
    bind_bidirectional(&a, &b, Identity).unwrap();

    let a_changes = Arc::new(Mutex::new(Vec::new()));
    let b_changes = Arc::new(Mutex::new(Vec::new()));
    let a_clone = a_changes.clone();
    a.add_change_listener(ChangeListener::new(move |_, old: &i32, new: &i32| {
        a_clone.lock().push((*old, *new));
        Ok(())
    }));
    let b_clone = b_changes.clone();
    b.add_change_listener(ChangeListener::new(move |_, old: &i32, new: &i32| {
        b_clone.lock().push((*old, *new));
        Ok(())
    }));

    a.set(1).unwrap();
    b.set(2).unwrap();

    assert_eq!(*a_changes.lock(), vec![(0, 1), (1, 2)]);
    assert_eq!(*b_changes.lock(), vec![(0, 1), (1, 2)]);
}

/// Removing one bidirectional pair leaves the others alone.
#[test]
fn bidirectional_unbind_is_pairwise() {
    let a = Property::new(0);
    let b = Property::new(0);
    let c = Property::new(0);

    a.bind_bidirectional(&b).unwrap();
    a.bind_bidirectional(&c).unwrap();
    unbind_bidirectional(&b, &a).unwrap();

    c.set(9).unwrap();
    assert_eq!(a.get(), 9);
    assert_eq!(b.get(), 0);

    b.set(4).unwrap();
    assert_eq!(a.get(), 9);
}

/// Self-binding fails and changes nothing.
#[test]
fn self_binding_is_rejected() {
    let a = Property::new(3);
    let count = count_invalidations(&a);

    assert!(matches!(
        a.bind_bidirectional(&a),
        Err(BindingError::InvalidArgument(_))
    ));
    assert!(matches!(a.bind(&a), Err(BindingError::InvalidArgument(_))));
    assert!(!a.is_bound());
    assert!(!a.is_bidirectionally_bound());
    assert_eq!(count.load(Ordering::SeqCst), 0);

    let list = ObservableList::from_vec(vec![1, 2]);
    assert!(matches!(
        bind_content(&list, &list),
        Err(BindingError::InvalidArgument(_))
    ));
    assert_eq!(list.to_vec(), vec![1, 2]);
}

/// A bound property that nobody references anymore releases its source.
#[test]
fn dropped_target_does_not_leak_through_its_source() {
    let source = Property::new(0);
    let target = Property::new(0);
    target.bind(&source).unwrap();
    let weak = target.downgrade();
    assert_eq!(source.listener_count(), 1);

    drop(target);
    assert!(weak.upgrade().is_none());

    source.set(1).unwrap();
    assert_eq!(source.listener_count(), 0);
}

/// A bidirectional partner that was dropped does not keep firing.
#[test]
fn dropped_bidirectional_partner_is_released() {
    let a = Property::new(0);
    let b = Property::new(0);
    a.bind_bidirectional(&b).unwrap();

    drop(b);
    a.set(3).unwrap();
    assert_eq!(a.listener_count(), 0);
    assert!(!a.is_bidirectionally_bound());
}

/// A content-bound list stays the same size and order as its source.
#[test]
fn content_mirror_follows_positions() {
    let source = ObservableList::from_vec(vec!["a", "c"]);
    let target = ObservableList::new();
    bind_content(&target, &source).unwrap();

    source.insert(1, "b").unwrap();
    assert_eq!(target.to_vec(), vec!["a", "b", "c"]);

    source.sort().unwrap();
    source.remove(0).unwrap();
    assert_eq!(target.to_vec(), source.to_vec());
    assert_eq!(target.len(), source.len());
}

/// Text and numbers stay in sync through a converter.
#[test]
fn text_property_tracks_a_number() {
    let text = Property::new(String::new());
    let number = Property::new(12);
    bind_bidirectional_with(&text, &number, DisplayFromStr::new()).unwrap();
    assert_eq!(text.get(), "12");

    text.set("40".to_string()).unwrap();
    assert_eq!(number.get(), 40);

    number.set(-3).unwrap();
    assert_eq!(text.get(), "-3");

    // Unparseable text is reported and leaves the number alone.
    assert!(matches!(
        text.set("forty".to_string()),
        Err(BindingError::Conversion(_))
    ));
    assert_eq!(number.get(), -3);
}

/// Derived values recompute lazily after their dependencies change.
#[test]
fn derived_binding_feeds_a_property() {
    let width = Property::new(4);
    let height = Property::new(5);
    let calls = Arc::new(AtomicI32::new(0));

    let (w, h, calls_clone) = (width.clone(), height.clone(), calls.clone());
    let area = Binding::new(
        vec![width.as_dependency(), height.as_dependency()],
        move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            w.get() * h.get()
        },
    );

    let label = Property::new(0);
    label.bind(&area).unwrap();
    assert_eq!(label.get(), 20);

    width.set(6).unwrap();
    height.set(10).unwrap();
    assert_eq!(label.get(), 60);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let doubled = height.map(|h| h * 2);
    assert_eq!(doubled.get(), 20);
}

/// Read-only views see writes made through the wrapper.
#[test]
fn read_only_view_exposes_owned_state() {
    let wrapper = ReadOnlyWrapper::new(false);
    let view = wrapper.read_only_property();
    let count = count_invalidations(&view);

    wrapper.set(true).unwrap();
    assert!(view.get());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// A list property forwards content operations to its list.
#[test]
fn list_property_content_binding() {
    let rows = ListProperty::new(ObservableList::new());
    let model = ObservableList::from_vec(vec![1, 2, 3]);

    rows.bind_content(&model).unwrap();
    model.retain(|row| row % 2 == 1).unwrap();
    assert!(rows == vec![1, 3]);

    let other: ListProperty<i32> = ListProperty::empty();
    assert!(matches!(
        other.bind_content(&model),
        Err(BindingError::NullArgument(_))
    ));
}

/// Comparison and list helpers stay current as their inputs change.
#[test]
fn ready_made_bindings_track_their_inputs() {
    let limit = Property::new(3usize);
    let rows = ObservableList::from_vec(vec!["a", "b"]);
    let count = tether_core::bindings::size(&rows);
    let over_limit = tether_core::bindings::greater_than(&count, &limit);

    assert!(!over_limit.get());
    rows.extend(["c", "d"]).unwrap();
    assert!(over_limit.get());

    limit.set(4).unwrap();
    assert!(!over_limit.get());
}
