//! Ready-made derived values.
//!
//! Helpers that build a [`Binding`] from one or two observables: equality
//! and ordering comparisons, and size and element lookups on observable
//! lists. Each result is lazy like any other binding and depends on exactly
//! the observables passed in.

use std::sync::Arc;

use tracing::debug;

use crate::binding::Binding;
use crate::collections::ObservableList;
use crate::observable::{Observable, ObservableValue, ObservableValueExt, Value};
use crate::property::Numeric;

fn combine<T, U, A, B, F>(a: &A, b: &B, f: F) -> Binding<U>
where
    T: Value,
    U: Value,
    A: ObservableValue<T> + Clone + 'static,
    B: ObservableValue<T> + Clone + 'static,
    F: Fn(&T, &T) -> U + Send + Sync + 'static,
{
    let (left, right) = (a.clone(), b.clone());
    Binding::new(vec![a.as_dependency(), b.as_dependency()], move || {
        f(&left.get(), &right.get())
    })
}

/// Whether `a` and `b` hold equal values.
pub fn equal<T, A, B>(a: &A, b: &B) -> Binding<bool>
where
    T: Value,
    A: ObservableValue<T> + Clone + 'static,
    B: ObservableValue<T> + Clone + 'static,
{
    combine(a, b, |left, right| left == right)
}

/// Whether `a` and `b` hold different values.
pub fn not_equal<T, A, B>(a: &A, b: &B) -> Binding<bool>
where
    T: Value,
    A: ObservableValue<T> + Clone + 'static,
    B: ObservableValue<T> + Clone + 'static,
{
    combine(a, b, |left, right| left != right)
}

/// Whether `a` holds `value`.
pub fn equal_value<T, A>(a: &A, value: T) -> Binding<bool>
where
    T: Value,
    A: ObservableValue<T> + Clone + 'static,
{
    a.map(move |current| *current == value)
}

/// Whether `a` holds something other than `value`.
pub fn not_equal_value<T, A>(a: &A, value: T) -> Binding<bool>
where
    T: Value,
    A: ObservableValue<T> + Clone + 'static,
{
    a.map(move |current| *current != value)
}

/// Whether two numbers differ by at most `epsilon`.
pub fn equal_within<N, A, B>(a: &A, b: &B, epsilon: f64) -> Binding<bool>
where
    N: Numeric,
    A: ObservableValue<N> + Clone + 'static,
    B: ObservableValue<N> + Clone + 'static,
{
    combine(a, b, move |left, right| {
        (left.to_f64() - right.to_f64()).abs() <= epsilon
    })
}

/// Whether two numbers differ by more than `epsilon`.
pub fn not_equal_within<N, A, B>(a: &A, b: &B, epsilon: f64) -> Binding<bool>
where
    N: Numeric,
    A: ObservableValue<N> + Clone + 'static,
    B: ObservableValue<N> + Clone + 'static,
{
    combine(a, b, move |left, right| {
        (left.to_f64() - right.to_f64()).abs() > epsilon
    })
}

/// Whether `a` is greater than `b`.
pub fn greater_than<T, A, B>(a: &A, b: &B) -> Binding<bool>
where
    T: Value + PartialOrd,
    A: ObservableValue<T> + Clone + 'static,
    B: ObservableValue<T> + Clone + 'static,
{
    combine(a, b, |left, right| left > right)
}

/// Whether `a` is greater than or equal to `b`.
pub fn greater_than_or_equal<T, A, B>(a: &A, b: &B) -> Binding<bool>
where
    T: Value + PartialOrd,
    A: ObservableValue<T> + Clone + 'static,
    B: ObservableValue<T> + Clone + 'static,
{
    combine(a, b, |left, right| left >= right)
}

/// Whether `a` is less than `b`.
pub fn less_than<T, A, B>(a: &A, b: &B) -> Binding<bool>
where
    T: Value + PartialOrd,
    A: ObservableValue<T> + Clone + 'static,
    B: ObservableValue<T> + Clone + 'static,
{
    combine(a, b, |left, right| left < right)
}

/// Whether `a` is less than or equal to `b`.
pub fn less_than_or_equal<T, A, B>(a: &A, b: &B) -> Binding<bool>
where
    T: Value + PartialOrd,
    A: ObservableValue<T> + Clone + 'static,
    B: ObservableValue<T> + Clone + 'static,
{
    combine(a, b, |left, right| left <= right)
}

/// Whether `a` is greater than `value`.
pub fn greater_than_value<T, A>(a: &A, value: T) -> Binding<bool>
where
    T: Value + PartialOrd,
    A: ObservableValue<T> + Clone + 'static,
{
    a.map(move |current| *current > value)
}

/// Whether `a` is less than `value`.
pub fn less_than_value<T, A>(a: &A, value: T) -> Binding<bool>
where
    T: Value + PartialOrd,
    A: ObservableValue<T> + Clone + 'static,
{
    a.map(move |current| *current < value)
}

/// Whether two strings are equal apart from letter case.
pub fn equal_ignore_case<A, B>(a: &A, b: &B) -> Binding<bool>
where
    A: ObservableValue<String> + Clone + 'static,
    B: ObservableValue<String> + Clone + 'static,
{
    combine(a, b, |left, right| same_ignoring_case(left, right))
}

/// Whether two strings differ in more than letter case.
pub fn not_equal_ignore_case<A, B>(a: &A, b: &B) -> Binding<bool>
where
    A: ObservableValue<String> + Clone + 'static,
    B: ObservableValue<String> + Clone + 'static,
{
    combine(a, b, |left, right| !same_ignoring_case(left, right))
}

fn same_ignoring_case(left: &str, right: &str) -> bool {
    left.chars()
        .flat_map(char::to_lowercase)
        .eq(right.chars().flat_map(char::to_lowercase))
}

fn list_dependency<E: Value>(list: &ObservableList<E>) -> Arc<dyn Observable> {
    Arc::new(list.clone())
}

/// Number of elements in `list`.
pub fn size<E: Value>(list: &ObservableList<E>) -> Binding<usize> {
    let reader = list.clone();
    Binding::new(vec![list_dependency(list)], move || reader.len())
}

/// Whether `list` is empty.
pub fn is_empty<E: Value>(list: &ObservableList<E>) -> Binding<bool> {
    let reader = list.clone();
    Binding::new(vec![list_dependency(list)], move || reader.is_empty())
}

/// Whether `list` has at least one element.
pub fn is_not_empty<E: Value>(list: &ObservableList<E>) -> Binding<bool> {
    let reader = list.clone();
    Binding::new(vec![list_dependency(list)], move || !reader.is_empty())
}

/// Element of `list` at a fixed `index`, `None` while out of range.
pub fn value_at<E: Value>(list: &ObservableList<E>, index: usize) -> Binding<Option<E>> {
    let reader = list.clone();
    Binding::new(vec![list_dependency(list)], move || element(&reader, Some(index)))
}

/// Element of `list` at a fixed `index`, `default` while out of range.
pub fn value_at_or<E: Value>(list: &ObservableList<E>, index: usize, default: E) -> Binding<E> {
    let reader = list.clone();
    Binding::new(vec![list_dependency(list)], move || {
        element(&reader, Some(index)).unwrap_or_else(|| default.clone())
    })
}

/// Element of `list` at the position held by `index`.
///
/// Negative and out-of-range positions read as `None`. The binding depends
/// on both the list and the index.
pub fn value_at_index<E, I, O>(list: &ObservableList<E>, index: &O) -> Binding<Option<E>>
where
    E: Value,
    I: Numeric,
    O: ObservableValue<I> + Clone + 'static,
{
    let reader = list.clone();
    let position = index.clone();
    Binding::new(
        vec![list_dependency(list), index.as_dependency()],
        move || element(&reader, usize::try_from(position.get().convert::<i64>()).ok()),
    )
}

fn element<E: Value>(list: &ObservableList<E>, index: Option<usize>) -> Option<E> {
    let found = index.and_then(|at| list.get(at));
    if found.is_none() {
        debug!(list = %list.id(), ?index, len = list.len(), "list index out of range");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    #[test]
    fn equality_follows_both_operands() {
        let a = Property::new(1);
        let b = Property::new(2);
        let same = equal(&a, &b);
        let different = not_equal(&a, &b);

        assert!(!same.get());
        assert!(different.get());
        assert_eq!(same.dependencies(), vec![a.id(), b.id()]);

        b.set(1).unwrap();
        assert!(same.get());
        assert!(!different.get());

        let is_three = equal_value(&a, 3);
        assert!(!is_three.get());
        a.set(3).unwrap();
        assert!(is_three.get());
        assert!(not_equal_value(&b, 3).get());
    }

    #[test]
    fn epsilon_equality() {
        let a = Property::new(1.0f64);
        let b = Property::new(1.05f64);
        let close = equal_within(&a, &b, 0.1);
        let far = not_equal_within(&a, &b, 0.1);

        assert!(close.get());
        assert!(!far.get());

        b.set(1.5).unwrap();
        assert!(!close.get());
        assert!(far.get());
    }

    #[test]
    fn ordering_comparisons() {
        let a = Property::new(2);
        let b = Property::new(2);
        let gt = greater_than(&a, &b);
        let ge = greater_than_or_equal(&a, &b);
        let lt = less_than(&a, &b);
        let le = less_than_or_equal(&a, &b);

        assert_eq!((gt.get(), ge.get(), lt.get(), le.get()), (false, true, false, true));

        a.set(5).unwrap();
        assert_eq!((gt.get(), ge.get(), lt.get(), le.get()), (true, true, false, false));

        b.set(9).unwrap();
        assert_eq!((gt.get(), ge.get(), lt.get(), le.get()), (false, false, true, true));

        assert!(greater_than_value(&a, 4).get());
        assert!(!less_than_value(&a, 5).get());
    }

    #[test]
    fn case_insensitive_equality() {
        let a = Property::new("Hello".to_string());
        let b = Property::new("HELLO".to_string());
        let same = equal_ignore_case(&a, &b);
        let different = not_equal_ignore_case(&a, &b);

        assert!(same.get());
        assert!(!different.get());

        b.set("Hello World".to_string()).unwrap();
        assert!(!same.get());
        assert!(different.get());
    }

    #[test]
    fn size_and_emptiness_track_the_list() {
        let list = ObservableList::new();
        let len = size(&list);
        let empty = is_empty(&list);
        let not_empty = is_not_empty(&list);

        assert_eq!(len.get(), 0);
        assert!(empty.get());
        assert!(!not_empty.get());

        list.extend(["a", "b"]).unwrap();
        assert_eq!(len.get(), 2);
        assert!(!empty.get());
        assert!(not_empty.get());

        list.remove_item(&"b").unwrap();
        assert_eq!(len.get(), 1);

        list.clear().unwrap();
        assert_eq!(len.get(), 0);
        assert!(empty.get());
    }

    #[test]
    fn fixed_position_falls_back_when_out_of_range() {
        let list = ObservableList::from_vec(vec![10, 20]);
        let first = value_at(&list, 0);
        let third = value_at(&list, 2);
        let third_or_zero = value_at_or(&list, 2, 0);

        assert_eq!(first.get(), Some(10));
        assert_eq!(third.get(), None);
        assert_eq!(third_or_zero.get(), 0);

        list.push(30).unwrap();
        assert_eq!(third.get(), Some(30));
        assert_eq!(third_or_zero.get(), 30);

        list.set_all([7]).unwrap();
        assert_eq!(first.get(), Some(7));
        assert_eq!(third.get(), None);
    }

    #[test]
    fn observed_position_follows_list_and_index() {
        let list = ObservableList::from_vec(vec!["x", "y"]);
        let index = Property::new(-1i32);
        let current = value_at_index(&list, &index);

        assert_eq!(current.get(), None);
        assert_eq!(current.dependencies(), vec![list.id(), index.id()]);

        index.set(1).unwrap();
        assert_eq!(current.get(), Some("y"));

        list.remove(1).unwrap();
        assert_eq!(current.get(), None);

        index.set(0).unwrap();
        assert_eq!(current.get(), Some("x"));
    }
}
