//! Collection-valued properties.
//!
//! A [`CollectionProperty`] holds an `Option<C>`: the collection itself can
//! be swapped, bound, or bidirectionally bound like any other value. Content
//! operations always act on the collection currently held, and fail with
//! [`BindingError::NullArgument`] while there is none.

use std::fmt;

use crate::collections::{ObservableCollection, ObservableList, ObservableMap, ObservableSet};
use crate::content;
use crate::error::{BindingError, Result};
use crate::id::ObservableId;
use crate::listener::{ChangeListener, InvalidationListener};
use crate::observable::{Observable, ObservableValue, ReadOnlyProperty, Value};

use super::{Owner, Property, PropertyBuilder, ReadOnlyView, ReadOnlyWrapper};

/// A property holding an observable collection.
pub struct CollectionProperty<C: ObservableCollection> {
    wrapper: ReadOnlyWrapper<Option<C>>,
}

pub type ListProperty<E> = CollectionProperty<ObservableList<E>>;
pub type SetProperty<E> = CollectionProperty<ObservableSet<E>>;
pub type MapProperty<K, V> = CollectionProperty<ObservableMap<K, V>>;

impl<C: ObservableCollection> CollectionProperty<C> {
    /// Create an anonymous property holding `collection`.
    pub fn new(collection: C) -> Self {
        Self::from_builder(Property::builder(), Some(collection))
    }

    /// Create an anonymous property holding no collection.
    pub fn empty() -> Self {
        Self::from_builder(Property::builder(), None)
    }

    pub fn from_builder(builder: PropertyBuilder<Option<C>>, collection: Option<C>) -> Self {
        Self {
            wrapper: ReadOnlyWrapper::from_builder(builder, collection),
        }
    }

    /// The underlying value property.
    pub fn property(&self) -> &Property<Option<C>> {
        self.wrapper.property()
    }

    /// Read-only view for handing out to callers.
    pub fn read_only_property(&self) -> ReadOnlyCollectionProperty<C> {
        ReadOnlyCollectionProperty {
            view: self.wrapper.read_only_property(),
        }
    }

    pub fn id(&self) -> ObservableId {
        self.property().id()
    }

    /// The collection currently held.
    pub fn get(&self) -> Option<C> {
        self.property().get()
    }

    /// Swap the collection.
    pub fn set(&self, collection: Option<C>) -> Result<()> {
        self.property().set(collection)
    }

    /// Follow another observable collection reference.
    pub fn bind<O>(&self, source: &O) -> Result<()>
    where
        O: ObservableValue<Option<C>> + Clone + 'static,
    {
        self.property().bind(source)
    }

    pub fn unbind(&self) {
        self.property().unbind();
    }

    pub fn is_bound(&self) -> bool {
        self.property().is_bound()
    }

    /// Share the collection reference with `other` in both directions.
    ///
    /// Fails with [`BindingError::IllegalState`] if either property's
    /// collection is the target of a one-way content binding.
    pub fn bind_bidirectional(&self, other: &CollectionProperty<C>) -> Result<()> {
        for side in [self, other] {
            if side.peek().is_some_and(|collection| content::is_content_bound(&collection)) {
                return Err(BindingError::IllegalState(format!(
                    "{} is content bound; value and content bindings are exclusive",
                    side.property().describe()
                )));
            }
        }
        self.property().bind_bidirectional(other.property())
    }

    pub fn unbind_bidirectional(&self, other: &CollectionProperty<C>) -> Result<()> {
        self.property().unbind_bidirectional(other.property())
    }

    /// Make the held collection mirror `source`.
    ///
    /// Fails with [`BindingError::IllegalState`] while the property is
    /// bidirectionally bound.
    pub fn bind_content(&self, source: &C) -> Result<()> {
        if self.property().is_bidirectionally_bound() {
            return Err(BindingError::IllegalState(format!(
                "{} is bidirectionally bound; value and content bindings are exclusive",
                self.property().describe()
            )));
        }
        let target = self.require()?;
        content::bind_content(&target, source)
    }

    /// Make the held collection mirror the collection held by `other`.
    pub fn bind_content_from(&self, other: &CollectionProperty<C>) -> Result<()> {
        let source = other.require()?;
        self.bind_content(&source)
    }

    /// Stop mirroring `source`. Does nothing if the held collection does
    /// not mirror it.
    pub fn unbind_content(&self, source: &C) -> Result<()> {
        let target = self.require()?;
        content::unbind_content(&target, source)
    }

    /// Stop mirroring whatever the held collection mirrors.
    pub fn detach_content(&self) -> bool {
        self.peek().is_some_and(|target| content::detach_content(&target))
    }

    pub fn bind_content_bidirectional(&self, other: &C) -> Result<()> {
        let collection = self.require()?;
        content::bind_content_bidirectional(&collection, other)
    }

    pub fn unbind_content_bidirectional(&self, other: &C) -> Result<()> {
        let collection = self.require()?;
        content::unbind_content_bidirectional(&collection, other)
    }

    /// Whether the held collection takes part in any content binding.
    pub fn is_content_bound(&self) -> bool {
        self.peek().is_some_and(|collection| {
            content::is_content_bound(&collection)
                || content::is_content_bound_bidirectionally(&collection)
        })
    }

    fn peek(&self) -> Option<C> {
        self.property().peek()
    }

    fn require(&self) -> Result<C> {
        self.get().ok_or_else(|| {
            BindingError::NullArgument(format!("{} holds no collection", self.property().describe()))
        })
    }
}

impl<C: ObservableCollection> Clone for CollectionProperty<C> {
    fn clone(&self) -> Self {
        Self {
            wrapper: self.wrapper.clone(),
        }
    }
}

impl<C: ObservableCollection> Observable for CollectionProperty<C> {
    fn observable_id(&self) -> ObservableId {
        self.property().id()
    }

    fn add_listener(&self, listener: InvalidationListener) {
        self.property().add_listener(listener);
    }

    fn remove_listener(&self, listener: &InvalidationListener) {
        self.property().remove_listener(listener);
    }
}

impl<C: ObservableCollection> ObservableValue<Option<C>> for CollectionProperty<C> {
    fn get(&self) -> Option<C> {
        CollectionProperty::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<Option<C>>) {
        self.property().add_change_listener(listener);
    }

    fn remove_change_listener(&self, listener: &ChangeListener<Option<C>>) {
        self.property().remove_change_listener(listener);
    }
}

impl<C: ObservableCollection> ReadOnlyProperty<Option<C>> for CollectionProperty<C> {
    fn owner(&self) -> Option<Owner> {
        self.property().owner()
    }

    fn name(&self) -> &str {
        self.property().name()
    }
}

impl<C: ObservableCollection> PartialEq for CollectionProperty<C> {
    fn eq(&self, other: &Self) -> bool {
        same_content(self.peek(), other.peek())
    }
}

impl<C: ObservableCollection> PartialEq<ReadOnlyCollectionProperty<C>> for CollectionProperty<C> {
    fn eq(&self, other: &ReadOnlyCollectionProperty<C>) -> bool {
        same_content(self.peek(), other.peek())
    }
}

impl<E: Value> PartialEq<Vec<E>> for CollectionProperty<ObservableList<E>> {
    fn eq(&self, other: &Vec<E>) -> bool {
        self.peek().is_some_and(|list| list.to_vec() == *other)
    }
}

impl<C: ObservableCollection + fmt::Debug> fmt::Display for CollectionProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        summarize(f, "CollectionProperty", self.property())
    }
}

impl<C: ObservableCollection + fmt::Debug> fmt::Debug for CollectionProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionProperty")
            .field("id", &self.id())
            .field("bound", &self.is_bound())
            .field("value", &self.peek())
            .finish()
    }
}

/// Read-only half of a [`CollectionProperty`].
pub struct ReadOnlyCollectionProperty<C: ObservableCollection> {
    view: ReadOnlyView<Option<C>>,
}

impl<C: ObservableCollection> ReadOnlyCollectionProperty<C> {
    pub fn get(&self) -> Option<C> {
        self.view.get()
    }

    pub fn is_bound(&self) -> bool {
        self.view.is_bound()
    }

    /// Whether the held collection takes part in any content binding.
    pub fn is_content_bound(&self) -> bool {
        self.peek().is_some_and(|collection| {
            content::is_content_bound(&collection)
                || content::is_content_bound_bidirectionally(&collection)
        })
    }

    fn peek(&self) -> Option<C> {
        self.view.property().peek()
    }
}

impl<C: ObservableCollection> Clone for ReadOnlyCollectionProperty<C> {
    fn clone(&self) -> Self {
        Self {
            view: self.view.clone(),
        }
    }
}

impl<C: ObservableCollection> Observable for ReadOnlyCollectionProperty<C> {
    fn observable_id(&self) -> ObservableId {
        self.view.observable_id()
    }

    fn add_listener(&self, listener: InvalidationListener) {
        self.view.add_listener(listener);
    }

    fn remove_listener(&self, listener: &InvalidationListener) {
        self.view.remove_listener(listener);
    }
}

impl<C: ObservableCollection> ObservableValue<Option<C>> for ReadOnlyCollectionProperty<C> {
    fn get(&self) -> Option<C> {
        self.view.get()
    }

    fn add_change_listener(&self, listener: ChangeListener<Option<C>>) {
        self.view.add_change_listener(listener);
    }

    fn remove_change_listener(&self, listener: &ChangeListener<Option<C>>) {
        self.view.remove_change_listener(listener);
    }
}

impl<C: ObservableCollection> ReadOnlyProperty<Option<C>> for ReadOnlyCollectionProperty<C> {
    fn owner(&self) -> Option<Owner> {
        self.view.owner()
    }

    fn name(&self) -> &str {
        self.view.name()
    }
}

impl<C: ObservableCollection> PartialEq for ReadOnlyCollectionProperty<C> {
    fn eq(&self, other: &Self) -> bool {
        same_content(self.peek(), other.peek())
    }
}

impl<C: ObservableCollection> PartialEq<CollectionProperty<C>> for ReadOnlyCollectionProperty<C> {
    fn eq(&self, other: &CollectionProperty<C>) -> bool {
        same_content(self.peek(), other.peek())
    }
}

impl<E: Value> PartialEq<Vec<E>> for ReadOnlyCollectionProperty<ObservableList<E>> {
    fn eq(&self, other: &Vec<E>) -> bool {
        self.peek().is_some_and(|list| list.to_vec() == *other)
    }
}

impl<C: ObservableCollection + fmt::Debug> fmt::Display for ReadOnlyCollectionProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        summarize(f, "ReadOnlyCollectionProperty", self.view.property())
    }
}

impl<C: ObservableCollection + fmt::Debug> fmt::Debug for ReadOnlyCollectionProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyCollectionProperty")
            .field("id", &self.view.observable_id())
            .field("value", &self.peek())
            .finish()
    }
}

fn same_content<C: ObservableCollection>(left: Option<C>, right: Option<C>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.content_eq(&right),
        (None, None) => true,
        _ => false,
    }
}

fn summarize<C: ObservableCollection + fmt::Debug>(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    property: &Property<Option<C>>,
) -> fmt::Result {
    write!(f, "{label} [")?;
    if let Some(owner) = property.owner() {
        write!(f, "owner: {}, ", owner.short_type_name())?;
    }
    if !property.name().is_empty() {
        write!(f, "name: {}, ", property.name())?;
    }
    if property.is_bound() {
        f.write_str("bound, ")?;
    }
    match property.peek() {
        Some(collection) => write!(f, "value: {collection:?}]"),
        None => f.write_str("value: none]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn content_operations_act_on_the_held_list() {
        let items = ListProperty::new(ObservableList::new());
        let source = ObservableList::from_vec(vec![1, 2]);

        items.bind_content(&source).unwrap();
        assert!(items == vec![1, 2]);
        assert!(items.is_content_bound());

        source.push(3).unwrap();
        assert!(items == vec![1, 2, 3]);

        items.unbind_content(&source).unwrap();
        source.push(4).unwrap();
        assert!(items == vec![1, 2, 3]);
        assert!(!items.is_content_bound());
    }

    #[test]
    fn missing_collection_is_a_null_argument() {
        let items: ListProperty<i32> = ListProperty::empty();
        let source = ObservableList::from_vec(vec![1]);

        assert!(matches!(items.bind_content(&source), Err(BindingError::NullArgument(_))));
        assert!(matches!(
            items.bind_content_bidirectional(&source),
            Err(BindingError::NullArgument(_))
        ));
        assert!(!items.detach_content());
    }

    #[test]
    fn content_and_value_bidirectional_bindings_exclude_each_other() {
        let left = ListProperty::new(ObservableList::from_vec(vec![1]));
        let right = ListProperty::new(ObservableList::new());
        let source = ObservableList::from_vec(vec![9]);

        left.bind_content(&source).unwrap();
        assert!(matches!(
            left.bind_bidirectional(&right),
            Err(BindingError::IllegalState(_))
        ));
        assert!(matches!(
            right.bind_bidirectional(&left),
            Err(BindingError::IllegalState(_))
        ));

        assert!(left.detach_content());
        right.bind_bidirectional(&left).unwrap();
        assert!(matches!(
            left.bind_content(&source),
            Err(BindingError::IllegalState(_))
        ));
    }

    #[test]
    fn bidirectional_value_binding_shares_the_collection() {
        let left = SetProperty::new(ObservableSet::new());
        let right = SetProperty::new(["x"].into_iter().collect::<ObservableSet<&'static str>>());

        left.bind_bidirectional(&right).unwrap();
        assert_eq!(left.get(), right.get());

        let fresh: ObservableSet<&'static str> = ObservableSet::new();
        right.set(Some(fresh.clone())).unwrap();
        assert_eq!(left.get(), Some(fresh));
    }

    #[test]
    fn equality_is_structural() {
        let left = ListProperty::new(ObservableList::from_vec(vec![1, 2]));
        let right = ListProperty::new(ObservableList::from_vec(vec![1, 2]));
        let empty: ListProperty<i32> = ListProperty::empty();

        assert!(left == right);
        assert!(left != empty);
        assert!(empty == ListProperty::<i32>::empty());
        assert!(left.read_only_property() == right);
        assert!(left.read_only_property() == vec![1, 2]);

        right.get().unwrap().push(3).unwrap();
        assert!(left != right);
    }

    #[test]
    fn swapping_the_collection_notifies_the_view() {
        let map = MapProperty::new(ObservableMap::<&'static str, i32>::new());
        let view = map.read_only_property();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        view.add_listener(InvalidationListener::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        map.set(Some(ObservableMap::new())).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(view.get().is_some());
    }

    #[test]
    fn display_lists_the_collection() {
        struct Panel;
        let panel = Arc::new(Panel);
        let items = ListProperty::from_builder(
            Property::builder().owner(&panel).name("items"),
            Some(ObservableList::from_vec(vec![1, 2])),
        );

        assert_eq!(
            items.to_string(),
            "CollectionProperty [owner: Panel, name: items, value: [1, 2]]"
        );
        assert_eq!(
            ListProperty::<i32>::empty().to_string(),
            "CollectionProperty [value: none]"
        );
    }
}
