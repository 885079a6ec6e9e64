//! Property owners.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Weak reference to the object that declares a property.
///
/// Properties usually live inside their owner, so holding the owner strongly
/// would form a cycle. The owner is used for diagnostics and to report the
/// declaring type; both degrade gracefully once the owner is gone.
#[derive(Clone)]
pub struct Owner {
    handle: Weak<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Owner {
    /// Refer to `owner` without keeping it alive.
    pub fn of<B: Any + Send + Sync>(owner: &Arc<B>) -> Self {
        let erased: Arc<dyn Any + Send + Sync> = owner.clone();
        Self {
            handle: Arc::downgrade(&erased),
            type_name: std::any::type_name::<B>(),
        }
    }

    /// Type name of the owner, captured at construction.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Short type name without the module path.
    pub fn short_type_name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        let start = base.rfind("::").map_or(0, |index| index + 2);
        &self.type_name[start..]
    }

    /// The owner, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.handle.upgrade()
    }

    /// The owner as its concrete type.
    pub fn downcast<B: Any + Send + Sync>(&self) -> Option<Arc<B>> {
        self.upgrade()?.downcast::<B>().ok()
    }

    /// Whether the owner has been dropped.
    pub fn is_gone(&self) -> bool {
        self.handle.strong_count() == 0
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("type_name", &self.type_name)
            .field("alive", &!self.is_gone())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Window {
        title: &'static str,
    }

    #[test]
    fn owner_downcasts_while_alive() {
        let window = Arc::new(Window { title: "main" });
        let owner = Owner::of(&window);

        assert_eq!(owner.short_type_name(), "Window");
        assert_eq!(owner.downcast::<Window>().map(|w| w.title), Some("main"));
        assert!(owner.downcast::<String>().is_none());

        drop(window);
        assert!(owner.is_gone());
        assert!(owner.upgrade().is_none());
    }
}
