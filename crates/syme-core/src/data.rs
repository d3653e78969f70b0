//! The per-dispatch data bag.
//!
//! A [`Data`] is created fresh for every dispatch and shared by handle between
//! before-middleware, the handler and after-middleware. Nothing survives the
//! dispatch that created it.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Ordered, string-keyed scratch space holding values of any type.
///
/// Cloning a `Data` clones the handle, not the contents: every clone sees the
/// same entries.
///
/// # Example
///
/// ```
/// use syme_core::Data;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Csrf(String);
///
/// let data = Data::new();
/// let shared = data.clone();
///
/// data.set("csrf", Csrf("abc".into()));
/// assert_eq!(shared.get::<Csrf>("csrf"), Some(Csrf("abc".into())));
/// assert_eq!(shared.get::<String>("csrf"), None);
/// ```
#[derive(Clone, Default)]
pub struct Data {
    entries: Rc<RefCell<IndexMap<String, Box<dyn Any>>>>,
}

impl Data {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// A replaced key keeps its original position.
    pub fn set<T: Any>(&self, key: impl Into<String>, value: T) {
        self.entries.borrow_mut().insert(key.into(), Box::new(value));
    }

    /// Returns a clone of the value under `key` if it has type `T`.
    #[must_use]
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.entries
            .borrow()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Runs `f` against the value under `key` without cloning it.
    pub fn with<T: Any, R>(&self, key: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        let entries = self.entries.borrow();
        entries.get(key).and_then(|v| v.downcast_ref::<T>()).map(f)
    }

    /// Returns true if a value is stored under `key`, whatever its type.
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Removes the value under `key`. Returns true if there was one.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.borrow_mut().shift_remove(key).is_some()
    }

    /// Removes every value.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data").field("keys", &self.keys()).finish()
    }
}
