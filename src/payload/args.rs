//! # Opaque event arguments.
//!
//! The engine never inspects the values it carries; it only owns references.
//! [`Value`] is a shared, type-erased handle and [`EventArgs`] groups the
//! positional and named arguments of one publication. Cloning an
//! `EventArgs` clones `Arc`s, not the underlying values.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased argument value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Positional and named arguments of one publication.
#[derive(Clone, Default)]
pub struct EventArgs {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

impl EventArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Any + Send + Sync) -> Self {
        self.positional.push(Arc::new(value));
        self
    }

    /// Appends an already-shared positional argument.
    #[must_use]
    pub fn arg_value(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Sets a named argument.
    #[must_use]
    pub fn named(mut self, key: impl Into<String>, value: impl Any + Send + Sync) -> Self {
        self.named.insert(key.into(), Arc::new(value));
        self
    }

    /// Sets an already-shared named argument.
    #[must_use]
    pub fn named_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.named.insert(key.into(), value);
        self
    }

    /// The positional arguments, in order.
    #[must_use]
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Looks up a named argument.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.named.get(key)
    }

    /// Looks up and downcasts a named argument.
    #[must_use]
    pub fn get_as<T: Any>(&self, key: &str) -> Option<&T> {
        self.named.get(key)?.downcast_ref::<T>()
    }

    /// Downcasts a positional argument.
    #[must_use]
    pub fn positional_as<T: Any>(&self, index: usize) -> Option<&T> {
        self.positional.get(index)?.downcast_ref::<T>()
    }

    /// Whether a named argument exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.named.contains_key(key)
    }

    /// Number of positional plus named arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Whether there are no arguments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Inserts a named value unless the key is already bound.
    ///
    /// Returns whether the value was inserted. Used for the `topic` binding
    /// of the with-topic calling convention: a caller-supplied `topic`
    /// argument always wins.
    pub(crate) fn insert_if_absent(&mut self, key: &str, value: Value) -> bool {
        if self.named.contains_key(key) {
            return false;
        }
        self.named.insert(key.to_owned(), value);
        true
    }

    /// Removes a named value.
    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        self.named.remove(key)
    }

    /// Drops all values, keeping allocated capacity for reuse.
    pub(crate) fn reset(&mut self) {
        self.positional.clear();
        self.named.clear();
    }
}

impl fmt::Debug for EventArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventArgs")
            .field("positional", &self.positional.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .finish()
    }
}
