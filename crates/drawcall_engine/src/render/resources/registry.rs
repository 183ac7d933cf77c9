//! Name-keyed resource stores and lazily resolved references
//!
//! A [`ResourceStore`] is the loaded catalog for one resource kind. A
//! [`ResourceReference`] names a resource and remembers the last resolution
//! weakly, so it neither keeps the resource alive nor resolves by name again
//! while the resource is alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Name to shared resource lookup
pub trait ResourceResolver<T> {
    /// Find a resource by name
    fn resolve(&self, name: &str) -> Option<Rc<T>>;
}

/// Catalog of loaded resources of one kind
pub struct ResourceStore<T> {
    kind: &'static str,
    entries: RefCell<HashMap<String, Rc<T>>>,
}

impl<T> ResourceStore<T> {
    /// Create an empty store; `kind` is used in log messages
    pub fn new(kind: &'static str) -> Self {
        Self { kind, entries: RefCell::new(HashMap::new()) }
    }

    /// Kind label
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Add or replace a resource, returning the shared handle
    pub fn insert(&self, name: impl Into<String>, resource: T) -> Rc<T> {
        let shared = Rc::new(resource);
        self.insert_shared(name, Rc::clone(&shared));
        shared
    }

    /// Add or replace an already shared resource
    pub fn insert_shared(&self, name: impl Into<String>, resource: Rc<T>) {
        let name = name.into();
        if self.entries.borrow_mut().insert(name.clone(), resource).is_some() {
            log::debug!("Replaced {} '{}'", self.kind, name);
        }
    }

    /// Remove a resource from the catalog
    pub fn remove(&self, name: &str) -> Option<Rc<T>> {
        self.entries.borrow_mut().remove(name)
    }

    /// Whether a name is loaded
    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Number of loaded resources
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Loaded names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T> ResourceResolver<T> for ResourceStore<T> {
    fn resolve(&self, name: &str) -> Option<Rc<T>> {
        self.entries.borrow().get(name).cloned()
    }
}

impl<T> fmt::Debug for ResourceStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .finish()
    }
}

/// Name-addressed handle with memoized resolution
pub struct ResourceReference<T> {
    name: String,
    cached: RefCell<Weak<T>>,
}

impl<T> ResourceReference<T> {
    /// Reference a resource by name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), cached: RefCell::new(Weak::new()) }
    }

    /// Reference with the cache already primed
    pub fn from_shared(name: impl Into<String>, resource: &Rc<T>) -> Self {
        Self { name: name.into(), cached: RefCell::new(Rc::downgrade(resource)) }
    }

    /// The referenced name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve, asking `resolver` only when nothing live is cached
    pub fn get(&self, resolver: &dyn ResourceResolver<T>) -> Option<Rc<T>> {
        if let Some(resource) = self.cached.borrow().upgrade() {
            return Some(resource);
        }
        let resource = resolver.resolve(&self.name)?;
        *self.cached.borrow_mut() = Rc::downgrade(&resource);
        Some(resource)
    }

    /// Whether the cache currently holds a live resource
    pub fn is_cached(&self) -> bool {
        self.cached.borrow().strong_count() > 0
    }

    /// Drop the cached resolution
    pub fn invalidate(&self) {
        *self.cached.borrow_mut() = Weak::new();
    }
}

impl<T> Clone for ResourceReference<T> {
    fn clone(&self) -> Self {
        Self { name: self.name.clone(), cached: RefCell::new(self.cached.borrow().clone()) }
    }
}

impl<T> PartialEq for ResourceReference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> fmt::Debug for ResourceReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceReference")
            .field("name", &self.name)
            .field("cached", &self.is_cached())
            .finish()
    }
}
