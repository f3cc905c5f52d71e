//! Environments.
//!
//! An environment maps names to [`Meta`] values, remembers the order its
//! local entries were first inserted in, and chains to a parent for
//! lexical nesting. Environments are shared through [`EnvRef`] handles;
//! lambdas keep a local environment whose leading entries are the
//! argument slots, addressed by their insertion index.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::meta::Meta;

/// A shared handle to an environment.
pub type EnvRef = Rc<RefCell<Env>>;

/// An insertion-ordered name → value map with an optional parent.
#[derive(Default)]
pub struct Env {
    entries: HashMap<String, Meta>,
    order: Vec<String>,
    parent: Option<EnvRef>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn with_parent(parent: &EnvRef) -> Self {
        Env {
            parent: Some(parent.clone()),
            ..Env::default()
        }
    }

    pub fn into_shared(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn set_parent(&mut self, parent: Option<EnvRef>) {
        self.parent = parent;
    }

    /// Find `name` here or up the parent chain.
    pub fn lookup(&self, name: &str) -> Option<Meta> {
        if let Some(meta) = self.entries.get(name) {
            Some(meta.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().lookup(name)
        } else {
            None
        }
    }

    /// Insert or overwrite a local entry. The first insertion of a name
    /// fixes its position in the entry order.
    pub fn enter(&mut self, name: &str, meta: Meta) {
        if let Some(slot) = self.entries.get_mut(name) {
            *slot = meta;
        } else {
            self.entries.insert(name.to_owned(), meta);
            self.order.push(name.to_owned());
        }
    }

    /// Number of local entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The `i`th local entry in insertion order.
    pub fn entry(&self, i: usize) -> Option<&Meta> {
        self.entries.get(self.order.get(i)?)
    }

    /// The name of the `i`th local entry.
    pub fn entry_name(&self, i: usize) -> Option<&str> {
        self.order.get(i).map(String::as_str)
    }

    /// Overwrite the `i`th local entry in place.
    pub fn set_entry(&mut self, i: usize, meta: Meta) {
        if let Some(name) = self.order.get(i)
            && let Some(slot) = self.entries.get_mut(name)
        {
            *slot = meta;
        }
    }

    /// A fresh environment with the same parent and copies of the local
    /// entries. Refcounted payloads are shared, not duplicated.
    pub fn fork(&self) -> EnvRef {
        Env {
            entries: self.entries.clone(),
            order: self.order.clone(),
            parent: self.parent.clone(),
        }
        .into_shared()
    }
}
