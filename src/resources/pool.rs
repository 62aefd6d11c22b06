//! Name-keyed resource registry.

use std::collections::HashMap;

use crate::error::{RenderError, RenderResult, ResourceKind};

/// Resources addressed by exact, case-sensitive name.
#[derive(Debug)]
pub struct NamedPool<T> {
    kind: ResourceKind,
    items: HashMap<String, T>,
}

impl<T> NamedPool<T> {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            items: HashMap::new(),
        }
    }

    /// Add `item` under `name`, failing with `Duplicate` if the name is taken.
    pub fn insert(&mut self, name: &str, item: T) -> RenderResult<()> {
        if self.items.contains_key(name) {
            return Err(RenderError::duplicate(self.kind, name));
        }
        self.items.insert(name.to_string(), item);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> RenderResult<T> {
        self.items
            .remove(name)
            .ok_or_else(|| RenderError::not_found(self.kind, name))
    }

    pub fn get(&self, name: &str) -> RenderResult<&T> {
        self.items
            .get(name)
            .ok_or_else(|| RenderError::not_found(self.kind, name))
    }

    pub fn get_mut(&mut self, name: &str) -> RenderResult<&mut T> {
        let kind = self.kind;
        self.items
            .get_mut(name)
            .ok_or_else(|| RenderError::not_found(kind, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items.iter().map(|(name, item)| (name.as_str(), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
