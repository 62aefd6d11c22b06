//! Value stores for each resolution scope.
//!
//! - [`ValueStore`] backs the system-wide scope and each object's object-wide scope.
//! - [`PassScopeStore`] holds one [`ValueStore`] per pass name.
//! - [`PassLocalStore`] lives inside a single object pass and remembers, per entry,
//!   whether the value was set on the pass directly (locked) or arrived from the
//!   object-wide scope (shadowable).
//!
//! Every write is type-checked against the shared [`InputRegistry`]; reads never fail
//! on absence because resolution probes most stores speculatively.

use std::collections::{BTreeMap, HashMap};

use crate::error::{RenderError, RenderResult, ResourceKind};

use super::registry::InputRegistry;
use super::tagged::SharedValue;

/// A name → value map guarded by the input registry.
#[derive(Debug, Clone)]
pub struct ValueStore {
    registry: InputRegistry,
    values: BTreeMap<String, SharedValue>,
}

impl ValueStore {
    pub fn new(registry: InputRegistry) -> Self {
        Self {
            registry,
            values: BTreeMap::new(),
        }
    }

    /// Insert or replace a value, returning the previous one.
    pub fn update(&mut self, name: &str, value: SharedValue) -> RenderResult<Option<SharedValue>> {
        self.registry.check_value(name, &value)?;
        Ok(self.values.insert(name.to_string(), value))
    }

    pub fn try_get(&self, name: &str) -> Option<&SharedValue> {
        self.values.get(name)
    }

    pub fn get(&self, name: &str) -> RenderResult<&SharedValue> {
        self.values
            .get(name)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Value, name))
    }

    pub fn remove(&mut self, name: &str) -> RenderResult<SharedValue> {
        self.values
            .remove(name)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Value, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Values visible to every object rendered within a named pass.
#[derive(Debug, Clone)]
pub struct PassScopeStore {
    registry: InputRegistry,
    passes: HashMap<String, ValueStore>,
}

impl PassScopeStore {
    pub fn new(registry: InputRegistry) -> Self {
        Self {
            registry,
            passes: HashMap::new(),
        }
    }

    pub fn update(
        &mut self,
        pass: &str,
        name: &str,
        value: SharedValue,
    ) -> RenderResult<Option<SharedValue>> {
        let registry = &self.registry;
        self.passes
            .entry(pass.to_string())
            .or_insert_with(|| ValueStore::new(registry.clone()))
            .update(name, value)
    }

    pub fn try_get(&self, pass: &str, name: &str) -> Option<&SharedValue> {
        self.passes.get(pass)?.try_get(name)
    }

    pub fn remove(&mut self, pass: &str, name: &str) -> RenderResult<SharedValue> {
        self.passes
            .get_mut(pass)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Value, name))?
            .remove(name)
    }

    /// Drop every value scoped to `pass`.
    pub fn clear_pass(&mut self, pass: &str) {
        self.passes.remove(pass);
    }

    pub fn pass(&self, pass: &str) -> Option<&ValueStore> {
        self.passes.get(pass)
    }
}

/// Which scope a pass-local binding request originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindScope {
    /// Set directly on the pass. Locks the entry.
    PassLocal,
    /// Propagated from the owning object. Never overwrites a locked entry.
    ObjectWide,
}

/// Result of a pass-local bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    /// An object-wide write was dropped because a locked pass-local value exists.
    Shadowed,
}

/// One pass-local binding.
#[derive(Debug, Clone)]
pub struct PassLocalEntry {
    pub value: SharedValue,
    /// Set when the value was bound on the pass itself.
    pub locked: bool,
}

/// Values bound to one pass of one object.
#[derive(Debug, Clone)]
pub struct PassLocalStore {
    registry: InputRegistry,
    entries: BTreeMap<String, PassLocalEntry>,
}

impl PassLocalStore {
    pub fn new(registry: InputRegistry) -> Self {
        Self {
            registry,
            entries: BTreeMap::new(),
        }
    }

    /// Bind `value` under `name` following the pass-local precedence rule.
    pub fn bind(
        &mut self,
        name: &str,
        value: SharedValue,
        scope: BindScope,
    ) -> RenderResult<BindOutcome> {
        self.registry.check_value(name, &value)?;

        let lock = scope == BindScope::PassLocal;
        match self.entries.get_mut(name) {
            Some(entry) if entry.locked && !lock => Ok(BindOutcome::Shadowed),
            Some(entry) => {
                entry.value = value;
                entry.locked |= lock;
                Ok(BindOutcome::Bound)
            }
            None => {
                self.entries.insert(
                    name.to_string(),
                    PassLocalEntry {
                        value,
                        locked: lock,
                    },
                );
                Ok(BindOutcome::Bound)
            }
        }
    }

    pub fn try_get(&self, name: &str) -> Option<&PassLocalEntry> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> RenderResult<PassLocalEntry> {
        self.entries
            .remove(name)
            .ok_or_else(|| RenderError::not_found(ResourceKind::Value, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PassLocalEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
