//! The declared-input registry.
//!
//! Every input name used anywhere in a renderer instance (declared by a shader,
//! or introduced by a host write to any value store) is bound to exactly one
//! [`ValueType`] for the lifetime of that instance. The registry is shared by
//! cloning: all clones see the same table.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{RenderError, RenderResult};

use super::tagged::TaggedValue;
use super::value_type::ValueType;

/// Name → declared type table shared by every store and pass of one renderer.
#[derive(Clone, Default)]
pub struct InputRegistry {
    types: Arc<RwLock<HashMap<String, ValueType>>>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as `declared`, or confirm an earlier registration.
    ///
    /// Fails with `TypeConflict` if the name is already bound to another type.
    pub fn declare(&self, name: &str, declared: ValueType) -> RenderResult<()> {
        if let Some(existing) = self.types.read().get(name).copied() {
            return Self::check_conflict(name, existing, declared);
        }

        let mut types = self.types.write();
        // Another clone may have declared it between the two locks.
        let existing = *types.entry(name.to_string()).or_insert(declared);
        Self::check_conflict(name, existing, declared)?;
        log::trace!("Declared input '{}' as {}", name, declared);
        Ok(())
    }

    /// Type-check a supplied value against the registry.
    ///
    /// Unknown names are declared with the value's type; known names must match
    /// exactly or the write fails with `TypeMismatch`.
    pub fn check_value(&self, name: &str, value: &TaggedValue) -> RenderResult<()> {
        match self.declared_type(name) {
            Some(expected) => value.expect_type(expected, Some(name)),
            None => self.declare(name, value.value_type()).map_err(|err| match err {
                RenderError::TypeConflict {
                    name,
                    existing,
                    requested,
                } => RenderError::TypeMismatch {
                    name: Some(name),
                    expected: existing,
                    found: requested,
                },
                other => other,
            }),
        }
    }

    pub fn declared_type(&self, name: &str) -> Option<ValueType> {
        self.types.read().get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Forget every declaration. Only meant for full teardown.
    pub fn clear(&self) {
        self.types.write().clear();
    }

    fn check_conflict(name: &str, existing: ValueType, requested: ValueType) -> RenderResult<()> {
        if existing == requested {
            Ok(())
        } else {
            Err(RenderError::TypeConflict {
                name: name.to_string(),
                existing,
                requested,
            })
        }
    }
}

impl std::fmt::Debug for InputRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputRegistry")
            .field("declared", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;

    #[test]
    fn test_declare_is_idempotent() {
        let registry = InputRegistry::new();
        registry.declare("color", ValueType::Vec4).unwrap();
        registry.declare("color", ValueType::Vec4).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.declared_type("color"), Some(ValueType::Vec4));
    }

    #[test]
    fn test_conflicting_declaration() {
        let registry = InputRegistry::new();
        registry.declare("color", ValueType::Vec4).unwrap();
        let err = registry.declare("color", ValueType::Vec3).unwrap_err();
        assert!(matches!(err, RenderError::TypeConflict { .. }));
        // The first declaration stays.
        assert_eq!(registry.declared_type("color"), Some(ValueType::Vec4));
    }

    #[test]
    fn test_check_value_declares_unknown_names() {
        let registry = InputRegistry::new();
        registry
            .check_value("tint", &TaggedValue::new(Vec3::ONE))
            .unwrap();
        assert_eq!(registry.declared_type("tint"), Some(ValueType::Vec3));

        let err = registry
            .check_value("tint", &TaggedValue::new(Vec4::ONE))
            .unwrap_err();
        assert!(matches!(err, RenderError::TypeMismatch { .. }));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = InputRegistry::new();
        let clone = registry.clone();
        clone.declare("time", ValueType::Float).unwrap();
        assert!(registry.contains("time"));

        registry.clear();
        assert!(clone.is_empty());
    }
}
