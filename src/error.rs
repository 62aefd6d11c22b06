//! Error types shared by every layer of the renderer.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;
use crate::values::ValueType;

/// The kind of named thing an operation failed to find or tried to duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pass,
    ObjectPass,
    Object,
    VertexBuffer,
    IndexBuffer,
    Program,
    Value,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pass => "pass",
            Self::ObjectPass => "object pass",
            Self::Object => "object",
            Self::VertexBuffer => "vertex buffer",
            Self::IndexBuffer => "index buffer",
            Self::Program => "shader program",
            Self::Value => "value",
        };
        f.write_str(name)
    }
}

/// Renderer error type
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: ResourceKind, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("input '{name}' is not declared by shader '{program}'")]
    NotDeclared { name: String, program: String },

    #[error(
        "type mismatch{}: expected {expected}, found {found}",
        .name.as_deref().map(|n| format!(" for '{n}'")).unwrap_or_default()
    )]
    TypeMismatch {
        name: Option<String>,
        expected: ValueType,
        found: ValueType,
    },

    #[error("input '{name}' is already declared as {existing}, cannot redeclare as {requested}")]
    TypeConflict {
        name: String,
        existing: ValueType,
        requested: ValueType,
    },

    #[error("vertex buffer '{buffer}' is incompatible with shader '{program}': {reason}")]
    AttributeMismatch {
        buffer: String,
        program: String,
        reason: String,
    },

    #[error("pass '{pass}' of object '{object}' has unsatisfied inputs: {}", .names.join(", "))]
    Unsatisfied {
        object: String,
        pass: String,
        names: Vec<String>,
    },

    #[error("pass '{pass}' of object '{object}' cannot run after '{parent}': sub-passes would form a cycle")]
    SubPassCycle {
        object: String,
        pass: String,
        parent: String,
    },

    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),

    #[error("callback failed: {0}")]
    Callback(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RenderError {
    pub(crate) fn duplicate(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Errors that indicate a bug in the host program rather than a recoverable
    /// runtime condition. These are never swallowed by the pass registry.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. } | Self::TypeConflict { .. })
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::not_found(ResourceKind::Pass, "shadow");
        assert_eq!(err.to_string(), "pass 'shadow' not found");

        let err = RenderError::TypeMismatch {
            name: Some("color".into()),
            expected: ValueType::Vec4,
            found: ValueType::Vec3,
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for 'color': expected vec4, found vec3"
        );

        let err = RenderError::TypeMismatch {
            name: None,
            expected: ValueType::Float,
            found: ValueType::Int,
        };
        assert_eq!(err.to_string(), "type mismatch: expected float, found int");
    }

    #[test]
    fn test_unsatisfied_lists_names() {
        let err = RenderError::Unsatisfied {
            object: "O".into(),
            pass: "P".into(),
            names: vec!["transform".into(), "tint".into()],
        };
        assert_eq!(
            err.to_string(),
            "pass 'P' of object 'O' has unsatisfied inputs: transform, tint"
        );
    }

    #[test]
    fn test_programming_errors() {
        let mismatch = RenderError::TypeMismatch {
            name: None,
            expected: ValueType::Float,
            found: ValueType::Int,
        };
        assert!(mismatch.is_programming_error());
        assert!(!RenderError::duplicate(ResourceKind::Object, "a").is_programming_error());
    }
}
