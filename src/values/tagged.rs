//! Runtime type-tagged shader input values.

use std::fmt;
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

use super::value_type::{ShaderValue, ValueType};

/// Payload capacity, sized for the largest supported type (`mat4`).
pub const MAX_VALUE_SIZE: usize = 64;

/// A value as held by the value stores. Stores share values instead of copying them.
pub type SharedValue = Arc<TaggedValue>;

/// An immutable shader input value together with its type tag.
///
/// The payload layout is determined entirely by the tag, so every read goes
/// through [`TaggedValue::get`], which refuses to decode under a different type.
///
/// # Example
///
/// ```
/// use glam::Vec4;
/// use retained_graphics::values::{TaggedValue, ValueType};
///
/// let color = TaggedValue::new(Vec4::new(1.0, 0.0, 0.0, 1.0));
/// assert_eq!(color.value_type(), ValueType::Vec4);
/// assert!(color.get::<f32>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct TaggedValue {
    ty: ValueType,
    payload: [u8; MAX_VALUE_SIZE],
}

impl TaggedValue {
    /// Create a value whose tag is derived from `T`.
    pub fn new<T: ShaderValue>(value: T) -> Self {
        let mut payload = [0u8; MAX_VALUE_SIZE];
        value.encode(&mut payload);
        Self {
            ty: T::VALUE_TYPE,
            payload,
        }
    }

    /// Create a value already wrapped for sharing between stores.
    pub fn shared<T: ShaderValue>(value: T) -> SharedValue {
        Arc::new(Self::new(value))
    }

    /// Rebuild a value from raw bytes, e.g. bytes read back from a backend.
    ///
    /// Returns `None` if `bytes` is not exactly the encoded size of `ty`.
    pub fn from_bytes(ty: ValueType, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ty.size() {
            return None;
        }
        let mut payload = [0u8; MAX_VALUE_SIZE];
        payload[..bytes.len()].copy_from_slice(bytes);
        Some(Self { ty, payload })
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    /// Decode the value as `T`, failing if `T` is not the stored type.
    pub fn get<T: ShaderValue>(&self) -> RenderResult<T> {
        self.expect_type(T::VALUE_TYPE, None)?;
        Ok(T::decode(&self.payload))
    }

    /// Fail with `TypeMismatch` unless this value carries `expected`.
    pub fn expect_type(&self, expected: ValueType, name: Option<&str>) -> RenderResult<()> {
        if self.ty == expected {
            Ok(())
        } else {
            Err(RenderError::TypeMismatch {
                name: name.map(str::to_owned),
                expected,
                found: self.ty,
            })
        }
    }

    /// The encoded bytes, exactly `value_type().size()` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload[..self.ty.size()]
    }
}

impl fmt::Debug for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedValue")
            .field("ty", &self.ty)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

impl<T: ShaderValue> From<T> for TaggedValue {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
