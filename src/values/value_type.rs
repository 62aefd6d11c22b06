//! Type vocabulary for shader inputs.
//!
//! [`ValueType`] is the runtime tag carried by every [`TaggedValue`](super::TaggedValue).
//! [`ShaderValue`] links a Rust type to its tag and its byte encoding, so host code can
//! write `TaggedValue::new(Vec4::ONE)` and have the tag derived from the argument type.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

/// Declared or supplied type of a shader input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    Mat2,
    Mat3,
    Mat4,
    /// Sampled texture handle.
    Texture,
    /// Texture sampler handle.
    Sampler,
}

impl ValueType {
    /// Size of the encoded payload in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Bool | Self::Int | Self::UInt | Self::Float => 4,
            Self::Vec2 | Self::IVec2 | Self::UVec2 => 8,
            Self::Vec3 | Self::IVec3 | Self::UVec3 => 12,
            Self::Vec4 | Self::IVec4 | Self::UVec4 => 16,
            Self::Mat2 => 16,
            Self::Mat3 => 36,
            Self::Mat4 => 64,
            Self::Texture | Self::Sampler => 8,
        }
    }

    /// Number of scalar components (matrices count every element).
    pub fn components(&self) -> u32 {
        match self {
            Self::Bool | Self::Int | Self::UInt | Self::Float => 1,
            Self::Vec2 | Self::IVec2 | Self::UVec2 => 2,
            Self::Vec3 | Self::IVec3 | Self::UVec3 => 3,
            Self::Vec4 | Self::IVec4 | Self::UVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
            Self::Texture | Self::Sampler => 1,
        }
    }

    /// Whether the value is a resource handle rather than plain data.
    pub fn is_handle(&self) -> bool {
        matches!(self, Self::Texture | Self::Sampler)
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Self::Mat2 | Self::Mat3 | Self::Mat4)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::IVec2 => "ivec2",
            Self::IVec3 => "ivec3",
            Self::IVec4 => "ivec4",
            Self::UVec2 => "uvec2",
            Self::UVec3 => "uvec3",
            Self::UVec4 => "uvec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
        };
        f.write_str(name)
    }
}

/// Native handle of a texture bound as a shader input.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct TextureBinding(pub u64);

/// Native handle of a sampler bound as a shader input.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct SamplerBinding(pub u64);

/// A Rust type that can be stored in a [`TaggedValue`](super::TaggedValue).
///
/// `encode` writes exactly `VALUE_TYPE.size()` bytes at the start of `payload`;
/// `decode` reads them back. Callers guarantee `payload` is at least that long.
pub trait ShaderValue: Copy + 'static {
    const VALUE_TYPE: ValueType;

    fn encode(&self, payload: &mut [u8]);

    fn decode(payload: &[u8]) -> Self;
}

macro_rules! pod_shader_value {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl ShaderValue for $ty {
                const VALUE_TYPE: ValueType = ValueType::$tag;

                fn encode(&self, payload: &mut [u8]) {
                    let bytes = bytemuck::bytes_of(self);
                    payload[..bytes.len()].copy_from_slice(bytes);
                }

                fn decode(payload: &[u8]) -> Self {
                    bytemuck::pod_read_unaligned(&payload[..std::mem::size_of::<Self>()])
                }
            }
        )*
    };
}

pod_shader_value! {
    i32 => Int,
    u32 => UInt,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    [f32; 2] => Vec2,
    [f32; 3] => Vec3,
    [f32; 4] => Vec4,
    IVec2 => IVec2,
    IVec3 => IVec3,
    IVec4 => IVec4,
    UVec2 => UVec2,
    UVec3 => UVec3,
    UVec4 => UVec4,
    Mat2 => Mat2,
    Mat3 => Mat3,
    Mat4 => Mat4,
    [[f32; 4]; 4] => Mat4,
    TextureBinding => Texture,
    SamplerBinding => Sampler,
}

// Booleans travel as 32-bit integers, matching shader-side bool layout.
impl ShaderValue for bool {
    const VALUE_TYPE: ValueType = ValueType::Bool;

    fn encode(&self, payload: &mut [u8]) {
        u32::from(*self).encode(payload);
    }

    fn decode(payload: &[u8]) -> Self {
        u32::decode(payload) != 0
    }
}
