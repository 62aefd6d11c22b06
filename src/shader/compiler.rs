//! WGSL loading and input introspection via naga.
//!
//! Each `(source, stage)` pair is parsed and validated, then the module's
//! resource globals and the stage's entry-point arguments are walked:
//!
//! - `var<uniform>` globals of scalar, vector or matrix type become one input
//!   named after the variable;
//! - `var<uniform>` globals of struct type are flattened, one input per member,
//!   named after the member and located by the member's byte offset. A member
//!   name shared by two blocks is rejected, since inputs are addressed by name;
//! - texture and sampler globals become `texture` / `sampler` handle inputs;
//! - `@location` arguments of the vertex entry point (directly or as struct
//!   members) become vertex attributes.

use std::path::PathBuf;

use naga::{AddressSpace, Binding, Handle, Module, ScalarKind, Type, TypeInner, VectorSize};

use crate::backend::{ShaderStage, UniformLocation, VertexFormat};
use crate::error::{RenderError, RenderResult};
use crate::values::ValueType;

use super::{ShaderAttribute, ShaderInput, ShaderReflection};

/// Where a stage's WGSL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    Inline(String),
    File(PathBuf),
}

impl ShaderSource {
    pub fn inline(source: impl Into<String>) -> Self {
        Self::Inline(source.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Read the source text.
    pub fn load(&self) -> RenderResult<String> {
        match self {
            ShaderSource::Inline(source) => Ok(source.clone()),
            ShaderSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                RenderError::ShaderCompilation(format!("cannot read {}: {e}", path.display()))
            }),
        }
    }
}

/// Output of [`ShaderCompiler::compile`], ready to hand to a backend.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub name: String,
    pub sources: Vec<(String, ShaderStage)>,
    pub reflection: ShaderReflection,
}

/// Parses WGSL stages and extracts their declared inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShaderCompiler;

impl ShaderCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Load, validate and introspect every stage of a program.
    pub fn compile(
        &self,
        name: &str,
        stages: &[(ShaderSource, ShaderStage)],
    ) -> RenderResult<CompiledShader> {
        if stages.is_empty() {
            return Err(RenderError::ShaderCompilation(format!(
                "program '{name}' has no stages"
            )));
        }

        let mut reflection = ShaderReflection::new();
        let mut sources = Vec::with_capacity(stages.len());

        for (source, stage) in stages {
            let text = source.load()?;
            let module = Self::parse(name, &text)?;
            Self::reflect(&module, *stage, &mut reflection).map_err(|err| match err {
                RenderError::ShaderCompilation(msg) => {
                    RenderError::ShaderCompilation(format!("{name}: {msg}"))
                }
                other => other,
            })?;
            sources.push((text, *stage));
        }

        log::debug!(
            "Compiled program '{}': inputs [{}], attributes [{}]",
            name,
            reflection
                .inputs()
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            reflection
                .attributes()
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(CompiledShader {
            name: name.to_string(),
            sources,
            reflection,
        })
    }

    fn parse(name: &str, source: &str) -> RenderResult<Module> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| {
            RenderError::ShaderCompilation(format!("{name}: {}", e.emit_to_string(source)))
        })?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator.validate(&module).map_err(|e| {
            RenderError::ShaderCompilation(format!("{name}: validation error: {e}"))
        })?;

        Ok(module)
    }

    fn reflect(
        module: &Module,
        stage: ShaderStage,
        reflection: &mut ShaderReflection,
    ) -> RenderResult<()> {
        let naga_stage = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
        };
        if !module.entry_points.iter().any(|ep| ep.stage == naga_stage) {
            return Err(RenderError::ShaderCompilation(format!(
                "no {stage:?} entry point"
            )));
        }

        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            let location = |offset| UniformLocation {
                group: binding.group,
                binding: binding.binding,
                offset,
            };

            match (&global.space, &module.types[global.ty].inner) {
                (AddressSpace::Uniform, TypeInner::Struct { members, .. }) => {
                    for member in members {
                        let Some(name) = &member.name else {
                            continue;
                        };
                        match value_type(module, member.ty) {
                            Some(ty) => reflection.add_input(ShaderInput::new(
                                name.as_str(),
                                location(member.offset),
                                ty,
                            ))?,
                            None => {
                                log::warn!("Skipping uniform member '{}' of unsupported type", name)
                            }
                        }
                    }
                }
                (AddressSpace::Uniform | AddressSpace::Handle, _) => {
                    let Some(name) = &global.name else {
                        continue;
                    };
                    match value_type(module, global.ty) {
                        Some(ty) => {
                            reflection.add_input(ShaderInput::new(name.as_str(), location(0), ty))?
                        }
                        None => log::warn!("Skipping uniform '{}' of unsupported type", name),
                    }
                }
                _ => {}
            }
        }

        if stage == ShaderStage::Vertex {
            for entry in module
                .entry_points
                .iter()
                .filter(|ep| ep.stage == naga::ShaderStage::Vertex)
            {
                for argument in &entry.function.arguments {
                    match (&argument.binding, &module.types[argument.ty].inner) {
                        (Some(binding), _) => {
                            Self::reflect_attribute(
                                module,
                                argument.name.as_deref(),
                                argument.ty,
                                binding,
                                reflection,
                            )?;
                        }
                        (None, TypeInner::Struct { members, .. }) => {
                            for member in members {
                                if let Some(binding) = &member.binding {
                                    Self::reflect_attribute(
                                        module,
                                        member.name.as_deref(),
                                        member.ty,
                                        binding,
                                        reflection,
                                    )?;
                                }
                            }
                        }
                        (None, _) => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn reflect_attribute(
        module: &Module,
        name: Option<&str>,
        ty: Handle<Type>,
        binding: &Binding,
        reflection: &mut ShaderReflection,
    ) -> RenderResult<()> {
        let Binding::Location { location, .. } = binding else {
            return Ok(()); // builtins are not vertex attributes
        };
        let name = name.ok_or_else(|| {
            RenderError::ShaderCompilation(format!("vertex input @location({location}) has no name"))
        })?;
        let format = vertex_format(module, ty).ok_or_else(|| {
            RenderError::ShaderCompilation(format!(
                "vertex input '{name}' has an unsupported type"
            ))
        })?;
        reflection.add_attribute(ShaderAttribute::new(name, *location, format));
        Ok(())
    }
}

fn value_type(module: &Module, ty: Handle<Type>) -> Option<ValueType> {
    use ValueType as V;

    match &module.types[ty].inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => Some(V::Float),
            ScalarKind::Sint => Some(V::Int),
            ScalarKind::Uint => Some(V::UInt),
            ScalarKind::Bool => Some(V::Bool),
            _ => None,
        },
        TypeInner::Vector { size, scalar } => match (scalar.kind, size) {
            (ScalarKind::Float, VectorSize::Bi) => Some(V::Vec2),
            (ScalarKind::Float, VectorSize::Tri) => Some(V::Vec3),
            (ScalarKind::Float, VectorSize::Quad) => Some(V::Vec4),
            (ScalarKind::Sint, VectorSize::Bi) => Some(V::IVec2),
            (ScalarKind::Sint, VectorSize::Tri) => Some(V::IVec3),
            (ScalarKind::Sint, VectorSize::Quad) => Some(V::IVec4),
            (ScalarKind::Uint, VectorSize::Bi) => Some(V::UVec2),
            (ScalarKind::Uint, VectorSize::Tri) => Some(V::UVec3),
            (ScalarKind::Uint, VectorSize::Quad) => Some(V::UVec4),
            _ => None,
        },
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if scalar.kind == ScalarKind::Float => match (columns, rows) {
            (VectorSize::Bi, VectorSize::Bi) => Some(V::Mat2),
            (VectorSize::Tri, VectorSize::Tri) => Some(V::Mat3),
            (VectorSize::Quad, VectorSize::Quad) => Some(V::Mat4),
            _ => None,
        },
        TypeInner::Image { .. } => Some(V::Texture),
        TypeInner::Sampler { .. } => Some(V::Sampler),
        _ => None,
    }
}

fn vertex_format(module: &Module, ty: Handle<Type>) -> Option<VertexFormat> {
    use VertexFormat as F;

    let (kind, components) = match &module.types[ty].inner {
        TypeInner::Scalar(scalar) => (scalar.kind, 1),
        TypeInner::Vector { size, scalar } => (scalar.kind, *size as u8),
        _ => return None,
    };

    match (kind, components) {
        (ScalarKind::Float, 1) => Some(F::Float32),
        (ScalarKind::Float, 2) => Some(F::Float32x2),
        (ScalarKind::Float, 3) => Some(F::Float32x3),
        (ScalarKind::Float, 4) => Some(F::Float32x4),
        (ScalarKind::Uint, 1) => Some(F::Uint32),
        (ScalarKind::Uint, 2) => Some(F::Uint32x2),
        (ScalarKind::Uint, 3) => Some(F::Uint32x3),
        (ScalarKind::Uint, 4) => Some(F::Uint32x4),
        (ScalarKind::Sint, 1) => Some(F::Sint32),
        (ScalarKind::Sint, 2) => Some(F::Sint32x2),
        (ScalarKind::Sint, 3) => Some(F::Sint32x3),
        (ScalarKind::Sint, 4) => Some(F::Sint32x4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXTURED: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    eye: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(1) @binding(0) var<uniform> tint: vec4<f32>;
@group(1) @binding(1) var albedo: texture_2d<f32>;
@group(1) @binding(2) var albedo_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = camera.view_proj * vec4<f32>(in.position, 1.0);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, in.uv) * tint;
}
"#;

    fn compile_textured() -> CompiledShader {
        ShaderCompiler::new()
            .compile(
                "textured",
                &[
                    (ShaderSource::inline(TEXTURED), ShaderStage::Vertex),
                    (ShaderSource::inline(TEXTURED), ShaderStage::Fragment),
                ],
            )
            .unwrap()
    }

    #[test]
    fn test_uniform_inputs() {
        let compiled = compile_textured();
        let reflection = &compiled.reflection;

        let view_proj = reflection.input("view_proj").unwrap();
        assert_eq!(view_proj.ty, ValueType::Mat4);
        assert_eq!(view_proj.location, UniformLocation { group: 0, binding: 0, offset: 0 });

        let eye = reflection.input("eye").unwrap();
        assert_eq!(eye.ty, ValueType::Vec4);
        assert_eq!(eye.location.offset, 64);

        assert_eq!(reflection.input("tint").unwrap().ty, ValueType::Vec4);
        assert_eq!(reflection.input("albedo").unwrap().ty, ValueType::Texture);
        assert_eq!(
            reflection.input("albedo_sampler").unwrap().ty,
            ValueType::Sampler
        );
        // Both stages see the same globals; they are merged.
        assert_eq!(reflection.inputs().len(), 5);
        assert_eq!(compiled.sources.len(), 2);
    }

    #[test]
    fn test_vertex_attributes() {
        let compiled = compile_textured();
        let attributes = compiled.reflection.attributes();
        assert_eq!(
            attributes,
            &[
                ShaderAttribute::new("position", 0, VertexFormat::Float32x3),
                ShaderAttribute::new("uv", 1, VertexFormat::Float32x2),
            ]
        );
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = ShaderCompiler::new()
            .compile(
                "broken",
                &[(ShaderSource::inline("fn main( {"), ShaderStage::Vertex)],
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompilation(_)));
    }

    #[test]
    fn test_missing_entry_point() {
        let err = ShaderCompiler::new()
            .compile(
                "textured",
                &[(ShaderSource::inline(TEXTURED), ShaderStage::Compute)],
            )
            .unwrap_err();
        assert!(err.to_string().contains("Compute"));
    }

    #[test]
    fn test_missing_file() {
        let err = ShaderCompiler::new()
            .compile(
                "missing",
                &[(
                    ShaderSource::file("/nonexistent/shader.wgsl"),
                    ShaderStage::Vertex,
                )],
            )
            .unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_member_name_shared_by_two_blocks() {
        let source = r#"
struct A { pos: vec4<f32> }
struct B { pos: vec4<f32> }

@group(0) @binding(0) var<uniform> a: A;
@group(0) @binding(1) var<uniform> b: B;

@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return a.pos + b.pos;
}
"#;
        let err = ShaderCompiler::new()
            .compile("ambiguous", &[(ShaderSource::inline(source), ShaderStage::Vertex)])
            .unwrap_err();
        match err {
            RenderError::ShaderCompilation(msg) => {
                assert!(msg.contains("'pos'"), "{msg}");
                assert!(msg.contains("0:0+0") && msg.contains("0:1+0"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
