//! Shader programs and their introspected inputs.
//!
//! A [`ShaderProgram`] pairs a native program handle with a [`ShaderReflection`]:
//! the uniforms the program declares (name, native location, type) and the vertex
//! attributes it consumes. The declared-input set is only known once the program
//! has been compiled, which is why everything downstream type-checks at runtime.
//!
//! Reflections come either from [`ShaderCompiler`] (WGSL parsed with naga) or are
//! built by hand for backends that report their own introspection.

mod compiler;

use std::sync::Arc;

use crate::backend::{
    GraphicsBackend, ProgramHandle, ShaderStage, UniformLocation, VertexFormat,
};
use crate::error::{RenderError, RenderResult};
use crate::resources::{PendingRelease, ReleaseQueue};
use crate::values::ValueType;

pub use compiler::{CompiledShader, ShaderCompiler, ShaderSource};

/// A uniform or resource handle declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderInput {
    pub name: String,
    pub location: UniformLocation,
    pub ty: ValueType,
}

impl ShaderInput {
    pub fn new(name: impl Into<String>, location: UniformLocation, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            location,
            ty,
        }
    }
}

/// A vertex attribute consumed by a shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderAttribute {
    pub name: String,
    pub location: u32,
    pub format: VertexFormat,
}

impl ShaderAttribute {
    pub fn new(name: impl Into<String>, location: u32, format: VertexFormat) -> Self {
        Self {
            name: name.into(),
            location,
            format,
        }
    }
}

/// Introspection result for one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    inputs: Vec<ShaderInput>,
    attributes: Vec<ShaderAttribute>,
}

impl ShaderReflection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add_input`](Self::add_input) for hand-written reflections.
    ///
    /// Conflicting declarations are kept and reported by [`validate`](Self::validate),
    /// which [`ShaderProgram::create`] runs before creating the native program.
    pub fn with_input(mut self, name: &str, location: UniformLocation, ty: ValueType) -> Self {
        let input = ShaderInput::new(name, location, ty);
        if !self.inputs.contains(&input) {
            self.inputs.push(input);
        }
        self
    }

    pub fn with_attribute(mut self, name: &str, location: u32, format: VertexFormat) -> Self {
        self.add_attribute(ShaderAttribute::new(name, location, format));
        self
    }

    /// Record a declared input.
    ///
    /// Stages of one program may each declare the same input; identical
    /// redeclarations are merged. A different type fails with `TypeConflict`, a
    /// different location with `ShaderCompilation`.
    pub fn add_input(&mut self, input: ShaderInput) -> RenderResult<()> {
        match self.inputs.iter().find(|existing| existing.name == input.name) {
            Some(existing) => check_redeclaration(existing, &input),
            None => {
                self.inputs.push(input);
                Ok(())
            }
        }
    }

    /// Check that every input name has a single type and location.
    pub fn validate(&self) -> RenderResult<()> {
        for (index, input) in self.inputs.iter().enumerate() {
            for other in &self.inputs[index + 1..] {
                if other.name == input.name {
                    check_redeclaration(input, other)?;
                }
            }
        }
        Ok(())
    }

    pub fn add_attribute(&mut self, attribute: ShaderAttribute) {
        if !self.attributes.iter().any(|a| a.name == attribute.name) {
            self.attributes.push(attribute);
        }
    }

    pub fn inputs(&self) -> &[ShaderInput] {
        &self.inputs
    }

    pub fn attributes(&self) -> &[ShaderAttribute] {
        &self.attributes
    }

    pub fn input(&self, name: &str) -> Option<&ShaderInput> {
        self.inputs.iter().find(|input| input.name == name)
    }
}

fn check_redeclaration(existing: &ShaderInput, input: &ShaderInput) -> RenderResult<()> {
    if existing.ty != input.ty {
        return Err(RenderError::TypeConflict {
            name: input.name.clone(),
            existing: existing.ty,
            requested: input.ty,
        });
    }
    if existing.location != input.location {
        return Err(RenderError::ShaderCompilation(format!(
            "input '{}' is declared at both {} and {}",
            input.name, existing.location, input.location
        )));
    }
    Ok(())
}

#[derive(Debug)]
struct NativeProgram {
    handle: ProgramHandle,
    release: ReleaseQueue,
}

impl Drop for NativeProgram {
    fn drop(&mut self) {
        self.release.push(PendingRelease::Program(self.handle));
    }
}

#[derive(Debug)]
struct ProgramInner {
    name: String,
    native: NativeProgram,
    reflection: ShaderReflection,
}

/// Shared handle to a compiled program and its reflection.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    inner: Arc<ProgramInner>,
}

impl ShaderProgram {
    /// Create the native program and attach its reflection.
    pub fn create(
        backend: &mut dyn GraphicsBackend,
        release: &ReleaseQueue,
        name: &str,
        sources: &[(String, ShaderStage)],
        reflection: ShaderReflection,
    ) -> RenderResult<Self> {
        reflection.validate()?;
        let handle = backend.create_program(name, sources)?;
        log::debug!(
            "Created program '{}' ({} inputs, {} attributes)",
            name,
            reflection.inputs().len(),
            reflection.attributes().len()
        );

        Ok(Self {
            inner: Arc::new(ProgramInner {
                name: name.to_string(),
                native: NativeProgram {
                    handle,
                    release: release.clone(),
                },
                reflection,
            }),
        })
    }

    /// Create a program from a [`CompiledShader`].
    pub fn from_compiled(
        backend: &mut dyn GraphicsBackend,
        release: &ReleaseQueue,
        compiled: CompiledShader,
    ) -> RenderResult<Self> {
        Self::create(
            backend,
            release,
            &compiled.name,
            &compiled.sources,
            compiled.reflection,
        )
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn handle(&self) -> ProgramHandle {
        self.inner.native.handle
    }

    pub fn reflection(&self) -> &ShaderReflection {
        &self.inner.reflection
    }

    pub fn inputs(&self) -> &[ShaderInput] {
        self.inner.reflection.inputs()
    }

    pub fn attributes(&self) -> &[ShaderAttribute] {
        self.inner.reflection.attributes()
    }

    pub fn input(&self, name: &str) -> Option<&ShaderInput> {
        self.inner.reflection.input(name)
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

static_assertions::assert_impl_all!(ShaderProgram: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_reflection_merges_redeclarations() {
        let mut reflection = ShaderReflection::new();
        reflection
            .add_input(ShaderInput::new("tint", UniformLocation::slot(0), ValueType::Vec4))
            .unwrap();
        reflection
            .add_input(ShaderInput::new("tint", UniformLocation::slot(0), ValueType::Vec4))
            .unwrap();
        assert_eq!(reflection.inputs().len(), 1);

        let err = reflection
            .add_input(ShaderInput::new("tint", UniformLocation::slot(0), ValueType::Vec3))
            .unwrap_err();
        assert!(matches!(err, RenderError::TypeConflict { .. }));

        let err = reflection
            .add_input(ShaderInput::new("tint", UniformLocation::slot(1), ValueType::Vec4))
            .unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompilation(_)));
        assert_eq!(reflection.inputs().len(), 1);
    }

    #[test]
    fn test_conflicting_builder_inputs_rejected_at_creation() {
        let mut backend = DummyBackend::new();
        let release = ReleaseQueue::new();
        let reflection = ShaderReflection::new()
            .with_input("color", UniformLocation::slot(0), ValueType::Vec4)
            .with_input("color", UniformLocation::slot(0), ValueType::Vec4)
            .with_input("color", UniformLocation::slot(0), ValueType::Vec3);
        assert_eq!(reflection.inputs().len(), 2);

        let err = ShaderProgram::create(
            &mut backend,
            &release,
            "flat",
            &[("".into(), ShaderStage::Vertex)],
            reflection,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::TypeConflict { .. }));
        assert_eq!(backend.live_program_count(), 0);
    }

    #[test]
    fn test_program_release_on_last_drop() {
        let mut backend = DummyBackend::new();
        let release = ReleaseQueue::new();
        let reflection = ShaderReflection::new()
            .with_input("color", UniformLocation::slot(0), ValueType::Vec4)
            .with_attribute("position", 0, VertexFormat::Float32x3);

        let program = ShaderProgram::create(
            &mut backend,
            &release,
            "flat",
            &[("".into(), ShaderStage::Vertex)],
            reflection,
        )
        .unwrap();
        assert_eq!(program.input("color").unwrap().ty, ValueType::Vec4);
        assert_eq!(backend.live_program_count(), 1);

        drop(program);
        release.drain(&mut backend);
        assert_eq!(backend.live_program_count(), 0);
    }
}
