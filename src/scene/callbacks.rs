//! Render-time hooks attached to object passes and registry passes.

use crate::backend::{GraphicsBackend, PrimitiveTopology};
use crate::error::{RenderError, RenderResult};
use crate::shader::{ShaderInput, ShaderProgram};
use crate::values::TaggedValue;

/// Computes values that no store could supply, once per frame.
///
/// Invoked with the inputs still unsatisfied after the pass-local, pass-scope and
/// system-wide lookups. A callback may provide any subset of them.
pub type ValueComputeCallback = Box<dyn FnMut(&mut ValueRequest<'_>) -> RenderResult<()> + Send>;

/// Replaces the default indexed draw of an object pass.
pub type RenderCallback = Box<dyn FnMut(&mut DrawContext<'_>) -> RenderResult<()> + Send>;

/// Runs before or after every object of a registry pass.
pub type PassHook = Box<dyn FnMut(&str, &mut dyn GraphicsBackend) -> RenderResult<()> + Send>;

/// The unsatisfied inputs of one object pass, handed to value-compute callbacks.
pub struct ValueRequest<'a> {
    pub(crate) object: &'a str,
    pub(crate) pass: &'a str,
    pub(crate) program: &'a ShaderProgram,
    pub(crate) backend: &'a mut dyn GraphicsBackend,
    pub(crate) pending: Vec<ShaderInput>,
}

impl<'a> ValueRequest<'a> {
    pub fn object(&self) -> &str {
        self.object
    }

    pub fn pass(&self) -> &str {
        self.pass
    }

    /// Inputs nobody has supplied yet.
    pub fn unsatisfied(&self) -> &[ShaderInput] {
        &self.pending
    }

    pub fn is_unsatisfied(&self, name: &str) -> bool {
        self.pending.iter().any(|input| input.name == name)
    }

    /// Apply a computed value to the pass's program.
    ///
    /// The value is type-checked against the declaration and written straight to
    /// the backend; it is not stored anywhere, so the callback runs again next frame.
    /// Inputs already resolved from a store are left alone: the write is skipped
    /// and logged.
    pub fn provide(&mut self, name: &str, value: impl Into<TaggedValue>) -> RenderResult<()> {
        self.provide_value(name, &value.into())
    }

    pub fn provide_value(&mut self, name: &str, value: &TaggedValue) -> RenderResult<()> {
        let input = self
            .program
            .input(name)
            .ok_or_else(|| RenderError::NotDeclared {
                name: name.to_string(),
                program: self.program.name().to_string(),
            })?;
        value.expect_type(input.ty, Some(name))?;
        if !self.is_unsatisfied(name) {
            log::warn!(
                "{}/{}: ignoring computed '{}', already resolved",
                self.object,
                self.pass,
                name
            );
            return Ok(());
        }
        self.backend.set_uniform(input.location, value)?;
        log::trace!(
            "{}/{}: computed '{}' ({})",
            self.object,
            self.pass,
            name,
            input.ty
        );

        self.pending.retain(|pending| pending.name != name);
        Ok(())
    }
}

/// State handed to custom render callbacks once all inputs are bound.
pub struct DrawContext<'a> {
    pub(crate) object: &'a str,
    pub(crate) pass: &'a str,
    pub(crate) backend: &'a mut dyn GraphicsBackend,
    pub(crate) topology: PrimitiveTopology,
    pub(crate) index_count: u32,
}

impl<'a> DrawContext<'a> {
    pub fn object(&self) -> &str {
        self.object
    }

    pub fn pass(&self) -> &str {
        self.pass
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// The backend, with program, buffers and uniforms already bound.
    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        &mut *self.backend
    }

    /// Issue the draw the pass would have issued without callbacks.
    pub fn draw(&mut self) -> RenderResult<()> {
        self.backend.draw_indexed(self.topology, self.index_count)?;
        Ok(())
    }
}
