//! One object drawn in one pass.
//!
//! An [`ObjectPass`] binds a shader program to a vertex buffer, an index buffer
//! and a primitive topology. Its inputs are always partitioned in two: values
//! bound on the pass itself (pass-local, possibly propagated from the owning
//! object) and inputs still unsatisfied. Rendering resolves the unsatisfied ones
//! in this order, every frame:
//!
//! ```text
//! pass-local  ->  pass-scope[pass name]  ->  system-wide  ->  compute callbacks
//! ```
//!
//! Anything left after the callbacks fails the pass with `Unsatisfied`.

use std::fmt;

use crate::backend::{GraphicsBackend, PrimitiveTopology, RenderState};
use crate::error::{RenderError, RenderResult};
use crate::resources::{IndexBuffer, VertexBuffer};
use crate::shader::{ShaderInput, ShaderProgram};
use crate::values::{
    BindOutcome, BindScope, InputRegistry, PassLocalEntry, PassLocalStore, PassScopeStore,
    SharedValue, ValueStore,
};

use super::callbacks::{DrawContext, RenderCallback, ValueComputeCallback, ValueRequest};

/// Everything an object pass draws with.
#[derive(Debug, Clone)]
pub struct PassBinding {
    pub program: ShaderProgram,
    pub vertex_buffer: VertexBuffer,
    pub index_buffer: IndexBuffer,
    pub topology: PrimitiveTopology,
}

/// Shared state needed to render object passes.
pub struct RenderContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub pass_scope: &'a PassScopeStore,
    pub system: &'a ValueStore,
}

pub struct ObjectPass {
    name: String,
    binding: PassBinding,
    values: PassLocalStore,
    unsatisfied: Vec<ShaderInput>,
    state_override: Option<RenderState>,
    compute_callbacks: Vec<ValueComputeCallback>,
    render_callbacks: Vec<RenderCallback>,
}

impl ObjectPass {
    /// Bind a program to buffers.
    ///
    /// Fails with `AttributeMismatch` if the vertex layout does not provide every
    /// attribute the program consumes, and with `TypeConflict` if one of the
    /// program's inputs was already declared elsewhere with another type.
    pub fn new(name: &str, binding: PassBinding, registry: InputRegistry) -> RenderResult<Self> {
        let program = &binding.program;
        binding
            .vertex_buffer
            .layout()
            .check_compatible(program.attributes())
            .map_err(|reason| RenderError::AttributeMismatch {
                buffer: binding.vertex_buffer.name().to_string(),
                program: program.name().to_string(),
                reason,
            })?;

        for input in program.inputs() {
            registry.declare(&input.name, input.ty)?;
        }

        let unsatisfied = program.inputs().to_vec();
        log::debug!(
            "Object pass '{}' uses program '{}' with {} inputs",
            name,
            program.name(),
            unsatisfied.len()
        );

        Ok(Self {
            name: name.to_string(),
            binding,
            values: PassLocalStore::new(registry),
            unsatisfied,
            state_override: None,
            compute_callbacks: Vec::new(),
            render_callbacks: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.binding.program
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.binding.vertex_buffer
    }

    pub fn index_buffer(&self) -> &IndexBuffer {
        &self.binding.index_buffer
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.binding.topology
    }

    /// Whether the program declares `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.binding.program.input(name).is_some()
    }

    /// Bind a value to this pass.
    ///
    /// An object-wide write never replaces a value bound on the pass itself; the
    /// write is dropped and [`BindOutcome::Shadowed`] is returned instead.
    pub fn add_value(
        &mut self,
        name: &str,
        value: SharedValue,
        scope: BindScope,
    ) -> RenderResult<BindOutcome> {
        let declared = self
            .binding
            .program
            .input(name)
            .map(|input| input.ty)
            .ok_or_else(|| RenderError::NotDeclared {
                name: name.to_string(),
                program: self.binding.program.name().to_string(),
            })?;
        value.expect_type(declared, Some(name))?;

        let outcome = self.values.bind(name, value, scope)?;
        if outcome == BindOutcome::Bound {
            self.unsatisfied.retain(|input| input.name != name);
        }
        Ok(outcome)
    }

    /// Unbind a pass-local value; the input becomes unsatisfied again.
    pub fn remove_value(&mut self, name: &str) -> RenderResult<SharedValue> {
        let entry = self.values.remove(name)?;
        self.mark_unsatisfied(name);
        Ok(entry.value)
    }

    /// Unbind `name` only if it arrived from the object-wide scope.
    ///
    /// Returns whether anything was removed.
    pub fn remove_object_wide_value(&mut self, name: &str) -> bool {
        let shadowable = self.values.try_get(name).is_some_and(|entry| !entry.locked);
        if shadowable && self.values.remove(name).is_ok() {
            self.mark_unsatisfied(name);
        }
        shadowable
    }

    fn mark_unsatisfied(&mut self, name: &str) {
        if let Some(input) = self.binding.program.input(name) {
            if !self.unsatisfied.iter().any(|pending| pending.name == name) {
                self.unsatisfied.push(input.clone());
            }
        }
    }

    /// Names of declared inputs without a pass-local value.
    pub fn unsatisfied_inputs(&self) -> impl Iterator<Item = &str> {
        self.unsatisfied.iter().map(|input| input.name.as_str())
    }

    pub fn is_unsatisfied(&self, name: &str) -> bool {
        self.unsatisfied.iter().any(|input| input.name == name)
    }

    /// The pass-local binding of `name`, with its lock flag.
    pub fn bound_value(&self, name: &str) -> Option<&PassLocalEntry> {
        self.values.try_get(name)
    }

    pub fn bound_values(&self) -> impl Iterator<Item = (&str, &PassLocalEntry)> {
        self.values.iter()
    }

    /// Fixed-function state to use while this pass draws. `None` keeps whatever
    /// state is current.
    pub fn set_state_override(&mut self, state: Option<RenderState>) {
        self.state_override = state;
    }

    pub fn state_override(&self) -> Option<&RenderState> {
        self.state_override.as_ref()
    }

    pub fn add_compute_callback(
        &mut self,
        callback: impl FnMut(&mut ValueRequest<'_>) -> RenderResult<()> + Send + 'static,
    ) {
        self.compute_callbacks.push(Box::new(callback));
    }

    pub fn add_render_callback(
        &mut self,
        callback: impl FnMut(&mut DrawContext<'_>) -> RenderResult<()> + Send + 'static,
    ) {
        self.render_callbacks.push(Box::new(callback));
    }

    /// Resolve every input and draw.
    ///
    /// The backend's render state is restored afterwards, also when resolution or
    /// drawing fails.
    pub fn render(&mut self, object: &str, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let previous = ctx.backend.render_state();
        if let Some(state) = &self.state_override {
            ctx.backend.set_render_state(state);
        }

        let result = self.resolve_and_draw(object, ctx);

        if self.state_override.is_some() {
            ctx.backend.set_render_state(&previous);
        }
        result
    }

    fn resolve_and_draw(&mut self, object: &str, ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        let binding = &self.binding;
        let backend: &mut dyn GraphicsBackend = &mut *ctx.backend;

        backend.use_program(binding.program.handle());
        backend.bind_vertex_buffer(binding.vertex_buffer.handle(), binding.vertex_buffer.layout());
        backend.bind_index_buffer(binding.index_buffer.handle(), binding.index_buffer.format());

        for (name, entry) in self.values.iter() {
            if let Some(input) = binding.program.input(name) {
                backend.set_uniform(input.location, &entry.value)?;
            }
        }

        let mut pending = Vec::new();
        for input in &self.unsatisfied {
            let found = ctx
                .pass_scope
                .try_get(&self.name, &input.name)
                .or_else(|| ctx.system.try_get(&input.name));
            match found {
                Some(value) => {
                    value.expect_type(input.ty, Some(&input.name))?;
                    backend.set_uniform(input.location, value)?;
                }
                None => pending.push(input.clone()),
            }
        }

        if !pending.is_empty() && !self.compute_callbacks.is_empty() {
            let mut request = ValueRequest {
                object,
                pass: &self.name,
                program: &binding.program,
                backend: &mut *backend,
                pending,
            };
            for callback in &mut self.compute_callbacks {
                if request.pending.is_empty() {
                    break;
                }
                callback(&mut request)?;
            }
            pending = request.pending;
        }

        if !pending.is_empty() {
            return Err(RenderError::Unsatisfied {
                object: object.to_string(),
                pass: self.name.clone(),
                names: pending.into_iter().map(|input| input.name).collect(),
            });
        }

        let index_count = binding.index_buffer.index_count();
        if self.render_callbacks.is_empty() {
            backend.draw_indexed(binding.topology, index_count)?;
        } else {
            let mut draw = DrawContext {
                object,
                pass: &self.name,
                backend,
                topology: binding.topology,
                index_count,
            };
            for callback in &mut self.render_callbacks {
                callback(&mut draw)?;
            }
        }

        log::trace!("Rendered {}/{}", object, self.name);
        Ok(())
    }
}

impl fmt::Debug for ObjectPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPass")
            .field("name", &self.name)
            .field("program", &self.binding.program.name())
            .field("vertex_buffer", &self.binding.vertex_buffer.name())
            .field("index_buffer", &self.binding.index_buffer.name())
            .field("topology", &self.binding.topology)
            .field("values", &self.values.len())
            .field("unsatisfied", &self.unsatisfied.len())
            .field("compute_callbacks", &self.compute_callbacks.len())
            .field("render_callbacks", &self.render_callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec4};

    use super::*;
    use crate::backend::{BackendCall, DummyBackend, UniformLocation, VertexFormat};
    use crate::resources::{IndexData, ReleaseQueue, VertexLayout};
    use crate::shader::ShaderReflection;
    use crate::values::{TaggedValue, ValueType};

    const COLOR: UniformLocation = UniformLocation {
        group: 0,
        binding: 0,
        offset: 0,
    };
    const TRANSFORM: UniformLocation = UniformLocation {
        group: 0,
        binding: 1,
        offset: 0,
    };

    struct Fixture {
        backend: DummyBackend,
        registry: InputRegistry,
        binding: PassBinding,
        pass_scope: PassScopeStore,
        system: ValueStore,
    }

    impl Fixture {
        fn new() -> Self {
            let mut backend = DummyBackend::new();
            let release = ReleaseQueue::new();
            let registry = InputRegistry::new();
            let reflection = ShaderReflection::new()
                .with_input("color", COLOR, ValueType::Vec4)
                .with_input("transform", TRANSFORM, ValueType::Mat4)
                .with_attribute("position", 0, VertexFormat::Float32x3);
            let program = ShaderProgram::create(
                &mut backend,
                &release,
                "S",
                &[(String::new(), crate::backend::ShaderStage::Vertex)],
                reflection,
            )
            .unwrap();
            let layout = VertexLayout::packed(&[("position", VertexFormat::Float32x3)]);
            let vertex_buffer =
                VertexBuffer::create(&mut backend, &release, "tri", &[0u8; 36], layout).unwrap();
            let index_buffer =
                IndexBuffer::create(&mut backend, &release, "tri", &IndexData::U16(vec![0, 1, 2]))
                    .unwrap();
            backend.take_calls();

            Self {
                backend,
                pass_scope: PassScopeStore::new(registry.clone()),
                system: ValueStore::new(registry.clone()),
                registry,
                binding: PassBinding {
                    program,
                    vertex_buffer,
                    index_buffer,
                    topology: PrimitiveTopology::TriangleList,
                },
            }
        }

        fn pass(&self, name: &str) -> ObjectPass {
            ObjectPass::new(name, self.binding.clone(), self.registry.clone()).unwrap()
        }

        fn render(&mut self, pass: &mut ObjectPass) -> RenderResult<()> {
            let mut ctx = RenderContext {
                backend: &mut self.backend,
                pass_scope: &self.pass_scope,
                system: &self.system,
            };
            pass.render("O", &mut ctx)
        }
    }

    #[test]
    fn test_new_pass_lists_every_input_as_unsatisfied() {
        let fixture = Fixture::new();
        let pass = fixture.pass("P");
        let mut names: Vec<_> = pass.unsatisfied_inputs().collect();
        names.sort_unstable();
        assert_eq!(names, ["color", "transform"]);
        assert_eq!(pass.bound_values().count(), 0);
        assert_eq!(fixture.registry.declared_type("transform"), Some(ValueType::Mat4));
    }

    #[test]
    fn test_add_value_checks_declaration_and_type() {
        let fixture = Fixture::new();
        let mut pass = fixture.pass("P");

        let err = pass
            .add_value("gloss", TaggedValue::shared(1.0f32), BindScope::PassLocal)
            .unwrap_err();
        assert!(matches!(err, RenderError::NotDeclared { .. }));

        let err = pass
            .add_value("color", TaggedValue::shared(1.0f32), BindScope::PassLocal)
            .unwrap_err();
        assert!(matches!(err, RenderError::TypeMismatch { .. }));

        pass.add_value("color", TaggedValue::shared(Vec4::ONE), BindScope::PassLocal)
            .unwrap();
        assert!(!pass.is_unsatisfied("color"));
        assert!(pass.bound_value("color").unwrap().locked);
    }

    #[test]
    fn test_remove_value_restores_unsatisfied() {
        let fixture = Fixture::new();
        let mut pass = fixture.pass("P");
        pass.add_value("color", TaggedValue::shared(Vec4::ONE), BindScope::PassLocal)
            .unwrap();
        let removed = pass.remove_value("color").unwrap();
        assert_eq!(removed.get::<Vec4>().unwrap(), Vec4::ONE);
        assert!(pass.is_unsatisfied("color"));
        assert!(pass.remove_value("color").is_err());
    }

    #[test]
    fn test_remove_object_wide_keeps_locked_values() {
        let fixture = Fixture::new();
        let mut pass = fixture.pass("P");
        pass.add_value("color", TaggedValue::shared(Vec4::ONE), BindScope::PassLocal)
            .unwrap();
        pass.add_value(
            "transform",
            TaggedValue::shared(Mat4::IDENTITY),
            BindScope::ObjectWide,
        )
        .unwrap();

        assert!(!pass.remove_object_wide_value("color"));
        assert!(pass.remove_object_wide_value("transform"));
        assert!(pass.is_unsatisfied("transform"));
    }

    #[test]
    fn test_render_resolves_pass_scope_before_system() {
        let mut fixture = Fixture::new();
        let mut pass = fixture.pass("P");
        pass.add_value("color", TaggedValue::shared(Vec4::ONE), BindScope::PassLocal)
            .unwrap();

        let scoped = Mat4::from_scale(glam::Vec3::splat(2.0));
        fixture
            .pass_scope
            .update("P", "transform", TaggedValue::shared(scoped))
            .unwrap();
        fixture
            .system
            .update("transform", TaggedValue::shared(Mat4::IDENTITY))
            .unwrap();

        fixture.render(&mut pass).unwrap();
        assert_eq!(
            fixture.backend.last_uniform(TRANSFORM),
            Some(TaggedValue::new(scoped))
        );
        assert_eq!(fixture.backend.draw_count(), 1);
        // Store lookups do not bind anything on the pass.
        assert!(pass.is_unsatisfied("transform"));
    }

    #[test]
    fn test_render_fails_on_unsatisfied() {
        let mut fixture = Fixture::new();
        let mut pass = fixture.pass("P");
        pass.add_value("color", TaggedValue::shared(Vec4::X), BindScope::PassLocal)
            .unwrap();

        let err = fixture.render(&mut pass).unwrap_err();
        match err {
            RenderError::Unsatisfied { names, .. } => assert_eq!(names, ["transform"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fixture.backend.draw_count(), 0);
        let color = pass.bound_value("color").unwrap();
        assert_eq!(color.value.get::<Vec4>().unwrap(), Vec4::X);
    }

    #[test]
    fn test_compute_callback_supplies_missing_values() {
        let mut fixture = Fixture::new();
        let mut pass = fixture.pass("P");
        pass.add_value("color", TaggedValue::shared(Vec4::ONE), BindScope::PassLocal)
            .unwrap();
        pass.add_compute_callback(|request| {
            assert_eq!(request.object(), "O");
            assert!(request.is_unsatisfied("transform"));
            request.provide("transform", Mat4::IDENTITY)
        });

        fixture.render(&mut pass).unwrap();
        assert_eq!(
            fixture.backend.last_uniform(TRANSFORM),
            Some(TaggedValue::new(Mat4::IDENTITY))
        );
    }

    #[test]
    fn test_render_callbacks_replace_default_draw() {
        let mut fixture = Fixture::new();
        let mut pass = fixture.pass("P");
        pass.add_value("color", TaggedValue::shared(Vec4::ONE), BindScope::PassLocal)
            .unwrap();
        pass.add_value(
            "transform",
            TaggedValue::shared(Mat4::IDENTITY),
            BindScope::PassLocal,
        )
        .unwrap();
        pass.add_render_callback(|draw| {
            draw.backend()
                .draw_indexed(PrimitiveTopology::LineList, 2)?;
            Ok(())
        });

        fixture.render(&mut pass).unwrap();
        let draws: Vec<_> = fixture
            .backend
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::DrawIndexed(..)))
            .cloned()
            .collect();
        assert_eq!(draws, [BackendCall::DrawIndexed(PrimitiveTopology::LineList, 2)]);
    }

    #[test]
    fn test_state_override_restored_after_failure() {
        let mut fixture = Fixture::new();
        let mut pass = fixture.pass("P");
        pass.set_state_override(Some(RenderState::overlay()));

        assert!(fixture.render(&mut pass).is_err());
        assert_eq!(fixture.backend.render_state(), RenderState::default());
        let states: Vec<_> = fixture
            .backend
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetRenderState(state) => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(states, [RenderState::overlay(), RenderState::default()]);
    }

    #[test]
    fn test_attribute_mismatch() {
        let mut fixture = Fixture::new();
        let release = ReleaseQueue::new();
        let layout = VertexLayout::packed(&[("normal", VertexFormat::Float32x3)]);
        let vertex_buffer =
            VertexBuffer::create(&mut fixture.backend, &release, "normals", &[0u8; 12], layout)
                .unwrap();
        let binding = PassBinding {
            vertex_buffer,
            ..fixture.binding.clone()
        };

        let err = ObjectPass::new("P", binding, fixture.registry.clone()).unwrap_err();
        assert!(matches!(err, RenderError::AttributeMismatch { .. }));
    }
}
