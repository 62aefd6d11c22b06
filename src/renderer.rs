//! Host-facing renderer.
//!
//! [`Renderer`] owns every named resource (objects, buffers, programs), the
//! pass-scope and system-wide value stores, the pass registry and the call
//! queue, and drives one frame:
//!
//! ```text
//! render_frame:
//!   make_current
//!   apply queued calls           (CallQueue)
//!   release dropped handles      (ReleaseQueue)
//!   render_all                   (PassRegistry -> RenderableObject -> ObjectPass)
//!   swap_buffers
//! ```

use std::sync::Arc;

use crate::backend::{GraphicsBackend, PrimitiveTopology, RenderState, ShaderStage};
use crate::call_queue::CallQueue;
use crate::error::{RenderError, RenderResult, ResourceKind};
use crate::resources::{
    IndexBuffer, IndexData, NamedPool, ReleaseQueue, VertexBuffer, VertexLayout,
};
use crate::scene::{
    DrawContext, FrameReport, ObjectPass, PassBinding, PassRegistry, RenderContext,
    RenderableObject, ValueRequest,
};
use crate::shader::{ShaderCompiler, ShaderProgram, ShaderReflection, ShaderSource};
use crate::values::{InputRegistry, PassScopeStore, SharedValue, TaggedValue, ValueStore};

/// Configuration for a [`Renderer`]
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Name used in log messages
    pub label: String,
    /// Log a warning when an object-wide value is ignored by a pass that binds its own
    pub warn_on_shadowed_writes: bool,
    /// Forget every declared input type when the renderer is dropped
    pub clear_registry_on_drop: bool,
    /// Return the first pass failure from `render_all` instead of logging it
    pub fail_fast: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            label: "Renderer".to_string(),
            warn_on_shadowed_writes: true,
            clear_registry_on_drop: true,
            fail_fast: false,
        }
    }
}

impl RendererConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_shadow_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_shadowed_writes = enabled;
        self
    }

    pub fn with_registry_cleared_on_drop(mut self, enabled: bool) -> Self {
        self.clear_registry_on_drop = enabled;
        self
    }

    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }
}

/// Names the resources an object pass is built from.
#[derive(Debug, Clone, Copy)]
pub struct ObjectPassDesc<'a> {
    pub program: &'a str,
    pub vertex_buffer: &'a str,
    pub index_buffer: &'a str,
    pub topology: PrimitiveTopology,
    /// Run right after this pass of the same object instead of as a registry member.
    pub parent: Option<&'a str>,
}

impl<'a> ObjectPassDesc<'a> {
    /// A triangle-list pass.
    pub fn new(program: &'a str, vertex_buffer: &'a str, index_buffer: &'a str) -> Self {
        Self {
            program,
            vertex_buffer,
            index_buffer,
            topology: PrimitiveTopology::TriangleList,
            parent: None,
        }
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_parent(mut self, parent: &'a str) -> Self {
        self.parent = Some(parent);
        self
    }
}

pub struct Renderer<B: GraphicsBackend> {
    config: RendererConfig,
    backend: B,
    registry: InputRegistry,
    release: ReleaseQueue,
    compiler: ShaderCompiler,
    queue: CallQueue<B>,
    passes: PassRegistry,
    objects: NamedPool<RenderableObject>,
    programs: NamedPool<ShaderProgram>,
    vertex_buffers: NamedPool<VertexBuffer>,
    index_buffers: NamedPool<IndexBuffer>,
    pass_values: PassScopeStore,
    system_values: ValueStore,
}

impl<B: GraphicsBackend> Renderer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, RendererConfig::default())
    }

    pub fn with_config(backend: B, config: RendererConfig) -> Self {
        log::info!("{}: using {} backend", config.label, backend.name());
        let registry = InputRegistry::new();
        Self {
            config,
            backend,
            release: ReleaseQueue::new(),
            compiler: ShaderCompiler::new(),
            queue: CallQueue::new(),
            passes: PassRegistry::new(),
            objects: NamedPool::new(ResourceKind::Object),
            programs: NamedPool::new(ResourceKind::Program),
            vertex_buffers: NamedPool::new(ResourceKind::VertexBuffer),
            index_buffers: NamedPool::new(ResourceKind::IndexBuffer),
            pass_values: PassScopeStore::new(registry.clone()),
            system_values: ValueStore::new(registry.clone()),
            registry,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The declared-input registry shared by every store of this renderer.
    pub fn registry(&self) -> &InputRegistry {
        &self.registry
    }

    /// A handle other threads can use to queue mutations.
    pub fn call_queue(&self) -> CallQueue<B> {
        self.queue.clone()
    }

    // ---- Passes ----

    pub fn add_pass_to_front(&mut self, name: &str) -> RenderResult<()> {
        self.passes.add_to_front(name)
    }

    pub fn add_pass_to_back(&mut self, name: &str) -> RenderResult<()> {
        self.passes.add_to_back(name)
    }

    /// Remove a registry pass together with its pass-scope values and the object
    /// passes (with their sub-passes) of every member object.
    pub fn remove_pass(&mut self, name: &str) -> RenderResult<()> {
        let members = self.passes.members(name)?.to_vec();
        for member in &members {
            let object = self.objects.get_mut(member)?;
            if object.has_pass(name) {
                object.remove_pass(name)?;
            }
        }
        self.passes.remove(name)?;
        self.pass_values.clear_pass(name);
        Ok(())
    }

    pub fn has_pass(&self, name: &str) -> bool {
        self.passes.has_pass(name)
    }

    pub fn is_object_in_pass(&self, pass: &str, object: &str) -> bool {
        self.passes.is_object_in_pass(pass, object)
    }

    pub fn passes(&self) -> &PassRegistry {
        &self.passes
    }

    pub fn add_before_hook(
        &mut self,
        pass: &str,
        hook: impl FnMut(&str, &mut dyn GraphicsBackend) -> RenderResult<()> + Send + 'static,
    ) -> RenderResult<()> {
        self.passes.add_before_hook(pass, hook)
    }

    pub fn add_after_hook(
        &mut self,
        pass: &str,
        hook: impl FnMut(&str, &mut dyn GraphicsBackend) -> RenderResult<()> + Send + 'static,
    ) -> RenderResult<()> {
        self.passes.add_after_hook(pass, hook)
    }

    // ---- Objects ----

    pub fn add_object(&mut self, name: &str) -> RenderResult<()> {
        let object = RenderableObject::new(name, self.registry.clone())
            .with_shadow_warnings(self.config.warn_on_shadowed_writes);
        self.objects.insert(name, object)?;
        log::debug!("Added object '{}'", name);
        Ok(())
    }

    /// Remove an object and its membership in every pass.
    pub fn remove_object(&mut self, name: &str) -> RenderResult<()> {
        self.objects.remove(name)?;
        self.passes.remove_object_everywhere(name);
        log::debug!("Removed object '{}'", name);
        Ok(())
    }

    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains(name)
    }

    pub fn object(&self, name: &str) -> RenderResult<&RenderableObject> {
        self.objects.get(name)
    }

    pub fn object_mut(&mut self, name: &str) -> RenderResult<&mut RenderableObject> {
        self.objects.get_mut(name)
    }

    pub fn object_pass(&self, object: &str, pass: &str) -> RenderResult<&ObjectPass> {
        self.objects.get(object)?.pass(pass)
    }

    fn object_pass_mut(&mut self, object: &str, pass: &str) -> RenderResult<&mut ObjectPass> {
        self.objects.get_mut(object)?.pass_mut(pass)
    }

    // ---- Buffers ----

    pub fn create_vertex_buffer(
        &mut self,
        name: &str,
        data: &[u8],
        layout: VertexLayout,
    ) -> RenderResult<()> {
        if self.vertex_buffers.contains(name) {
            return Err(RenderError::duplicate(ResourceKind::VertexBuffer, name));
        }
        let buffer = VertexBuffer::create(&mut self.backend, &self.release, name, data, layout)?;
        self.vertex_buffers.insert(name, buffer)
    }

    /// Forget a vertex buffer. Passes still using it keep it alive.
    pub fn remove_vertex_buffer(&mut self, name: &str) -> RenderResult<()> {
        self.vertex_buffers.remove(name).map(drop)
    }

    pub fn vertex_buffer(&self, name: &str) -> RenderResult<&VertexBuffer> {
        self.vertex_buffers.get(name)
    }

    pub fn create_index_buffer(&mut self, name: &str, indices: &IndexData) -> RenderResult<()> {
        if self.index_buffers.contains(name) {
            return Err(RenderError::duplicate(ResourceKind::IndexBuffer, name));
        }
        let buffer = IndexBuffer::create(&mut self.backend, &self.release, name, indices)?;
        self.index_buffers.insert(name, buffer)
    }

    /// Forget an index buffer. Passes still using it keep it alive.
    pub fn remove_index_buffer(&mut self, name: &str) -> RenderResult<()> {
        self.index_buffers.remove(name).map(drop)
    }

    pub fn index_buffer(&self, name: &str) -> RenderResult<&IndexBuffer> {
        self.index_buffers.get(name)
    }

    // ---- Programs ----

    /// Compile WGSL stages and register the program under `name`.
    pub fn load_program(
        &mut self,
        name: &str,
        stages: &[(ShaderSource, ShaderStage)],
    ) -> RenderResult<()> {
        if self.programs.contains(name) {
            return Err(RenderError::duplicate(ResourceKind::Program, name));
        }
        let compiled = self.compiler.compile(name, stages)?;
        let program = ShaderProgram::from_compiled(&mut self.backend, &self.release, compiled)?;
        self.programs.insert(name, program)
    }

    /// Register a program whose introspection is supplied by the caller.
    pub fn add_program(
        &mut self,
        name: &str,
        sources: &[(String, ShaderStage)],
        reflection: ShaderReflection,
    ) -> RenderResult<()> {
        if self.programs.contains(name) {
            return Err(RenderError::duplicate(ResourceKind::Program, name));
        }
        let program =
            ShaderProgram::create(&mut self.backend, &self.release, name, sources, reflection)?;
        self.programs.insert(name, program)
    }

    pub fn remove_program(&mut self, name: &str) -> RenderResult<()> {
        self.programs.remove(name).map(drop)
    }

    pub fn program(&self, name: &str) -> RenderResult<&ShaderProgram> {
        self.programs.get(name)
    }

    // ---- Object passes ----

    /// Bind `object` to the named resources as pass `pass`.
    ///
    /// A pass without a parent must exist in the registry; the object becomes a
    /// member of it. A sub-pass runs after its parent and is not a member itself.
    pub fn add_object_pass(
        &mut self,
        object: &str,
        pass: &str,
        desc: ObjectPassDesc<'_>,
    ) -> RenderResult<()> {
        if desc.parent.is_none() && !self.passes.has_pass(pass) {
            return Err(RenderError::not_found(ResourceKind::Pass, pass));
        }

        let binding = PassBinding {
            program: self.programs.get(desc.program)?.clone(),
            vertex_buffer: self.vertex_buffers.get(desc.vertex_buffer)?.clone(),
            index_buffer: self.index_buffers.get(desc.index_buffer)?.clone(),
            topology: desc.topology,
        };
        self.objects
            .get_mut(object)?
            .add_pass(pass, binding, desc.parent)?;

        if desc.parent.is_none() {
            self.passes.add_object(pass, object)?;
        }
        Ok(())
    }

    /// Remove an object pass and its sub-passes, and the object's membership in `pass`.
    pub fn remove_object_pass(&mut self, object: &str, pass: &str) -> RenderResult<()> {
        let removed = self.objects.get_mut(object)?.remove_pass(pass)?;
        for name in &removed {
            if self.passes.has_pass(name) {
                self.passes.remove_object(name, object)?;
            }
        }
        Ok(())
    }

    /// Fixed-function state used while `object` draws in `pass`.
    pub fn set_pass_state(
        &mut self,
        object: &str,
        pass: &str,
        state: Option<RenderState>,
    ) -> RenderResult<()> {
        self.object_pass_mut(object, pass)?.set_state_override(state);
        Ok(())
    }

    pub fn add_value_callback(
        &mut self,
        object: &str,
        pass: &str,
        callback: impl FnMut(&mut ValueRequest<'_>) -> RenderResult<()> + Send + 'static,
    ) -> RenderResult<()> {
        self.object_pass_mut(object, pass)?
            .add_compute_callback(callback);
        Ok(())
    }

    pub fn add_render_callback(
        &mut self,
        object: &str,
        pass: &str,
        callback: impl FnMut(&mut DrawContext<'_>) -> RenderResult<()> + Send + 'static,
    ) -> RenderResult<()> {
        self.object_pass_mut(object, pass)?
            .add_render_callback(callback);
        Ok(())
    }

    // ---- Values ----

    /// Bind a value on one pass of one object.
    pub fn set_pass_value(
        &mut self,
        object: &str,
        pass: &str,
        name: &str,
        value: impl Into<TaggedValue>,
    ) -> RenderResult<()> {
        self.objects
            .get_mut(object)?
            .add_pass_value(pass, name, Arc::new(value.into()))
    }

    pub fn remove_pass_value(
        &mut self,
        object: &str,
        pass: &str,
        name: &str,
    ) -> RenderResult<SharedValue> {
        self.objects
            .get_mut(object)?
            .remove_pass_value(pass, name)
    }

    /// Bind a value on every pass of `object`, present and future.
    ///
    /// Returns the passes that kept their own pass-local value instead.
    pub fn set_object_value(
        &mut self,
        object: &str,
        name: &str,
        value: impl Into<TaggedValue>,
    ) -> RenderResult<Vec<String>> {
        self.objects
            .get_mut(object)?
            .add_value(name, Arc::new(value.into()))
    }

    pub fn remove_object_value(&mut self, object: &str, name: &str) -> RenderResult<SharedValue> {
        self.objects.get_mut(object)?.remove_value(name)
    }

    /// Set a value for every object drawn in `pass`.
    pub fn set_pass_scope_value(
        &mut self,
        pass: &str,
        name: &str,
        value: impl Into<TaggedValue>,
    ) -> RenderResult<()> {
        self.pass_values
            .update(pass, name, Arc::new(value.into()))
            .map(drop)
    }

    pub fn remove_pass_scope_value(&mut self, pass: &str, name: &str) -> RenderResult<SharedValue> {
        self.pass_values.remove(pass, name)
    }

    pub fn pass_scope_value(&self, pass: &str, name: &str) -> Option<&SharedValue> {
        self.pass_values.try_get(pass, name)
    }

    /// Set a value visible to every object in every pass.
    pub fn set_system_value(
        &mut self,
        name: &str,
        value: impl Into<TaggedValue>,
    ) -> RenderResult<()> {
        self.system_values
            .update(name, Arc::new(value.into()))
            .map(drop)
    }

    pub fn remove_system_value(&mut self, name: &str) -> RenderResult<SharedValue> {
        self.system_values.remove(name)
    }

    pub fn system_value(&self, name: &str) -> Option<&SharedValue> {
        self.system_values.try_get(name)
    }

    // ---- Frame ----

    /// Apply every call queued from other threads. Returns how many ran.
    pub fn apply_queued_calls(&mut self) -> usize {
        let calls = self.queue.drain();
        let count = calls.len();
        for call in calls {
            call(self);
        }
        if count > 0 {
            log::debug!("{}: applied {} queued calls", self.config.label, count);
        }
        count
    }

    /// Release native handles whose last owner is gone.
    pub fn release_dropped(&mut self) -> usize {
        self.release.drain(&mut self.backend)
    }

    /// Render every registry pass once.
    pub fn render_all(&mut self) -> RenderResult<FrameReport> {
        let mut ctx = RenderContext {
            backend: &mut self.backend,
            pass_scope: &self.pass_values,
            system: &self.system_values,
        };
        self.passes
            .render_all(&mut self.objects, &mut ctx, self.config.fail_fast)
    }

    /// Run one full frame on the owning thread.
    pub fn render_frame(&mut self) -> RenderResult<FrameReport> {
        self.backend.make_current()?;
        self.apply_queued_calls();
        self.release_dropped();
        let report = self.render_all()?;
        self.backend.swap_buffers()?;
        Ok(report)
    }
}

impl<B: GraphicsBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        self.objects.clear();
        self.programs.clear();
        self.vertex_buffers.clear();
        self.index_buffers.clear();
        // Closures may hold buffers too.
        drop(self.queue.drain());
        let released = self.release.drain(&mut self.backend);
        if self.config.clear_registry_on_drop {
            self.registry.clear();
        }
        log::debug!(
            "{}: shut down, released {} native handles",
            self.config.label,
            released
        );
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("label", &self.config.label)
            .field("backend", &self.backend.name())
            .field("passes", &self.passes)
            .field("objects", &self.objects.len())
            .field("programs", &self.programs.len())
            .field("registry", &self.registry)
            .finish()
    }
}
