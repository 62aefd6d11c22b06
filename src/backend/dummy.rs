//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It records every call it
//! receives so tests can assert on the exact sequence of binds, uniform writes
//! and draws the renderer issued.

use std::collections::HashSet;

use crate::backend::traits::{BackendError, BackendResult, GraphicsBackend};
use crate::backend::types::*;
use crate::resources::VertexLayout;
use crate::values::TaggedValue;

/// A single recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    MakeCurrent,
    SwapBuffers,
    CreateProgram(ProgramHandle),
    CreateBuffer(BufferHandle, BufferKind),
    ReleaseProgram(ProgramHandle),
    ReleaseBuffer(BufferHandle),
    UseProgram(ProgramHandle),
    BindVertexBuffer(BufferHandle),
    BindIndexBuffer(BufferHandle, IndexFormat),
    SetUniform(UniformLocation, TaggedValue),
    SetRenderState(RenderState),
    DrawIndexed(PrimitiveTopology, u32),
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    calls: Vec<BackendCall>,
    next_handle: u64,
    state: RenderState,
    live_programs: HashSet<ProgramHandle>,
    live_buffers: HashSet<BufferHandle>,
    fail_draws: bool,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent draw fail, to exercise error paths.
    pub fn with_failing_draws(mut self) -> Self {
        self.fail_draws = true;
        self
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Drain the recorded calls.
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Uniform writes recorded so far, in order.
    pub fn uniform_writes(&self) -> Vec<(UniformLocation, TaggedValue)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SetUniform(location, value) => Some((*location, *value)),
                _ => None,
            })
            .collect()
    }

    /// The last value written to `location`, if any.
    pub fn last_uniform(&self, location: UniformLocation) -> Option<TaggedValue> {
        self.calls.iter().rev().find_map(|call| match call {
            BackendCall::SetUniform(at, value) if *at == location => Some(*value),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::DrawIndexed(..)))
            .count()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.len()
    }

    pub fn live_program_count(&self) -> usize {
        self.live_programs.len()
    }

    fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn make_current(&mut self) -> BackendResult<()> {
        self.calls.push(BackendCall::MakeCurrent);
        Ok(())
    }

    fn swap_buffers(&mut self) -> BackendResult<()> {
        self.calls.push(BackendCall::SwapBuffers);
        Ok(())
    }

    fn create_program(
        &mut self,
        label: &str,
        sources: &[(String, ShaderStage)],
    ) -> BackendResult<ProgramHandle> {
        if sources.is_empty() {
            return Err(BackendError::ProgramCreationFailed(format!(
                "program '{label}' has no stages"
            )));
        }
        let handle = ProgramHandle(self.allocate());
        log::trace!("DummyBackend: creating program {:?} ({:?})", label, handle);
        self.live_programs.insert(handle);
        self.calls.push(BackendCall::CreateProgram(handle));
        Ok(handle)
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle> {
        let handle = BufferHandle(self.allocate());
        log::trace!(
            "DummyBackend: creating {:?} buffer {:?} (size: {})",
            kind,
            handle,
            data.len()
        );
        self.live_buffers.insert(handle);
        self.calls.push(BackendCall::CreateBuffer(handle, kind));
        Ok(handle)
    }

    fn release_program(&mut self, program: ProgramHandle) {
        log::trace!("DummyBackend: releasing program {:?}", program);
        self.live_programs.remove(&program);
        self.calls.push(BackendCall::ReleaseProgram(program));
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        log::trace!("DummyBackend: releasing buffer {:?}", buffer);
        self.live_buffers.remove(&buffer);
        self.calls.push(BackendCall::ReleaseBuffer(buffer));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, layout: &VertexLayout) {
        log::trace!(
            "DummyBackend: binding vertex buffer {:?} ({} attributes)",
            buffer,
            layout.attributes.len()
        );
        self.calls.push(BackendCall::BindVertexBuffer(buffer));
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat) {
        self.calls.push(BackendCall::BindIndexBuffer(buffer, format));
    }

    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: &TaggedValue,
    ) -> BackendResult<()> {
        log::trace!(
            "DummyBackend: uniform {} <- {}",
            location,
            value.value_type()
        );
        self.calls.push(BackendCall::SetUniform(location, *value));
        Ok(())
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.state = *state;
        self.calls.push(BackendCall::SetRenderState(*state));
    }

    fn draw_indexed(
        &mut self,
        topology: PrimitiveTopology,
        index_count: u32,
    ) -> BackendResult<()> {
        if self.fail_draws {
            return Err(BackendError::DrawFailed("draws disabled".into()));
        }
        self.calls.push(BackendCall::DrawIndexed(topology, index_count));
        Ok(())
    }
}
