//! Core backend abstraction traits
//!
//! The renderer drives a stateful graphics API: bind a program, bind buffers,
//! set uniforms one by one, then draw. Backends implement [`GraphicsBackend`]
//! and must be called only from the thread that owns the graphics context.

use thiserror::Error;

use crate::backend::types::*;
use crate::resources::VertexLayout;
use crate::values::TaggedValue;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to make context current: {0}")]
    ContextLost(String),
    #[error("Failed to present: {0}")]
    PresentFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create shader program: {0}")]
    ProgramCreationFailed(String),
    #[error("Failed to set uniform at {location}: {reason}")]
    UniformRejected {
        location: UniformLocation,
        reason: String,
    },
    #[error("Draw failed: {0}")]
    DrawFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Main graphics backend trait
pub trait GraphicsBackend {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    // Context

    /// Make the graphics context current on the calling thread
    fn make_current(&mut self) -> BackendResult<()>;

    /// Present the finished frame
    fn swap_buffers(&mut self) -> BackendResult<()>;

    // Resource creation

    /// Compile and link a program from per-stage sources
    fn create_program(
        &mut self,
        label: &str,
        sources: &[(String, ShaderStage)],
    ) -> BackendResult<ProgramHandle>;

    /// Create a buffer with initial data
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BackendResult<BufferHandle>;

    // Resource cleanup

    fn release_program(&mut self, program: ProgramHandle);

    fn release_buffer(&mut self, buffer: BufferHandle);

    // State and draw

    /// Make `program` the target of subsequent uniform writes and draws
    fn use_program(&mut self, program: ProgramHandle);

    /// Bind a vertex buffer together with its attribute layout
    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, layout: &VertexLayout);

    fn bind_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat);

    /// Write one uniform of the current program
    fn set_uniform(&mut self, location: UniformLocation, value: &TaggedValue)
        -> BackendResult<()>;

    /// Current fixed-function state
    fn render_state(&self) -> RenderState;

    fn set_render_state(&mut self, state: &RenderState);

    /// Draw `index_count` indices from the bound index buffer
    fn draw_indexed(&mut self, topology: PrimitiveTopology, index_count: u32)
        -> BackendResult<()>;
}
