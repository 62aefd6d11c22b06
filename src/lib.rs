//! Retained Graphics - retained-mode rendering over a stateful graphics API
//!
//! The host describes named objects, each drawn in one or more named passes by a
//! shader program with a vertex buffer, an index buffer and a primitive
//! topology. Shader inputs are discovered when a program is compiled and are
//! supplied in pieces, at four scopes:
//!
//! - **pass-local**: bound on one pass of one object; always wins
//! - **object-wide**: bound once on an object, copied into each of its passes
//!   unless the pass binds its own value
//! - **pass-scope**: shared by every object drawn in a named pass
//! - **system-wide**: visible everywhere
//!
//! Anything still missing at draw time is offered to per-pass compute callbacks;
//! an input nobody supplies fails that pass.
//!
//! # Features
//! - Runtime type-tagged values checked against a declared-input registry
//! - WGSL introspection via naga
//! - Ordered pass registry with before/after hooks and per-pass error isolation
//! - Sub-passes that run right after their parent pass
//! - Cross-thread call queue and deferred release of native handles

pub mod backend;
pub mod call_queue;
pub mod error;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod values;

pub use backend::{BackendCall, BackendError, DummyBackend, GraphicsBackend};
pub use call_queue::CallQueue;
pub use error::{RenderError, RenderResult, ResourceKind};
pub use renderer::{ObjectPassDesc, Renderer, RendererConfig};
pub use scene::{FrameReport, ObjectPass, PassRegistry, RenderableObject};
pub use shader::{ShaderCompiler, ShaderSource};
pub use values::{TaggedValue, ValueType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version. Call once after installing a logger.
pub fn init() {
    log::info!("Retained Graphics v{} initialized", VERSION);
}
