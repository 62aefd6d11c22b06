//! Backend abstraction layer
//!
//! Provides the stateful graphics API trait the renderer drives, plus a dummy
//! backend that records calls instead of touching a GPU.

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::{BackendCall, DummyBackend};
pub use traits::*;
pub use types::*;
