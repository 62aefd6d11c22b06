//! Resource management
//!
//! Handles vertex/index buffers, their deferred release, and name-keyed pools.

mod buffer;
mod pool;
mod release;

pub use buffer::*;
pub use pool::*;
pub use release::*;
