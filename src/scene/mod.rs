//! Object/pass graph
//!
//! Objects own their passes; the [`PassRegistry`] decides which objects are drawn
//! in which frame pass and in what order.

mod callbacks;
mod object;
mod object_pass;
mod pass_registry;

pub use callbacks::*;
pub use object::*;
pub use object_pass::*;
pub use pass_registry::*;
