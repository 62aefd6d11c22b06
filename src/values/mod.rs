//! Shader input values and the stores that hold them.
//!
//! All values cross store boundaries as [`TaggedValue`]s, and every store consults
//! the same [`InputRegistry`], so a name keeps one type no matter which scope
//! introduces it.

mod registry;
mod store;
mod tagged;
mod value_type;

pub use registry::InputRegistry;
pub use store::{
    BindOutcome, BindScope, PassLocalEntry, PassLocalStore, PassScopeStore, ValueStore,
};
pub use tagged::{SharedValue, TaggedValue, MAX_VALUE_SIZE};
pub use value_type::{SamplerBinding, ShaderValue, TextureBinding, ValueType};
