//! Tree parameter set: fields, presets, raw input and persistence

pub mod persist;
pub mod raw;
pub mod tree_params;

pub use raw::RawParams;
pub use tree_params::{level_index, TreeParams, TreePreset, TreeShape, PARAM_LEVELS};
