//! Arbor - Weber & Penn parametric tree generation

pub mod core;
pub mod math;
pub mod params;
pub mod leaf;
pub mod generation;

pub use crate::core::TreeError;
pub use generation::{construct, construct_async, construct_batch, construct_from_map, construct_with, TreeGeometry};
pub use params::{TreeParams, TreePreset};
