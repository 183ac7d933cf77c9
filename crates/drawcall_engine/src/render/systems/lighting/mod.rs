//! Lighting system
//!
//! Light definitions, their per-frame view-space update and the GPU light block.

pub mod lighting;
pub mod light_block;

pub use lighting::*;
pub use light_block::{pack_lights, LightBlockHeader, LightData};
