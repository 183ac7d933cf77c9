//! Rendering systems
//!
//! Lighting and shadow mapping, driven each frame by the draw call renderer.

pub mod lighting;
pub mod shadows;
