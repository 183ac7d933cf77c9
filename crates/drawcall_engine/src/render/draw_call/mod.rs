//! Draw call submission and the per-frame renderer

pub mod draw_call;
pub mod object_block;
pub mod renderer;
pub mod stats;

pub use draw_call::{DrawCall, DrawCallKey, DrawCallReference, DrawCallTarget, SharedTransform};
pub use object_block::ObjectBlock;
pub use renderer::DrawCallRenderer;
pub use stats::FrameStats;
