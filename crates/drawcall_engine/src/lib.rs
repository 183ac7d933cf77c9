//! # Drawcall Engine
//!
//! A draw-call batching renderer built on an abstract graphics device.
//!
//! ## Features
//!
//! - **Draw Call Batching**: Submissions are grouped by program so each program is activated once per frame
//! - **Shared Geometry Buffers**: Many meshes packed into one vertex/index buffer pair
//! - **Packed Materials**: Material parameters laid out from program metadata
//! - **Shadows**: Point (cubemap), spot (2D) and cascaded directional shadow maps
//! - **Headless Backend**: A recording device for tests and tools
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use drawcall_engine::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     let context = Rc::new(RenderContext::new());
//!     let mut renderer = DrawCallRenderer::new(
//!         Box::new(HeadlessDevice::new()),
//!         Rc::clone(&context),
//!         RendererConfig::default(),
//!     )?;
//!
//!     renderer.submit_draw_call(DrawCall::new("cube", "stone", Mat4::identity()));
//!
//!     let frustum = Frustum::default();
//!     let view = Mat4::look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::zeros(), Vec3::y());
//!     renderer.draw(&view, &frustum.projection(), &frustum)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod foundation;
pub mod config;
pub mod core;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::Config,
        core::{DrawOrder, RendererConfig},
        foundation::math::{Mat4, Mat4Ext, Vec3, Vec4},
        render::{
            BufferUpdateMode, DrawCall, DrawCallReference, DrawCallRenderer, Frustum, GeometryBuffer,
            GeometryDescription, GraphicsDevice, HeadlessDevice, Light, LightType, Material, Mesh,
            Program, ProgramDescription, RenderContext, RenderError, RenderResult, VertexAttribute,
        },
    };
}
