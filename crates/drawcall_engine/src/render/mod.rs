//! # Rendering System
//!
//! Draw-call based renderer over an abstract graphics device.
//!
//! ## Architecture
//!
//! - **api**: the [`GraphicsDevice`](api::GraphicsDevice) trait and buffer update strategies
//! - **backends**: device implementations (the headless recording device)
//! - **geometry**: shared vertex/index buffers with per-mesh sub-allocation
//! - **resources**: programs, materials, meshes, textures and the stores that resolve them
//! - **systems**: lighting and shadow mapping
//! - **primitives**: camera frustum parameters
//! - **draw_call**: the per-frame [`DrawCallRenderer`]
//!
//! ## Error Model
//!
//! Construction-time failures (shader compilation, too few uniform binding
//! points, GPU object creation) are returned as [`RenderError`]. Failures that
//! concern a single draw call, such as a material that no longer resolves,
//! skip that draw and are logged; a frame never fails because of one object.

pub mod api;
pub mod backends;
pub mod geometry;
pub mod resources;
pub mod systems;
pub mod primitives;
pub mod draw_call;

pub use api::{GraphicsDevice, BufferUpdateMode};
pub use backends::HeadlessDevice;
pub use draw_call::{DrawCall, DrawCallKey, DrawCallReference, DrawCallRenderer, FrameStats};
pub use geometry::{GeometryBuffer, GeometryDescription, VertexAttribute};
pub use primitives::Frustum;
pub use resources::{
    Material, MaterialDescription, MaterialReference, Mesh, MeshReference, Program,
    ProgramDescription, ProgramReference, RenderContext,
};
pub use systems::lighting::{Light, LightType};

use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A shader program failed to compile or link
    ///
    /// Carries the program name and the compiler log.
    #[error("Shader compilation failed for '{program}': {message}")]
    ShaderCompilation {
        /// Program name
        program: String,
        /// Compiler/linker output
        message: String,
    },

    /// The device exposes fewer uniform buffer binding points than the renderer uses
    #[error("Out of uniform buffer bindings: {required} required, {available} available")]
    OutOfUniformBindings {
        /// Binding points the renderer needs
        required: u32,
        /// Binding points the device offers
        available: u32,
    },

    /// Resource creation or management failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A buffer write or mapping was rejected
    #[error("Buffer write failed: {0}")]
    BufferWrite(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
