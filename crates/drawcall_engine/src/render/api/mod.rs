//! Public rendering API
//!
//! The device abstraction every backend implements and the buffer update
//! strategies the renderer builds its uniform traffic on.

pub mod device;
pub mod buffer_update;

pub use device::{
    GraphicsDevice, BufferId, ProgramId, VertexArrayId, TextureId, FramebufferId,
    BufferKind, BufferUsage, MapAccess, ShaderSources, TextureKind, TextureFormat,
    TextureDescriptor, DepthAttachment, VertexAttributeFormat,
};
pub use buffer_update::{BufferUpdateMode, UniformBuffer, update_buffer};
