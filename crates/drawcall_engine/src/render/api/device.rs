//! Graphics device abstraction
//!
//! The renderer never talks to a graphics API directly. Everything it needs
//! from the GPU goes through [`GraphicsDevice`]: buffer objects and the
//! primitive operations the [`BufferUpdateMode`](super::BufferUpdateMode)
//! strategies are composed from, shader programs and their interface
//! reflection, vertex arrays, depth textures and framebuffers, and indexed
//! draws. The shape follows a bind-point API (uniform binding points, texture
//! units, a current program) because that is what the renderer's singleton
//! uniform buffers are designed around.

use bitflags::bitflags;

use crate::render::RenderResult;

/// Handle to a buffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Handle to a vertex array (attribute layout + bound buffers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub u32);

/// Handle to a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle to a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// What a buffer object holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Interleaved vertex attributes
    Vertex,
    /// 32-bit indices
    Index,
    /// Uniform block storage
    Uniform,
}

/// Expected update frequency of a buffer's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Written once, drawn many times
    Static,
    /// Rewritten every draw or frame
    Dynamic,
}

bitflags! {
    /// Access flags for a mapped buffer range
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapAccess: u32 {
        /// Mapping will be read
        const READ = 1 << 0;
        /// Mapping will be written
        const WRITE = 1 << 1;
        /// Previous contents of the range may be discarded
        const INVALIDATE_RANGE = 1 << 2;
        /// Previous contents of the whole buffer may be discarded
        const INVALIDATE_BUFFER = 1 << 3;
    }
}

/// GLSL source for one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    /// Vertex stage source
    pub vertex: String,
    /// Fragment stage source
    pub fragment: String,
}

/// Texture shapes the renderer creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// Single 2D image
    Texture2D,
    /// Six square faces
    Cubemap,
    /// Layered 2D image
    Array2D {
        /// Number of layers
        layers: u32,
    },
}

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit RGBA color
    Rgba8,
    /// 32-bit float depth
    Depth32F,
}

/// Parameters for [`GraphicsDevice::create_texture`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Shape
    pub kind: TextureKind,
    /// Texel format
    pub format: TextureFormat,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
}

/// Which image of a depth texture a framebuffer renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthAttachment {
    /// The whole 2D texture
    Texture2D(TextureId),
    /// One face (0..6, +X -X +Y -Y +Z -Z) of a cubemap
    CubeFace(TextureId, u32),
    /// One layer of an array texture
    Layer(TextureId, u32),
}

/// Format of one vertex attribute inside the interleaved vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeFormat {
    /// Shader input location
    pub location: u32,
    /// Number of f32 components
    pub components: u32,
    /// Byte offset inside one vertex
    pub offset: u32,
    /// Whether the value is normalized on fetch
    pub normalized: bool,
}

/// Graphics device trait
///
/// Implementations are single-threaded and owned by the thread that owns
/// the graphics context.
pub trait GraphicsDevice {
    /// Human readable backend name for logging
    fn name(&self) -> &str;

    // === Buffers ===

    /// Create a buffer initialised with `data`
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8], usage: BufferUsage) -> RenderResult<BufferId>;

    /// Delete a buffer; unknown ids are ignored
    fn delete_buffer(&mut self, id: BufferId);

    /// Re-specify the whole data store with `size` bytes, detaching the old one.
    /// When `data` is given it initialises the start of the new store.
    fn buffer_data(&mut self, id: BufferId, size: usize, data: Option<&[u8]>, usage: BufferUsage) -> RenderResult<()>;

    /// Overwrite part of the data store
    fn buffer_sub_data(&mut self, id: BufferId, offset: usize, data: &[u8]) -> RenderResult<()>;

    /// Hint that the current contents are no longer needed
    fn invalidate_buffer(&mut self, id: BufferId) -> RenderResult<()>;

    /// Map a range for CPU access. The returned slice is valid until [`Self::unmap_buffer`].
    fn map_buffer(&mut self, id: BufferId, offset: usize, len: usize, access: MapAccess) -> RenderResult<&mut [u8]>;

    /// Release a mapping
    fn unmap_buffer(&mut self, id: BufferId) -> RenderResult<()>;

    /// Size of the data store in bytes
    fn buffer_size(&self, id: BufferId) -> Option<usize>;

    /// Attach a uniform buffer to an indexed binding point
    fn bind_uniform_buffer(&mut self, binding: u32, id: BufferId);

    /// Number of uniform buffer binding points available
    fn max_uniform_buffer_bindings(&self) -> u32;

    // === Programs ===

    /// Compile and link a program
    fn create_program(&mut self, label: &str, sources: &ShaderSources) -> RenderResult<ProgramId>;

    /// Delete a program
    fn delete_program(&mut self, id: ProgramId);

    /// Make a program current
    fn use_program(&mut self, id: ProgramId);

    /// Location of a vertex input
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;

    /// Index of a uniform block
    fn uniform_block_index(&self, program: ProgramId, name: &str) -> Option<u32>;

    /// Route a uniform block to a binding point
    fn uniform_block_binding(&mut self, program: ProgramId, block_index: u32, binding: u32);

    /// Location of a plain uniform (samplers included), e.g. `albedo` or `shadowMaps[2]`
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<i32>;

    /// Point a sampler uniform at a texture unit
    fn set_sampler_unit(&mut self, program: ProgramId, location: i32, unit: u32);

    // === Vertex arrays ===

    /// Create an empty vertex array
    fn create_vertex_array(&mut self) -> RenderResult<VertexArrayId>;

    /// Delete a vertex array
    fn delete_vertex_array(&mut self, id: VertexArrayId);

    /// Make a vertex array current
    fn bind_vertex_array(&mut self, id: VertexArrayId);

    /// Enable and describe one attribute
    fn set_vertex_attribute_format(&mut self, vao: VertexArrayId, format: VertexAttributeFormat);

    /// Disable one attribute location
    fn disable_vertex_attribute(&mut self, vao: VertexArrayId, location: u32);

    /// Attach the vertex and index buffers a vertex array reads from
    fn set_vertex_array_buffers(&mut self, vao: VertexArrayId, vertex_buffer: BufferId, index_buffer: BufferId, stride: u32);

    // === Textures and framebuffers ===

    /// Allocate a texture
    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> RenderResult<TextureId>;

    /// Delete a texture
    fn delete_texture(&mut self, id: TextureId);

    /// Bind a texture (or nothing) to a texture unit
    fn bind_texture(&mut self, unit: u32, kind: TextureKind, texture: Option<TextureId>);

    /// Create a framebuffer with no attachments
    fn create_framebuffer(&mut self) -> RenderResult<FramebufferId>;

    /// Delete a framebuffer
    fn delete_framebuffer(&mut self, id: FramebufferId);

    /// Attach a depth image
    fn attach_depth(&mut self, framebuffer: FramebufferId, attachment: DepthAttachment);

    /// Bind a framebuffer, `None` selects the default one
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Set the viewport rectangle origin at (0, 0)
    fn set_viewport(&mut self, width: u32, height: u32);

    /// Enable or disable color writes
    fn set_color_write(&mut self, enabled: bool);

    /// Clear the depth attachment of the bound framebuffer
    fn clear_depth(&mut self);

    // === Drawing ===

    /// Indexed triangle-list draw through the current program and vertex array
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32);

    /// Downcast to concrete backend type
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to mutable concrete backend type
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
