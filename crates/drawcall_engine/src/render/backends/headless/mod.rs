//! Headless graphics backend
//!
//! Keeps every GPU object in CPU memory and records the commands it
//! receives. Shader "compilation" reflects interface names out of the GLSL
//! text (see [`reflection`]) so name lookups behave like a real driver:
//! a sampler that is not declared has no location.
//!
//! Each indexed draw is captured as a [`DrawRecord`] holding the uniform
//! block contents and texture bindings visible at that moment, which is what
//! tests assert against.

pub mod reflection;

use std::collections::{BTreeMap, HashMap};

use crate::render::api::{
    BufferId, BufferKind, BufferUsage, DepthAttachment, FramebufferId, GraphicsDevice, MapAccess,
    ProgramId, ShaderSources, TextureDescriptor, TextureId, TextureKind, VertexArrayId,
    VertexAttributeFormat,
};
use crate::render::{RenderError, RenderResult};
use reflection::ProgramInterface;

/// Default number of uniform buffer binding points
const DEFAULT_UNIFORM_BINDINGS: u32 = 24;

/// One state-changing command received by the device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Buffer created
    CreateBuffer(BufferId, BufferKind, usize),
    /// Buffer deleted
    DeleteBuffer(BufferId),
    /// Data store re-specified
    BufferData(BufferId, usize),
    /// Partial write
    BufferSubData(BufferId, usize, usize),
    /// Invalidate hint
    InvalidateBuffer(BufferId),
    /// Range mapped
    MapBuffer(BufferId, MapAccess),
    /// Mapping released
    UnmapBuffer(BufferId),
    /// Uniform binding point attached
    BindUniformBuffer(u32, BufferId),
    /// Program made current
    UseProgram(ProgramId),
    /// Vertex array made current
    BindVertexArray(VertexArrayId),
    /// Attribute format set
    VertexAttributeFormat(VertexArrayId, VertexAttributeFormat),
    /// Vertex/index buffers attached to a vertex array
    VertexArrayBuffers(VertexArrayId, BufferId, BufferId),
    /// Texture bound to a unit
    BindTexture(u32, Option<TextureId>),
    /// Texture created
    CreateTexture(TextureId, TextureKind),
    /// Texture deleted
    DeleteTexture(TextureId),
    /// Depth image attached
    AttachDepth(FramebufferId, DepthAttachment),
    /// Framebuffer bound
    BindFramebuffer(Option<FramebufferId>),
    /// Viewport set
    Viewport(u32, u32),
    /// Depth cleared
    ClearDepth,
    /// Indexed draw issued
    DrawIndexed {
        /// Number of indices
        index_count: u32,
        /// First index
        first_index: u32,
        /// Added to every index
        base_vertex: i32,
    },
}

/// Snapshot of the state an indexed draw executed with
#[derive(Debug, Clone)]
pub struct DrawRecord {
    /// Current program
    pub program: Option<ProgramId>,
    /// Current vertex array
    pub vertex_array: Option<VertexArrayId>,
    /// Bound framebuffer (`None` is the default framebuffer)
    pub framebuffer: Option<FramebufferId>,
    /// Depth attachment of the bound framebuffer
    pub depth_attachment: Option<DepthAttachment>,
    /// Whether color writes were enabled
    pub color_write: bool,
    /// Number of indices
    pub index_count: u32,
    /// First index
    pub first_index: u32,
    /// Added to every index
    pub base_vertex: i32,
    /// Contents of every bound uniform buffer, by binding point
    pub uniforms: BTreeMap<u32, Vec<u8>>,
    /// Texture bound to every touched unit
    pub textures: BTreeMap<u32, Option<TextureId>>,
    /// Whether the index range lies inside the bound index buffer
    pub in_bounds: bool,
}

impl DrawRecord {
    /// Read the `index`th 4x4 column-major matrix of the block at `binding`
    pub fn uniform_matrix(&self, binding: u32, index: usize) -> Option<[[f32; 4]; 4]> {
        let bytes = self.uniforms.get(&binding)?;
        let start = index * 64;
        let slice = bytes.get(start..start + 64)?;
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(slice);
        let mut matrix = [[0.0f32; 4]; 4];
        for (column, chunk) in matrix.iter_mut().zip(floats.chunks_exact(4)) {
            column.copy_from_slice(chunk);
        }
        Some(matrix)
    }
}

#[derive(Debug)]
struct HeadlessBuffer {
    kind: BufferKind,
    data: Vec<u8>,
    mapped: bool,
}

#[derive(Debug)]
struct HeadlessProgram {
    label: String,
    interface: ProgramInterface,
    block_bindings: HashMap<u32, u32>,
    sampler_units: HashMap<i32, u32>,
}

#[derive(Debug, Default)]
struct HeadlessVertexArray {
    attributes: BTreeMap<u32, VertexAttributeFormat>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    stride: u32,
}

/// CPU-resident graphics device that records its command stream
#[derive(Debug)]
pub struct HeadlessDevice {
    next_id: u32,
    max_uniform_bindings: u32,
    buffers: HashMap<BufferId, HeadlessBuffer>,
    programs: HashMap<ProgramId, HeadlessProgram>,
    vertex_arrays: HashMap<VertexArrayId, HeadlessVertexArray>,
    textures: HashMap<TextureId, TextureDescriptor>,
    framebuffers: HashMap<FramebufferId, Option<DepthAttachment>>,
    uniform_bindings: BTreeMap<u32, BufferId>,
    texture_units: BTreeMap<u32, Option<TextureId>>,
    current_program: Option<ProgramId>,
    current_vertex_array: Option<VertexArrayId>,
    current_framebuffer: Option<FramebufferId>,
    viewport: (u32, u32),
    color_write: bool,
    commands: Vec<DeviceCommand>,
    draws: Vec<DrawRecord>,
}

impl HeadlessDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self {
            next_id: 1,
            max_uniform_bindings: DEFAULT_UNIFORM_BINDINGS,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            uniform_bindings: BTreeMap::new(),
            texture_units: BTreeMap::new(),
            current_program: None,
            current_vertex_array: None,
            current_framebuffer: None,
            viewport: (0, 0),
            color_write: true,
            commands: Vec::new(),
            draws: Vec::new(),
        }
    }

    /// Limit the number of uniform binding points the device reports
    pub fn with_max_uniform_buffer_bindings(mut self, count: u32) -> Self {
        self.max_uniform_bindings = count;
        self
    }

    /// Every command recorded since creation or the last [`Self::clear_log`]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Every draw recorded since creation or the last [`Self::clear_log`]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Draws issued into the default framebuffer
    pub fn main_pass_draws(&self) -> Vec<&DrawRecord> {
        self.draws.iter().filter(|draw| draw.framebuffer.is_none()).collect()
    }

    /// Draws issued into an offscreen framebuffer
    pub fn offscreen_draws(&self) -> Vec<&DrawRecord> {
        self.draws.iter().filter(|draw| draw.framebuffer.is_some()).collect()
    }

    /// Forget recorded commands and draws, keeping all objects
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Contents of a buffer
    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|buffer| buffer.data.as_slice())
    }

    /// Number of live buffers of the given kind
    pub fn live_buffer_count(&self, kind: BufferKind) -> usize {
        self.buffers.values().filter(|buffer| buffer.kind == kind).count()
    }

    /// Descriptor of a live texture
    pub fn texture(&self, id: TextureId) -> Option<&TextureDescriptor> {
        self.textures.get(&id)
    }

    /// Number of live textures
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Label a program was created with
    pub fn program_label(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(&id).map(|program| program.label.as_str())
    }

    /// Texture unit a sampler uniform was pointed at
    pub fn sampler_unit(&self, program: ProgramId, name: &str) -> Option<u32> {
        let location = self.uniform_location(program, name)?;
        self.programs.get(&program)?.sampler_units.get(&location).copied()
    }

    /// Binding point a uniform block was routed to
    pub fn block_binding(&self, program: ProgramId, name: &str) -> Option<u32> {
        let index = self.uniform_block_index(program, name)?;
        self.programs.get(&program)?.block_bindings.get(&index).copied()
    }

    /// Attribute formats currently enabled on a vertex array
    pub fn vertex_attributes(&self, vao: VertexArrayId) -> Vec<VertexAttributeFormat> {
        self.vertex_arrays
            .get(&vao)
            .map(|array| array.attributes.values().copied().collect())
            .unwrap_or_default()
    }

    /// Current viewport
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Framebuffer draws currently target, `None` for the default one
    pub fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.current_framebuffer
    }

    /// Whether color writes are enabled
    pub fn color_write_enabled(&self) -> bool {
        self.color_write
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn buffer_mut(&mut self, id: BufferId) -> RenderResult<&mut HeadlessBuffer> {
        self.buffers
            .get_mut(&id)
            .ok_or_else(|| RenderError::BufferWrite(format!("unknown buffer {:?}", id)))
    }

    fn index_range_in_bounds(&self, index_count: u32, first_index: u32, base_vertex: i32) -> bool {
        let Some(array) = self.current_vertex_array.and_then(|id| self.vertex_arrays.get(&id)) else {
            return false;
        };
        let indices = array
            .index_buffer
            .and_then(|id| self.buffers.get(&id))
            .map(|buffer| bytemuck::pod_collect_to_vec::<u8, u32>(&buffer.data[..buffer.data.len() / 4 * 4]));
        let vertex_count = array
            .vertex_buffer
            .and_then(|id| self.buffers.get(&id))
            .map(|buffer| if array.stride == 0 { 0 } else { buffer.data.len() / array.stride as usize });
        let (Some(indices), Some(vertex_count)) = (indices, vertex_count) else {
            return false;
        };
        let end = first_index as usize + index_count as usize;
        if end > indices.len() {
            return false;
        }
        indices[first_index as usize..end].iter().all(|&index| {
            let vertex = i64::from(index) + i64::from(base_vertex);
            vertex >= 0 && (vertex as usize) < vertex_count
        })
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8], _usage: BufferUsage) -> RenderResult<BufferId> {
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, HeadlessBuffer { kind, data: data.to_vec(), mapped: false });
        self.commands.push(DeviceCommand::CreateBuffer(id, kind, data.len()));
        Ok(id)
    }

    fn delete_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id).is_some() {
            self.commands.push(DeviceCommand::DeleteBuffer(id));
        }
    }

    fn buffer_data(&mut self, id: BufferId, size: usize, data: Option<&[u8]>, _usage: BufferUsage) -> RenderResult<()> {
        let buffer = self.buffer_mut(id)?;
        let mut store = vec![0u8; size];
        if let Some(data) = data {
            if data.len() > size {
                return Err(RenderError::BufferWrite(format!(
                    "{} bytes do not fit a {} byte store", data.len(), size
                )));
            }
            store[..data.len()].copy_from_slice(data);
        }
        buffer.data = store;
        self.commands.push(DeviceCommand::BufferData(id, size));
        Ok(())
    }

    fn buffer_sub_data(&mut self, id: BufferId, offset: usize, data: &[u8]) -> RenderResult<()> {
        let buffer = self.buffer_mut(id)?;
        if buffer.mapped {
            return Err(RenderError::BufferWrite(format!("buffer {:?} is mapped", id)));
        }
        let end = offset + data.len();
        if end > buffer.data.len() {
            return Err(RenderError::BufferWrite(format!(
                "write of {} bytes at {} overflows {} byte buffer {:?}",
                data.len(), offset, buffer.data.len(), id
            )));
        }
        buffer.data[offset..end].copy_from_slice(data);
        self.commands.push(DeviceCommand::BufferSubData(id, offset, data.len()));
        Ok(())
    }

    fn invalidate_buffer(&mut self, id: BufferId) -> RenderResult<()> {
        self.buffer_mut(id)?;
        self.commands.push(DeviceCommand::InvalidateBuffer(id));
        Ok(())
    }

    fn map_buffer(&mut self, id: BufferId, offset: usize, len: usize, access: MapAccess) -> RenderResult<&mut [u8]> {
        self.commands.push(DeviceCommand::MapBuffer(id, access));
        let buffer = self.buffer_mut(id)?;
        if buffer.mapped {
            return Err(RenderError::BufferWrite(format!("buffer {:?} is already mapped", id)));
        }
        if offset + len > buffer.data.len() {
            return Err(RenderError::BufferWrite(format!(
                "map of {} bytes at {} overflows {} byte buffer {:?}",
                len, offset, buffer.data.len(), id
            )));
        }
        buffer.mapped = true;
        Ok(&mut buffer.data[offset..offset + len])
    }

    fn unmap_buffer(&mut self, id: BufferId) -> RenderResult<()> {
        let buffer = self.buffer_mut(id)?;
        if !buffer.mapped {
            return Err(RenderError::BufferWrite(format!("buffer {:?} is not mapped", id)));
        }
        buffer.mapped = false;
        self.commands.push(DeviceCommand::UnmapBuffer(id));
        Ok(())
    }

    fn buffer_size(&self, id: BufferId) -> Option<usize> {
        self.buffers.get(&id).map(|buffer| buffer.data.len())
    }

    fn bind_uniform_buffer(&mut self, binding: u32, id: BufferId) {
        self.uniform_bindings.insert(binding, id);
        self.commands.push(DeviceCommand::BindUniformBuffer(binding, id));
    }

    fn max_uniform_buffer_bindings(&self) -> u32 {
        self.max_uniform_bindings
    }

    fn create_program(&mut self, label: &str, sources: &ShaderSources) -> RenderResult<ProgramId> {
        let interface = reflection::reflect(&sources.vertex, &sources.fragment).map_err(|message| {
            RenderError::ShaderCompilation { program: label.to_string(), message }
        })?;
        let id = ProgramId(self.allocate_id());
        self.programs.insert(id, HeadlessProgram {
            label: label.to_string(),
            interface,
            block_bindings: HashMap::new(),
            sampler_units: HashMap::new(),
        });
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.programs.remove(&id);
        if self.current_program == Some(id) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, id: ProgramId) {
        self.current_program = Some(id);
        self.commands.push(DeviceCommand::UseProgram(id));
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        let program = self.programs.get(&program)?;
        program.interface.attributes.iter().position(|n| n == name).map(|i| i as u32)
    }

    fn uniform_block_index(&self, program: ProgramId, name: &str) -> Option<u32> {
        let program = self.programs.get(&program)?;
        program.interface.blocks.iter().position(|n| n == name).map(|i| i as u32)
    }

    fn uniform_block_binding(&mut self, program: ProgramId, block_index: u32, binding: u32) {
        if let Some(program) = self.programs.get_mut(&program) {
            program.block_bindings.insert(block_index, binding);
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<i32> {
        let program = self.programs.get(&program)?;
        program.interface.uniforms.iter().position(|n| n == name).map(|i| i as i32)
    }

    fn set_sampler_unit(&mut self, program: ProgramId, location: i32, unit: u32) {
        if let Some(program) = self.programs.get_mut(&program) {
            program.sampler_units.insert(location, unit);
        }
    }

    fn create_vertex_array(&mut self) -> RenderResult<VertexArrayId> {
        let id = VertexArrayId(self.allocate_id());
        self.vertex_arrays.insert(id, HeadlessVertexArray::default());
        Ok(id)
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) {
        self.vertex_arrays.remove(&id);
        if self.current_vertex_array == Some(id) {
            self.current_vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, id: VertexArrayId) {
        self.current_vertex_array = Some(id);
        self.commands.push(DeviceCommand::BindVertexArray(id));
    }

    fn set_vertex_attribute_format(&mut self, vao: VertexArrayId, format: VertexAttributeFormat) {
        if let Some(array) = self.vertex_arrays.get_mut(&vao) {
            array.attributes.insert(format.location, format);
            self.commands.push(DeviceCommand::VertexAttributeFormat(vao, format));
        }
    }

    fn disable_vertex_attribute(&mut self, vao: VertexArrayId, location: u32) {
        if let Some(array) = self.vertex_arrays.get_mut(&vao) {
            array.attributes.remove(&location);
        }
    }

    fn set_vertex_array_buffers(&mut self, vao: VertexArrayId, vertex_buffer: BufferId, index_buffer: BufferId, stride: u32) {
        if let Some(array) = self.vertex_arrays.get_mut(&vao) {
            array.vertex_buffer = Some(vertex_buffer);
            array.index_buffer = Some(index_buffer);
            array.stride = stride;
            self.commands.push(DeviceCommand::VertexArrayBuffers(vao, vertex_buffer, index_buffer));
        }
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> RenderResult<TextureId> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(RenderError::ResourceCreationFailed("zero-sized texture".to_string()));
        }
        let id = TextureId(self.allocate_id());
        self.textures.insert(id, *descriptor);
        self.commands.push(DeviceCommand::CreateTexture(id, descriptor.kind));
        Ok(id)
    }

    fn delete_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            self.commands.push(DeviceCommand::DeleteTexture(id));
        }
    }

    fn bind_texture(&mut self, unit: u32, _kind: TextureKind, texture: Option<TextureId>) {
        self.texture_units.insert(unit, texture);
        self.commands.push(DeviceCommand::BindTexture(unit, texture));
    }

    fn create_framebuffer(&mut self) -> RenderResult<FramebufferId> {
        let id = FramebufferId(self.allocate_id());
        self.framebuffers.insert(id, None);
        Ok(id)
    }

    fn delete_framebuffer(&mut self, id: FramebufferId) {
        self.framebuffers.remove(&id);
        if self.current_framebuffer == Some(id) {
            self.current_framebuffer = None;
        }
    }

    fn attach_depth(&mut self, framebuffer: FramebufferId, attachment: DepthAttachment) {
        if let Some(slot) = self.framebuffers.get_mut(&framebuffer) {
            *slot = Some(attachment);
            self.commands.push(DeviceCommand::AttachDepth(framebuffer, attachment));
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.current_framebuffer = framebuffer;
        self.commands.push(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.commands.push(DeviceCommand::Viewport(width, height));
    }

    fn set_color_write(&mut self, enabled: bool) {
        self.color_write = enabled;
    }

    fn clear_depth(&mut self) {
        self.commands.push(DeviceCommand::ClearDepth);
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) {
        let in_bounds = self.index_range_in_bounds(index_count, first_index, base_vertex);
        if !in_bounds {
            log::warn!(
                "Headless draw out of bounds: {} indices from {} (base vertex {})",
                index_count, first_index, base_vertex
            );
        }
        let uniforms = self
            .uniform_bindings
            .iter()
            .filter_map(|(binding, id)| self.buffers.get(id).map(|buffer| (*binding, buffer.data.clone())))
            .collect();
        let depth_attachment = self
            .current_framebuffer
            .and_then(|id| self.framebuffers.get(&id).copied().flatten());
        self.draws.push(DrawRecord {
            program: self.current_program,
            vertex_array: self.current_vertex_array,
            framebuffer: self.current_framebuffer,
            depth_attachment,
            color_write: self.color_write,
            index_count,
            first_index,
            base_vertex,
            uniforms,
            textures: self.texture_units.clone(),
            in_bounds,
        });
        self.commands.push(DeviceCommand::DrawIndexed { index_count, first_index, base_vertex });
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
