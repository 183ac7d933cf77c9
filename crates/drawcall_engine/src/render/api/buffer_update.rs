//! Buffer update strategies
//!
//! The per-object, material, light and shadow blocks are single uniform
//! buffers that are overwritten before every draw (or every frame) instead of
//! one buffer per object. How the overwrite reaches the driver decides
//! whether it stalls on in-flight draws or churns memory, so each call site
//! picks a [`BufferUpdateMode`] from configuration. The observable contents
//! are the same for every mode.

use serde::{Serialize, Deserialize};

use crate::render::api::{BufferId, BufferKind, BufferUsage, GraphicsDevice, MapAccess};
use crate::render::RenderResult;

/// How a uniform buffer is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BufferUpdateMode {
    /// Plain sub-data write
    #[default]
    SubData,
    /// Invalidate hint, then sub-data write
    InvalidateSubData,
    /// Map with buffer invalidation, copy, unmap
    MapInvalidate,
    /// Re-specify the data store (orphaning), then sub-data write
    Orphan,
    /// Map for writing, copy, unmap
    MapWrite,
}

/// Write `data` to the start of `buffer` using `mode`
///
/// The buffer must already be at least `data.len()` bytes long.
pub fn update_buffer(
    device: &mut dyn GraphicsDevice,
    buffer: BufferId,
    data: &[u8],
    mode: BufferUpdateMode,
) -> RenderResult<()> {
    match mode {
        BufferUpdateMode::SubData => device.buffer_sub_data(buffer, 0, data),
        BufferUpdateMode::InvalidateSubData => {
            device.invalidate_buffer(buffer)?;
            device.buffer_sub_data(buffer, 0, data)
        }
        BufferUpdateMode::MapInvalidate => {
            let mapped = device.map_buffer(
                buffer,
                0,
                data.len(),
                MapAccess::WRITE | MapAccess::INVALIDATE_BUFFER,
            )?;
            mapped.copy_from_slice(data);
            device.unmap_buffer(buffer)
        }
        BufferUpdateMode::Orphan => {
            let size = device.buffer_size(buffer).unwrap_or(0).max(data.len());
            device.buffer_data(buffer, size, None, BufferUsage::Dynamic)?;
            device.buffer_sub_data(buffer, 0, data)
        }
        BufferUpdateMode::MapWrite => {
            let mapped = device.map_buffer(buffer, 0, data.len(), MapAccess::WRITE)?;
            mapped.copy_from_slice(data);
            device.unmap_buffer(buffer)
        }
    }
}

/// Uniform buffer attached to a fixed binding point, grown on demand
#[derive(Debug)]
pub struct UniformBuffer {
    id: BufferId,
    binding: u32,
    capacity: usize,
}

impl UniformBuffer {
    /// Create a zero-filled uniform buffer and attach it to `binding`
    pub fn new(device: &mut dyn GraphicsDevice, binding: u32, capacity: usize) -> RenderResult<Self> {
        let id = device.create_buffer(BufferKind::Uniform, &vec![0u8; capacity], BufferUsage::Dynamic)?;
        device.bind_uniform_buffer(binding, id);
        log::debug!("Created uniform buffer {:?} at binding {} ({} bytes)", id, binding, capacity);
        Ok(Self { id, binding, capacity })
    }

    /// Underlying buffer handle
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Binding point
    pub fn binding(&self) -> u32 {
        self.binding
    }

    /// Current size of the data store
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overwrite the start of the buffer with `data`
    pub fn write(&mut self, device: &mut dyn GraphicsDevice, data: &[u8], mode: BufferUpdateMode) -> RenderResult<()> {
        if data.len() > self.capacity {
            log::debug!(
                "Growing uniform buffer at binding {} from {} to {} bytes",
                self.binding, self.capacity, data.len()
            );
            device.buffer_data(self.id, data.len(), Some(data), BufferUsage::Dynamic)?;
            self.capacity = data.len();
            return Ok(());
        }
        update_buffer(device, self.id, data, mode)
    }

    /// Delete the buffer
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.delete_buffer(self.id);
    }
}
