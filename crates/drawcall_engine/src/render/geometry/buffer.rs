//! Geometry buffer with per-mesh sub-allocation
//!
//! Vertices of every mesh are appended to one byte array and indices to one
//! `u32` array. Indices stay local to their mesh (they start at 0); a draw
//! adds the mesh's base vertex. Registration order is kept so removal can
//! close the gap by shifting every later mesh down.

use crate::render::api::{BufferId, BufferKind, BufferUsage, GraphicsDevice};
use crate::render::RenderResult;

use super::GeometryDescription;

/// Identifier of one mesh inside a [`GeometryBuffer`]; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Where one mesh lives inside the shared arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshOffsetData {
    /// First vertex of the mesh
    pub base_vertex: u32,
    /// Number of vertices
    pub vertex_count: u32,
    /// First index of the mesh
    pub index_start: u32,
    /// Number of indices
    pub index_count: u32,
}

/// Device buffers holding the last uploaded contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuGeometry {
    /// Vertex buffer
    pub vertex_buffer: BufferId,
    /// Index buffer
    pub index_buffer: BufferId,
}

/// Shared, growable vertex/index store
#[derive(Debug)]
pub struct GeometryBuffer {
    label: String,
    description: Option<GeometryDescription>,
    vertices: Vec<u8>,
    indices: Vec<u32>,
    meshes: Vec<(MeshId, MeshOffsetData)>,
    next_mesh_id: u32,
    dirty: bool,
    gpu: Option<GpuGeometry>,
}

impl GeometryBuffer {
    /// Create an empty buffer; the first mesh added fixes its layout
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            vertices: Vec::new(),
            indices: Vec::new(),
            meshes: Vec::new(),
            next_mesh_id: 1,
            dirty: false,
            gpu: None,
        }
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Layout shared by every mesh, once established
    pub fn description(&self) -> Option<&GeometryDescription> {
        self.description.as_ref()
    }

    /// Append a mesh
    ///
    /// `vertices` holds `floats_per_vertex()` values per vertex in the
    /// description's slot order. Returns `None` when the description is
    /// invalid or differs from the buffer's, when the vertex data is not a
    /// whole number of vertices, or when an index points past the mesh.
    pub fn add_mesh(&mut self, description: &GeometryDescription, vertices: &[f32], indices: &[u32]) -> Option<MeshId> {
        if !description.is_valid() {
            log::warn!("Geometry buffer '{}': rejected mesh with invalid layout {:?}", self.label, description);
            return None;
        }
        if let Some(existing) = &self.description {
            if !self.meshes.is_empty() && existing != description {
                log::warn!(
                    "Geometry buffer '{}': mesh layout {:?} does not match buffer layout {:?}",
                    self.label, description, existing
                );
                return None;
            }
        }

        let floats_per_vertex = description.floats_per_vertex();
        if vertices.len() % floats_per_vertex != 0 {
            log::warn!(
                "Geometry buffer '{}': {} floats is not a whole number of {}-float vertices",
                self.label, vertices.len(), floats_per_vertex
            );
            return None;
        }
        let vertex_count = (vertices.len() / floats_per_vertex) as u32;
        if let Some(&bad) = indices.iter().find(|&&index| index >= vertex_count) {
            log::warn!(
                "Geometry buffer '{}': index {} out of range for {} vertices",
                self.label, bad, vertex_count
            );
            return None;
        }

        let offset = MeshOffsetData {
            base_vertex: self.vertex_count() as u32,
            vertex_count,
            index_start: self.indices.len() as u32,
            index_count: indices.len() as u32,
        };

        let id = MeshId(self.next_mesh_id);
        self.next_mesh_id += 1;
        self.description = Some(*description);
        self.vertices.extend_from_slice(bytemuck::cast_slice(vertices));
        self.indices.extend_from_slice(indices);
        self.meshes.push((id, offset));
        self.dirty = true;

        log::trace!("Geometry buffer '{}': added mesh {:?} at {:?}", self.label, id, offset);
        Some(id)
    }

    /// Remove a mesh and close the gap it leaves
    pub fn remove_mesh(&mut self, id: MeshId) -> bool {
        let Some(position) = self.meshes.iter().position(|(mesh, _)| *mesh == id) else {
            return false;
        };
        let (_, removed) = self.meshes.remove(position);

        for (_, later) in self.meshes.iter_mut().skip(position) {
            later.base_vertex -= removed.vertex_count;
            later.index_start -= removed.index_count;
        }

        let stride = self.stride() as usize;
        let byte_start = removed.base_vertex as usize * stride;
        let byte_end = byte_start + removed.vertex_count as usize * stride;
        self.vertices.drain(byte_start..byte_end);

        let index_start = removed.index_start as usize;
        self.indices.drain(index_start..index_start + removed.index_count as usize);

        self.dirty = true;
        log::trace!("Geometry buffer '{}': removed mesh {:?}", self.label, id);
        true
    }

    /// Offsets of a live mesh
    pub fn try_get_offset(&self, id: MeshId) -> Option<MeshOffsetData> {
        self.meshes.iter().find(|(mesh, _)| *mesh == id).map(|(_, offset)| *offset)
    }

    /// Upload to the device when the contents changed since the last upload
    ///
    /// Device buffers are recreated rather than updated because the size may
    /// have changed. The previous pair is only released once both new
    /// buffers exist, so a failed upload leaves the last one in place.
    /// Returns whether an upload happened.
    pub fn update_if_dirty(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<bool> {
        if !self.dirty && self.gpu.is_some() {
            return Ok(false);
        }

        let vertex_buffer = device.create_buffer(BufferKind::Vertex, &self.vertices, BufferUsage::Static)?;
        let index_buffer = match device.create_buffer(
            BufferKind::Index,
            bytemuck::cast_slice(&self.indices),
            BufferUsage::Static,
        ) {
            Ok(id) => id,
            Err(error) => {
                device.delete_buffer(vertex_buffer);
                return Err(error);
            }
        };

        if let Some(previous) = self.gpu.replace(GpuGeometry { vertex_buffer, index_buffer }) {
            device.delete_buffer(previous.vertex_buffer);
            device.delete_buffer(previous.index_buffer);
        }
        self.dirty = false;
        log::debug!(
            "Geometry buffer '{}': uploaded {} vertices / {} indices",
            self.label, self.vertex_count(), self.indices.len()
        );
        Ok(true)
    }

    /// Device buffers from the last upload
    pub fn gpu_buffers(&self) -> Option<GpuGeometry> {
        self.gpu
    }

    /// Whether the contents changed since the last upload
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bytes per vertex (0 before the first mesh)
    pub fn stride(&self) -> u32 {
        self.description.map(|d| d.stride()).unwrap_or(0)
    }

    /// Total vertices stored
    pub fn vertex_count(&self) -> usize {
        match self.stride() {
            0 => 0,
            stride => self.vertices.len() / stride as usize,
        }
    }

    /// Total indices stored
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of live meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Live meshes in registration order
    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, MeshOffsetData)> + '_ {
        self.meshes.iter().copied()
    }

    /// Delete device buffers; the CPU copy is kept and re-uploaded on next use
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(gpu) = self.gpu.take() {
            device.delete_buffer(gpu.vertex_buffer);
            device.delete_buffer(gpu.index_buffer);
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::{DeviceCommand, HeadlessDevice};
    use crate::render::geometry::VertexAttribute;

    fn position_only() -> GeometryDescription {
        GeometryDescription::new().with(VertexAttribute::Position, 3)
    }

    fn triangle_fan(vertex_count: u32) -> (Vec<f32>, Vec<u32>) {
        let vertices = (0..vertex_count * 3).map(|v| v as f32).collect();
        let indices = (1..vertex_count.saturating_sub(1))
            .flat_map(|i| [0, i, i + 1])
            .collect();
        (vertices, indices)
    }

    fn assert_contiguous(buffer: &GeometryBuffer) {
        let mut expected_vertex = 0;
        let mut expected_index = 0;
        for (_, offset) in buffer.meshes() {
            assert_eq!(offset.base_vertex, expected_vertex);
            assert_eq!(offset.index_start, expected_index);
            expected_vertex += offset.vertex_count;
            expected_index += offset.index_count;
        }
        assert_eq!(expected_vertex as usize, buffer.vertex_count());
        assert_eq!(expected_index as usize, buffer.index_count());
    }

    #[test]
    fn test_add_mesh_assigns_consecutive_offsets() {
        let mut buffer = GeometryBuffer::new("test");
        let (v, i) = triangle_fan(4);
        let first = buffer.add_mesh(&position_only(), &v, &i).unwrap();
        let second = buffer.add_mesh(&position_only(), &v, &i).unwrap();

        assert_ne!(first, second);
        let offset = buffer.try_get_offset(second).unwrap();
        assert_eq!(offset.base_vertex, 4);
        assert_eq!(offset.index_start, 6);
        assert_eq!(offset.index_count, 6);
        assert_contiguous(&buffer);
    }

    #[test]
    fn test_removing_first_of_three_shifts_the_rest() {
        let mut buffer = GeometryBuffer::new("test");
        let (v0, i0) = triangle_fan(5);
        let (v1, i1) = triangle_fan(3);
        let (v2, i2) = triangle_fan(4);
        let m0 = buffer.add_mesh(&position_only(), &v0, &i0).unwrap();
        let m1 = buffer.add_mesh(&position_only(), &v1, &i1).unwrap();
        let m2 = buffer.add_mesh(&position_only(), &v2, &i2).unwrap();

        let before_1 = buffer.try_get_offset(m1).unwrap();
        let before_2 = buffer.try_get_offset(m2).unwrap();
        let removed = buffer.try_get_offset(m0).unwrap();

        assert!(buffer.remove_mesh(m0));
        assert!(buffer.try_get_offset(m0).is_none());

        let after_1 = buffer.try_get_offset(m1).unwrap();
        let after_2 = buffer.try_get_offset(m2).unwrap();
        assert_eq!(after_1.base_vertex, before_1.base_vertex - removed.vertex_count);
        assert_eq!(after_2.base_vertex, before_2.base_vertex - removed.vertex_count);
        assert_eq!(after_1.index_start, before_1.index_start - removed.index_count);
        assert_eq!(after_2.index_start, before_2.index_start - removed.index_count);
        assert_contiguous(&buffer);
    }

    #[test]
    fn test_removal_keeps_remaining_vertex_bytes() {
        let mut buffer = GeometryBuffer::new("test");
        let first = buffer.add_mesh(&position_only(), &[0.0; 9], &[0, 1, 2]).unwrap();
        let second = buffer.add_mesh(&position_only(), &[7.0; 9], &[0, 1, 2]).unwrap();
        buffer.remove_mesh(first);

        let offset = buffer.try_get_offset(second).unwrap();
        assert_eq!(offset.base_vertex, 0);
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&buffer.vertices);
        assert_eq!(floats, vec![7.0; 9]);
    }

    #[test]
    fn test_mixed_add_remove_sequence_stays_contiguous() {
        let mut buffer = GeometryBuffer::new("test");
        let mut live = Vec::new();
        for round in 0..12u32 {
            let (v, i) = triangle_fan(3 + round % 4);
            live.push(buffer.add_mesh(&position_only(), &v, &i).unwrap());
            if round % 3 == 2 {
                let victim = live.remove((round as usize * 7) % live.len());
                assert!(buffer.remove_mesh(victim));
            }
            assert_contiguous(&buffer);
        }
        assert_eq!(buffer.mesh_count(), live.len());
    }

    #[test]
    fn test_layout_mismatch_is_rejected() {
        let mut buffer = GeometryBuffer::new("test");
        buffer.add_mesh(&position_only(), &[0.0; 9], &[0, 1, 2]).unwrap();

        let other = GeometryDescription::position_normal_texcoord();
        assert!(buffer.add_mesh(&other, &[0.0; 24], &[0, 1, 2]).is_none());
        assert_eq!(buffer.mesh_count(), 1);
    }

    #[test]
    fn test_empty_buffer_adopts_new_layout() {
        let mut buffer = GeometryBuffer::new("test");
        let mesh = buffer.add_mesh(&position_only(), &[0.0; 9], &[0, 1, 2]).unwrap();
        buffer.remove_mesh(mesh);

        let other = GeometryDescription::position_normal_texcoord();
        assert!(buffer.add_mesh(&other, &[0.0; 24], &[0, 1, 2]).is_some());
        assert_eq!(buffer.stride(), 32);
    }

    #[test]
    fn test_degenerate_vertex_data_is_rejected() {
        let mut buffer = GeometryBuffer::new("test");
        assert!(buffer.add_mesh(&position_only(), &[0.0; 8], &[0, 1]).is_none());
        assert!(buffer.add_mesh(&position_only(), &[0.0; 9], &[0, 1, 3]).is_none());
        assert_eq!(buffer.mesh_count(), 0);
    }

    #[test]
    fn test_upload_only_when_dirty() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GeometryBuffer::new("test");
        buffer.add_mesh(&position_only(), &[0.0; 9], &[0, 1, 2]).unwrap();

        assert!(buffer.update_if_dirty(&mut device).unwrap());
        let first = buffer.gpu_buffers().unwrap();
        assert!(!buffer.update_if_dirty(&mut device).unwrap());
        assert_eq!(buffer.gpu_buffers(), Some(first));

        buffer.add_mesh(&position_only(), &[1.0; 9], &[0, 1, 2]).unwrap();
        assert!(buffer.update_if_dirty(&mut device).unwrap());
        let second = buffer.gpu_buffers().unwrap();
        assert_ne!(first.vertex_buffer, second.vertex_buffer);
        assert!(device.buffer_contents(first.vertex_buffer).is_none());
        assert_eq!(device.buffer_contents(second.vertex_buffer).unwrap().len(), 72);
        assert_eq!(device.live_buffer_count(BufferKind::Vertex), 1);
    }

    #[test]
    fn test_reupload_creates_before_releasing() {
        let mut device = HeadlessDevice::new();
        let mut buffer = GeometryBuffer::new("test");
        buffer.add_mesh(&position_only(), &[0.0; 9], &[0, 1, 2]).unwrap();
        buffer.update_if_dirty(&mut device).unwrap();
        let first = buffer.gpu_buffers().unwrap();

        buffer.add_mesh(&position_only(), &[1.0; 9], &[0, 1, 2]).unwrap();
        device.clear_log();
        buffer.update_if_dirty(&mut device).unwrap();
        let second = buffer.gpu_buffers().unwrap();

        assert_eq!(
            device.commands(),
            &[
                DeviceCommand::CreateBuffer(second.vertex_buffer, BufferKind::Vertex, 72),
                DeviceCommand::CreateBuffer(second.index_buffer, BufferKind::Index, 24),
                DeviceCommand::DeleteBuffer(first.vertex_buffer),
                DeviceCommand::DeleteBuffer(first.index_buffer),
            ]
        );
    }
}
