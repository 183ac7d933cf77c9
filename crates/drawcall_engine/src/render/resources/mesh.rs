//! Meshes: one sub-allocation inside a shared geometry buffer

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::render::geometry::{GeometryBuffer, GeometryDescription, MeshId, MeshOffsetData};
use super::registry::ResourceReference;

/// Geometry buffer shared between meshes of the same layout
pub type SharedGeometryBuffer = Rc<RefCell<GeometryBuffer>>;

/// Named region of a shared geometry buffer
///
/// Dropping the last handle to a mesh frees its region in the buffer.
pub struct Mesh {
    name: String,
    buffer: SharedGeometryBuffer,
    id: MeshId,
}

impl Mesh {
    /// Add geometry to `buffer` and wrap the resulting region
    ///
    /// Returns `None` when the buffer rejects the data (layout mismatch or
    /// malformed vertex/index arrays).
    pub fn new(
        name: impl Into<String>,
        buffer: &SharedGeometryBuffer,
        description: &GeometryDescription,
        vertices: &[f32],
        indices: &[u32],
    ) -> Option<Self> {
        let name = name.into();
        let id = buffer.borrow_mut().add_mesh(description, vertices, indices);
        match id {
            Some(id) => Some(Self { name, buffer: Rc::clone(buffer), id }),
            None => {
                log::warn!(
                    "Mesh '{}' rejected by geometry buffer '{}'",
                    name,
                    buffer.borrow().label()
                );
                None
            }
        }
    }

    /// Mesh name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id inside the owning buffer
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Owning buffer
    pub fn buffer(&self) -> &SharedGeometryBuffer {
        &self.buffer
    }

    /// Current offsets; they move when earlier meshes are removed
    pub fn offset(&self) -> Option<MeshOffsetData> {
        self.buffer.borrow().try_get_offset(self.id)
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        match self.buffer.try_borrow_mut() {
            Ok(mut buffer) => {
                buffer.remove_mesh(self.id);
            }
            Err(_) => log::warn!("Geometry buffer busy, mesh '{}' region leaked", self.name),
        }
    }
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("offset", &self.offset())
            .finish()
    }
}

/// Lazily resolved mesh
pub type MeshReference = ResourceReference<Mesh>;
