//! Shared geometry storage
//!
//! Many meshes live in one growable vertex/index store per vertex layout.
//! Each mesh is addressed by the offsets recorded when it was added; the
//! store is uploaded to the device lazily, only after it changed.

pub mod description;
pub mod buffer;

pub use description::{GeometryDescription, VertexAttribute, AttributeLayout};
pub use buffer::{GeometryBuffer, MeshId, MeshOffsetData, GpuGeometry};
