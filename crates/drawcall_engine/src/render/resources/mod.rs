//! Named rendering resources
//!
//! Programs, materials, meshes and textures are loaded into name-keyed
//! stores collected in a [`RenderContext`]. Draw calls and materials refer to
//! them by name through [`ResourceReference`]s, which resolve on first use
//! and remember the result as long as the resource stays loaded.

pub mod registry;
pub mod mesh;
pub mod texture;
pub mod materials;
pub mod program;

pub use registry::{ResourceReference, ResourceResolver, ResourceStore};
pub use mesh::{Mesh, MeshReference, SharedGeometryBuffer};
pub use texture::{Texture, TextureReference, TextureStore, ATLAS_PREFIX};
pub use materials::{
    Material, MaterialDescription, MaterialProperty, MaterialReference, MaterialStore, PropertyKind,
    PropertyValue, SerializableMaterial,
};
pub use program::{
    Program, ProgramDescription, ProgramReference, ProgramStore, ShaderSource, LIGHT_BLOCK_BINDING,
    MATERIAL_BLOCK_BINDING, OBJECT_BLOCK_BINDING, REQUIRED_UNIFORM_BINDINGS, SHADOW_BLOCK_BINDING,
};

/// Loaded meshes by name
pub type MeshStore = ResourceStore<Mesh>;

/// Every resource catalog the renderer resolves names against
///
/// The application creates one and shares it (behind an `Rc`) with every
/// renderer that draws from it.
#[derive(Debug)]
pub struct RenderContext {
    /// Compiled programs
    pub programs: ProgramStore,
    /// Materials
    pub materials: MaterialStore,
    /// Meshes
    pub meshes: MeshStore,
    /// Textures and atlases
    pub textures: TextureStore,
}

impl RenderContext {
    /// Empty catalogs
    pub fn new() -> Self {
        Self {
            programs: ResourceStore::new("program"),
            materials: ResourceStore::new("material"),
            meshes: ResourceStore::new("mesh"),
            textures: TextureStore::new(),
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}
