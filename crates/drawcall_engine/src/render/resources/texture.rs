//! Texture handles and the texture store
//!
//! Image decoding is done by the asset layer; the store only maps names to
//! textures already resident on the device. Names starting with `atlas-`
//! resolve against the atlas catalog (composite textures built from many
//! images) instead of the plain one.

use std::rc::Rc;

use crate::render::api::{TextureId, TextureKind};
use super::registry::{ResourceReference, ResourceResolver, ResourceStore};

/// Prefix selecting the atlas catalog
pub const ATLAS_PREFIX: &str = "atlas-";

/// Device texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    /// Device handle
    pub id: TextureId,
    /// Shape used when binding
    pub kind: TextureKind,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
}

impl Texture {
    /// 2D texture
    pub fn new_2d(id: TextureId, width: u32, height: u32) -> Self {
        Self { id, kind: TextureKind::Texture2D, width, height }
    }
}

/// Lazily resolved texture
pub type TextureReference = ResourceReference<Texture>;

/// Name to texture catalog with a separate atlas namespace
#[derive(Debug)]
pub struct TextureStore {
    textures: ResourceStore<Texture>,
    atlases: ResourceStore<Texture>,
}

impl TextureStore {
    /// Empty store
    pub fn new() -> Self {
        Self {
            textures: ResourceStore::new("texture"),
            atlases: ResourceStore::new("atlas"),
        }
    }

    /// Add a plain texture
    pub fn insert(&self, name: impl Into<String>, texture: Texture) -> Rc<Texture> {
        self.textures.insert(name, texture)
    }

    /// Add an atlas, addressed as `atlas-<name>`
    pub fn insert_atlas(&self, name: impl Into<String>, texture: Texture) -> Rc<Texture> {
        self.atlases.insert(name, texture)
    }

    /// Number of plain textures and atlases
    pub fn len(&self) -> usize {
        self.textures.len() + self.atlases.len()
    }

    /// Whether nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TextureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceResolver<Texture> for TextureStore {
    fn resolve(&self, name: &str) -> Option<Rc<Texture>> {
        match name.strip_prefix(ATLAS_PREFIX) {
            Some(atlas) => self.atlases.resolve(atlas),
            None => self.textures.resolve(name),
        }
    }
}
