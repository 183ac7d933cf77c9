//! Material instances
//!
//! A material names the program it renders with, maps that program's
//! sampler names to textures and overrides some of the program's material
//! properties. Packing against the program's [`MaterialDescription`] turns
//! it into the bytes of the material uniform block.

use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, Deserialize};

use super::description::{MaterialDescription, PropertyValue};
use crate::render::resources::program::ProgramReference;
use crate::render::resources::registry::ResourceReference;
use crate::render::resources::texture::TextureReference;

/// Material record as produced by a description loader
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializableMaterial {
    /// Program name
    pub program: String,
    /// Sampler name to texture name
    pub textures: BTreeMap<String, String>,
    /// Property overrides by name
    pub properties: BTreeMap<String, PropertyValue>,
    /// Whether the material blends with what is behind it
    pub transparent: bool,
}

/// Shader parameters plus the program they are meant for
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    program: ProgramReference,
    textures: BTreeMap<String, TextureReference>,
    properties: HashMap<String, PropertyValue>,
    transparent: bool,
}

impl Material {
    /// Material with no overrides and no textures
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: ProgramReference::new(program),
            textures: BTreeMap::new(),
            properties: HashMap::new(),
            transparent: false,
        }
    }

    /// Build from a loader record
    pub fn from_serializable(name: impl Into<String>, record: &SerializableMaterial) -> Self {
        let mut material = Self::new(name, record.program.clone());
        for (sampler, texture) in &record.textures {
            material.textures.insert(sampler.clone(), TextureReference::new(texture.clone()));
        }
        for (property, value) in &record.properties {
            material.properties.insert(property.clone(), *value);
        }
        material.transparent = record.transparent;
        material
    }

    /// Builder: override a property
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.set_property(name, value);
        self
    }

    /// Builder: map a sampler to a texture name
    pub fn with_texture(mut self, sampler: impl Into<String>, texture: impl Into<String>) -> Self {
        self.textures.insert(sampler.into(), ResourceReference::new(texture));
        self
    }

    /// Builder: mark as transparent
    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program this material renders with
    pub fn program(&self) -> &ProgramReference {
        &self.program
    }

    /// Sampler to texture mapping
    pub fn textures(&self) -> &BTreeMap<String, TextureReference> {
        &self.textures
    }

    /// Texture mapped to a sampler
    pub fn texture(&self, sampler: &str) -> Option<&TextureReference> {
        self.textures.get(sampler)
    }

    /// Override a property
    pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.insert(name.into(), value);
    }

    /// Override of a property, if any
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Whether the material blends with what is behind it
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Pack the material into the layout `description` declares
    ///
    /// Properties are written in declaration order. Each uses this material's
    /// override when it has one of the right type, the declared default
    /// otherwise. The result is exactly [`MaterialDescription::byte_size`]
    /// bytes long.
    pub fn convert_bytes_via_description(&self, description: &MaterialDescription) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(description.byte_size());
        for property in description.properties() {
            let value = match self.properties.get(&property.name) {
                Some(value) if value.kind() == property.kind => value,
                Some(value) => {
                    log::warn!(
                        "Material '{}' overrides '{}' with {:?}, expected {:?}; using default",
                        self.name,
                        property.name,
                        value.kind(),
                        property.kind
                    );
                    &property.default
                }
                None => &property.default,
            };
            value.write_bytes(property.components, &mut bytes);
        }
        bytes
    }
}
