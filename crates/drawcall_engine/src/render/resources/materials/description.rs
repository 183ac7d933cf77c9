//! Material layouts declared by programs
//!
//! A program declares the uniform block its fragment stage reads as an
//! ordered list of properties. The order is fixed when the program is loaded
//! and is the packing order: property `n` starts right after property `n-1`,
//! each taking `components * 4` bytes. No std140 padding is inserted; the
//! shader author lays the block out so the packed form matches it.

use serde::{Serialize, Deserialize};

use crate::render::{RenderError, RenderResult};

/// Scalar type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// 32-bit signed integer components
    Int,
    /// 32-bit float components
    Float,
}

/// Up to four components of one property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Integer vector
    Int([i32; 4]),
    /// Float vector
    Float([f32; 4]),
}

impl PropertyValue {
    /// Float value from 1 to 4 components, zero-padded
    pub fn float(values: &[f32]) -> Self {
        let mut padded = [0.0; 4];
        for (slot, value) in padded.iter_mut().zip(values) {
            *slot = *value;
        }
        Self::Float(padded)
    }

    /// Integer value from 1 to 4 components, zero-padded
    pub fn int(values: &[i32]) -> Self {
        let mut padded = [0; 4];
        for (slot, value) in padded.iter_mut().zip(values) {
            *slot = *value;
        }
        Self::Int(padded)
    }

    /// Scalar type
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Int(_) => PropertyKind::Int,
            Self::Float(_) => PropertyKind::Float,
        }
    }

    /// Append the first `components` components as native-endian bytes
    pub fn write_bytes(&self, components: u32, out: &mut Vec<u8>) {
        let count = components.min(4) as usize;
        match self {
            Self::Int(values) => out.extend_from_slice(bytemuck::cast_slice(&values[..count])),
            Self::Float(values) => out.extend_from_slice(bytemuck::cast_slice(&values[..count])),
        }
    }
}

/// One entry of a material layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperty {
    /// Name materials override it by
    pub name: String,
    /// Component count, 1 to 4
    pub components: u32,
    /// Scalar type
    pub kind: PropertyKind,
    /// Value used when a material does not override it
    pub default: PropertyValue,
}

impl MaterialProperty {
    /// Float property whose component count is the length of `default`
    pub fn float(name: impl Into<String>, default: &[f32]) -> Self {
        Self {
            name: name.into(),
            components: default.len() as u32,
            kind: PropertyKind::Float,
            default: PropertyValue::float(default),
        }
    }

    /// Integer property whose component count is the length of `default`
    pub fn int(name: impl Into<String>, default: &[i32]) -> Self {
        Self {
            name: name.into(),
            components: default.len() as u32,
            kind: PropertyKind::Int,
            default: PropertyValue::int(default),
        }
    }

    /// Packed size in bytes
    pub fn byte_size(&self) -> usize {
        self.components as usize * 4
    }
}

/// Ordered material layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialDescription {
    properties: Vec<MaterialProperty>,
}

impl MaterialDescription {
    /// Validate and freeze a property list
    ///
    /// Rejects component counts outside 1..=4, defaults whose type differs
    /// from the declared one, and duplicate names.
    pub fn new(properties: Vec<MaterialProperty>) -> RenderResult<Self> {
        for (index, property) in properties.iter().enumerate() {
            if !(1..=4).contains(&property.components) {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "material property '{}' has {} components",
                    property.name, property.components
                )));
            }
            if property.default.kind() != property.kind {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "material property '{}' default is {:?}, declared {:?}",
                    property.name,
                    property.default.kind(),
                    property.kind
                )));
            }
            if properties[..index].iter().any(|earlier| earlier.name == property.name) {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "material property '{}' declared twice",
                    property.name
                )));
            }
        }
        Ok(Self { properties })
    }

    /// Properties in packing order
    pub fn properties(&self) -> &[MaterialProperty] {
        &self.properties
    }

    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&MaterialProperty> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the layout has no properties
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Packed size in bytes
    pub fn byte_size(&self) -> usize {
        self.properties.iter().map(MaterialProperty::byte_size).sum()
    }

    /// Whether the packed size is a multiple of 16 bytes
    pub fn is_aligned(&self) -> bool {
        self.byte_size() % 16 == 0
    }

    /// Every default packed in order
    pub fn default_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_size());
        for property in &self.properties {
            property.default.write_bytes(property.components, &mut bytes);
        }
        bytes
    }
}
