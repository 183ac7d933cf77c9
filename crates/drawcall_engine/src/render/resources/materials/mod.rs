//! Material system
//!
//! Layouts declared by programs and the material instances packed into them.

pub mod description;
pub mod material;

pub use description::{MaterialDescription, MaterialProperty, PropertyKind, PropertyValue};
pub use material::{Material, SerializableMaterial};

use std::collections::HashMap;

use super::registry::{ResourceReference, ResourceStore};

/// Lazily resolved material
pub type MaterialReference = ResourceReference<Material>;

/// Loaded materials by name
pub type MaterialStore = ResourceStore<Material>;

impl ResourceStore<Material> {
    /// Build and insert every record; returns how many were loaded
    pub fn load(&self, records: &HashMap<String, SerializableMaterial>) -> usize {
        for (name, record) in records {
            self.insert(name.clone(), Material::from_serializable(name.clone(), record));
        }
        log::info!("Loaded {} materials", records.len());
        records.len()
    }
}
