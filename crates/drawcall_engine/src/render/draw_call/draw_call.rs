//! Draw call records and the handles that address them

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::foundation::math::Mat4;
use crate::render::resources::{MaterialReference, MeshReference};

/// Shared world transform; the owner updates it, the renderer reads it each frame
pub type SharedTransform = Rc<Cell<Mat4>>;

/// One renderable unit: geometry, material and world transform
#[derive(Clone)]
pub struct DrawCall {
    /// Mesh to draw
    pub geometry: MeshReference,
    /// Material to draw it with
    pub material: MaterialReference,
    /// World transform
    pub transform: SharedTransform,
    /// Debug label
    pub label: String,
    /// Disabled calls stay submitted but are not drawn
    pub enabled: bool,
}

impl DrawCall {
    /// Enabled draw call with its own transform
    pub fn new(geometry: impl Into<String>, material: impl Into<String>, transform: Mat4) -> Self {
        Self::with_shared_transform(geometry, material, Rc::new(Cell::new(transform)))
    }

    /// Enabled draw call reading a transform owned elsewhere
    pub fn with_shared_transform(
        geometry: impl Into<String>,
        material: impl Into<String>,
        transform: SharedTransform,
    ) -> Self {
        let geometry = geometry.into();
        Self {
            label: geometry.clone(),
            geometry: MeshReference::new(geometry),
            material: MaterialReference::new(material),
            transform,
            enabled: true,
        }
    }

    /// Builder: debug label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Current world transform
    pub fn world(&self) -> Mat4 {
        self.transform.get()
    }
}

impl PartialEq for DrawCall {
    /// Same resources by name, same transform cell, same label and flag
    fn eq(&self, other: &Self) -> bool {
        self.geometry == other.geometry
            && self.material == other.material
            && Rc::ptr_eq(&self.transform, &other.transform)
            && self.label == other.label
            && self.enabled == other.enabled
    }
}

impl fmt::Debug for DrawCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCall")
            .field("label", &self.label)
            .field("geometry", &self.geometry.name())
            .field("material", &self.material.name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Key of a submitted draw call; keys are never reused by a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawCallKey(pub u64);

/// Key plus the identity of the renderer that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawCallReference {
    /// Draw call key
    pub key: DrawCallKey,
    /// Issuing renderer
    pub renderer_id: u64,
}

/// Either way of addressing a submitted draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCallTarget {
    /// Bare key, trusted to belong to the renderer
    Key(DrawCallKey),
    /// Reference, checked against the renderer
    Reference(DrawCallReference),
}

impl From<DrawCallKey> for DrawCallTarget {
    fn from(key: DrawCallKey) -> Self {
        Self::Key(key)
    }
}

impl From<DrawCallReference> for DrawCallTarget {
    fn from(reference: DrawCallReference) -> Self {
        Self::Reference(reference)
    }
}

impl From<&DrawCallReference> for DrawCallTarget {
    fn from(reference: &DrawCallReference) -> Self {
        Self::Reference(*reference)
    }
}
