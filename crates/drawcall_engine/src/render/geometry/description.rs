//! Per-vertex attribute layout

use serde::{Serialize, Deserialize};

/// Vertex attributes a geometry buffer may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexAttribute {
    /// Object-space position
    Position,
    /// Tangent for normal mapping
    Tangent,
    /// Surface normal
    Normal,
    /// Binormal (bitangent)
    Binormal,
    /// Texture coordinate
    TexCoord,
}

impl VertexAttribute {
    /// Every attribute, in declaration order
    pub const ALL: [VertexAttribute; 5] = [
        VertexAttribute::Position,
        VertexAttribute::Tangent,
        VertexAttribute::Normal,
        VertexAttribute::Binormal,
        VertexAttribute::TexCoord,
    ];

    /// Direction vectors are fetched normalized
    pub fn is_normalized(self) -> bool {
        matches!(self, VertexAttribute::Tangent | VertexAttribute::Normal | VertexAttribute::Binormal)
    }
}

/// Placement of one attribute inside a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeLayout {
    /// Number of f32 components (1..=4)
    pub components: u32,
    /// 1-based slot; attributes are packed in ascending order
    pub order: u32,
}

/// Interleaved vertex layout of a geometry buffer
///
/// Valid when the orders of the present attributes form the sequence
/// `1..=n` and every component count is within 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GeometryDescription {
    /// Position layout
    pub position: Option<AttributeLayout>,
    /// Tangent layout
    pub tangent: Option<AttributeLayout>,
    /// Normal layout
    pub normal: Option<AttributeLayout>,
    /// Binormal layout
    pub binormal: Option<AttributeLayout>,
    /// Texture coordinate layout
    pub texcoord: Option<AttributeLayout>,
}

impl GeometryDescription {
    /// Empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute after the ones already present
    pub fn with(mut self, attribute: VertexAttribute, components: u32) -> Self {
        let order = self.attribute_count() as u32 + 1;
        *self.slot_mut(attribute) = Some(AttributeLayout { components, order });
        self
    }

    /// Position (3), normal (3), texcoord (2)
    pub fn position_normal_texcoord() -> Self {
        Self::new()
            .with(VertexAttribute::Position, 3)
            .with(VertexAttribute::Normal, 3)
            .with(VertexAttribute::TexCoord, 2)
    }

    /// Layout of one attribute
    pub fn get(&self, attribute: VertexAttribute) -> Option<AttributeLayout> {
        match attribute {
            VertexAttribute::Position => self.position,
            VertexAttribute::Tangent => self.tangent,
            VertexAttribute::Normal => self.normal,
            VertexAttribute::Binormal => self.binormal,
            VertexAttribute::TexCoord => self.texcoord,
        }
    }

    fn slot_mut(&mut self, attribute: VertexAttribute) -> &mut Option<AttributeLayout> {
        match attribute {
            VertexAttribute::Position => &mut self.position,
            VertexAttribute::Tangent => &mut self.tangent,
            VertexAttribute::Normal => &mut self.normal,
            VertexAttribute::Binormal => &mut self.binormal,
            VertexAttribute::TexCoord => &mut self.texcoord,
        }
    }

    /// Number of attributes present
    pub fn attribute_count(&self) -> usize {
        VertexAttribute::ALL.iter().filter(|a| self.get(**a).is_some()).count()
    }

    /// Check the contiguous 1-based ordering and component ranges
    pub fn is_valid(&self) -> bool {
        let mut orders: Vec<u32> = Vec::with_capacity(VertexAttribute::ALL.len());
        for attribute in VertexAttribute::ALL {
            if let Some(layout) = self.get(attribute) {
                if !(1..=4).contains(&layout.components) {
                    return false;
                }
                orders.push(layout.order);
            }
        }
        if orders.is_empty() {
            return false;
        }
        orders.sort_unstable();
        orders.iter().enumerate().all(|(i, order)| *order == i as u32 + 1)
    }

    /// Present attributes in slot order with their byte offset inside a vertex
    pub fn ordered_attributes(&self) -> Vec<(VertexAttribute, AttributeLayout, u32)> {
        let mut present: Vec<(VertexAttribute, AttributeLayout)> = VertexAttribute::ALL
            .iter()
            .filter_map(|a| self.get(*a).map(|layout| (*a, layout)))
            .collect();
        present.sort_by_key(|(_, layout)| layout.order);

        let mut offset = 0;
        present
            .into_iter()
            .map(|(attribute, layout)| {
                let entry = (attribute, layout, offset);
                offset += layout.components * 4;
                entry
            })
            .collect()
    }

    /// f32 values per vertex
    pub fn floats_per_vertex(&self) -> usize {
        VertexAttribute::ALL
            .iter()
            .filter_map(|a| self.get(*a))
            .map(|layout| layout.components as usize)
            .sum()
    }

    /// Bytes per vertex
    pub fn stride(&self) -> u32 {
        self.floats_per_vertex() as u32 * 4
    }
}
