//! Shadow slots, their depth textures and the shadow uniform block
//!
//! Slots are handed out per frame, not per light: the first enabled
//! shadow-casting point or spot lights (in light index order) get slots
//! `1..=max`, the first directional light gets the cascades. A slot's texture
//! is created on first use and kept across frames; it is only recreated when
//! the light occupying the slot is of a different type than last time.

use bytemuck::{Pod, Zeroable};

use crate::core::config::CASCADE_COUNT;
use crate::foundation::math::utils::to_cols_array;
use crate::render::api::{FramebufferId, GraphicsDevice, TextureDescriptor, TextureFormat, TextureId, TextureKind};
use crate::render::systems::lighting::{Light, LightType};
use crate::render::RenderResult;
use super::cascade::Cascade;

/// Texture shape of a point/spot slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowKind {
    /// Depth cubemap
    Point,
    /// 2D depth map
    Spot,
}

impl ShadowKind {
    fn texture_kind(self) -> TextureKind {
        match self {
            ShadowKind::Point => TextureKind::Cubemap,
            ShadowKind::Spot => TextureKind::Texture2D,
        }
    }
}

/// Allocated shadow texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowSlot {
    /// Shape
    pub kind: ShadowKind,
    /// Depth texture
    pub texture: TextureId,
}

/// One point/spot light that received a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAssignment {
    /// Index into the renderer's light list
    pub light: usize,
    /// 1-based slot
    pub slot: usize,
    /// Slot shape
    pub kind: ShadowKind,
}

/// Result of one frame's slot assignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowAssignment {
    /// Point/spot lights with a slot, in slot order
    pub slots: Vec<SlotAssignment>,
    /// Light rendered into the cascades
    pub directional: Option<usize>,
    /// Lights that wanted a shadow but did not get one
    pub skipped: usize,
}

/// Assign this frame's shadow slots and write each light's shadow index
pub fn assign_shadow_slots(lights: &mut [Light], max_slots: usize) -> ShadowAssignment {
    let mut assignment = ShadowAssignment::default();
    for (index, light) in lights.iter_mut().enumerate() {
        light.shadow_index = 0;
        if !light.wants_shadow() {
            continue;
        }
        match light.light_type {
            LightType::Point | LightType::Spot => {
                if assignment.slots.len() == max_slots {
                    assignment.skipped += 1;
                    continue;
                }
                let slot = assignment.slots.len() + 1;
                let kind = if light.light_type == LightType::Point { ShadowKind::Point } else { ShadowKind::Spot };
                assignment.slots.push(SlotAssignment { light: index, slot, kind });
                light.shadow_index = slot as u32;
            }
            LightType::Directional => {
                if assignment.directional.is_some() {
                    assignment.skipped += 1;
                    continue;
                }
                assignment.directional = Some(index);
                light.shadow_index = 1;
            }
        }
    }
    if assignment.skipped > 0 {
        log::debug!("{} shadow-casting lights left without a shadow slot", assignment.skipped);
    }
    assignment
}

/// Depth textures and the framebuffer the shadow pass renders with
#[derive(Debug)]
pub struct ShadowMaps {
    size: u32,
    slots: Vec<Option<ShadowSlot>>,
    cascade: Option<TextureId>,
    framebuffer: Option<FramebufferId>,
}

impl ShadowMaps {
    /// No textures yet; `slot_count` point/spot slots of `size`² texels
    pub fn new(size: u32, slot_count: usize) -> Self {
        Self { size, slots: vec![None; slot_count], cascade: None, framebuffer: None }
    }

    /// Edge length in texels
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of point/spot slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Texture of a 1-based slot, if allocated
    pub fn slot(&self, slot: usize) -> Option<&ShadowSlot> {
        slot.checked_sub(1).and_then(|i| self.slots.get(i)).and_then(Option::as_ref)
    }

    /// Cascade array texture, if allocated
    pub fn cascade_texture(&self) -> Option<TextureId> {
        self.cascade
    }

    /// Shape of the cascade texture
    pub fn cascade_kind(&self) -> TextureKind {
        TextureKind::Array2D { layers: CASCADE_COUNT as u32 }
    }

    /// Texture for a 1-based slot, recreated if it held the other shape
    pub fn ensure_slot(&mut self, device: &mut dyn GraphicsDevice, slot: usize, kind: ShadowKind) -> RenderResult<TextureId> {
        let size = self.size;
        let Some(entry) = slot.checked_sub(1).and_then(|i| self.slots.get_mut(i)) else {
            return Err(crate::render::RenderError::ResourceCreationFailed(format!("shadow slot {} out of range", slot)));
        };
        match *entry {
            Some(existing) if existing.kind == kind => return Ok(existing.texture),
            Some(existing) => {
                log::debug!("Shadow slot {} changes from {:?} to {:?}", slot, existing.kind, kind);
                device.delete_texture(existing.texture);
                *entry = None;
            }
            None => {}
        }
        let texture = device.create_texture(&TextureDescriptor {
            kind: kind.texture_kind(),
            format: TextureFormat::Depth32F,
            width: size,
            height: size,
        })?;
        *entry = Some(ShadowSlot { kind, texture });
        Ok(texture)
    }

    /// Cascade texture, created on first use
    pub fn ensure_cascade(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<TextureId> {
        if let Some(texture) = self.cascade {
            return Ok(texture);
        }
        let texture = device.create_texture(&TextureDescriptor {
            kind: self.cascade_kind(),
            format: TextureFormat::Depth32F,
            width: self.size,
            height: self.size,
        })?;
        self.cascade = Some(texture);
        Ok(texture)
    }

    /// Framebuffer depth images are attached to, created on first use
    pub fn framebuffer(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<FramebufferId> {
        if let Some(framebuffer) = self.framebuffer {
            return Ok(framebuffer);
        }
        let framebuffer = device.create_framebuffer()?;
        self.framebuffer = Some(framebuffer);
        Ok(framebuffer)
    }

    /// Delete every texture and the framebuffer
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for slot in self.slots.iter_mut().filter_map(Option::take) {
            device.delete_texture(slot.texture);
        }
        if let Some(texture) = self.cascade.take() {
            device.delete_texture(texture);
        }
        if let Some(framebuffer) = self.framebuffer.take() {
            device.delete_framebuffer(framebuffer);
        }
    }
}

/// Start of the shadow block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowBlockHeader {
    /// x: slot entries that follow, y: cascade layers to read, zw unused
    ///
    /// y is one past the highest cascade written. A layer below it whose
    /// `cascade_far` is zero was not rendered this frame.
    pub counts: [i32; 4],
    /// View distance where each cascade ends, zero for a skipped layer
    pub cascade_far: [f32; 4],
    /// Light view-projection of each cascade
    pub cascade_matrices: [[[f32; 4]; 4]; CASCADE_COUNT],
}

/// One point/spot slot
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowSlotData {
    /// Light view-projection (spot lights)
    pub view_projection: [[f32; 4]; 4],
    /// World position, w = far plane
    pub position_far: [f32; 4],
    /// x: 0 empty, 1 point, 2 spot; yzw unused
    pub flags: [i32; 4],
}

impl ShadowSlotData {
    /// Entry for a spot light
    pub fn spot(view_projection: &crate::foundation::math::Mat4, light: &Light) -> Self {
        Self {
            view_projection: to_cols_array(view_projection),
            position_far: [light.position.x, light.position.y, light.position.z, light.range],
            flags: [2, 0, 0, 0],
        }
    }

    /// Entry for a point light
    pub fn point(light: &Light) -> Self {
        Self {
            view_projection: [[0.0; 4]; 4],
            position_far: [light.position.x, light.position.y, light.position.z, light.range],
            flags: [1, 0, 0, 0],
        }
    }
}

/// Header followed by exactly `capacity` slot entries
pub fn pack_shadows(slots: &[ShadowSlotData], capacity: usize, cascades: &[Cascade]) -> Vec<u8> {
    let mut header = ShadowBlockHeader::zeroed();
    let mut layers = 0;
    for cascade in cascades.iter().filter(|c| c.index < CASCADE_COUNT) {
        header.cascade_far[cascade.index] = cascade.far;
        header.cascade_matrices[cascade.index] = to_cols_array(&cascade.view_projection);
        layers = layers.max(cascade.index + 1);
    }
    header.counts = [slots.len().min(capacity) as i32, layers as i32, 0, 0];

    let mut entries = vec![ShadowSlotData::zeroed(); capacity];
    for (entry, slot) in entries.iter_mut().zip(slots) {
        *entry = *slot;
    }

    let mut bytes = Vec::with_capacity(std::mem::size_of::<ShadowBlockHeader>() + capacity * std::mem::size_of::<ShadowSlotData>());
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(bytemuck::cast_slice(&entries));
    bytes
}
