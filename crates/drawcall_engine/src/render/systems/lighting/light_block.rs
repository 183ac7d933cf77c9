//! GPU layout of the light uniform block

use bytemuck::{Pod, Zeroable};

use super::Light;

/// Start of the light block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightBlockHeader {
    /// x: number of light entries that follow, yzw unused
    pub counts: [i32; 4],
}

/// One light, std140 compatible
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightData {
    /// View-space position, w unused
    pub position: [f32; 4],
    /// View-space direction, w = range
    pub direction_range: [f32; 4],
    /// Color, w = intensity
    pub color_intensity: [f32; 4],
    /// Constant, linear, quadratic attenuation, w = cosine of the spot half-angle
    pub attenuation_cutoff: [f32; 4],
    /// x: type, y: enabled, z: shadow index, w unused
    pub flags: [i32; 4],
}

impl LightData {
    /// Pack one light's view-space state
    pub fn from_light(light: &Light) -> Self {
        Self {
            position: [light.view_position.x, light.view_position.y, light.view_position.z, 1.0],
            direction_range: [
                light.view_direction.x,
                light.view_direction.y,
                light.view_direction.z,
                light.range,
            ],
            color_intensity: [light.color.x, light.color.y, light.color.z, light.intensity],
            attenuation_cutoff: [
                light.attenuation.x,
                light.attenuation.y,
                light.attenuation.z,
                light.spot_half_angle.cos(),
            ],
            flags: [light.light_type.gpu_id(), i32::from(light.enabled), light.shadow_index as i32, 0],
        }
    }
}

/// Header followed by exactly `capacity` entries; unused entries are zero
pub fn pack_lights(lights: &[Light], capacity: usize) -> Vec<u8> {
    if lights.len() > capacity {
        log::warn!("{} lights set, only {} fit the light block", lights.len(), capacity);
    }
    let used = lights.len().min(capacity);
    let header = LightBlockHeader { counts: [used as i32, 0, 0, 0] };

    let mut entries = vec![LightData::zeroed(); capacity];
    for (entry, light) in entries.iter_mut().zip(lights) {
        *entry = LightData::from_light(light);
    }

    let mut bytes = Vec::with_capacity(std::mem::size_of::<LightBlockHeader>() + capacity * std::mem::size_of::<LightData>());
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(bytemuck::cast_slice(&entries));
    bytes
}
