//! # Renderer Configuration
//!
//! Configuration for the draw-call renderer: shadow resolution and light
//! limits, cascade tuning, the buffer update strategy used at each call site,
//! and the draw ordering policy.
//!
//! Loaded from TOML or RON through the [`Config`] trait, or built in code with
//! the `with_*` builders.

use serde::{Serialize, Deserialize};

use crate::config::{Config, ConfigError};
use crate::render::api::BufferUpdateMode;

/// Default cap on simultaneously shadowed point/spot lights
pub const MAX_SHADOW_LIGHT_COUNT: usize = 4;

/// Number of cascades for the directional light
pub const CASCADE_COUNT: usize = 3;

/// Order in which the main pass submits draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DrawOrder {
    /// Program-group order only
    #[default]
    ProgramGrouped,
    /// Program-group order for opaque materials, then transparent materials back-to-front
    TransparencySorted,
}

/// # Renderer Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Edge length of every shadow texture in texels
    pub shadow_map_size: u32,
    /// Number of light slots uploaded in the light block
    pub max_light_count: usize,
    /// Number of point/spot lights that may receive a shadow slot per frame
    pub max_shadow_light_count: usize,
    /// Blend between logarithmic (1.0) and uniform (0.0) cascade splits
    pub cascade_split_lambda: f32,
    /// Multiplicative widening applied to the cascade light-space depth range
    pub cascade_z_padding: f32,
    /// Distance from the camera beyond which directional shadows are not rendered
    pub max_shadow_distance: f32,
    /// Near plane used for point and spot shadow projections
    pub shadow_near_plane: f32,
    /// Update strategy for the per-object block
    pub object_update_mode: BufferUpdateMode,
    /// Update strategy for the material block
    pub material_update_mode: BufferUpdateMode,
    /// Update strategy for the light and shadow blocks
    pub light_update_mode: BufferUpdateMode,
    /// Main pass ordering policy
    pub draw_order: DrawOrder,
    /// Main framebuffer size (width, height)
    pub viewport: (u32, u32),
    /// Initial size of the material uniform buffer in bytes (grows on demand)
    pub material_buffer_capacity: usize,
}

impl RendererConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            shadow_map_size: 1024,
            max_light_count: 16,
            max_shadow_light_count: MAX_SHADOW_LIGHT_COUNT,
            cascade_split_lambda: 0.75,
            cascade_z_padding: 10.0,
            max_shadow_distance: 100.0,
            shadow_near_plane: 0.1,
            object_update_mode: BufferUpdateMode::SubData,
            material_update_mode: BufferUpdateMode::InvalidateSubData,
            light_update_mode: BufferUpdateMode::Orphan,
            draw_order: DrawOrder::ProgramGrouped,
            viewport: (1280, 720),
            material_buffer_capacity: 256,
        }
    }

    /// Set shadow map resolution
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow_map_size = size;
        self
    }

    /// Set the number of light slots
    pub fn with_max_light_count(mut self, count: usize) -> Self {
        self.max_light_count = count;
        self
    }

    /// Set the number of point/spot shadow slots
    pub fn with_max_shadow_light_count(mut self, count: usize) -> Self {
        self.max_shadow_light_count = count;
        self
    }

    /// Use one update strategy at every call site
    pub fn with_update_mode(mut self, mode: BufferUpdateMode) -> Self {
        self.object_update_mode = mode;
        self.material_update_mode = mode;
        self.light_update_mode = mode;
        self
    }

    /// Set draw ordering policy
    pub fn with_draw_order(mut self, order: DrawOrder) -> Self {
        self.draw_order = order;
        self
    }

    /// Set the main viewport size
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shadow_map_size == 0 {
            return Err(ConfigError::Invalid("shadow_map_size must be non-zero".to_string()));
        }
        if self.max_light_count == 0 {
            return Err(ConfigError::Invalid("max_light_count must be at least 1".to_string()));
        }
        if self.max_shadow_light_count > self.max_light_count {
            return Err(ConfigError::Invalid(format!(
                "max_shadow_light_count ({}) exceeds max_light_count ({})",
                self.max_shadow_light_count, self.max_light_count
            )));
        }
        if !(0.0..=1.0).contains(&self.cascade_split_lambda) {
            return Err(ConfigError::Invalid("cascade_split_lambda must be within [0, 1]".to_string()));
        }
        if self.cascade_z_padding < 1.0 {
            return Err(ConfigError::Invalid("cascade_z_padding must be >= 1 so padding never shrinks".to_string()));
        }
        if self.shadow_near_plane <= 0.0 || self.max_shadow_distance <= self.shadow_near_plane {
            return Err(ConfigError::Invalid("shadow distance range is empty".to_string()));
        }
        if self.material_buffer_capacity == 0 {
            return Err(ConfigError::Invalid("material_buffer_capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RendererConfig {}
