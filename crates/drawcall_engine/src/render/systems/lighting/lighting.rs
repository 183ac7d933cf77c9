//! Light sources
//!
//! World-space fields are the source of truth. The view-space position and
//! direction are derived from them once per frame by
//! [`Light::update_view_space`], and the shadow index is assigned per frame by
//! the shadow subsystem.

use serde::{Serialize, Deserialize};

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
    /// Directional light (like sunlight)
    Directional,
}

impl LightType {
    /// Value written to the light block
    pub fn gpu_id(self) -> i32 {
        match self {
            LightType::Point => 0,
            LightType::Spot => 1,
            LightType::Directional => 2,
        }
    }
}

/// Light source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// World position (point/spot)
    pub position: Vec3,
    /// World direction the light shines along (spot/directional)
    pub direction: Vec3,
    /// View-space position, derived
    #[serde(skip, default = "Vec3::zeros")]
    pub view_position: Vec3,
    /// View-space direction, derived
    #[serde(skip, default = "Vec3::zeros")]
    pub view_direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Constant, linear and quadratic attenuation terms
    pub attenuation: Vec3,
    /// Light range (point/spot); also the far plane of their shadow maps
    pub range: f32,
    /// Half of the cone opening angle for spot lights (radians)
    pub spot_half_angle: f32,
    /// 1-based shadow slot for this frame, 0 when unshadowed
    #[serde(skip)]
    pub shadow_index: u32,
    /// Whether the light may receive a shadow slot
    pub casts_shadows: bool,
    /// Disabled lights are uploaded but ignored by shaders
    pub enabled: bool,
}

fn normalize_or(direction: Vec3, fallback: Vec3) -> Vec3 {
    direction.try_normalize(f32::EPSILON).unwrap_or(fallback)
}

impl Light {
    /// Create a point light
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            position,
            direction: -Vec3::y(),
            view_position: Vec3::zeros(),
            view_direction: Vec3::zeros(),
            color,
            intensity,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
            range,
            spot_half_angle: 0.0,
            shadow_index: 0,
            casts_shadows: true,
            enabled: true,
        }
    }

    /// Create a spot light
    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, range: f32, half_angle: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            direction: normalize_or(direction, -Vec3::y()),
            spot_half_angle: half_angle,
            ..Self::point(position, color, intensity, range)
        }
    }

    /// Create a directional light
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            direction: normalize_or(direction, -Vec3::y()),
            ..Self::point(Vec3::zeros(), color, intensity, 0.0)
        }
    }

    /// Builder: attenuation terms
    pub fn with_attenuation(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.attenuation = Vec3::new(constant, linear, quadratic);
        self
    }

    /// Builder: shadow casting
    pub fn with_shadows(mut self, casts_shadows: bool) -> Self {
        self.casts_shadows = casts_shadows;
        self
    }

    /// Derive the view-space fields from the world-space ones
    pub fn update_view_space(&mut self, view: &Mat4) {
        self.view_position = view.transform_point(&Point3::from(self.position)).coords;
        self.view_direction = normalize_or(view.transform_vector(&self.direction), Vec3::zeros());
    }

    /// Whether the light can be given a shadow slot this frame
    pub fn wants_shadow(&self) -> bool {
        self.enabled && self.casts_shadows
    }
}

impl Default for Light {
    /// Disabled white point light at the origin
    fn default() -> Self {
        Self { enabled: false, ..Self::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 0.0, 0.0) }
    }
}
