//! Camera frustum parameters
//!
//! The renderer receives the view and projection matrices from the caller
//! every frame; the frustum carries the perspective parameters they were
//! built from so the cascade split can build per-cascade projections.

use serde::{Serialize, Deserialize};

use crate::foundation::math::{Mat4, Mat4Ext};

/// Perspective frustum of the main camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
}

impl Frustum {
    /// Create a frustum
    pub fn new(near: f32, far: f32, fov_y: f32, aspect: f32) -> Self {
        Self { near, far, fov_y, aspect }
    }

    /// Whether a projection can be built from it
    pub fn is_valid(&self) -> bool {
        self.near > 0.0
            && self.far > self.near
            && self.fov_y > 0.0
            && self.fov_y < std::f32::consts::PI
            && self.aspect > 0.0
    }

    /// Full projection matrix
    pub fn projection(&self) -> Mat4 {
        self.projection_for_range(self.near, self.far)
    }

    /// Projection with the same field of view over `[near, far]`
    pub fn projection_for_range(&self, near: f32, far: f32) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, near, far)
    }
}

impl Default for Frustum {
    fn default() -> Self {
        Self::new(0.1, 1000.0, std::f32::consts::FRAC_PI_3, 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn test_range_projection_maps_planes_to_ndc() {
        let frustum = Frustum::default();
        let projection = frustum.projection_for_range(2.0, 8.0);
        assert_relative_eq!(projection.project_point(&Vec3::new(0.0, 0.0, -2.0)).z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(projection.project_point(&Vec3::new(0.0, 0.0, -8.0)).z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_validity() {
        assert!(Frustum::default().is_valid());
        assert!(!Frustum::new(1.0, 0.5, 1.0, 1.0).is_valid());
    }
}
