//! View and projection matrices for point and spot shadow maps

use crate::foundation::math::{constants, Mat4, Mat4Ext, Vec3};

/// Up vector perpendicular to `direction`
///
/// Derived through the cross product with the world Y helper axis. When
/// `direction` is parallel to it the product vanishes and world Z is used
/// instead.
pub fn up_vector(direction: &Vec3) -> Vec3 {
    let right = direction.cross(&Vec3::y());
    let right = if right.norm_squared() > 1e-8 { right } else { direction.cross(&Vec3::z()) };
    right.cross(direction).normalize()
}

/// View from the light position along its direction
pub fn spot_light_view(position: &Vec3, direction: &Vec3) -> Mat4 {
    let direction = direction.try_normalize(f32::EPSILON).unwrap_or(-Vec3::y());
    Mat4::look_at(*position, position + direction, up_vector(&direction))
}

/// Perspective covering the cone; far plane is the light range
pub fn spot_light_projection(half_angle: f32, near: f32, range: f32) -> Mat4 {
    let fov = (2.0 * half_angle).clamp(1e-3, constants::PI - 1e-3);
    Mat4::perspective(fov, 1.0, near, range.max(near * 2.0))
}

/// 90 degree perspective for one cube face
pub fn point_light_projection(near: f32, range: f32) -> Mat4 {
    Mat4::perspective(constants::HALF_PI, 1.0, near, range.max(near * 2.0))
}

/// Views for the cube faces in +X, -X, +Y, -Y, +Z, -Z order
pub fn point_light_face_views(position: &Vec3) -> [Mat4; 6] {
    let faces = [
        (Vec3::x(), -Vec3::y()),
        (-Vec3::x(), -Vec3::y()),
        (Vec3::y(), Vec3::z()),
        (-Vec3::y(), -Vec3::z()),
        (Vec3::z(), -Vec3::y()),
        (-Vec3::z(), -Vec3::y()),
    ];
    faces.map(|(axis, up)| Mat4::look_at(*position, position + axis, up))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::utils::is_finite_matrix;
    use approx::assert_relative_eq;

    #[test]
    fn test_spot_view_along_helper_axis_is_finite() {
        let view = spot_light_view(&Vec3::new(0.0, 2.0, 0.0), &Vec3::new(0.0, 1.0, 0.0));
        assert!(is_finite_matrix(&view));

        let ahead = view.project_point(&Vec3::new(0.0, 5.0, 0.0));
        assert_relative_eq!(ahead, Vec3::new(0.0, 0.0, -3.0), epsilon = 1e-5);
    }

    #[test]
    fn test_spot_view_looks_down_direction() {
        let direction = Vec3::new(1.0, -1.0, 0.0).normalize();
        let view = spot_light_view(&Vec3::zeros(), &direction);
        let ahead = view.project_point(&(direction * 4.0));
        assert_relative_eq!(ahead, Vec3::new(0.0, 0.0, -4.0), epsilon = 1e-5);
    }

    #[test]
    fn test_spot_projection_covers_cone() {
        let half_angle = 0.4f32;
        let projection = spot_light_projection(half_angle, 0.1, 20.0);
        let edge = Vec3::new(0.0, half_angle.tan() * 10.0, -10.0);
        assert_relative_eq!(projection.project_point(&edge).y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cube_faces_look_along_axes() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let views = point_light_face_views(&position);
        let axes = [Vec3::x(), -Vec3::x(), Vec3::y(), -Vec3::y(), Vec3::z(), -Vec3::z()];
        for (view, axis) in views.iter().zip(axes) {
            let ahead = view.project_point(&(position + axis));
            assert_relative_eq!(ahead, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        }
    }
}
