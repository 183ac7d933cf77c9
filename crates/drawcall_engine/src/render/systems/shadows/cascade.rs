//! Cascaded shadow maps for the directional light
//!
//! The camera frustum is cut into slices by view distance. Each slice gets
//! an orthographic light projection fitted around its eight corners, so near
//! slices spend their texels on a small area.

use crate::core::config::CASCADE_COUNT;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::primitives::Frustum;
use super::light_space::up_vector;

/// Light-space fit of one frustum slice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// Layer of the cascade texture
    pub index: usize,
    /// Light view matrix
    pub light_view: Mat4,
    /// Orthographic light projection
    pub light_projection: Mat4,
    /// `light_projection * light_view`
    pub view_projection: Mat4,
    /// View distance where the slice starts
    pub near: f32,
    /// View distance where the slice ends
    pub far: f32,
}

/// Slice boundaries between `near` and `far`, `count + 1` values
///
/// Practical split scheme: `lambda` blends the logarithmic split (1.0) with
/// the uniform split (0.0).
pub fn cascade_splits(near: f32, far: f32, count: usize, lambda: f32) -> Vec<f32> {
    let mut splits = Vec::with_capacity(count + 1);
    splits.push(near);
    for i in 1..=count {
        let p = i as f32 / count as f32;
        let logarithmic = near * (far / near).powf(p);
        let uniform = near + (far - near) * p;
        splits.push(lambda * logarithmic + (1.0 - lambda) * uniform);
    }
    splits
}

/// World-space corners of the volume `view_projection` maps to the NDC cube
///
/// Near plane first (-1 depth), then far; `None` if the matrix is singular.
pub fn frustum_corners(view_projection: &Mat4) -> Option<[Vec3; 8]> {
    let inverse = view_projection.try_inverse()?;
    let mut corners = [Vec3::zeros(); 8];
    let mut i = 0;
    for z in [-1.0, 1.0] {
        for y in [-1.0, 1.0] {
            for x in [-1.0, 1.0] {
                corners[i] = inverse.project_point(&Vec3::new(x, y, z));
                i += 1;
            }
        }
    }
    Some(corners)
}

/// Widen a light-space depth range by a multiplicative `factor` (>= 1)
///
/// Each bound moves away from the other whatever its sign, so the result
/// always contains `[min_z, max_z]`.
pub fn pad_depth_range(min_z: f32, max_z: f32, factor: f32) -> (f32, f32) {
    let min_z = if min_z < 0.0 { min_z * factor } else { min_z / factor };
    let max_z = if max_z < 0.0 { max_z / factor } else { max_z * factor };
    (min_z, max_z)
}

/// Fit every cascade of a directional light to the camera frustum
///
/// Slices span from the frustum near plane to `min(far, max_distance)`.
/// Slices whose light-space box is degenerate are left out.
pub fn compute_cascades(
    view: &Mat4,
    frustum: &Frustum,
    light_direction: &Vec3,
    max_distance: f32,
    split_lambda: f32,
    z_padding: f32,
) -> Vec<Cascade> {
    if !frustum.is_valid() {
        log::debug!("Frustum {:?} cannot be split into cascades", frustum);
        return Vec::new();
    }
    let Some(direction) = light_direction.try_normalize(f32::EPSILON) else {
        return Vec::new();
    };
    let far = frustum.far.min(max_distance).max(frustum.near * 1.01);
    let splits = cascade_splits(frustum.near, far, CASCADE_COUNT, split_lambda);

    splits
        .windows(2)
        .enumerate()
        .filter_map(|(index, range)| {
            let (near, far) = (range[0], range[1]);
            let corners = frustum_corners(&(frustum.projection_for_range(near, far) * view))?;
            fit_cascade(index, near, far, &corners, &direction, z_padding)
        })
        .collect()
}

fn fit_cascade(
    index: usize,
    near: f32,
    far: f32,
    corners: &[Vec3; 8],
    direction: &Vec3,
    z_padding: f32,
) -> Option<Cascade> {
    let centroid = corners.iter().fold(Vec3::zeros(), |sum, corner| sum + corner) / 8.0;
    let light_view = Mat4::look_at(centroid - direction, centroid, up_vector(direction));

    let mut min = Vec3::repeat(f32::MAX);
    let mut max = Vec3::repeat(f32::MIN);
    for corner in corners {
        let point = light_view.project_point(corner);
        min = min.inf(&point);
        max = max.sup(&point);
    }
    let (min_z, max_z) = pad_depth_range(min.z, max.z, z_padding);

    let extent = max - min;
    if extent.x < 1e-5 || extent.y < 1e-5 || max_z - min_z < 1e-5 {
        log::debug!("Cascade {} has a degenerate light-space box", index);
        return None;
    }

    let light_projection = Mat4::orthographic(min.x, max.x, min.y, max.y, -max_z, -min_z);
    Some(Cascade {
        index,
        light_view,
        light_projection,
        view_projection: light_projection * light_view,
        near,
        far,
    })
}
