//! Per-object uniform block

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{utils::to_cols_array, Mat3, Mat4};

/// Matrices of one draw, rewritten before every draw call
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectBlock {
    /// Object to world
    pub world: [[f32; 4]; 4],
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip
    pub projection: [[f32; 4]; 4],
    /// `view * world`
    pub world_view: [[f32; 4]; 4],
    /// `projection * view`
    pub view_projection: [[f32; 4]; 4],
    /// `projection * view * world`
    pub world_view_projection: [[f32; 4]; 4],
    /// Inverse transpose of the world-view rotation, padded to 4x4
    pub normal: [[f32; 4]; 4],
}

impl ObjectBlock {
    /// Compute every product for one object
    pub fn new(world: &Mat4, view: &Mat4, projection: &Mat4) -> Self {
        let world_view = view * world;
        let view_projection = projection * view;
        let world_view_projection = projection * world_view;
        Self {
            world: to_cols_array(world),
            view: to_cols_array(view),
            projection: to_cols_array(projection),
            world_view: to_cols_array(&world_view),
            view_projection: to_cols_array(&view_projection),
            world_view_projection: to_cols_array(&world_view_projection),
            normal: to_cols_array(&normal_matrix(&world_view)),
        }
    }
}

/// Inverse transpose of the upper 3x3, identity when singular
pub fn normal_matrix(world_view: &Mat4) -> Mat4 {
    let linear: Mat3 = world_view.fixed_view::<3, 3>(0, 0).into_owned();
    let normal = linear.try_inverse().map(|inverse| inverse.transpose()).unwrap_or_else(Mat3::identity);
    normal.to_homogeneous()
}
