//! Shadow mapping
//!
//! Each frame the renderer gives shadow slots to as many enabled,
//! shadow-casting lights as fit, computes their light-space matrices and
//! renders depth for every shadow-capable program into the slot's texture.
//!
//! - Point lights render the six faces of a cubemap with a 90 degree frustum.
//! - Spot lights render one 2D map whose field of view is twice the cone half-angle.
//! - The directional light renders three cascades into a layered texture.
//!
//! Lights that do not get a slot still light the scene, they just cast no
//! shadow that frame.

pub mod cascade;
pub mod light_space;
pub mod shadow_maps;

pub use cascade::{cascade_splits, compute_cascades, frustum_corners, pad_depth_range, Cascade};
pub use light_space::{point_light_face_views, point_light_projection, spot_light_projection, spot_light_view};
pub use shadow_maps::{
    assign_shadow_slots, pack_shadows, ShadowAssignment, ShadowBlockHeader, ShadowKind, ShadowMaps,
    ShadowSlot, ShadowSlotData, SlotAssignment,
};
