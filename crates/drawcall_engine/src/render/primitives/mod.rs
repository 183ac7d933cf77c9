//! Core rendering primitives

pub mod frustum;

pub use frustum::Frustum;
