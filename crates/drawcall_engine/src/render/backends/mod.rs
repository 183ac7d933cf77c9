//! Graphics backend implementations
//!
//! Windowed backends live with the application that owns the graphics
//! context. The crate ships the headless backend, used by tests and tools.

pub mod headless;

pub use headless::{HeadlessDevice, DeviceCommand, DrawRecord};
