//! Per-frame counters

/// What the last [`draw`](super::DrawCallRenderer::draw) did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Indexed draws issued in the main pass
    pub draw_calls_issued: usize,
    /// Draw calls skipped because a resource was missing or empty
    pub draw_calls_skipped: usize,
    /// Disabled draw calls passed over
    pub draw_calls_disabled: usize,
    /// Program activations in the main pass
    pub program_switches: usize,
    /// Indexed draws issued into shadow maps
    pub shadow_draws: usize,
    /// Lights that rendered a shadow map
    pub shadowed_lights: usize,
    /// Shadow-casting lights without a slot
    pub shadow_lights_skipped: usize,
}
