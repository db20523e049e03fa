/// Construction parameters for a [`Context`](super::Context).
///
/// Capacities are starting points; every arena doubles on demand.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Depth of the viewport stack, base viewport included.
    pub max_viewports: usize,

    /// Exclusive upper bound on material handle values. Each material owns a
    /// block of [`SLOT_SPAN`](crate::handle::SLOT_SPAN) addresses.
    pub material_address_limit: u32,

    /// Draw commands reserved up front.
    pub initial_commands: usize,

    /// Transform pairs reserved up front.
    pub initial_transforms: usize,

    /// Lighting arena bytes reserved up front.
    pub initial_lighting_bytes: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_viewports: 8,
            material_address_limit: 1 << 23,
            initial_commands: 256,
            initial_transforms: 64,
            initial_lighting_bytes: 4096,
        }
    }
}
