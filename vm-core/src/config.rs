//! Embedder-facing configuration for a [`crate::state::VMState`].

/// Construction-time parameters for a VM instance.
///
/// Everything but arena sizing has a workable default; an embedder that
/// only cares about running bytecode can use `VmConfig::default()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmConfig {
    /// Requested arena size in bytes, rounded down to
    /// [`crate::consts::arena_layout::ROUND_TO_BYTES`] before being split
    /// into eden/survivor/old region capacities.
    pub arena_bytes: usize,
    /// Survivor age at which an object promotes to old space.
    pub max_age: u8,
    /// Call-chain depth above which `Fault::StackOverflow` is raised.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            arena_bytes: 16 * 1024 * 1024,
            max_age: crate::consts::MAX_AGE,
            max_call_depth: crate::consts::MAX_CALL_DEPTH,
        }
    }
}
