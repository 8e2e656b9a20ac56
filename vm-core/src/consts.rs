//! Named constants for the value kernel, heap layout, and GC thresholds.
//!
//! Kept as named constants rather than scattered literals, the way a real
//! interpreter crate in this corpus does it (c.f. fuel-vm's `consts.rs`).

/// Inclusive lower bound of the small-integer range.
pub const SMALL_INT_MIN: i32 = -(1 << 29);
/// Inclusive upper bound of the small-integer range.
pub const SMALL_INT_MAX: i32 = (1 << 29) - 1;

/// Survivor-generation age at which an object is promoted to old space.
pub const MAX_AGE: u8 = 64;

/// Number of data slots per operand-stack chunk.
pub const SPLICE_SIZE: usize = 64;

/// Number of registers in a call frame's register window.
pub const REGISTER_COUNT: usize = 32;

/// Call-chain depth above which execution raises `StackOverflow`.
pub const MAX_CALL_DEPTH: usize = 65535;

/// Initial bucket-array capacity for a freshly created `HashMap`.
pub const INITIAL_HASHMAP_CAPACITY: usize = 16;

/// Default load factor for `HashMap` resize decisions.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Tolerance used for float equality comparisons in `HeapObject::equals`.
pub const FLOAT_EQUALITY_TOLERANCE: f64 = 1e-16;

/// Fixed seed XOR'd into address-derived hashes for kinds with no natural
/// content hash (everything except `String`).
pub const HASH_SEED: u32 = 0x9e37_79b9;

/// Fractional boundaries of the GC arena, applied to a requested byte size
/// rounded down to [`arena_layout::ROUND_TO_BYTES`].
pub mod arena_layout {
    /// Eden (young generation) start fraction.
    pub const EDEN_START: f64 = 0.0;
    /// Survivor-A start fraction.
    pub const SURVIVOR_A_START: f64 = 0.2;
    /// Survivor-B start fraction.
    pub const SURVIVOR_B_START: f64 = 0.3;
    /// Old space start fraction.
    pub const OLD_START: f64 = 0.4;
    /// Rounding granularity applied to the requested arena size.
    pub const ROUND_TO_BYTES: usize = 4096;
}

/// Nominal bytes attributed to a single heap object slot, used only to turn
/// a requested arena byte budget into per-region object-count capacities
/// (the index-based arena manages real memory through `Vec` growth, not raw
/// byte offsets — see DESIGN.md's index-based-arena translation note).
pub const NOMINAL_OBJECT_SIZE: usize = 64;
