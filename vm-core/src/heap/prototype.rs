//! The `Prototype` heap kind: a function's code and capture layout,
//! reusable across every `Closure` built from it.

use std::sync::Arc;

/// Where a closure's capture slot `k` draws its value from when the
/// closure is constructed (`NewClosure`, spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// Capture `stack[index]` at closure-construction time.
    FromStack(u32),
    /// Capture the constructing frame's own `captures[index]`.
    FromEnclosing(u32),
}

/// Compile-time description of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeObj {
    is_vararg: bool,
    num_params: u8,
    captures: Box<[CaptureSource]>,
    /// Reference-counted, since the source's non-owning pointer into the
    /// loader's bytecode buffer has no safe-Rust equivalent across the
    /// loader boundary (see DESIGN.md).
    code: Arc<[u8]>,
}

impl PrototypeObj {
    /// Creates a new prototype.
    #[must_use]
    pub fn new(
        is_vararg: bool,
        num_params: u8,
        captures: Box<[CaptureSource]>,
        code: Arc<[u8]>,
    ) -> Self {
        Self {
            is_vararg,
            num_params,
            captures,
            code,
        }
    }

    /// Whether the function accepts a variable number of arguments.
    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.is_vararg
    }

    /// Declared (non-vararg) parameter count.
    #[must_use]
    pub fn num_params(&self) -> u8 {
        self.num_params
    }

    /// Number of values a `Closure` built from this prototype must capture.
    #[must_use]
    pub fn num_captures(&self) -> u16 {
        self.captures.len() as u16
    }

    /// Capture-source descriptors, in capture-slot order.
    #[must_use]
    pub fn captures(&self) -> &[CaptureSource] {
        &self.captures
    }

    /// The function's bytecode.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// A cheap `Arc` clone of the function's bytecode, for callers that need
    /// an owned handle decoupled from the arena borrow (the interpreter's
    /// dispatch loop fetches this once per call rather than per instruction).
    #[must_use]
    pub fn code_arc(&self) -> Arc<[u8]> {
        self.code.clone()
    }
}
