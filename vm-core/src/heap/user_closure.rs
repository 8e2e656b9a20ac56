//! The `UserClosure` heap kind: a closure whose body is a host function.
//!
//! The source stores an opaque host-function pointer directly in the
//! object. Rust has no free-standing function-pointer type that can
//! close over embedder state the way a C function pointer conventionally
//! does via a trailing `void*`, so this stores an index into
//! `VMState`'s host-function table instead (see DESIGN.md).

/// A reference to a registered host function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserClosureObj {
    name_index: u32,
}

impl UserClosureObj {
    /// Wraps the index returned by `VMState::register_user_closure`.
    #[must_use]
    pub fn new(name_index: u32) -> Self {
        Self { name_index }
    }

    /// The index into the host-function table.
    #[must_use]
    pub fn name_index(&self) -> u32 {
        self.name_index
    }
}
