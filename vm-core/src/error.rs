//! The fault taxonomy raised by the interpreter, GC, and heap kinds.
//!
//! Every variant here is fatal to the current `VMState`: there is no
//! try/catch machinery in the bytecode, and embedders that want recovery
//! must re-enter a fresh `VMState` (see the loader-facing API in `state.rs`).

use mote_asm::IllegalOpcode;

/// An unrecoverable failure of the interpreter core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Fault {
    /// Both a minor and a major collection failed to satisfy an allocation.
    #[error("out of memory")]
    OutOfMemory,

    /// The call-chain depth exceeded `consts::MAX_CALL_DEPTH`.
    #[error("stack overflow: call depth exceeded the configured limit")]
    StackOverflow,

    /// Arithmetic, comparison, indexing, or a call target used a value of
    /// the wrong kind.
    #[error("type error: {0}")]
    TypeError(&'static str),

    /// An array, string, or vector index was out of bounds.
    #[error("range error: {0}")]
    RangeError(&'static str),

    /// Integer division or modulus with a zero right-hand operand.
    #[error("divide by zero")]
    DivideByZero,

    /// The instruction stream contained a byte that does not map to a
    /// known opcode.
    #[error("illegal instruction: unrecognized opcode byte {0:#04x}")]
    IllegalInstruction(u8),
}

impl From<IllegalOpcode> for Fault {
    fn from(value: IllegalOpcode) -> Self {
        Self::IllegalInstruction(value.0)
    }
}
