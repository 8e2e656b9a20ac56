//! Fixed-width bytecode encoding for the mote virtual machine.
//!
//! This crate owns the wire format only: the [`Opcode`] enumeration, the
//! instruction [`Shape`]s that determine how operand bytes are interpreted,
//! and the [`Instruction`] decoder/encoder. It knows nothing about registers
//! holding values, the heap, or execution — that lives in `vm-core`.

#![warn(missing_docs)]

mod instruction;
mod opcode;

pub use instruction::{IllegalOpcode, Instruction};
pub use opcode::{Opcode, Shape};
