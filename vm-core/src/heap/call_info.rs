//! The `CallInfo` heap kind: one call frame.

use crate::consts::REGISTER_COUNT;
use crate::heap::kind::HeapRef;
use crate::value::Value;

/// One call frame: a 32-register window, captured upvalues, the saved
/// program counter, and a link to the caller's frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfoObj {
    reg_begin: u8,
    reg_end: u8,
    num_params: u8,
    saved_pc: u32,
    callee: HeapRef,
    parent: Option<HeapRef>,
    registers: Box<[Value; REGISTER_COUNT]>,
    captures: Box<[Value]>,
}

impl CallInfoObj {
    /// Creates a frame for a bytecode closure: captures copied in,
    /// registers nil-initialized, `saved_pc` at the prototype's entry.
    #[must_use]
    pub fn for_closure(
        reg_begin: u8,
        reg_end: u8,
        num_params: u8,
        callee: HeapRef,
        parent: Option<HeapRef>,
        captures: Box<[Value]>,
    ) -> Self {
        Self {
            reg_begin,
            reg_end,
            num_params,
            saved_pc: 0,
            callee,
            parent,
            registers: Box::new([Value::Nil; REGISTER_COUNT]),
            captures,
        }
    }

    /// Start of the caller's return-value register window.
    #[must_use]
    pub fn reg_begin(&self) -> u8 {
        self.reg_begin
    }

    /// End (exclusive) of the caller's return-value register window.
    #[must_use]
    pub fn reg_end(&self) -> u8 {
        self.reg_end
    }

    /// Declared parameter count.
    #[must_use]
    pub fn num_params(&self) -> u8 {
        self.num_params
    }

    /// Saved program counter, in instruction units from the prototype's
    /// code start.
    #[must_use]
    pub fn saved_pc(&self) -> u32 {
        self.saved_pc
    }

    /// Sets the saved program counter.
    pub fn set_saved_pc(&mut self, pc: u32) {
        self.saved_pc = pc;
    }

    /// The callee (a `Closure` or `UserClosure` reference).
    #[must_use]
    pub fn callee(&self) -> HeapRef {
        self.callee
    }

    /// The calling frame, or `None` for the outermost frame.
    #[must_use]
    pub fn parent(&self) -> Option<HeapRef> {
        self.parent
    }

    pub(crate) fn set_callee(&mut self, callee: HeapRef) {
        self.callee = callee;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<HeapRef>) {
        self.parent = parent;
    }

    /// This frame's register window.
    #[must_use]
    pub fn registers(&self) -> &[Value; REGISTER_COUNT] {
        &self.registers
    }

    /// Mutable access to this frame's register window.
    pub fn registers_mut(&mut self) -> &mut [Value; REGISTER_COUNT] {
        &mut self.registers
    }

    /// This frame's captured upvalues.
    #[must_use]
    pub fn captures(&self) -> &[Value] {
        &self.captures
    }

    /// Mutable access to captured upvalues, for GC child-tracing and
    /// `StoreCaptured`.
    pub fn captures_mut(&mut self) -> &mut [Value] {
        &mut self.captures
    }
}
