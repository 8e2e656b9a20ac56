//! `VMScene`: one independent execution context — an operand stack plus a
//! call-frame chain — that `VMState::execute` dispatches bytecode through.
//!
//! Supplements the distilled spec's "list of VMScenes" with the scene
//! lifecycle and register-access surface `original_source/include/nerangake/vm_state.h`'s
//! `scenes_` member implies but the distillation does not spell out (see
//! DESIGN.md).

use crate::consts::REGISTER_COUNT;
use crate::error::Fault;
use crate::gc::{Arena, RootHolder};
use crate::heap::call_info::CallInfoObj;
use crate::heap::kind::HeapRef;
use crate::heap::stack;
use crate::value::Value;

/// A stable handle to a [`VMScene`] registered with a `VMState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(pub(crate) usize);

/// One execution context: an operand stack and the chain of call frames
/// currently in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VMScene {
    stack: HeapRef,
    call_top: Option<HeapRef>,
    call_depth: usize,
}

impl VMScene {
    /// Creates a scene with a fresh, empty operand stack and no active
    /// call frame.
    pub fn new(arena: &mut Arena) -> Result<Self, Fault> {
        Ok(Self {
            stack: stack::create(arena)?,
            call_top: None,
            call_depth: 0,
        })
    }

    /// The scene's operand stack.
    #[must_use]
    pub fn stack(&self) -> HeapRef {
        self.stack
    }

    /// The innermost active call frame, or `None` if the scene has not yet
    /// entered a call.
    #[must_use]
    pub fn call_top(&self) -> Option<HeapRef> {
        self.call_top
    }

    /// Current call-chain depth.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Pushes `value` onto the operand stack.
    pub fn push_operand(&mut self, arena: &mut Arena, value: Value) -> Result<(), Fault> {
        stack::push(arena, self.stack, value)
    }

    /// Pops and returns the top of the operand stack.
    pub fn pop_operand(&mut self, arena: &mut Arena) -> Result<Value, Fault> {
        stack::pop(arena, self.stack)
    }

    /// Enters a new call frame, making it the scene's innermost frame.
    /// Fails with `Fault::StackOverflow` once `max_call_depth` is exceeded.
    pub fn push_frame(&mut self, frame: HeapRef, max_call_depth: usize) -> Result<(), Fault> {
        if self.call_depth >= max_call_depth {
            return Err(Fault::StackOverflow);
        }
        self.call_top = Some(frame);
        self.call_depth += 1;
        Ok(())
    }

    /// Leaves the current call frame, restoring its parent as the scene's
    /// innermost frame. Returns the frame that was popped.
    pub fn pop_frame(&mut self, arena: &Arena) -> Option<HeapRef> {
        let popped = self.call_top?;
        self.call_top = arena.as_call_info(popped).parent();
        self.call_depth = self.call_depth.saturating_sub(1);
        Some(popped)
    }

    fn current_frame<'a>(&self, arena: &'a Arena) -> &'a CallInfoObj {
        arena.as_call_info(self.call_top.expect("no active call frame"))
    }

    /// Reads register `index` of the current frame.
    #[must_use]
    pub fn register(&self, arena: &Arena, index: u8) -> Value {
        self.current_frame(arena).registers()[index as usize]
    }

    /// Writes register `index` of the current frame, applying the write
    /// barrier if the frame lives in old space.
    pub fn set_register(&mut self, arena: &mut Arena, index: u8, value: Value) {
        let frame = self.call_top.expect("no active call frame");
        if let Value::Heap(referent) = value {
            arena.write_barrier(frame, referent);
        }
        arena.as_call_info_mut(frame).registers_mut()[index as usize] = value;
    }

    /// Reads captured-upvalue slot `index` of the current frame.
    #[must_use]
    pub fn captured(&self, arena: &Arena, index: u16) -> Value {
        self.current_frame(arena).captures()[index as usize]
    }

    /// Writes captured-upvalue slot `index` of the current frame.
    pub fn set_captured(&mut self, arena: &mut Arena, index: u16, value: Value) {
        let frame = self.call_top.expect("no active call frame");
        if let Value::Heap(referent) = value {
            arena.write_barrier(frame, referent);
        }
        arena.as_call_info_mut(frame).captures_mut()[index as usize] = value;
    }

    /// The current frame's saved program counter.
    #[must_use]
    pub fn saved_pc(&self, arena: &Arena) -> u32 {
        self.current_frame(arena).saved_pc()
    }

    /// Sets the current frame's saved program counter.
    pub fn set_saved_pc(&mut self, arena: &mut Arena, pc: u32) {
        let frame = self.call_top.expect("no active call frame");
        arena.as_call_info_mut(frame).set_saved_pc(pc);
    }

    /// The current frame's callee (a `Closure` or `UserClosure`).
    #[must_use]
    pub fn callee(&self, arena: &Arena) -> HeapRef {
        self.current_frame(arena).callee()
    }

    /// The caller-designated return-value register window, `[begin, end)`.
    #[must_use]
    pub fn return_window(&self, arena: &Arena) -> (u8, u8) {
        let frame = self.current_frame(arena);
        (frame.reg_begin(), frame.reg_end())
    }
}

impl RootHolder for VMScene {
    fn process_roots(&mut self, cb: &mut dyn FnMut(HeapRef) -> HeapRef) {
        self.stack = cb(self.stack);
        if let Some(top) = self.call_top {
            self.call_top = Some(cb(top));
        }
    }
}

/// Builds a `CallInfo` frame for entering a bytecode closure, nil-
/// initializing `registers`, copying `captures`, and linking `parent`.
pub fn build_closure_frame(
    arena: &mut Arena,
    reg_begin: u8,
    reg_end: u8,
    num_params: u8,
    callee: HeapRef,
    parent: Option<HeapRef>,
    captures: Box<[Value]>,
) -> Result<HeapRef, Fault> {
    debug_assert!((reg_end as usize) <= REGISTER_COUNT);
    let frame = CallInfoObj::for_closure(reg_begin, reg_end, num_params, callee, parent, captures);
    let frame_ref = arena.alloc_call_info(frame)?;
    arena.write_barrier(frame_ref, callee);
    if let Some(p) = parent {
        arena.write_barrier(frame_ref, p);
    }
    Ok(frame_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    #[test]
    fn operand_stack_round_trips_a_value() {
        let mut arena = Arena::new(VmConfig::default().arena_bytes);
        let mut scene = VMScene::new(&mut arena).unwrap();
        scene.push_operand(&mut arena, Value::SmallInt(5)).unwrap();
        assert_eq!(scene.pop_operand(&mut arena).unwrap(), Value::SmallInt(5));
    }

    #[test]
    fn frame_push_and_pop_restores_parent() {
        let mut arena = Arena::new(VmConfig::default().arena_bytes);
        let mut scene = VMScene::new(&mut arena).unwrap();
        let proto = crate::heap::prototype::PrototypeObj::new(false, 0, Box::new([]), std::sync::Arc::from(&[][..]));
        let proto_ref = arena.alloc_prototype_static(proto).unwrap();
        let closure = arena.alloc_closure(proto_ref, Box::new([])).unwrap();

        let frame1 = build_closure_frame(&mut arena, 0, 1, 0, closure, None, Box::new([])).unwrap();
        scene.push_frame(frame1, 65535).unwrap();
        assert_eq!(scene.call_depth(), 1);

        let frame2 = build_closure_frame(&mut arena, 0, 1, 0, closure, scene.call_top(), Box::new([])).unwrap();
        scene.push_frame(frame2, 65535).unwrap();
        assert_eq!(scene.call_depth(), 2);

        let popped = scene.pop_frame(&arena).unwrap();
        assert_eq!(popped, frame2);
        assert_eq!(scene.call_top(), Some(frame1));
        assert_eq!(scene.call_depth(), 1);
    }

    #[test]
    fn push_frame_past_max_depth_is_stack_overflow() {
        let mut arena = Arena::new(VmConfig::default().arena_bytes);
        let mut scene = VMScene::new(&mut arena).unwrap();
        let proto = crate::heap::prototype::PrototypeObj::new(false, 0, Box::new([]), std::sync::Arc::from(&[][..]));
        let proto_ref = arena.alloc_prototype_static(proto).unwrap();
        let closure = arena.alloc_closure(proto_ref, Box::new([])).unwrap();
        let frame = build_closure_frame(&mut arena, 0, 1, 0, closure, None, Box::new([])).unwrap();
        assert!(matches!(scene.push_frame(frame, 0), Err(Fault::StackOverflow)));
    }

    #[test]
    fn register_read_write_round_trips() {
        let mut arena = Arena::new(VmConfig::default().arena_bytes);
        let mut scene = VMScene::new(&mut arena).unwrap();
        let proto = crate::heap::prototype::PrototypeObj::new(false, 0, Box::new([]), std::sync::Arc::from(&[][..]));
        let proto_ref = arena.alloc_prototype_static(proto).unwrap();
        let closure = arena.alloc_closure(proto_ref, Box::new([])).unwrap();
        let frame = build_closure_frame(&mut arena, 0, 1, 0, closure, None, Box::new([])).unwrap();
        scene.push_frame(frame, 65535).unwrap();

        scene.set_register(&mut arena, 3, Value::SmallInt(11));
        assert_eq!(scene.register(&arena, 3), Value::SmallInt(11));
    }
}
