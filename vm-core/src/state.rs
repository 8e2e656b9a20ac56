//! `VMState`: owns the arena, the loader-populated constant pools, the
//! registered host functions, and the set of independent [`VMScene`]s;
//! drives one scene to completion through [`crate::interpreter`].
//!
//! Supplements the distilled spec's loader API (`push_int_constant`,
//! `push_float_constant`, `push_string_constant`, `push_prototype`,
//! `push_closure`, `register_user_closure`, `new_scene`, `execute`) with a
//! `push_global`/`set_global` pair: the opcode table gives `LoadGlobal`/
//! `StoreGlobal` but the distillation never says how a loader populates the
//! globals array in the first place (see DESIGN.md).

use std::sync::Arc;

use crate::config::VmConfig;
use crate::error::Fault;
use crate::gc::{Arena, RootHolder};
use crate::heap::kind::HeapRef;
use crate::heap::prototype::{CaptureSource, PrototypeObj};
use crate::heap::user_closure::UserClosureObj;
use crate::host::{HostFn, HostTable};
use crate::interpreter;
use crate::scene::{build_closure_frame, SceneId, VMScene};
use crate::value::Value;

/// The loader-facing entry point and execution driver for one VM instance.
///
/// Owns every GC root outside of a scene's own stack/call-chain: the
/// constant pools, the globals array, the loader-registered closures and
/// user-closures, and the scenes themselves. There is no process-wide
/// `Context` singleton (spec §9) — an embedder is free to run several
/// independent `VMState`s in one process, which the test suite does.
pub struct VMState {
    arena: Arena,
    config: VmConfig,
    entry_code: Arc<[u8]>,
    entry_prototype: Option<HeapRef>,
    int_pool: Vec<i32>,
    float_pool: Vec<HeapRef>,
    string_pool: Vec<HeapRef>,
    prototypes: Vec<HeapRef>,
    closures: Vec<HeapRef>,
    user_closures: Vec<HeapRef>,
    globals: Vec<Value>,
    host_table: HostTable,
    scenes: Vec<VMScene>,
}

impl VMState {
    /// Creates a VM over `code` (the entry prototype's bytecode), sized and
    /// tuned per `config`. Allocates nothing yet: the entry prototype is
    /// built lazily on the first [`VMState::new_scene`], since this
    /// constructor cannot fail while [`Arena`] allocation can.
    #[must_use]
    pub fn new(code: Arc<[u8]>, config: VmConfig) -> Self {
        let mut arena = Arena::new(config.arena_bytes);
        arena.set_max_age(config.max_age);
        Self {
            arena,
            config,
            entry_code: code,
            entry_prototype: None,
            int_pool: Vec::new(),
            float_pool: Vec::new(),
            string_pool: Vec::new(),
            prototypes: Vec::new(),
            closures: Vec::new(),
            user_closures: Vec::new(),
            globals: Vec::new(),
            host_table: HostTable::default(),
            scenes: Vec::new(),
        }
    }

    // --- Loader API: constant pools -----------------------------------

    /// Appends `v` to the integer constant pool, returning its `MoveI` index.
    pub fn push_int_constant(&mut self, v: i32) -> u32 {
        self.int_pool.push(v);
        (self.int_pool.len() - 1) as u32
    }

    /// Appends `v` to the float constant pool, returning its `MoveF` index.
    pub fn push_float_constant(&mut self, v: f64) -> Result<u32, Fault> {
        let r = self.arena.alloc_float_static(v)?;
        self.float_pool.push(r);
        Ok((self.float_pool.len() - 1) as u32)
    }

    /// Appends `s` to the string constant pool, returning its `MoveS` index.
    pub fn push_string_constant(&mut self, s: impl Into<Box<str>>) -> Result<u32, Fault> {
        let r = self.arena.alloc_string_static(s)?;
        self.string_pool.push(r);
        Ok((self.string_pool.len() - 1) as u32)
    }

    /// Registers a function prototype, returning the index `NewClosure`
    /// addresses it by.
    pub fn push_prototype(
        &mut self,
        is_vararg: bool,
        num_params: u8,
        captures: Box<[CaptureSource]>,
        code: Arc<[u8]>,
    ) -> Result<u32, Fault> {
        let proto = PrototypeObj::new(is_vararg, num_params, captures, code);
        let r = self.arena.alloc_prototype_static(proto)?;
        self.prototypes.push(r);
        Ok((self.prototypes.len() - 1) as u32)
    }

    /// Builds a runtime `Closure` over a previously pushed prototype,
    /// rooting it in the loader-owned `closures` pool. Use
    /// [`VMState::closure_value`] to retrieve a `Value` for it (typically to
    /// install with [`VMState::push_global`]) since no opcode reads this
    /// pool directly.
    pub fn push_closure(&mut self, prototype_index: u32, captures: Box<[Value]>) -> Result<u32, Fault> {
        let proto_ref = self.prototypes[prototype_index as usize];
        let r = self.arena.alloc_closure(proto_ref, captures)?;
        self.closures.push(r);
        Ok((self.closures.len() - 1) as u32)
    }

    /// The `Value` referencing a closure previously registered with
    /// [`VMState::push_closure`].
    #[must_use]
    pub fn closure_value(&self, index: u32) -> Value {
        Value::Heap(self.closures[index as usize])
    }

    /// Registers a host function under `name`, returning the handle
    /// `NewUserClosure` addresses it by (also the `HostTable` index).
    pub fn register_user_closure(&mut self, name: &str, f: Box<HostFn>) -> Result<u32, Fault> {
        let index = self.host_table.register(name, f);
        let r = self.arena.alloc_user_closure_static(UserClosureObj::new(index))?;
        self.user_closures.push(r);
        debug_assert_eq!(self.user_closures.len() as u32 - 1, index);
        Ok(index)
    }

    /// Looks up a previously registered host function's stable index by its
    /// registration name (spec §6's "retrievable by name" loader contract).
    #[must_use]
    pub fn user_closure_index(&self, name: &str) -> Option<u32> {
        self.host_table.index_of(name)
    }

    /// Appends a new global slot initialized to `value`, returning the index
    /// `LoadGlobal`/`StoreGlobal` address it by.
    pub fn push_global(&mut self, value: Value) -> u32 {
        self.globals.push(value);
        (self.globals.len() - 1) as u32
    }

    /// Overwrites an existing global slot, growing the globals array with
    /// nils if `index` lies past its current end.
    pub fn set_global(&mut self, index: u32, value: Value) {
        let index = index as usize;
        if index >= self.globals.len() {
            self.globals.resize(index + 1, Value::Nil);
        }
        self.globals[index] = value;
    }

    // --- Scenes and execution -------------------------------------------

    /// Creates a new execution context, entering the program's entry
    /// prototype as its outermost call frame.
    pub fn new_scene(&mut self) -> Result<SceneId, Fault> {
        let entry_proto = self.ensure_entry_prototype()?;
        let closure = self.arena.alloc_closure(entry_proto, Box::new([]))?;
        let mut scene = VMScene::new(&mut self.arena)?;
        let frame = build_closure_frame(&mut self.arena, 0, 0, 0, closure, None, Box::new([]))?;
        scene.push_frame(frame, self.config.max_call_depth)?;
        let id = SceneId(self.scenes.len());
        self.scenes.push(scene);
        Ok(id)
    }

    fn ensure_entry_prototype(&mut self) -> Result<HeapRef, Fault> {
        if let Some(r) = self.entry_prototype {
            return Ok(r);
        }
        let proto = PrototypeObj::new(false, 0, Box::new([]), self.entry_code.clone());
        let r = self.arena.alloc_prototype_static(proto)?;
        self.entry_prototype = Some(r);
        Ok(r)
    }

    /// Drives `scene`'s call-frame chain through the bytecode interpreter
    /// until it halts or raises a fault.
    pub fn execute(&mut self, scene: SceneId) -> Result<(), Fault> {
        interpreter::dispatch(self, scene)
    }

    // --- GC orchestration --------------------------------------------------
    //
    // `Arena::alloc_*` never triggers a collection itself (see DESIGN.md);
    // `interpreter::run` checks in once per instruction, and allocation call
    // sites retry once via `VMState::alloc_with_retry` on `OutOfMemory`.

    /// Runs a minor collection, sweeping every root this `VMState` and its
    /// scenes hold.
    pub(crate) fn minor_gc(&mut self) {
        tracing::debug!(eden_len = self.arena.eden_len(), "minor GC: start");
        self.arena.begin_minor_gc();
        {
            let arena = &mut self.arena;
            for r in self.float_pool.iter_mut() {
                *r = arena.copy_ref(*r);
            }
            for r in self.string_pool.iter_mut() {
                *r = arena.copy_ref(*r);
            }
            for r in self.prototypes.iter_mut() {
                *r = arena.copy_ref(*r);
            }
            for r in self.closures.iter_mut() {
                *r = arena.copy_ref(*r);
            }
            for r in self.user_closures.iter_mut() {
                *r = arena.copy_ref(*r);
            }
            if let Some(r) = self.entry_prototype.as_mut() {
                *r = arena.copy_ref(*r);
            }
            for v in self.globals.iter_mut() {
                if let Value::Heap(r) = *v {
                    *v = Value::Heap(arena.copy_ref(r));
                }
            }
            for scene in self.scenes.iter_mut() {
                scene.process_roots(&mut |r| arena.copy_ref(r));
            }
            arena.sweep_pins_minor();
            arena.sweep_remembered_set_minor();
        }
        self.arena.finish_minor_gc();
        tracing::debug!(eden_len = self.arena.eden_len(), "minor GC: done");
    }

    /// Runs a major collection: mark, compute forwarding, rewrite every
    /// surviving reference, then compact.
    pub(crate) fn major_gc(&mut self) {
        tracing::debug!(old_len = self.arena.old_len(), "major GC: start");
        self.arena.begin_major_mark();
        {
            let arena = &mut self.arena;
            for r in self.float_pool.iter_mut() {
                *r = arena.mark_from(*r);
            }
            for r in self.string_pool.iter_mut() {
                *r = arena.mark_from(*r);
            }
            for r in self.prototypes.iter_mut() {
                *r = arena.mark_from(*r);
            }
            for r in self.closures.iter_mut() {
                *r = arena.mark_from(*r);
            }
            for r in self.user_closures.iter_mut() {
                *r = arena.mark_from(*r);
            }
            if let Some(r) = self.entry_prototype.as_mut() {
                *r = arena.mark_from(*r);
            }
            for v in self.globals.iter_mut() {
                if let Value::Heap(r) = *v {
                    *v = Value::Heap(arena.mark_from(r));
                }
            }
            for scene in self.scenes.iter_mut() {
                scene.process_roots(&mut |r| arena.mark_from(r));
            }
            arena.sweep_pins_mark();
        }

        let map = self.arena.compute_forwarding();
        self.arena.rewrite_old_children(&map);
        {
            let arena = &self.arena;
            for r in self.float_pool.iter_mut() {
                *r = arena.rewrite_ref(&map, *r);
            }
            for r in self.string_pool.iter_mut() {
                *r = arena.rewrite_ref(&map, *r);
            }
            for r in self.prototypes.iter_mut() {
                *r = arena.rewrite_ref(&map, *r);
            }
            for r in self.closures.iter_mut() {
                *r = arena.rewrite_ref(&map, *r);
            }
            for r in self.user_closures.iter_mut() {
                *r = arena.rewrite_ref(&map, *r);
            }
            if let Some(r) = self.entry_prototype.as_mut() {
                *r = arena.rewrite_ref(&map, *r);
            }
            for v in self.globals.iter_mut() {
                if let Value::Heap(r) = *v {
                    *v = Value::Heap(arena.rewrite_ref(&map, r));
                }
            }
            for scene in self.scenes.iter_mut() {
                scene.process_roots(&mut |r| arena.rewrite_ref(&map, r));
            }
        }
        self.arena.rewrite_pins(&map);
        self.arena.compact(&map);
        tracing::debug!(old_len = self.arena.old_len(), "major GC: done");
    }

    /// A major collection followed by a minor one, used whenever old-space
    /// exhaustion forces a retry (spec §4.2).
    pub(crate) fn full_gc(&mut self) {
        self.major_gc();
        self.minor_gc();
    }

    /// Opportunistic GC checkpoint, called once per dispatched instruction:
    /// collects ahead of need rather than only reactively on failure.
    pub(crate) fn maybe_collect(&mut self) {
        if self.arena.needs_major_gc() {
            self.full_gc();
        } else if self.arena.needs_minor_gc() {
            self.minor_gc();
        }
    }

    /// Runs `f` against the arena, retrying once after a full collection if
    /// it fails with `Fault::OutOfMemory` (spec §4.2's allocation-retry
    /// rule). Used by the interpreter for every opcode that allocates.
    pub(crate) fn alloc_with_retry<T>(
        &mut self,
        f: impl Fn(&mut Arena) -> Result<T, Fault>,
    ) -> Result<T, Fault> {
        match f(&mut self.arena) {
            Err(Fault::OutOfMemory) => {
                self.full_gc();
                f(&mut self.arena)
            }
            other => other,
        }
    }

    // --- Accessors used by `crate::interpreter` ----------------------------

    pub(crate) fn arena(&self) -> &Arena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub(crate) fn max_call_depth(&self) -> usize {
        self.config.max_call_depth
    }

    pub(crate) fn int_constant(&self, index: u16) -> i32 {
        self.int_pool[index as usize]
    }

    pub(crate) fn float_constant(&self, index: u16) -> HeapRef {
        self.float_pool[index as usize]
    }

    pub(crate) fn string_constant(&self, index: u16) -> HeapRef {
        self.string_pool[index as usize]
    }

    pub(crate) fn prototype_at(&self, index: u16) -> HeapRef {
        self.prototypes[index as usize]
    }

    pub(crate) fn user_closure_at(&self, index: u16) -> HeapRef {
        self.user_closures[index as usize]
    }

    pub(crate) fn global(&self, index: u16) -> Value {
        self.globals.get(index as usize).copied().unwrap_or(Value::Nil)
    }

    pub(crate) fn set_global_indexed(&mut self, index: u16, value: Value) {
        self.set_global(u32::from(index), value);
    }

    pub(crate) fn host_fn(&self, index: u32) -> Option<&HostFn> {
        self.host_table.get(index)
    }

    /// Invokes the host function registered at `index` directly against
    /// `scene`'s current frame, with no `CallInfo` pushed: a host call
    /// never dispatches bytecode, so `begin`/`end` stay the caller's own
    /// return-window registers throughout (see `host.rs`).
    pub(crate) fn invoke_host(
        &mut self,
        scene: SceneId,
        index: u32,
        begin: u8,
        end: u8,
        num_params: u8,
    ) -> Result<(), Fault> {
        let VMState {
            arena,
            scenes,
            host_table,
            ..
        } = self;
        let f = host_table.get(index).ok_or(Fault::TypeError("unregistered host function"))?;
        f(&mut scenes[scene.0], arena, begin, end, num_params)
    }

    pub(crate) fn stack(&self, scene: SceneId) -> HeapRef {
        self.scenes[scene.0].stack()
    }

    pub(crate) fn callee(&self, scene: SceneId) -> HeapRef {
        self.scenes[scene.0].callee(&self.arena)
    }

    /// The scene's innermost active call frame, if any. `None` once a
    /// `Return`/`ReturnVoid` has popped the outermost frame.
    pub(crate) fn call_top(&self, scene: SceneId) -> Option<HeapRef> {
        self.scenes[scene.0].call_top()
    }

    pub(crate) fn return_window(&self, scene: SceneId) -> (u8, u8) {
        self.scenes[scene.0].return_window(&self.arena)
    }

    pub(crate) fn saved_pc(&self, scene: SceneId) -> u32 {
        self.scenes[scene.0].saved_pc(&self.arena)
    }

    pub(crate) fn set_saved_pc(&mut self, scene: SceneId, pc: u32) {
        let VMState { arena, scenes, .. } = self;
        scenes[scene.0].set_saved_pc(arena, pc);
    }

    pub(crate) fn register(&self, scene: SceneId, index: u8) -> Value {
        self.scenes[scene.0].register(&self.arena, index)
    }

    pub(crate) fn set_register(&mut self, scene: SceneId, index: u8, value: Value) {
        let VMState { arena, scenes, .. } = self;
        scenes[scene.0].set_register(arena, index, value);
    }

    pub(crate) fn captured(&self, scene: SceneId, index: u16) -> Value {
        self.scenes[scene.0].captured(&self.arena, index)
    }

    pub(crate) fn set_captured(&mut self, scene: SceneId, index: u16, value: Value) {
        let VMState { arena, scenes, .. } = self;
        scenes[scene.0].set_captured(arena, index, value);
    }

    pub(crate) fn push_operand(&mut self, scene: SceneId, value: Value) -> Result<(), Fault> {
        let VMState { arena, scenes, .. } = self;
        scenes[scene.0].push_operand(arena, value)
    }

    pub(crate) fn pop_operand(&mut self, scene: SceneId) -> Result<Value, Fault> {
        let VMState { arena, scenes, .. } = self;
        scenes[scene.0].pop_operand(arena)
    }

    pub(crate) fn push_frame(&mut self, scene: SceneId, frame: HeapRef) -> Result<(), Fault> {
        let max_call_depth = self.config.max_call_depth;
        let VMState { scenes, .. } = self;
        scenes[scene.0].push_frame(frame, max_call_depth)
    }

    pub(crate) fn pop_frame(&mut self, scene: SceneId) -> Option<HeapRef> {
        let VMState { arena, scenes, .. } = self;
        scenes[scene.0].pop_frame(arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_pools_return_insertion_order_indices() {
        let mut state = VMState::new(Arc::from(&[][..]), VmConfig::default());
        assert_eq!(state.push_int_constant(42), 0);
        assert_eq!(state.push_int_constant(7), 1);
        assert_eq!(state.push_string_constant("hi").unwrap(), 0);
        assert_eq!(state.push_float_constant(1.5).unwrap(), 0);
    }

    #[test]
    fn new_scene_enters_the_entry_prototype_as_its_outermost_frame() {
        let mut state = VMState::new(Arc::from(&[][..]), VmConfig::default());
        let scene = state.new_scene().unwrap();
        assert_eq!(state.saved_pc(scene), 0);
    }

    #[test]
    fn set_global_past_the_end_grows_with_nils() {
        let mut state = VMState::new(Arc::from(&[][..]), VmConfig::default());
        state.set_global(3, Value::SmallInt(9));
        assert_eq!(state.global(0), Value::Nil);
        assert_eq!(state.global(3), Value::SmallInt(9));
    }
}
