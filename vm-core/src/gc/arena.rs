//! The managed heap: a generational arena split into eden, two survivor
//! semispaces, and an old (tenured) region, plus the copying minor
//! collector and mark-compact major collector that manage it (spec §4).
//!
//! Per spec §9's suggested re-architecture, references are typed indices
//! ([`HeapRef`]) into one of four `Vec<Slot>` regions rather than raw
//! pointers, so "moving" an object is a `Vec` push plus a forwarding
//! record, never a `memcpy` the rest of the program must chase.

use std::collections::HashSet;
use std::mem;

use crate::consts::{self, arena_layout};
use crate::error::Fault;
use crate::gc::remembered_set::RememberedSet;
use crate::heap::array::ArrayObj;
use crate::heap::call_info::CallInfoObj;
use crate::heap::closure::ClosureObj;
use crate::heap::hash_map::{HashMapObj, HashNodeObj};
use crate::heap::kind::{HeapRef, Kind, Region};
use crate::heap::object::{HeapObject, ObjectHeader};
use crate::heap::prototype::PrototypeObj;
use crate::heap::stack::{self, StackObj};
use crate::heap::string_obj::StringObj;
use crate::heap::user_closure::UserClosureObj;
use crate::heap::vector::VectorObj;
use crate::value::Value;

/// A single arena slot: the header the collector consults plus the
/// object's payload.
#[derive(Debug, Clone, PartialEq)]
struct Slot {
    header: ObjectHeader,
    object: HeapObject,
}

macro_rules! downcast {
    ($name:ident, $name_mut:ident, $variant:ident, $ty:ty) => {
        #[doc = concat!("Accesses `r` as a `", stringify!($variant), "`. Panics if `r` is not that kind.")]
        #[must_use]
        pub fn $name(&self, r: HeapRef) -> &$ty {
            match self.get(r) {
                HeapObject::$variant(v) => v,
                other => panic!("expected {:?} at {:?}, found {:?}", Kind::$variant, r, other.kind()),
            }
        }

        #[doc = concat!("Mutably accesses `r` as a `", stringify!($variant), "`. Panics if `r` is not that kind.")]
        pub fn $name_mut(&mut self, r: HeapRef) -> &mut $ty {
            match self.get_mut(r) {
                HeapObject::$variant(v) => v,
                other => panic!("expected {:?}, found {:?}", Kind::$variant, other.kind()),
            }
        }
    };
}

/// The managed heap.
///
/// Eden and the two survivor semispaces together form the young
/// generation; `from_is` tracks which physical survivor vec currently
/// plays the copying collector's "from" role (spec §9: region membership
/// becomes an index-range test rather than a pointer comparison, and the
/// from/to swap becomes flipping this index instead of swapping base
/// pointers).
#[derive(Debug)]
pub struct Arena {
    eden: Vec<Slot>,
    survivor: [Vec<Slot>; 2],
    from_is: usize,
    old: Vec<Slot>,
    remembered: RememberedSet,
    mark_visited_young: HashSet<HeapRef>,
    eden_capacity: usize,
    survivor_capacity: usize,
    old_capacity: usize,
    max_age: u8,
    /// The GC scratch stack (spec §5.4): composite-object constructors pin
    /// their already-allocated parts here before an inner allocation that
    /// could otherwise make them the sole reachable path to it disappear
    /// mid-construction. Swept alongside ordinary roots by both collectors.
    pins: Vec<HeapRef>,
}

impl Arena {
    /// Builds a new arena sized from a total byte budget, split across
    /// regions per [`arena_layout`] and converted to object counts via
    /// [`consts::NOMINAL_OBJECT_SIZE`].
    #[must_use]
    pub fn new(arena_bytes: usize) -> Self {
        let rounded = (arena_bytes / arena_layout::ROUND_TO_BYTES).max(1) * arena_layout::ROUND_TO_BYTES;
        let eden_bytes = (rounded as f64 * (arena_layout::SURVIVOR_A_START - arena_layout::EDEN_START)) as usize;
        let survivor_bytes = (rounded as f64 * (arena_layout::SURVIVOR_B_START - arena_layout::SURVIVOR_A_START)) as usize;
        let old_bytes = (rounded as f64 * (1.0 - arena_layout::OLD_START)) as usize;

        Self {
            eden: Vec::new(),
            survivor: [Vec::new(), Vec::new()],
            from_is: 0,
            old: Vec::new(),
            remembered: RememberedSet::default(),
            mark_visited_young: HashSet::new(),
            eden_capacity: (eden_bytes / consts::NOMINAL_OBJECT_SIZE).max(1),
            survivor_capacity: (survivor_bytes / consts::NOMINAL_OBJECT_SIZE).max(1),
            old_capacity: (old_bytes / consts::NOMINAL_OBJECT_SIZE).max(1),
            max_age: consts::MAX_AGE,
            pins: Vec::new(),
        }
    }

    /// Overrides the promotion-age threshold, for tests that want to
    /// observe promotion without allocating thousands of objects.
    pub fn set_max_age(&mut self, max_age: u8) {
        self.max_age = max_age;
    }

    fn from_region(&self) -> Region {
        if self.from_is == 0 {
            Region::SurvivorA
        } else {
            Region::SurvivorB
        }
    }

    fn to_region(&self) -> Region {
        if self.from_is == 0 {
            Region::SurvivorB
        } else {
            Region::SurvivorA
        }
    }

    fn region_vec(&self, region: Region) -> &Vec<Slot> {
        match region {
            Region::Eden => &self.eden,
            Region::SurvivorA => &self.survivor[0],
            Region::SurvivorB => &self.survivor[1],
            Region::Old => &self.old,
        }
    }

    fn region_vec_mut(&mut self, region: Region) -> &mut Vec<Slot> {
        match region {
            Region::Eden => &mut self.eden,
            Region::SurvivorA => &mut self.survivor[0],
            Region::SurvivorB => &mut self.survivor[1],
            Region::Old => &mut self.old,
        }
    }

    fn slot(&self, r: HeapRef) -> &Slot {
        &self.region_vec(r.region)[r.index]
    }

    fn slot_mut(&mut self, r: HeapRef) -> &mut Slot {
        &mut self.region_vec_mut(r.region)[r.index]
    }

    /// The object at `r`.
    #[must_use]
    pub fn get(&self, r: HeapRef) -> &HeapObject {
        &self.slot(r).object
    }

    /// Mutable access to the object at `r`.
    pub fn get_mut(&mut self, r: HeapRef) -> &mut HeapObject {
        &mut self.slot_mut(r).object
    }

    /// The header at `r`.
    #[must_use]
    pub fn header(&self, r: HeapRef) -> &ObjectHeader {
        &self.slot(r).header
    }

    /// Current eden occupancy.
    #[must_use]
    pub fn eden_len(&self) -> usize {
        self.eden.len()
    }

    /// Configured eden capacity, in objects.
    #[must_use]
    pub fn eden_capacity(&self) -> usize {
        self.eden_capacity
    }

    /// Current old-space occupancy.
    #[must_use]
    pub fn old_len(&self) -> usize {
        self.old.len()
    }

    /// Configured old-space capacity, in objects.
    #[must_use]
    pub fn old_capacity(&self) -> usize {
        self.old_capacity
    }

    /// Whether eden has filled enough to warrant a minor collection before
    /// the next allocation.
    #[must_use]
    pub fn needs_minor_gc(&self) -> bool {
        self.eden.len() >= self.eden_capacity
    }

    /// Whether old space has filled enough to warrant a major collection.
    #[must_use]
    pub fn needs_major_gc(&self) -> bool {
        self.old.len() >= self.old_capacity
    }

    fn push_young(&mut self, kind: Kind, size: u32, object: HeapObject) -> Result<HeapRef, Fault> {
        if self.eden.len() >= self.eden_capacity {
            return Err(Fault::OutOfMemory);
        }
        let index = self.eden.len();
        self.eden.push(Slot {
            header: ObjectHeader::new(kind, size),
            object,
        });
        Ok(HeapRef {
            region: Region::Eden,
            index,
        })
    }

    fn push_old(&mut self, kind: Kind, size: u32, object: HeapObject) -> Result<HeapRef, Fault> {
        if self.old.len() >= self.old_capacity {
            return Err(Fault::OutOfMemory);
        }
        let index = self.old.len();
        self.old.push(Slot {
            header: ObjectHeader::new(kind, size),
            object,
        });
        Ok(HeapRef {
            region: Region::Old,
            index,
        })
    }

    // --- Allocation: young generation -----------------------------------

    /// Boxes a float in young space (runtime arithmetic promotion, spec
    /// §4.1).
    pub fn alloc_float(&mut self, value: f64) -> Result<HeapRef, Fault> {
        self.push_young(Kind::Float, 1, HeapObject::Float(value))
    }

    /// Allocates a nil-initialized `Array` of `len` slots in young space.
    pub fn alloc_array(&mut self, len: u32) -> Result<HeapRef, Fault> {
        self.push_young(Kind::Array, len.max(1), HeapObject::Array(ArrayObj::new(len)))
    }

    /// Allocates an empty `Vector` over a freshly allocated backing array.
    pub fn alloc_vector(&mut self) -> Result<HeapRef, Fault> {
        let backing = self.alloc_array(0)?;
        self.push_young(Kind::Vector, 1, HeapObject::Vector(VectorObj::new(backing)))
    }

    /// Allocates an empty `HashMap` with an initial bucket array.
    pub fn alloc_hash_map(&mut self) -> Result<HeapRef, Fault> {
        let buckets = self.alloc_array(consts::INITIAL_HASHMAP_CAPACITY as u32)?;
        self.push_young(
            Kind::HashMap,
            1,
            HeapObject::HashMap(HashMapObj::new(buckets, consts::DEFAULT_LOAD_FACTOR)),
        )
    }

    /// Allocates a `HashNode` link.
    pub fn alloc_hash_node(&mut self, key: Value, value: Value, next: Value) -> Result<HeapRef, Fault> {
        self.push_young(Kind::HashNode, 1, HeapObject::HashNode(HashNodeObj::new(key, value, next)))
    }

    /// Allocates a runtime `Closure` pairing `prototype` with `captures`.
    pub fn alloc_closure(&mut self, prototype: HeapRef, captures: Box<[Value]>) -> Result<HeapRef, Fault> {
        self.push_young(Kind::Closure, 1, HeapObject::Closure(ClosureObj::new(prototype, captures)))
    }

    /// Allocates a `CallInfo` frame in young space (runtime call frames,
    /// reclaimed by ordinary generational collection once unreachable).
    pub fn alloc_call_info(&mut self, frame: CallInfoObj) -> Result<HeapRef, Fault> {
        self.push_young(Kind::CallInfo, 1, HeapObject::CallInfo(frame))
    }

    // --- Allocation: old ("static") space --------------------------------
    //
    // Per spec §4.2, constant-pool strings/floats and the wrapper kinds that
    // are long-lived by construction (a scene's operand `Stack`, loader-
    // registered prototypes and user-closures) are allocated directly into
    // old space. Their *backing* storage (stack chunks, hashmap buckets)
    // still goes through the young allocators above and is promoted
    // normally if it survives, preserving the already-tested backing-array
    // code paths in `heap::stack` and `heap::hash_map` unchanged.

    /// Allocates a constant-pool string directly into old space.
    pub fn alloc_string_static(&mut self, s: impl Into<Box<str>>) -> Result<HeapRef, Fault> {
        let obj = StringObj::new(s);
        let size = obj.len().max(1) as u32;
        self.push_old(Kind::String, size, HeapObject::String(obj))
    }

    /// Allocates a constant-pool float directly into old space.
    pub fn alloc_float_static(&mut self, value: f64) -> Result<HeapRef, Fault> {
        self.push_old(Kind::Float, 1, HeapObject::Float(value))
    }

    /// Allocates a `Prototype` directly into old space.
    pub fn alloc_prototype_static(&mut self, proto: PrototypeObj) -> Result<HeapRef, Fault> {
        self.push_old(Kind::Prototype, 1, HeapObject::Prototype(proto))
    }

    /// Allocates a `UserClosure` directly into old space.
    pub fn alloc_user_closure_static(&mut self, uc: UserClosureObj) -> Result<HeapRef, Fault> {
        self.push_old(Kind::UserClosure, 1, HeapObject::UserClosure(uc))
    }

    /// Allocates a `Stack` wrapper directly into old space, wrapping a
    /// (young) first chunk.
    pub fn alloc_stack(&mut self, first_chunk: HeapRef) -> Result<HeapRef, Fault> {
        self.push_old(Kind::Stack, 1, HeapObject::Stack(StackObj::new(first_chunk)))
    }

    // --- Downcast convenience --------------------------------------------

    downcast!(as_array, as_array_mut, Array, ArrayObj);
    downcast!(as_vector, as_vector_mut, Vector, VectorObj);
    downcast!(as_hash_map, as_hash_map_mut, HashMap, HashMapObj);
    downcast!(as_hash_node, as_hash_node_mut, HashNode, HashNodeObj);
    downcast!(as_stack, as_stack_mut, Stack, StackObj);
    downcast!(as_closure, as_closure_mut, Closure, ClosureObj);
    downcast!(as_call_info, as_call_info_mut, CallInfo, CallInfoObj);

    /// Accesses `r` as a `Prototype`. Panics if `r` is not that kind.
    #[must_use]
    pub fn as_prototype(&self, r: HeapRef) -> &PrototypeObj {
        match self.get(r) {
            HeapObject::Prototype(p) => p,
            other => panic!("expected a Prototype, found {:?}", other.kind()),
        }
    }

    /// Accesses `r` as a `UserClosure`. Panics if `r` is not that kind.
    #[must_use]
    pub fn as_user_closure(&self, r: HeapRef) -> &UserClosureObj {
        match self.get(r) {
            HeapObject::UserClosure(u) => u,
            other => panic!("expected a UserClosure, found {:?}", other.kind()),
        }
    }

    /// Accesses `r` as a `String`. Panics if `r` is not that kind.
    #[must_use]
    pub fn as_string(&self, r: HeapRef) -> &StringObj {
        match self.get(r) {
            HeapObject::String(s) => s,
            other => panic!("expected a String, found {:?}", other.kind()),
        }
    }

    // --- Write barrier and equality ---------------------------------------

    /// Records an old→young reference in the remembered set (spec §4.3).
    /// Idempotent; a no-op unless `container` is in old space and
    /// `referent` is not.
    pub fn write_barrier(&mut self, container: HeapRef, referent: HeapRef) {
        if container.region == Region::Old && referent.region != Region::Old {
            self.remembered.insert(container.index);
        }
    }

    /// Bounds-checked array write that also applies the write barrier when
    /// storing a heap reference, so callers never have to remember to call
    /// both.
    pub fn array_set(&mut self, array: HeapRef, index: u32, value: Value) -> Result<(), Fault> {
        if let Value::Heap(referent) = value {
            self.write_barrier(array, referent);
        }
        self.as_array_mut(array).set(index, value)
    }

    /// Structural equality between two values that may be heap references
    /// (spec §4.1): identity first, then same-kind content equality, else
    /// `false`.
    #[must_use]
    pub fn equals(&self, a: HeapRef, b: HeapRef) -> bool {
        if a == b {
            return true;
        }
        let (sa, sb) = (self.get(a), self.get(b));
        sa.kind() == sb.kind() && sa.content_equals(sb)
    }

    // --- Minor GC: Cheney-style copying -----------------------------------

    /// Resets the "to" survivor space ahead of a copying pass.
    pub fn begin_minor_gc(&mut self) {
        let to = self.to_region();
        self.region_vec_mut(to).clear();
    }

    /// Drops eden and the drained "from" survivor space, then flips which
    /// physical survivor plays "from" for the next cycle.
    pub fn finish_minor_gc(&mut self) {
        self.eden.clear();
        let from = self.from_region();
        self.region_vec_mut(from).clear();
        self.from_is = 1 - self.from_is;
    }

    /// The Cheney `Copy` primitive (spec §4.4 step 1): roots and reachable
    /// children are moved out of eden/"from" into "to" (or promoted to old
    /// space at the age ceiling), tracing recursively as each copy lands.
    /// Old-space references and references already forwarded this pass are
    /// returned unchanged / as their recorded forward target.
    pub fn copy_ref(&mut self, r: HeapRef) -> HeapRef {
        if r.region == Region::Old {
            return r;
        }
        if let Some(to) = self.header(r).forward_to() {
            return to;
        }

        let age = self.header(r).age();
        if age >= self.max_age {
            return self.promote(r);
        }

        let to_region = self.to_region();
        let new_index = self.region_vec(to_region).len();
        let new_ref = HeapRef {
            region: to_region,
            index: new_index,
        };

        // Record the forward before recursing, so cycles terminate. The
        // source slot is left in place (object swapped for a placeholder,
        // not removed) so that other not-yet-visited `HeapRef`s into this
        // same region keep pointing at valid, if now-stale, indices until
        // `finish_minor_gc` clears the whole region.
        let mut header = *self.header(r);
        header.set_age(age + 1);
        header.set_forward_to(None);
        self.slot_mut(r).header.set_forward_to(Some(new_ref));

        let object = mem::replace(&mut self.slot_mut(r).object, HeapObject::Float(0.0));
        self.region_vec_mut(to_region).push(Slot { header, object });

        let mut object = mem::replace(
            &mut self.region_vec_mut(to_region)[new_index].object,
            HeapObject::Float(0.0),
        );
        object.trace_children(&mut |child| self.copy_ref(child));
        self.region_vec_mut(to_region)[new_index].object = object;

        new_ref
    }

    /// Unconditionally copies `r` into old space (spec §4.4's age-ceiling
    /// promotion path). Does not itself check old-space capacity against a
    /// concurrent major collection; the caller is expected to have already
    /// ensured headroom (a deliberate simplification — see DESIGN.md).
    fn promote(&mut self, r: HeapRef) -> HeapRef {
        if let Some(to) = self.header(r).forward_to() {
            return to;
        }

        let new_index = self.old.len();
        let new_ref = HeapRef {
            region: Region::Old,
            index: new_index,
        };

        let mut header = *self.header(r);
        header.set_forwarded(false);
        header.set_forward_to(None);
        self.slot_mut(r).header.set_forward_to(Some(new_ref));

        let object = mem::replace(&mut self.slot_mut(r).object, HeapObject::Float(0.0));
        self.old.push(Slot { header, object });

        let mut object = mem::replace(&mut self.old[new_index].object, HeapObject::Float(0.0));
        let mut any_young_child = false;
        object.trace_children(&mut |child| {
            let moved = self.copy_ref(child);
            if moved.region != Region::Old {
                any_young_child = true;
            }
            moved
        });
        self.old[new_index].object = object;
        if any_young_child {
            self.remembered.insert(new_index);
        }

        new_ref
    }

    /// Re-traces every remembered old object through the copying
    /// collector, so old→young edges are kept live across a minor
    /// collection (spec §4.4 step 4), dropping entries that no longer
    /// reference young space.
    pub fn sweep_remembered_set_minor(&mut self) {
        let indices: Vec<usize> = self.remembered.iter().collect();
        let mut still_young: Vec<usize> = Vec::new();
        for index in indices {
            let mut object = mem::replace(&mut self.old[index].object, HeapObject::Float(0.0));
            let mut any_young_child = false;
            object.trace_children(&mut |child| {
                let moved = self.copy_ref(child);
                if moved.region != Region::Old {
                    any_young_child = true;
                }
                moved
            });
            self.old[index].object = object;
            if any_young_child {
                still_young.push(index);
            }
        }
        self.remembered.replace_with(still_young);
    }

    // --- Major GC: mark-compact --------------------------------------------

    /// Resets mark state ahead of a mark phase: every old header's
    /// `forwarded` flag (repurposed here as the mark bit) is cleared, and
    /// the young-object visited scratch set is emptied.
    pub fn begin_major_mark(&mut self) {
        for slot in &mut self.old {
            slot.header.set_forwarded(false);
        }
        self.mark_visited_young.clear();
    }

    /// The mark-phase root-tracing callback (spec §4.4 step 2).
    ///
    /// Old-space objects use their header's `forwarded` bit as the mark
    /// flag directly; young-space objects are traced through (so that any
    /// old object they reach is still marked) but are not themselves
    /// marked, since a minor collection's copying semantics will reclaim
    /// unreachable young objects on its own pass. A separate
    /// `mark_visited_young` set (rather than reusing the young header's
    /// `forwarded` bit) avoids corrupting state the next minor GC depends
    /// on, since marking and copying share no pass here.
    pub fn mark_from(&mut self, r: HeapRef) -> HeapRef {
        if r.region != Region::Old {
            if !self.mark_visited_young.insert(r) {
                return r;
            }
            let mut object = mem::replace(&mut self.slot_mut(r).object, HeapObject::Float(0.0));
            object.trace_children(&mut |child| self.mark_from(child));
            self.slot_mut(r).object = object;
            return r;
        }

        if self.header(r).forwarded() {
            return r;
        }
        self.slot_mut(r).header.set_forwarded(true);

        let mut object = mem::replace(&mut self.old[r.index].object, HeapObject::Float(0.0));
        object.trace_children(&mut |child| self.mark_from(child));
        self.old[r.index].object = object;

        r
    }

    /// Computes each live old-space slot's post-compaction index, in
    /// left-to-right order (spec §4.4 step 3). `None` marks a dead slot.
    #[must_use]
    pub fn compute_forwarding(&self) -> Vec<Option<usize>> {
        let mut next = 0usize;
        self.old
            .iter()
            .map(|slot| {
                if slot.header.forwarded() {
                    let assigned = next;
                    next += 1;
                    Some(assigned)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Remaps the old-region half of every reference reachable from a live
    /// old slot's children, ahead of compaction, so that the data moved in
    /// `compact` is already internally consistent (spec §4.4 step 3).
    pub fn rewrite_old_children(&mut self, map: &[Option<usize>]) {
        for i in 0..self.old.len() {
            if !self.old[i].header.forwarded() {
                continue;
            }
            let mut object = mem::replace(&mut self.old[i].object, HeapObject::Float(0.0));
            object.trace_children(&mut |child| self.rewrite_ref(map, child));
            self.old[i].object = object;
        }
    }

    /// Remaps a single reference through the compaction map: old-region
    /// references are rewritten to their post-compaction index, everything
    /// else (including young references) is returned unchanged.
    #[must_use]
    pub fn rewrite_ref(&self, map: &[Option<usize>], r: HeapRef) -> HeapRef {
        if r.region != Region::Old {
            return r;
        }
        match map[r.index] {
            Some(new_index) => HeapRef {
                region: Region::Old,
                index: new_index,
            },
            None => r,
        }
    }

    /// Physically compacts old space: live slots are copied into a new
    /// `Vec` in their assigned order, dead slots are dropped, and the
    /// remembered set is remapped to match (spec §4.4 step 5).
    pub fn compact(&mut self, map: &[Option<usize>]) {
        let old = mem::take(&mut self.old);
        let mut compacted: Vec<Slot> = Vec::with_capacity(old.len());
        for (i, mut slot) in old.into_iter().enumerate() {
            if map[i].is_some() {
                slot.header.set_forwarded(false);
                compacted.push(slot);
            }
        }
        self.old = compacted;

        let remapped: Vec<usize> = self
            .remembered
            .iter()
            .filter_map(|i| map[i])
            .collect();
        self.remembered.replace_with(remapped);
    }

    /// Read-only access to the remembered set, for diagnostics and tests.
    #[must_use]
    pub fn remembered_set(&self) -> &RememberedSet {
        &self.remembered
    }

    // --- GC scratch stack (spec §5.4) --------------------------------------

    /// Pins `r` so neither collector reclaims it until [`Arena::unpin`].
    pub fn pin(&mut self, r: HeapRef) {
        self.pins.push(r);
    }

    /// Releases the most recently pinned reference. Pins nest like a stack;
    /// callers must unpin in the reverse order they pinned in.
    pub fn unpin(&mut self) {
        self.pins.pop();
    }

    /// Runs `f` with `r` pinned, unpinning again once `f` returns (including
    /// on early return via `?`). The safe, non-self-referential stand-in for
    /// the spec's RAII `Handle<'gc, T>` guard: a literal borrow-holding guard
    /// would need to borrow the very `Arena` it is meant to authorize
    /// further allocations against, which the borrow checker cannot express
    /// (see DESIGN.md).
    pub fn with_pinned<T>(&mut self, r: HeapRef, f: impl FnOnce(&mut Self) -> T) -> T {
        self.pin(r);
        let result = f(self);
        self.unpin();
        result
    }

    /// Traces every pin through the copying collector (spec §4.4 step 1,
    /// extended to the scratch stack).
    pub fn sweep_pins_minor(&mut self) {
        for i in 0..self.pins.len() {
            let r = self.pins[i];
            self.pins[i] = self.copy_ref(r);
        }
    }

    /// Marks every pin as a major-GC root (spec §4.4 step 2, extended).
    pub fn sweep_pins_mark(&mut self) {
        for i in 0..self.pins.len() {
            let r = self.pins[i];
            self.pins[i] = self.mark_from(r);
        }
    }

    /// Remaps every pin through the compaction map (spec §4.4 step 3,
    /// extended). Must run after [`Arena::compute_forwarding`] and before
    /// [`Arena::compact`], alongside the rest of root rewriting.
    pub fn rewrite_pins(&mut self, map: &[Option<usize>]) {
        for i in 0..self.pins.len() {
            self.pins[i] = self.rewrite_ref(map, self.pins[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    #[test]
    fn eden_allocation_fills_toward_capacity() {
        let mut a = Arena::new(VmConfig::default().arena_bytes);
        let before = a.eden_len();
        a.alloc_array(4).unwrap();
        assert_eq!(a.eden_len(), before + 1);
    }

    #[test]
    fn minor_gc_preserves_a_live_root_array_value() {
        let mut a = Arena::new(VmConfig::default().arena_bytes);
        let arr = a.alloc_array(1).unwrap();
        a.array_set(arr, 0, Value::SmallInt(42)).unwrap();

        a.begin_minor_gc();
        let new_root = a.copy_ref(arr);
        a.sweep_remembered_set_minor();
        a.finish_minor_gc();

        assert_eq!(a.as_array(new_root).get(0).unwrap(), Value::SmallInt(42));
    }

    #[test]
    fn minor_gc_preserves_heap_reference_chains() {
        let mut a = Arena::new(VmConfig::default().arena_bytes);
        let inner = a.alloc_array(1).unwrap();
        a.array_set(inner, 0, Value::SmallInt(7)).unwrap();
        let outer = a.alloc_array(1).unwrap();
        a.array_set(outer, 0, Value::Heap(inner)).unwrap();

        a.begin_minor_gc();
        let new_outer = a.copy_ref(outer);
        a.sweep_remembered_set_minor();
        a.finish_minor_gc();

        let Value::Heap(new_inner) = a.as_array(new_outer).get(0).unwrap() else {
            panic!("expected a heap reference to survive");
        };
        assert_eq!(a.as_array(new_inner).get(0).unwrap(), Value::SmallInt(7));
    }

    #[test]
    fn repeated_minor_gc_promotes_a_long_lived_object_to_old_space() {
        let mut a = Arena::new(VmConfig::default().arena_bytes);
        a.set_max_age(2);
        let mut root = a.alloc_array(1).unwrap();

        for _ in 0..5 {
            a.begin_minor_gc();
            root = a.copy_ref(root);
            a.sweep_remembered_set_minor();
            a.finish_minor_gc();
        }

        assert_eq!(root.region, Region::Old);
    }

    #[test]
    fn write_barrier_only_records_old_to_young_edges() {
        let mut a = Arena::new(VmConfig::default().arena_bytes);
        let young = a.alloc_array(1).unwrap();
        let old = a.alloc_string_static("x").unwrap();
        a.write_barrier(old, young);
        assert!(a.remembered_set().contains(old.index));

        let mut b = Arena::new(VmConfig::default().arena_bytes);
        let y1 = b.alloc_array(1).unwrap();
        let y2 = b.alloc_array(1).unwrap();
        b.write_barrier(y1, y2);
        assert!(b.remembered_set().is_empty());
    }

    #[test]
    fn major_gc_reclaims_an_unreachable_old_object_and_compacts() {
        let mut a = Arena::new(VmConfig::default().arena_bytes);
        let garbage = a.alloc_string_static("garbage").unwrap();
        let root = a.alloc_string_static("root").unwrap();
        let _ = garbage;

        a.begin_major_mark();
        let new_root = a.mark_from(root);
        let map = a.compute_forwarding();
        a.rewrite_old_children(&map);
        let rewritten_root = a.rewrite_ref(&map, new_root);
        a.compact(&map);

        assert_eq!(a.old_len(), 1);
        assert_eq!(a.as_string(rewritten_root).as_str(), "root");
    }

    #[test]
    fn major_gc_rewrites_cross_references_after_compaction() {
        let mut a = Arena::new(VmConfig::default().arena_bytes);
        let _ = a.alloc_string_static("dead").unwrap();
        let target = a.alloc_string_static("kept").unwrap();
        let proto = crate::heap::prototype::PrototypeObj::new(false, 0, Box::new([]), std::sync::Arc::from(&[][..]));
        let proto_ref = a.alloc_prototype_static(proto).unwrap();
        let closure = a.alloc_closure(proto_ref, Box::new([Value::Heap(target)])).unwrap();
        // Force the closure into old space for this test by promoting it.
        a.begin_minor_gc();
        let closure = a.promote(closure);
        a.finish_minor_gc();

        a.begin_major_mark();
        let closure = a.mark_from(closure);
        let map = a.compute_forwarding();
        a.rewrite_old_children(&map);
        let closure = a.rewrite_ref(&map, closure);
        a.compact(&map);

        let Value::Heap(rewritten_target) = a.as_closure(closure).captures()[0] else {
            panic!("expected the capture to remain a heap reference");
        };
        assert_eq!(a.as_string(rewritten_target).as_str(), "kept");
    }
}
