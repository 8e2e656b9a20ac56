//! [`HeapObject`]: the tagged union of every concrete heap kind, plus the
//! per-object header the arena stores alongside it.
//!
//! Per spec §9 ("Method tables become per-kind dispatch tables stored once,
//! keyed by type tag, not embedded per object"), there is no `vtable_ptr`
//! field and no per-object function-pointer table: `equals`, `hash`, and
//! `trace_children` are each one `match` over [`Kind`] here, not an indirect
//! call through a stored method table.

use crate::consts;
use crate::heap::array::ArrayObj;
use crate::heap::call_info::CallInfoObj;
use crate::heap::closure::ClosureObj;
use crate::heap::hash_map::{HashMapObj, HashNodeObj};
use crate::heap::kind::{HeapRef, Kind};
use crate::heap::prototype::PrototypeObj;
use crate::heap::stack::StackObj;
use crate::heap::string_obj::StringObj;
use crate::heap::user_closure::UserClosureObj;
use crate::heap::vector::VectorObj;
use crate::value::Value;

/// The fixed per-object header every heap allocation carries, separate from
/// its payload (spec §3's header table, minus `vtable_ptr` — see the module
/// doc comment — and minus `forwarding`, which lives in a side table during
/// major GC per spec §4.4 step 2, and directly on this header only during
/// the copying phase of a minor GC, matching the source's "meaningful only
/// while `forwarded == 1`" invariant).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectHeader {
    age: u8,
    forwarded: bool,
    size: u32,
    kind: Kind,
    forward_to: Option<HeapRef>,
}

impl ObjectHeader {
    pub(crate) fn new(kind: Kind, size: u32) -> Self {
        debug_assert!(size < (1 << 24));
        Self {
            age: 0,
            forwarded: false,
            size,
            kind,
            forward_to: None,
        }
    }

    /// Survival count across minor collections.
    #[must_use]
    pub fn age(&self) -> u8 {
        self.age
    }

    /// Sets the survival count. `a` must be `< 128` (the field is 7 bits
    /// wide in the source layout).
    pub fn set_age(&mut self, a: u8) {
        debug_assert!(a < 128);
        self.age = a;
    }

    /// Total object size in the nominal accounting unit used by arena
    /// capacity planning (see [`crate::consts::NOMINAL_OBJECT_SIZE`]).
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Sets the object's accounted size. `s` must be `< 2^24`.
    pub fn set_size(&mut self, s: u32) {
        debug_assert!(s < (1 << 24));
        self.size = s;
    }

    /// Whether this object has already been forwarded (copied, promoted, or
    /// marked, depending on which collection phase is in progress).
    #[must_use]
    pub fn forwarded(&self) -> bool {
        self.forwarded
    }

    /// The type-tag discriminant.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub(crate) fn set_forwarded(&mut self, forwarded: bool) {
        self.forwarded = forwarded;
    }

    pub(crate) fn forward_to(&self) -> Option<HeapRef> {
        self.forward_to
    }

    pub(crate) fn set_forward_to(&mut self, to: Option<HeapRef>) {
        self.forward_to = to;
    }
}

/// The payload of a heap allocation: exactly one of the ten concrete kinds
/// from spec §3's kind table.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    /// An immutable string.
    String(StringObj),
    /// A boxed IEEE-754 double.
    Float(f64),
    /// A fixed-length, nil-initialized slot array.
    Array(ArrayObj),
    /// A growable array backed by an `Array`.
    Vector(VectorObj),
    /// A separate-chaining link node.
    HashNode(HashNodeObj),
    /// A separate-chaining hash map.
    HashMap(HashMapObj),
    /// A function's code and capture layout.
    Prototype(PrototypeObj),
    /// A prototype paired with its captured values.
    Closure(ClosureObj),
    /// A closure whose body is a host function.
    UserClosure(UserClosureObj),
    /// A chunked operand stack.
    Stack(StackObj),
    /// A single call frame.
    CallInfo(CallInfoObj),
}

impl HeapObject {
    /// The discriminant for this object, matching the kind its allocation
    /// site requested.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::String(_) => Kind::String,
            Self::Float(_) => Kind::Float,
            Self::Array(_) => Kind::Array,
            Self::Vector(_) => Kind::Vector,
            Self::HashNode(_) => Kind::HashNode,
            Self::HashMap(_) => Kind::HashMap,
            Self::Prototype(_) => Kind::Prototype,
            Self::Closure(_) => Kind::Closure,
            Self::UserClosure(_) => Kind::UserClosure,
            Self::Stack(_) => Kind::Stack,
            Self::CallInfo(_) => Kind::CallInfo,
        }
    }

    /// The boxed double, if this is a `Float` object.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Structural equality between two objects of the **same** kind. The
    /// default (for kinds with no natural content equality) is identity,
    /// which the caller establishes by comparing `HeapRef`s before falling
    /// back to this; see [`crate::gc::Arena::equals`].
    #[must_use]
    pub fn content_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.content_eq(b),
            (Self::Float(a), Self::Float(b)) => {
                (a - b).abs() <= consts::FLOAT_EQUALITY_TOLERANCE
            }
            _ => false,
        }
    }

    /// A content hash for kinds that define one (strings); other kinds fall
    /// back to an address-derived hash XOR'd with a fixed seed. Since this
    /// arena addresses objects by region+index rather than raw memory
    /// address, the "address" here is that index pair (documented deviation
    /// in DESIGN.md — behaviorally equivalent, since both are arbitrary but
    /// stable-for-the-object's-lifetime bit patterns).
    #[must_use]
    pub fn address_or_content_hash(&self, here: HeapRef) -> u32 {
        match self {
            Self::String(s) => s.polynomial_hash(),
            _ => (here.index as u32) ^ consts::HASH_SEED,
        }
    }

    /// Invokes `cb` on every heap reference this object owns and writes the
    /// result back in place. This is the unified GC traversal hook used by
    /// copying, promotion, marking, and reference rewriting alike (spec
    /// §4.1's `trace_children`).
    pub fn trace_children(&mut self, cb: &mut dyn FnMut(HeapRef) -> HeapRef) {
        match self {
            Self::String(_) | Self::Float(_) | Self::Prototype(_) | Self::UserClosure(_) => {}
            Self::Array(a) => {
                for slot in a.iter_mut() {
                    if let Value::Heap(r) = *slot {
                        *slot = Value::Heap(cb(r));
                    }
                }
            }
            Self::Vector(v) => {
                v.set_backing(cb(v.backing()));
            }
            Self::HashNode(n) => {
                trace_value(n.key_mut(), cb);
                trace_value(n.value_mut(), cb);
                trace_value(n.next_mut(), cb);
            }
            Self::HashMap(m) => {
                m.set_buckets(cb(m.buckets()));
            }
            Self::Closure(c) => {
                c.set_prototype(cb(c.prototype()));
                for slot in c.captures_mut() {
                    if let Value::Heap(r) = *slot {
                        *slot = Value::Heap(cb(r));
                    }
                }
            }
            Self::Stack(s) => {
                s.set_current_chunk(cb(s.current_chunk()));
                // `top` is a cached copy of a value already reachable
                // through `current_chunk`'s chain; it must still be
                // rewritten independently, or it would dangle after a move
                // (see DESIGN.md).
                trace_value(s.top_mut(), cb);
            }
            Self::CallInfo(f) => {
                f.set_callee(cb(f.callee()));
                if let Some(p) = f.parent() {
                    f.set_parent(Some(cb(p)));
                }
                for slot in f.registers_mut() {
                    if let Value::Heap(r) = *slot {
                        *slot = Value::Heap(cb(r));
                    }
                }
                for slot in f.captures_mut() {
                    if let Value::Heap(r) = *slot {
                        *slot = Value::Heap(cb(r));
                    }
                }
            }
        }
    }
}

fn trace_value(slot: &mut Value, cb: &mut dyn FnMut(HeapRef) -> HeapRef) {
    if let Value::Heap(r) = *slot {
        *slot = Value::Heap(cb(r));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_set_size_preserves_age_and_forwarded() {
        let mut h = ObjectHeader::new(Kind::Array, 10);
        h.set_age(5);
        h.set_forwarded(true);
        h.set_size(200);
        assert_eq!(h.size(), 200);
        assert_eq!(h.age(), 5);
        assert!(h.forwarded());
    }

    #[test]
    fn header_set_age_preserves_forwarded() {
        let mut h = ObjectHeader::new(Kind::String, 1);
        h.set_forwarded(true);
        h.set_age(40);
        assert_eq!(h.age(), 40);
        assert!(h.forwarded());
    }
}
