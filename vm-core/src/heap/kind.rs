//! The type-tag discriminant and reference type used throughout the heap.

/// Discriminant identifying the concrete heap object kind, replacing the
/// source's per-object `vtable_ptr`: dispatch is a `match` on this tag in
/// `heap::object`, not an indirect call through a stored function-pointer
/// table (spec §9: "Method tables become per-kind dispatch tables stored
/// once, keyed by type tag, not embedded per object").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Immutable byte string.
    String,
    /// Boxed IEEE-754 double.
    Float,
    /// Fixed-length, nil-initialized slot vector.
    Array,
    /// Growable array backed by an `Array`.
    Vector,
    /// Separate-chaining link node inside a `HashMap`'s bucket.
    HashNode,
    /// Separate-chaining hash map.
    HashMap,
    /// Compile-time description of a function (code + capture layout).
    Prototype,
    /// Runtime pairing of a `Prototype` with its captured values.
    Closure,
    /// A closure whose body is a host (Rust) function.
    UserClosure,
    /// Chunked operand stack.
    Stack,
    /// A single call frame.
    CallInfo,
}

/// Which arena region a [`HeapRef`] points into.
///
/// The survivor semispaces are physically fixed (`SurvivorA`/`SurvivorB`);
/// which one currently plays "from" versus "to" is tracked separately by
/// the [`crate::gc::Arena`] and flips every minor collection, the safe-Rust
/// analogue of swapping the source's `from_`/`to_` pointers (spec §9:
/// "region membership becomes an index-range test" — here, a discriminant
/// plus a `Vec` index instead of a raw address range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// The young generation; all fresh `Heap`-flavored allocations land here.
    Eden,
    /// Survivor semispace A.
    SurvivorA,
    /// Survivor semispace B.
    SurvivorB,
    /// The tenured region, managed by mark-compact.
    Old,
}

/// A typed index into the arena: the safe-Rust replacement for a raw heap
/// pointer (spec §9: "represents references as typed indices").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef {
    /// The region this reference points into.
    pub region: Region,
    /// Index within that region's backing `Vec`.
    pub index: usize,
}
