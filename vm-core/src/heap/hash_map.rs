//! The `HashMap`/`HashNode` heap kinds: separate chaining with resize.
//!
//! Grounded on `original_source/include/nerangake/object/hash_map.h` and
//! `src/object/hash_map.cc`, with two source bugs fixed rather than
//! reproduced (see DESIGN.md):
//!
//! - `GetHashNodeLink` used `hash & capacity` for lookup but `hash %
//!   capacity` for insertion. This implementation uses `hash % capacity`
//!   everywhere (see [`bucket_index`]).
//! - `ValidateKeyType` tested a conjunction of negations that can never
//!   both hold. [`validate_key_type`] uses the corrected predicate: key is
//!   a small-int OR key is a `String` heap object.

use crate::error::Fault;
use crate::gc::Arena;
use crate::heap::kind::HeapRef;
use crate::heap::object::HeapObject;
use crate::value::Value;

/// A separate-chaining link node: one key/value pair plus the next link in
/// its bucket's chain (`Value::Nil` terminates the chain).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashNodeObj {
    key: Value,
    value: Value,
    next: Value,
}

impl HashNodeObj {
    /// Creates a new link node.
    #[must_use]
    pub fn new(key: Value, value: Value, next: Value) -> Self {
        Self { key, value, next }
    }

    /// The node's key.
    #[must_use]
    pub fn key(&self) -> Value {
        self.key
    }

    /// The node's value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.value
    }

    /// The next link (`Value::Nil` if this is the chain's tail).
    #[must_use]
    pub fn next(&self) -> Value {
        self.next
    }

    pub(crate) fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    pub(crate) fn set_next(&mut self, next: Value) {
        self.next = next;
    }

    /// Mutable access to the key, for GC child-tracing.
    pub(crate) fn key_mut(&mut self) -> &mut Value {
        &mut self.key
    }

    /// Mutable access to the value, for GC child-tracing.
    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// Mutable access to the next link, for GC child-tracing.
    pub(crate) fn next_mut(&mut self) -> &mut Value {
        &mut self.next
    }
}

/// A hash map: a bucket-head `Array`, an element count, and a load factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashMapObj {
    buckets: HeapRef,
    len: u32,
    load_factor: f64,
}

impl HashMapObj {
    /// Wraps a freshly allocated, nil-initialized bucket array.
    #[must_use]
    pub fn new(buckets: HeapRef, load_factor: f64) -> Self {
        Self {
            buckets,
            len: 0,
            load_factor,
        }
    }

    /// The backing bucket-head array.
    #[must_use]
    pub fn buckets(&self) -> HeapRef {
        self.buckets
    }

    /// Number of key/value bindings currently stored.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the map holds zero bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Configured load factor.
    #[must_use]
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    pub(crate) fn set_buckets(&mut self, buckets: HeapRef) {
        self.buckets = buckets;
    }

    pub(crate) fn set_len(&mut self, len: u32) {
        self.len = len;
    }
}

/// Corrected key-type predicate (spec §9 Open Question): a map key must be
/// a small-int or a `String` heap object.
pub fn validate_key_type(arena: &Arena, key: Value) -> Result<(), Fault> {
    let ok = match key {
        Value::SmallInt(_) => true,
        Value::Heap(r) => matches!(arena.get(r), HeapObject::String(_)),
        Value::Bool(_) | Value::Nil => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Fault::TypeError("hash map keys must be a small-int or a string"))
    }
}

fn hash_key(arena: &Arena, key: Value) -> Result<u32, Fault> {
    validate_key_type(arena, key)?;
    Ok(match key {
        Value::SmallInt(i) => (i as u32) ^ crate::consts::HASH_SEED,
        Value::Heap(r) => match arena.get(r) {
            HeapObject::String(s) => s.polynomial_hash(),
            _ => unreachable!("validate_key_type rejected non-string heap keys"),
        },
        Value::Bool(_) | Value::Nil => unreachable!("validate_key_type rejected this key"),
    })
}

/// Bucket index for a hash, given the bucket array's capacity. Used for
/// both lookup and insertion (the source used two different operators;
/// see the module doc comment).
#[must_use]
pub fn bucket_index(hash: u32, capacity: usize) -> usize {
    hash as usize % capacity
}

fn capacity(arena: &Arena, map: HeapRef) -> usize {
    let buckets = arena.as_hash_map(map).buckets;
    arena.as_array(buckets).len() as usize
}

fn chain_head(arena: &Arena, map: HeapRef, key: Value) -> Result<Value, Fault> {
    let hash = hash_key(arena, key)?;
    let cap = capacity(arena, map);
    let buckets = arena.as_hash_map(map).buckets;
    Ok(arena.as_array(buckets).get(bucket_index(hash, cap) as u32)?)
}

fn set_chain_head(arena: &mut Arena, map: HeapRef, key: Value, link: Value) -> Result<(), Fault> {
    let hash = hash_key(arena, key)?;
    let cap = capacity(arena, map);
    let buckets = arena.as_hash_map(map).buckets;
    let idx = bucket_index(hash, cap) as u32;
    arena.array_set(buckets, idx, link)
}

/// Creates a new, empty hash map with the default initial capacity and
/// load factor.
pub fn create(arena: &mut Arena) -> Result<HeapRef, Fault> {
    arena.alloc_hash_map()
}

/// Looks up `key`, returning `Value::Nil` if absent.
pub fn find(arena: &Arena, map: HeapRef, key: Value) -> Result<Value, Fault> {
    let mut link = chain_head(arena, map, key)?;
    while let Value::Heap(node_ref) = link {
        let node = arena.as_hash_node(node_ref);
        if key.value_eq(node.key(), arena) {
            return Ok(node.value());
        }
        link = node.next();
    }
    Ok(Value::Nil)
}

/// Sets `key` to `value`, or removes the binding if `value` is
/// `Value::Nil` (per spec §4.7's `SetIndex` semantics for `HashMap`).
pub fn set(arena: &mut Arena, map: HeapRef, key: Value, value: Value) -> Result<(), Fault> {
    if matches!(value, Value::Nil) {
        remove(arena, map, key)
    } else {
        set_without_resize(arena, map, key, value)?;
        maybe_resize(arena, map)
    }
}

fn set_without_resize(
    arena: &mut Arena,
    map: HeapRef,
    key: Value,
    value: Value,
) -> Result<(), Fault> {
    let start = chain_head(arena, map, key)?;
    let mut link = start;
    while let Value::Heap(node_ref) = link {
        let node = arena.as_hash_node(node_ref);
        if key.value_eq(node.key(), arena) {
            arena.as_hash_node_mut(node_ref).set_value(value);
            return Ok(());
        }
        link = node.next();
    }
    let node_ref = arena.alloc_hash_node(key, value, start)?;
    set_chain_head(arena, map, key, Value::Heap(node_ref))?;
    let len = arena.as_hash_map(map).len();
    arena.as_hash_map_mut(map).set_len(len + 1);
    Ok(())
}

/// Removes `key`'s binding, if present.
pub fn remove(arena: &mut Arena, map: HeapRef, key: Value) -> Result<(), Fault> {
    let head = chain_head(arena, map, key)?;
    let Value::Heap(head_ref) = head else {
        return Ok(());
    };
    let head_node = arena.as_hash_node(head_ref);
    if key.value_eq(head_node.key(), arena) {
        set_chain_head(arena, map, key, head_node.next())?;
        decrement_len(arena, map);
        return Ok(());
    }

    let mut prev_ref = head_ref;
    loop {
        let next = arena.as_hash_node(prev_ref).next();
        let Value::Heap(next_ref) = next else {
            return Ok(());
        };
        let next_node = arena.as_hash_node(next_ref);
        if key.value_eq(next_node.key(), arena) {
            let skip_to = next_node.next();
            arena.as_hash_node_mut(prev_ref).set_next(skip_to);
            decrement_len(arena, map);
            return Ok(());
        }
        prev_ref = next_ref;
    }
}

fn decrement_len(arena: &mut Arena, map: HeapRef) {
    let len = arena.as_hash_map(map).len();
    arena.as_hash_map_mut(map).set_len(len.saturating_sub(1));
    // Removal-triggered shrink is best-effort; ignore capacity errors here
    // since removal itself always succeeds.
    let _ = maybe_resize(arena, map);
}

fn maybe_resize(arena: &mut Arena, map: HeapRef) -> Result<(), Fault> {
    let obj = arena.as_hash_map(map);
    let cap = capacity(arena, map);
    let len = obj.len() as usize;
    let load_factor = obj.load_factor();

    if (load_factor * cap as f64) <= len as f64 {
        rehash(arena, map, cap * 2)
    } else if cap > crate::consts::INITIAL_HASHMAP_CAPACITY
        && ((1.0 - load_factor) * cap as f64) > len as f64
    {
        rehash(arena, map, cap / 2)
    } else {
        Ok(())
    }
}

fn rehash(arena: &mut Arena, map: HeapRef, new_capacity: usize) -> Result<(), Fault> {
    let old_buckets = arena.as_hash_map(map).buckets;
    let old_cap = arena.as_array(old_buckets).len();
    let new_buckets = arena.alloc_array(new_capacity as u32)?;
    arena.as_hash_map_mut(map).set_buckets(new_buckets);

    for i in 0..old_cap {
        let mut link = arena.as_array(old_buckets).get(i)?;
        while let Value::Heap(node_ref) = link {
            let node = arena.as_hash_node(node_ref);
            link = node.next();
            let key = node.key();

            let target = chain_head(arena, map, key)?;
            arena.as_hash_node_mut(node_ref).set_next(target);
            set_chain_head(arena, map, key, Value::Heap(node_ref))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    fn arena() -> Arena {
        Arena::new(VmConfig::default().arena_bytes)
    }

    #[test]
    fn set_then_find_round_trips() {
        let mut a = arena();
        let map = create(&mut a).unwrap();
        set(&mut a, map, Value::SmallInt(1), Value::SmallInt(100)).unwrap();
        assert_eq!(find(&a, map, Value::SmallInt(1)).unwrap(), Value::SmallInt(100));
    }

    #[test]
    fn find_on_absent_key_is_nil() {
        let mut a = arena();
        let map = create(&mut a).unwrap();
        assert_eq!(find(&a, map, Value::SmallInt(1)).unwrap(), Value::Nil);
    }

    #[test]
    fn setting_nil_removes_the_binding() {
        let mut a = arena();
        let map = create(&mut a).unwrap();
        set(&mut a, map, Value::SmallInt(1), Value::SmallInt(7)).unwrap();
        set(&mut a, map, Value::SmallInt(1), Value::Nil).unwrap();
        assert_eq!(find(&a, map, Value::SmallInt(1)).unwrap(), Value::Nil);
        assert_eq!(a.as_hash_map(map).len(), 0);
    }

    #[test]
    fn non_string_non_int_key_is_rejected() {
        let mut a = arena();
        let map = create(&mut a).unwrap();
        let err = set(&mut a, map, Value::Bool(true), Value::SmallInt(1)).unwrap_err();
        assert!(matches!(err, Fault::TypeError(_)));
    }

    #[test]
    fn many_distinct_keys_all_round_trip_and_resize() {
        let mut a = arena();
        let map = create(&mut a).unwrap();
        for i in 0..1000i32 {
            let key = Value::Heap(a.alloc_string_static(format!("k{i}")).unwrap());
            set(&mut a, map, key, Value::SmallInt(i)).unwrap();
        }
        assert_eq!(a.as_hash_map(map).len(), 1000);
        for i in 0..1000i32 {
            let key = Value::Heap(a.alloc_string_static(format!("k{i}")).unwrap());
            assert_eq!(find(&a, map, key).unwrap(), Value::SmallInt(i));
        }
    }
}
