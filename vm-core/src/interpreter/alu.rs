//! Register-to-register glue between the dispatch loop and
//! [`crate::value::Value`]'s arithmetic/comparison API: reads the two
//! operand registers, runs the op (retrying once through a full GC on
//! `Fault::OutOfMemory` for ops that may box a float), writes the result.

use crate::error::Fault;
use crate::gc::Arena;
use crate::scene::SceneId;
use crate::state::VMState;
use crate::value::Value;

/// `r[a] = op(r[b], r[c])`, via [`VMState::alloc_with_retry`] since
/// arithmetic that overflows a small-int boxes a `Float`.
pub(super) fn binary_arith(
    state: &mut VMState,
    scene: SceneId,
    a: u8,
    b: u8,
    c: u8,
    op: impl Fn(Value, Value, &mut Arena) -> Result<Value, Fault>,
) -> Result<(), Fault> {
    let lhs = state.register(scene, b);
    let rhs = state.register(scene, c);
    let result = state.alloc_with_retry(|arena| op(lhs, rhs, arena))?;
    state.set_register(scene, a, result);
    Ok(())
}

/// `r[a] = op(r[b])`, for the boxed-float-producing unary ops (`Inc`/`Dec`).
pub(super) fn unary_arith(
    state: &mut VMState,
    scene: SceneId,
    a: u8,
    b: u8,
    op: impl Fn(Value, &mut Arena) -> Result<Value, Fault>,
) -> Result<(), Fault> {
    let operand = state.register(scene, b);
    let result = state.alloc_with_retry(|arena| op(operand, arena))?;
    state.set_register(scene, a, result);
    Ok(())
}

/// `r[a] = op(r[b], r[c])` for a fallible comparison, no allocation.
pub(super) fn compare(
    state: &mut VMState,
    scene: SceneId,
    a: u8,
    b: u8,
    c: u8,
    op: impl Fn(Value, Value, &Arena) -> Result<bool, Fault>,
) -> Result<(), Fault> {
    let lhs = state.register(scene, b);
    let rhs = state.register(scene, c);
    let result = op(lhs, rhs, state.arena())?;
    state.set_register(scene, a, Value::Bool(result));
    Ok(())
}

/// The boolean outcome of a relational test, for branch opcodes that
/// consult it without writing to a register.
pub(super) fn test(
    state: &VMState,
    scene: SceneId,
    a: u8,
    b: u8,
    op: impl Fn(Value, Value, &Arena) -> Result<bool, Fault>,
) -> Result<bool, Fault> {
    let lhs = state.register(scene, a);
    let rhs = state.register(scene, b);
    op(lhs, rhs, state.arena())
}
