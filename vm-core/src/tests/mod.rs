//! End-to-end interpreter scenarios (spec §8): hand-assembled bytecode run
//! through the full `VMState`/`interpreter::dispatch` path, rather than
//! exercising `value`/`heap`/`gc` in isolation the way their own
//! `#[cfg(test)]` modules do.

use mote_asm::{Instruction, Opcode};

use crate::config::VmConfig;
use crate::state::VMState;
use crate::value::Value;

fn assemble(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().flat_map(|i| i.encode()).collect()
}

#[test]
fn constant_load_and_halt() {
    let code = assemble(&[
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 0,
            bx: 0,
        },
        Instruction::None { op: Opcode::Halt },
    ]);
    let mut state = VMState::new(code.into(), VmConfig::default());
    state.push_int_constant(42);

    let scene = state.new_scene().unwrap();
    state.execute(scene).unwrap();

    assert_eq!(state.register(scene, 0), Value::SmallInt(42));
}

#[test]
fn arithmetic_add() {
    let code = assemble(&[
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 0,
            bx: 0,
        },
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 1,
            bx: 1,
        },
        Instruction::Abc {
            op: Opcode::Add,
            a: 2,
            b: 0,
            c: 1,
        },
        Instruction::None { op: Opcode::Halt },
    ]);
    let mut state = VMState::new(code.into(), VmConfig::default());
    state.push_int_constant(5);
    state.push_int_constant(7);

    let scene = state.new_scene().unwrap();
    state.execute(scene).unwrap();

    assert_eq!(state.register(scene, 2), Value::SmallInt(12));
}

/// Mirrors spec §8's worked `Blt` example exactly: on the taken branch the
/// baseline `pc + 1` fallthrough plus the signed offset land three
/// instructions ahead, skipping the `99` assignment in favor of `7`.
#[test]
fn conditional_branch_takes_the_lesser_path() {
    let code = assemble(&[
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 0,
            bx: 0,
        }, // 0: r0 = 1
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 1,
            bx: 1,
        }, // 1: r1 = 2
        Instruction::Abc {
            op: Opcode::Blt,
            a: 0,
            b: 1,
            c: 2,
        }, // 2: if r0 < r1, pc += 1 + 2
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 2,
            bx: 2,
        }, // 3: r2 = 99
        Instruction::None { op: Opcode::Halt }, // 4
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 2,
            bx: 3,
        }, // 5: r2 = 7
        Instruction::None { op: Opcode::Halt }, // 6
    ]);
    let mut state = VMState::new(code.into(), VmConfig::default());
    state.push_int_constant(1);
    state.push_int_constant(2);
    state.push_int_constant(99);
    state.push_int_constant(7);

    let scene = state.new_scene().unwrap();
    state.execute(scene).unwrap();

    assert_eq!(state.register(scene, 2), Value::SmallInt(7));
}

#[test]
fn call_and_return() {
    // The callee prototype: r0 = 7, then returns [r0, r1) to the caller.
    let callee_code = assemble(&[
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 0,
            bx: 0,
        },
        Instruction::Abc {
            op: Opcode::Return,
            a: 0,
            b: 1,
            c: 0,
        },
    ]);
    // The entry prototype: load the callee closure from globals, push it
    // (no arguments), call with a one-register return window, halt.
    let entry_code = assemble(&[
        Instruction::Abx {
            op: Opcode::LoadGlobal,
            a: 0,
            bx: 0,
        },
        Instruction::Abc {
            op: Opcode::Push,
            a: 0,
            b: 0,
            c: 0,
        },
        Instruction::Abc {
            op: Opcode::Call,
            a: 1,
            b: 2,
            c: 0,
        },
        Instruction::None { op: Opcode::Halt },
    ]);

    let mut state = VMState::new(entry_code.into(), VmConfig::default());
    state.push_int_constant(7);
    let proto = state.push_prototype(false, 0, Box::new([]), callee_code.into()).unwrap();
    let closure_index = state.push_closure(proto, Box::new([])).unwrap();
    let closure_value = state.closure_value(closure_index);
    state.push_global(closure_value);

    let scene = state.new_scene().unwrap();
    state.execute(scene).unwrap();

    assert_eq!(state.register(scene, 1), Value::SmallInt(7));
}

#[test]
fn hash_map_set_and_index_round_trip_through_bytecode() {
    let code = assemble(&[
        Instruction::A {
            op: Opcode::NewHash,
            a: 0,
        }, // r0 = {}
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 1,
            bx: 0,
        }, // r1 = key
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 2,
            bx: 1,
        }, // r2 = value
        Instruction::Abc {
            op: Opcode::SetIndex,
            a: 0,
            b: 1,
            c: 2,
        }, // r0[r1] = r2
        Instruction::Abc {
            op: Opcode::Index,
            a: 3,
            b: 0,
            c: 1,
        }, // r3 = r0[r1]
        Instruction::None { op: Opcode::Halt },
    ]);
    let mut state = VMState::new(code.into(), VmConfig::default());
    state.push_int_constant(9);
    state.push_int_constant(555);

    let scene = state.new_scene().unwrap();
    state.execute(scene).unwrap();

    assert_eq!(state.register(scene, 3), Value::SmallInt(555));
}

/// Loops `NewArray` 10,000 times, forcing many minor collections over an
/// arena far smaller than the naive total allocation volume would need if
/// nothing were ever collected. The loop counter lives in a register for
/// the whole run, so it must survive every collection unscathed.
#[test]
fn gc_survives_ten_thousand_short_lived_vectors() {
    let code = assemble(&[
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 0,
            bx: 0,
        }, // 0: r0 = 0 (counter)
        Instruction::Abx {
            op: Opcode::MoveI,
            a: 2,
            bx: 1,
        }, // 1: r2 = 10000 (limit)
        Instruction::A {
            op: Opcode::NewArray,
            a: 1,
        }, // 2: r1 = new Vector (garbage, loop head)
        Instruction::Abc {
            op: Opcode::Inc,
            a: 0,
            b: 0,
            c: 0,
        }, // 3: r0 += 1
        Instruction::Abc {
            op: Opcode::Blt,
            a: 0,
            b: 2,
            c: (-3i8) as u8,
        }, // 4: if r0 < r2, pc = 4 + 1 - 3 = 2
        Instruction::None { op: Opcode::Halt }, // 5
    ]);
    let mut state = VMState::new(
        code.into(),
        VmConfig {
            arena_bytes: 256 * 1024,
            ..VmConfig::default()
        },
    );
    state.push_int_constant(0);
    state.push_int_constant(10_000);

    let scene = state.new_scene().unwrap();
    state.execute(scene).unwrap();

    assert_eq!(state.register(scene, 0), Value::SmallInt(10_000));
}

/// A major collection run twice in a row with no intervening mutation
/// changes nothing the second time (spec §9's idempotence property).
#[test]
fn full_gc_is_idempotent_once_quiescent() {
    let code = assemble(&[Instruction::None { op: Opcode::Halt }]);
    let mut state = VMState::new(code.into(), VmConfig::default());
    let scene = state.new_scene().unwrap();
    state.execute(scene).unwrap();

    state.full_gc();
    let (eden_after_first, old_after_first) = (state.arena().eden_len(), state.arena().old_len());
    state.full_gc();
    let (eden_after_second, old_after_second) = (state.arena().eden_len(), state.arena().old_len());

    assert_eq!(eden_after_first, eden_after_second);
    assert_eq!(old_after_first, old_after_second);
}
