//! The bytecode dispatch loop: fetch, decode, execute, repeat.
//!
//! Grounded on fuel-vm's `interpreter/executors/instruction.rs`: a
//! single entry point drives one frame-chain to completion, delegating
//! per-instruction work to a big match over the decoded opcode (here,
//! [`dispatch::step`]) rather than a separate handler struct per opcode.

mod alu;
mod dispatch;

use crate::error::Fault;
use crate::scene::SceneId;
use crate::state::VMState;

/// Runs `scene`'s call-frame chain until it halts (`Opcode::Halt`, or the
/// outermost frame returning) or a fault interrupts it.
#[tracing::instrument(skip(state), fields(scene = scene.0))]
pub fn dispatch(state: &mut VMState, scene: SceneId) -> Result<(), Fault> {
    loop {
        state.maybe_collect();
        if !dispatch::step(state, scene)? {
            return Ok(());
        }
    }
}
