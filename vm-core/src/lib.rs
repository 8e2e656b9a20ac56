//! `mote-vm`: the value kernel, managed heap, generational garbage
//! collector, and bytecode interpreter for a small register-based dynamic
//! language.
//!
//! A [`state::VMState`] owns a bytecode buffer, its constant pools, and a
//! list of independent [`scene::VMScene`] execution contexts;
//! [`state::VMState::execute`] drives one scene through
//! [`interpreter::dispatch`] until it halts or raises a [`error::Fault`].

pub mod config;
pub mod consts;
pub mod error;
pub mod gc;
pub mod heap;
pub mod host;
pub mod interpreter;
pub mod scene;
pub mod state;
pub mod value;

pub use config::VmConfig;
pub use error::Fault;
pub use gc::Arena;
pub use heap::HeapRef;
pub use host::{HostFn, HostTable};
pub use scene::{SceneId, VMScene};
pub use state::VMState;
pub use value::Value;

#[cfg(test)]
mod tests;
