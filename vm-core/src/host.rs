//! The host-callable interface: how a `UserClosure` hands control to an
//! embedder-supplied Rust function (spec §6/§7).

use crate::error::Fault;
use crate::gc::Arena;
use crate::scene::VMScene;

/// A registered host function.
///
/// Invoked synchronously from `Call`'s dispatch with the arena, the scene,
/// the caller's return-window bounds, and the declared argument count. It
/// reads its arguments from the scene (by the same operand-stack convention
/// bytecode calls use) and writes up to `end - begin` results into the
/// caller's register window; the core treats it as opaque. The arena
/// parameter is required since essentially every `VMScene` accessor needs
/// one — a host function that only touched `VMScene` in isolation could
/// never read or write a single value.
pub type HostFn = dyn Fn(&mut VMScene, &mut Arena, u8, u8, u8) -> Result<(), Fault> + Send + Sync;

/// A named table of registered host functions, indexed by the `u32` handle
/// `VMState::register_user_closure` hands back to the loader.
#[derive(Default)]
pub struct HostTable {
    names: Vec<Box<str>>,
    functions: Vec<Box<HostFn>>,
}

impl HostTable {
    /// Registers `f` under `name`, returning its stable table index.
    pub fn register(&mut self, name: &str, f: Box<HostFn>) -> u32 {
        let index = self.functions.len() as u32;
        self.names.push(name.into());
        self.functions.push(f);
        index
    }

    /// The function registered at `index`, if any.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&HostFn> {
        self.functions.get(index as usize).map(AsRef::as_ref)
    }

    /// The name a function was registered under.
    #[must_use]
    pub fn name_of(&self, index: u32) -> Option<&str> {
        self.names.get(index as usize).map(AsRef::as_ref)
    }

    /// The stable index a function was registered under, looked up by its
    /// registration name (spec §6: "returning a stable index retrievable by
    /// name").
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.names.iter().position(|n| n.as_ref() == name).map(|i| i as u32)
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for HostTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostTable")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_returns_insertion_order_index() {
        let mut table = HostTable::default();
        let a = table.register("a", Box::new(|_scene, _arena, _begin, _end, _n| Ok(())));
        let b = table.register("b", Box::new(|_scene, _arena, _begin, _end, _n| Ok(())));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(table.name_of(1), Some("b"));
    }

    #[test]
    fn unregistered_index_returns_none() {
        let table = HostTable::default();
        assert!(table.get(0).is_none());
    }

    #[test]
    fn index_of_recovers_a_registered_names_index() {
        let mut table = HostTable::default();
        table.register("a", Box::new(|_scene, _arena, _begin, _end, _n| Ok(())));
        let b = table.register("b", Box::new(|_scene, _arena, _begin, _end, _n| Ok(())));
        assert_eq!(table.index_of("b"), Some(b));
        assert_eq!(table.index_of("missing"), None);
    }
}
