//! Storage engines.
//!
//! Three backends realize the same five-operation contract (insert, fetch,
//! modify, delete, existence check) so identical traffic can be replayed
//! against each structure:
//!
//! - `array`: linear scan over a fixed slot table with hole reuse
//! - `tree`: red/black tree ordered by key bytes
//! - `hash`: fixed-slot chained table behind a mutex

mod array;
mod hash;
mod tree;

pub use array::ArrayStore;
pub use hash::HashStore;
pub use tree::TreeStore;

/// The engine set threaded through the command executor.
///
/// Owned by the dispatcher and handed to handlers explicitly, so the
/// process-wide state stays visible and testable.
#[derive(Debug)]
pub struct Stores {
    pub array: ArrayStore,
    pub tree: TreeStore,
    pub hash: HashStore,
}

impl Stores {
    pub fn new() -> Self {
        Stores {
            array: ArrayStore::new(),
            tree: TreeStore::new(),
            hash: HashStore::new(),
        }
    }
}
