//! Remote store implementations

mod memory;

pub use memory::MemoryRemoteStore;
