//! Concrete [`ResourceStore`](crate::traits::ResourceStore) implementations.

pub mod memory;

pub use memory::MemoryResourceStore;
