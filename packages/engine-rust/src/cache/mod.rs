//! Cache implementations for the [`Cache`](conflux_core::Cache) capability.

pub mod memory;

pub use memory::MemoryCache;
