//! Fast-access token store implementations.

mod memory;

pub use memory::MemoryTokenStore;
