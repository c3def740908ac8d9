//! A software managed, physically tagged set associative cache for the emulator's memory path.
//!
//! The cache sits between the load/store layer and a flat backing store and models what a real
//! cache level does with data: hits, fills, LRU replacement, write-through or write-back.

pub mod cache;
pub mod error;
pub mod memory;

pub use cache::cache_line::{CacheLine, CacheState, LineStatus};
pub use cache::config::CacheConfig;
pub use cache::geometry::{AddressParts, CacheGeometry, PAGE_SHIFT};
pub use cache::statistics::CacheStatistics;
pub use cache::tagged_cache::{CacheResponse, TaggedCache, WritePolicy};
pub use error::{CacheError, ConfigError, GeometryError, MemoryFault};
pub use memory::memory_device::{
    Address, BackingStore, MemoryRequest, MemoryRequestType, MemoryWord, SharedMemory, WordSize,
};
pub use memory::user_memory::UserMemory;
