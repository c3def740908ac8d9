use thiserror::Error;

use crate::memory::memory_device::Address;

/// faults raised by a backing store, the cache forwards them untouched
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryFault {
    #[error("address 0x{address:X} is not mapped to any memory segment")]
    Unmapped { address: Address },

    #[error("segment 0x{base:X}+0x{size:X} overlaps an existing segment")]
    Overlap { base: Address, size: u64 },

    #[error("backing store lock was poisoned")]
    Poisoned,
}

/// geometry violations are detected when the cache is built and prevent its creation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("{name} must be a non-zero power of two, got {value}")]
    NotPowerOfTwo { name: &'static str, value: usize },

    #[error("total size {total_size} cannot hold a single set of {num_ways} x {line_size} bytes")]
    TooSmall {
        total_size: usize,
        num_ways: usize,
        line_size: usize,
    },

    #[error("set bits ({set_shift}) + line bits ({line_shift}) must equal the page shift ({page_shift})")]
    PageMismatch {
        set_shift: u32,
        line_shift: u32,
        page_shift: u32,
    },

    #[error("cacheable window 0x{start:X}..0x{end:X} is empty or not aligned to {line_size} byte lines")]
    UnalignedWindow {
        start: Address,
        end: Address,
        line_size: usize,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read cache config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache config is not valid json: {0}")]
    Parse(#[from] json::Error),

    #[error("cache config field `{0}` has an invalid value")]
    InvalidField(&'static str),

    #[error("unknown write policy `{0}`, expected \"through\" or \"back\"")]
    UnknownWritePolicy(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("backing store fault: {0}")]
    Fault(#[from] MemoryFault),

    #[error("invalid cache geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// a full set without any replacement candidate, the set structure is corrupted
    #[error("set {set_index} has neither an empty nor an evictable line")]
    NoEvictableLine { set_index: usize },

    #[error("store request to 0x{address:X} carries no data")]
    MissingStoreData { address: Address },
}
