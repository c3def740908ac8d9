use std::sync::{Arc, RwLock};

use crate::error::MemoryFault;

pub type Address = u64;

/// handle to a backing store that other components (MMU, devices, loaders) can hold as well
pub type SharedMemory<M> = Arc<RwLock<M>>;

/// sizes of the supported words in bytes
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WordSize {
    BYTE = 1,
    HALF = 2,
    WORD = 4,
    DOUBLE = 8,
}

impl WordSize {
    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// mask selecting the meaningful low bytes of a value of this size
    #[inline]
    pub fn mask(self) -> u64 {
        match self {
            WordSize::DOUBLE => u64::MAX,
            size => (1u64 << (size.bytes() * 8)) - 1,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MemoryRequestType {
    READ,
    WRITE,
}

/// request coming from the memory access layer, addresses are already physical
/// for a WRITE, `data` holds the value in its low `data_size` bytes
#[derive(Debug, Clone)]
pub struct MemoryRequest {
    pub request_type: MemoryRequestType,
    pub data_address: Address,
    pub data_size: WordSize,
    pub data: Option<u64>,
}

impl MemoryRequest {
    pub fn read(data_address: Address, data_size: WordSize) -> Self {
        Self {
            request_type: MemoryRequestType::READ,
            data_address,
            data_size,
            data: None,
        }
    }

    pub fn write(data_address: Address, data_size: WordSize, data: u64) -> Self {
        Self {
            request_type: MemoryRequestType::WRITE,
            data_address,
            data_size,
            data: Some(data),
        }
    }
}

/// plain unsigned integers that can travel through the cache as little endian words
pub trait MemoryWord: Copy {
    const SIZE: WordSize;

    fn to_u64(self) -> u64;

    fn from_u64(value: u64) -> Self;
}

macro_rules! impl_memory_word {
    ($($ty:ty => $size:expr),* $(,)?) => {
        $(
            impl MemoryWord for $ty {
                const SIZE: WordSize = $size;

                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn from_u64(value: u64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_memory_word!(
    u8 => WordSize::BYTE,
    u16 => WordSize::HALF,
    u32 => WordSize::WORD,
    u64 => WordSize::DOUBLE,
);

/// The flat physical memory a cache sits in front of.
///
/// Values are little endian: the byte at the lowest address is the least significant one.
/// No alignment is required beyond byte addressability.
pub trait BackingStore {
    fn load(&self, address: Address, size: WordSize) -> Result<u64, MemoryFault>;

    fn store(&mut self, address: Address, size: WordSize, value: u64) -> Result<(), MemoryFault>;

    fn load_word<T: MemoryWord>(&self, address: Address) -> Result<T, MemoryFault>
    where
        Self: Sized,
    {
        self.load(address, T::SIZE).map(T::from_u64)
    }

    fn store_word<T: MemoryWord>(&mut self, address: Address, value: T) -> Result<(), MemoryFault>
    where
        Self: Sized,
    {
        self.store(address, T::SIZE, value.to_u64())
    }
}
