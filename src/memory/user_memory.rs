use ahash::AHashMap;

use crate::error::MemoryFault;
use crate::memory::memory_device::{Address, BackingStore, WordSize};

const PAGE_SHIFT: u32 = 12;
const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
const PAGE_MASK: Address = (PAGE_SIZE as Address) - 1;

/// a RAM region mapped at a physical address
/// pages are only allocated once written, so large segments are cheap until touched
#[derive(Debug)]
pub struct MemorySegment {
    /// physical address of the first byte
    pub mpa: Address,
    pub size: u64,
    pages: AHashMap<Address, Box<[u8; PAGE_SIZE]>>,
}

impl MemorySegment {
    fn new(mpa: Address, size: u64) -> Self {
        Self {
            mpa,
            size,
            pages: AHashMap::default(),
        }
    }

    #[inline]
    fn contains(&self, address: Address) -> bool {
        address >= self.mpa && address - self.mpa < self.size
    }

    fn read_byte(&self, address: Address) -> u8 {
        self.pages
            .get(&(address >> PAGE_SHIFT))
            .map_or(0, |page| page[(address & PAGE_MASK) as usize])
    }

    fn write_byte(&mut self, address: Address, value: u8) {
        let page = self
            .pages
            .entry(address >> PAGE_SHIFT)
            .or_insert_with(|| Box::new([0u8; PAGE_SIZE]));
        page[(address & PAGE_MASK) as usize] = value;
    }
}

/// Segment based, byte addressable memory of a user process.
///
/// Every byte of an access must fall inside a segment, otherwise the access faults
/// and nothing is written.
#[derive(Debug, Default)]
pub struct UserMemory {
    segments: Vec<MemorySegment>,
}

impl UserMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ram(&mut self, mpa: Address, size: u64) -> Result<(), MemoryFault> {
        let end = mpa.saturating_add(size);
        let overlaps = self
            .segments
            .iter()
            .any(|segment| mpa < segment.mpa + segment.size && segment.mpa < end);
        if size == 0 || overlaps {
            return Err(MemoryFault::Overlap { base: mpa, size });
        }
        tracing::debug!("Mapped RAM segment 0x{:X}..0x{:X}", mpa, end);
        self.segments.push(MemorySegment::new(mpa, size));
        Ok(())
    }

    pub fn clear_segments(&mut self) {
        self.segments.clear();
    }

    pub fn segments(&self) -> &[MemorySegment] {
        &self.segments
    }

    fn segment_index(&self, address: Address) -> Result<usize, MemoryFault> {
        self.segments
            .iter()
            .position(|segment| segment.contains(address))
            .ok_or(MemoryFault::Unmapped { address })
    }
}

impl BackingStore for UserMemory {
    fn load(&self, address: Address, size: WordSize) -> Result<u64, MemoryFault> {
        let mut value = 0u64;
        for i in 0..size.bytes() {
            let byte_address = address.wrapping_add(i as Address);
            let segment = &self.segments[self.segment_index(byte_address)?];
            value |= (segment.read_byte(byte_address) as u64) << (i * 8);
        }
        Ok(value)
    }

    fn store(&mut self, address: Address, size: WordSize, value: u64) -> Result<(), MemoryFault> {
        // resolve all bytes first so a faulting store leaves memory untouched
        let mut targets = [0usize; 8];
        for (i, target) in targets.iter_mut().enumerate().take(size.bytes()) {
            *target = self.segment_index(address.wrapping_add(i as Address))?;
        }
        for (i, segment) in targets.iter().enumerate().take(size.bytes()) {
            let byte = (value >> (i * 8)) as u8;
            self.segments[*segment].write_byte(address.wrapping_add(i as Address), byte);
        }
        Ok(())
    }
}
