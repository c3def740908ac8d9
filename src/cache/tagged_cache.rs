use std::ops::Range;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use crate::cache::cache_line::{CacheLine, CacheState, LineStatus};
use crate::cache::geometry::CacheGeometry;
use crate::cache::statistics::CacheStatistics;
use crate::error::{CacheError, MemoryFault};
use crate::memory::memory_device::{
    Address, BackingStore, MemoryRequest, MemoryRequestType, MemoryWord, SharedMemory, WordSize,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WritePolicy {
    /// stores reach the backing store immediately
    Through,
    /// stores stay in the cache until the line is evicted
    Back,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CacheResponse {
    /// loaded value, or the stored value for a write, in the low bytes
    pub data: u64,
    /// classification of the line holding the first byte
    pub status: LineStatus,
}

/// part of an access that falls inside a single line
#[derive(Debug, Clone, Copy)]
struct Segment {
    address: Address,
    /// position of the first byte inside the value
    shift: usize,
    len: usize,
}

fn read_lock<M>(memory: &SharedMemory<M>) -> Result<RwLockReadGuard<'_, M>, MemoryFault> {
    memory.read().map_err(|_| MemoryFault::Poisoned)
}

fn write_lock<M>(memory: &SharedMemory<M>) -> Result<RwLockWriteGuard<'_, M>, MemoryFault> {
    memory.write().map_err(|_| MemoryFault::Poisoned)
}

/// Physically tagged, set associative cache in front of a backing store.
///
/// Lines live in `lines` at `set_index * num_ways + way`, each owning a fixed `line_size` slice
/// of the `data` arena. The caller translates addresses and serializes accesses,
/// the cache does no locking of its own besides borrowing the backing store for each transfer.
pub struct TaggedCache<M: BackingStore> {
    memory: SharedMemory<M>,
    geometry: CacheGeometry,
    write_policy: WritePolicy,
    /// lines outside this range bypass the cache
    cacheable: Option<Range<Address>>,
    lines: Box<[CacheLine]>,
    data: Box<[u8]>,
    statistics: CacheStatistics,
    last_access: Option<LineStatus>,
}

impl<M: BackingStore> TaggedCache<M> {
    pub fn new(
        memory: SharedMemory<M>,
        geometry: CacheGeometry,
        write_policy: WritePolicy,
    ) -> Self {
        let line_size = geometry.line_size();
        let lines = (0..geometry.num_lines())
            .map(|i| CacheLine::new(i * line_size..(i + 1) * line_size))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        tracing::debug!(
            "Created {:?} cache: {} bytes, {} ways, {} sets of {} byte lines",
            write_policy,
            geometry.total_size(),
            geometry.num_ways(),
            geometry.num_entries(),
            line_size
        );

        Self {
            memory,
            geometry,
            write_policy,
            cacheable: None,
            lines,
            data: vec![0u8; geometry.total_size()].into_boxed_slice(),
            statistics: CacheStatistics::default(),
            last_access: None,
        }
    }

    /// restrict caching to `window`, accesses outside of it go straight to the backing store
    pub fn with_cacheable_window(mut self, window: Range<Address>) -> Result<Self, CacheError> {
        self.geometry.check_window(&window)?;
        self.cacheable = Some(window);
        Ok(self)
    }

    pub fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    pub fn cacheable_window(&self) -> Option<&Range<Address>> {
        self.cacheable.as_ref()
    }

    pub fn statistics(&self) -> &CacheStatistics {
        &self.statistics
    }

    /// classification of the most recent access
    pub fn last_access(&self) -> Option<LineStatus> {
        self.last_access
    }

    pub fn memory(&self) -> &SharedMemory<M> {
        &self.memory
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    /// all ways of the set `address` maps to
    pub fn set_lines(&self, address: Address) -> &[CacheLine] {
        let set_index = self.geometry.decompose(address).set_index;
        let num_ways = self.geometry.num_ways();
        &self.lines[set_index * num_ways..(set_index + 1) * num_ways]
    }

    /// the line currently holding `address`, if any
    pub fn resident_line(&self, address: Address) -> Option<&CacheLine> {
        self.resident_index(address).map(|index| &self.lines[index])
    }

    pub fn line_data(&self, line: &CacheLine) -> &[u8] {
        &self.data[line.data_range()]
    }

    #[inline]
    pub fn is_cacheable(&self, address: Address) -> bool {
        self.cacheable
            .as_ref()
            .is_none_or(|window| window.contains(&address))
    }

    fn resident_index(&self, address: Address) -> Option<usize> {
        let parts = self.geometry.decompose(address);
        let first = parts.set_index * self.geometry.num_ways();
        (first..first + self.geometry.num_ways())
            .find(|&index| self.lines[index].tag == Some(parts.tag))
    }

    /// Classifies `address` against its set without touching anything.
    ///
    /// Returns the matching line as Hit, else the first empty way as Empty, else the way with the
    /// largest LRU counter (the last one among equals) as MustEvict.
    pub fn lookup(&self, address: Address) -> Result<(usize, LineStatus), CacheError> {
        let parts = self.geometry.decompose(address);
        let first = parts.set_index * self.geometry.num_ways();
        let mut empty_line = None;
        let mut line_to_evict: Option<usize> = None;

        for index in first..first + self.geometry.num_ways() {
            let line = &self.lines[index];
            match line.tag {
                Some(tag) if tag == parts.tag => return Ok((index, LineStatus::Hit)),
                None => {
                    if empty_line.is_none() {
                        empty_line = Some(index);
                    }
                }
                Some(_) => {
                    if line_to_evict
                        .is_none_or(|victim| line.lru_counter >= self.lines[victim].lru_counter)
                    {
                        line_to_evict = Some(index);
                    }
                }
            }
        }

        if let Some(index) = empty_line {
            Ok((index, LineStatus::Empty))
        } else if let Some(index) = line_to_evict {
            Ok((index, LineStatus::MustEvict))
        } else {
            tracing::error!("Set {} has no empty or evictable line", parts.set_index);
            Err(CacheError::NoEvictableLine {
                set_index: parts.set_index,
            })
        }
    }

    /// the serviced line becomes the most recent one, every other way of the set ages
    fn update_lru_counters(&mut self, index: usize) {
        let num_ways = self.geometry.num_ways();
        let first = index - index % num_ways;
        for i in first..first + num_ways {
            if i == index {
                self.lines[i].lru_counter = 0;
            } else {
                self.lines[i].lru_counter = self.lines[i].lru_counter.saturating_add(1);
            }
        }
    }

    /// writes a dirty line back to memory at the address of its current tag
    fn write_back(&mut self, index: usize) -> Result<(), CacheError> {
        let line = &self.lines[index];
        let Some(tag) = line.tag else {
            return Ok(());
        };
        let base = self.geometry.line_address(tag, index / self.geometry.num_ways());
        {
            let mut memory = write_lock(&self.memory)?;
            for (offset, byte) in self.data[line.data.clone()].iter().enumerate() {
                memory.store(base + offset as Address, WordSize::BYTE, *byte as u64)?;
            }
        }
        tracing::debug!("Wrote back dirty line 0x{:X}", base);
        self.lines[index].state = CacheState::Shared;
        self.statistics.writeback_count += 1;
        Ok(())
    }

    /// loads the whole line holding `address` from memory into way `index`
    /// a failed fill leaves the way empty
    fn fill(&mut self, index: usize, address: Address) -> Result<(), CacheError> {
        let parts = self.geometry.decompose(address);
        let base = self.geometry.line_base(address);
        let range = self.lines[index].data.clone();
        let result = read_lock(&self.memory).and_then(|memory| {
            for (offset, byte) in self.data[range].iter_mut().enumerate() {
                *byte = memory.load(base + offset as Address, WordSize::BYTE)? as u8;
            }
            Ok(())
        });
        if let Err(fault) = result {
            self.lines[index].invalidate();
            return Err(fault.into());
        }
        self.lines[index].retag(parts.line_number, parts.tag);
        Ok(())
    }

    /// makes the line holding `address` resident and most recently used
    fn service(&mut self, address: Address) -> Result<(usize, LineStatus), CacheError> {
        let (index, status) = self.lookup(address)?;
        match status {
            LineStatus::Hit => {}
            LineStatus::MustEvict => {
                if self.write_policy == WritePolicy::Back && self.lines[index].is_dirty() {
                    self.write_back(index)?;
                }
                tracing::debug!(
                    "Evicting line 0x{:X} for 0x{:X}",
                    self.lines[index].line_number << self.geometry.line_shift(),
                    address
                );
                self.statistics.evicted_count += 1;
                self.fill(index, address)?;
            }
            LineStatus::Empty => {
                tracing::debug!("Filling empty line for 0x{:X}", address);
                self.fill(index, address)?;
            }
            LineStatus::Filled | LineStatus::Uncached => {
                unreachable!("lookup only classifies lines as Hit, Empty or MustEvict")
            }
        }
        self.update_lru_counters(index);
        Ok((index, status))
    }

    /// splits an access at the line boundary it crosses, if any
    fn segments(&self, address: Address, size: WordSize) -> ([Segment; 2], usize) {
        let offset = self.geometry.decompose(address).line_offset;
        let first_len = size.bytes().min(self.geometry.line_size() - offset);
        let first = Segment {
            address,
            shift: 0,
            len: first_len,
        };
        let second = Segment {
            address: address.wrapping_add(first_len as Address),
            shift: first_len,
            len: size.bytes() - first_len,
        };
        ([first, second], if second.len > 0 { 2 } else { 1 })
    }

    /// Services a single load or store.
    ///
    /// Every line the value touches is made resident before any byte moves, then bytes are
    /// assembled or deposited in address order, least significant byte first.
    /// Hit and miss are counted once per access from the line holding the first byte, a value
    /// spilling into a line that had to be filled still counts as a hit when the first line hit.
    pub fn access(&mut self, request: MemoryRequest) -> Result<CacheResponse, CacheError> {
        let address = request.data_address;
        let size = request.data_size;
        let value = match request.request_type {
            MemoryRequestType::READ => {
                self.statistics.load_count += 1;
                None
            }
            MemoryRequestType::WRITE => {
                let data = request
                    .data
                    .ok_or(CacheError::MissingStoreData { address })?;
                self.statistics.store_count += 1;
                Some(data & size.mask())
            }
        };

        let result = self.access_segments(address, size, value);
        match &result {
            Ok(response) => {
                self.last_access = Some(response.status);
                tracing::trace!(
                    "{:?} 0x{:X} ({:?}) -> {:?} 0x{:X}",
                    request.request_type,
                    address,
                    size,
                    response.status,
                    response.data
                );
            }
            Err(e) => tracing::warn!("{:?} 0x{:X} aborted: {}", request.request_type, address, e),
        }
        result
    }

    fn access_segments(
        &mut self,
        address: Address,
        size: WordSize,
        value: Option<u64>,
    ) -> Result<CacheResponse, CacheError> {
        let (segments, count) = self.segments(address, size);
        let segments = &segments[..count];

        let mut status = LineStatus::Uncached;
        for (i, segment) in segments.iter().enumerate() {
            if !self.is_cacheable(segment.address) {
                continue;
            }
            let (_, line_status) = self.service(segment.address)?;
            if i == 0 {
                status = line_status;
                if line_status == LineStatus::Hit {
                    self.statistics.hit_count += 1;
                } else {
                    self.statistics.miss_count += 1;
                }
            }
        }

        let mut data = value.unwrap_or(0);
        for segment in segments {
            if self.is_cacheable(segment.address) {
                // a single way set can lose the first line while the second one is serviced
                let index = match self.resident_index(segment.address) {
                    Some(index) => index,
                    None => self.service(segment.address)?.0,
                };
                let offset = self.geometry.decompose(segment.address).line_offset;
                let start = self.lines[index].data.start + offset;
                let bytes = start..start + segment.len;
                match value {
                    Some(value) => {
                        for (i, byte) in self.data[bytes.clone()].iter_mut().enumerate() {
                            *byte = (value >> ((segment.shift + i) * 8)) as u8;
                        }
                        match self.write_policy {
                            WritePolicy::Through => {
                                let mut memory = write_lock(&self.memory)?;
                                for (i, byte) in self.data[bytes].iter().enumerate() {
                                    memory.store(
                                        segment.address + i as Address,
                                        WordSize::BYTE,
                                        *byte as u64,
                                    )?;
                                }
                            }
                            WritePolicy::Back => self.lines[index].state = CacheState::Modified,
                        }
                    }
                    None => {
                        for (i, byte) in self.data[bytes].iter().enumerate() {
                            data |= (*byte as u64) << ((segment.shift + i) * 8);
                        }
                    }
                }
            } else {
                match value {
                    Some(value) => {
                        let mut memory = write_lock(&self.memory)?;
                        for i in 0..segment.len {
                            let byte = (value >> ((segment.shift + i) * 8)) & 0xFF;
                            memory.store(segment.address + i as Address, WordSize::BYTE, byte)?;
                        }
                    }
                    None => {
                        let memory = read_lock(&self.memory)?;
                        for i in 0..segment.len {
                            let byte = memory.load(segment.address + i as Address, WordSize::BYTE)?;
                            data |= (byte & 0xFF) << ((segment.shift + i) * 8);
                        }
                    }
                }
            }
        }

        Ok(CacheResponse { data, status })
    }

    pub fn load_word<T: MemoryWord>(&mut self, address: Address) -> Result<T, CacheError> {
        self.access(MemoryRequest::read(address, T::SIZE))
            .map(|response| T::from_u64(response.data))
    }

    pub fn store_word<T: MemoryWord>(
        &mut self,
        address: Address,
        value: T,
    ) -> Result<LineStatus, CacheError> {
        self.access(MemoryRequest::write(address, T::SIZE, value.to_u64()))
            .map(|response| response.status)
    }

    /// writes every dirty line back, lines stay resident and become clean
    pub fn flush(&mut self) -> Result<usize, CacheError> {
        let mut flushed = 0;
        for index in 0..self.lines.len() {
            if self.lines[index].is_dirty() {
                self.write_back(index)?;
                flushed += 1;
            }
        }
        if flushed > 0 {
            tracing::debug!("Flushed {} dirty lines", flushed);
        }
        Ok(flushed)
    }
}
