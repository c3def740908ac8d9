use std::ops::Range;

use crate::error::GeometryError;
use crate::memory::memory_device::Address;

/// page offset bits of the host, the cache index must cover exactly one page
pub const PAGE_SHIFT: u32 = 12;

/// an address split into its cache coordinates
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct AddressParts {
    /// physical cache line number
    pub line_number: u64,
    pub set_index: usize,
    /// physical page number, used as the tag
    pub tag: u64,
    pub line_offset: usize,
}

/// Validated shape of a cache: size, associativity and line size.
///
/// All three are powers of two and `set_shift + line_shift == PAGE_SHIFT`, so the set index is
/// taken entirely from the page offset.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CacheGeometry {
    total_size: usize,
    num_ways: usize,
    line_size: usize,
    num_entries: usize,
    line_shift: u32,
    set_shift: u32,
}

fn check_pow2(name: &'static str, value: usize) -> Result<(), GeometryError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(GeometryError::NotPowerOfTwo { name, value })
    }
}

impl CacheGeometry {
    pub fn new(
        total_size: usize,
        num_ways: usize,
        line_size: usize,
    ) -> Result<Self, GeometryError> {
        check_pow2("total_size", total_size)?;
        check_pow2("num_ways", num_ways)?;
        check_pow2("line_size", line_size)?;

        let set_bytes = num_ways
            .checked_mul(line_size)
            .filter(|set_bytes| *set_bytes <= total_size)
            .ok_or(GeometryError::TooSmall {
                total_size,
                num_ways,
                line_size,
            })?;
        let num_entries = total_size / set_bytes;
        check_pow2("num_entries", num_entries)?;

        let line_shift = line_size.trailing_zeros();
        let set_shift = num_entries.trailing_zeros();
        if set_shift + line_shift != PAGE_SHIFT {
            return Err(GeometryError::PageMismatch {
                set_shift,
                line_shift,
                page_shift: PAGE_SHIFT,
            });
        }

        Ok(Self {
            total_size,
            num_ways,
            line_size,
            num_entries,
            line_shift,
            set_shift,
        })
    }

    #[inline]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    #[inline]
    pub fn num_ways(&self) -> usize {
        self.num_ways
    }

    #[inline]
    pub fn line_size(&self) -> usize {
        self.line_size
    }

    /// number of sets
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    #[inline]
    pub fn num_lines(&self) -> usize {
        self.num_entries * self.num_ways
    }

    #[inline]
    pub fn line_shift(&self) -> u32 {
        self.line_shift
    }

    #[inline]
    pub fn set_shift(&self) -> u32 {
        self.set_shift
    }

    #[inline]
    pub fn decompose(&self, address: Address) -> AddressParts {
        let line_number = address >> self.line_shift;
        AddressParts {
            line_number,
            set_index: (line_number & (self.num_entries as u64 - 1)) as usize,
            tag: line_number >> self.set_shift,
            line_offset: (address & (self.line_size as u64 - 1)) as usize,
        }
    }

    /// address of the first byte of the line holding `address`
    #[inline]
    pub fn line_base(&self, address: Address) -> Address {
        address & !(self.line_size as u64 - 1)
    }

    /// rebuilds the base address of a line from its tag and set
    #[inline]
    pub fn line_address(&self, tag: u64, set_index: usize) -> Address {
        ((tag << self.set_shift) | set_index as u64) << self.line_shift
    }

    /// a cacheable window must be non empty and start and end on line boundaries
    pub fn check_window(&self, window: &Range<Address>) -> Result<(), GeometryError> {
        let unaligned = |address: Address| address & (self.line_size as u64 - 1) != 0;
        if window.start >= window.end || unaligned(window.start) || unaligned(window.end) {
            return Err(GeometryError::UnalignedWindow {
                start: window.start,
                end: window.end,
                line_size: self.line_size,
            });
        }
        Ok(())
    }
}
