use std::ops::Range;

/// Coherence state of a line.
///
/// A single cache has no peers, so only Modified (dirty), Shared (clean) and Invalid (empty)
/// are ever used. Owned and Exclusive are kept for a multi-cache model.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CacheState {
    /// only copy, modified
    Modified,
    /// several copies, modify permission
    Owned,
    /// only copy, unmodified
    Exclusive,
    /// several copies, no modify permission
    Shared,
    /// not valid, must be fetched
    Invalid,
}

/// Classification of a line for one access.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LineStatus {
    /// line is empty and not being used
    Empty,
    /// line holds the page we're looking for
    Hit,
    /// line must be evicted to make room for another
    MustEvict,
    /// line holds data but does not need to be evicted
    Filled,
    /// address lies outside the cacheable window and went straight to memory
    Uncached,
}

/// One way of one set. Lines are created empty with the cache and re-tagged on every refill.
#[derive(Debug, Clone)]
pub struct CacheLine {
    /// physical page number held by the line, None while empty
    pub(crate) tag: Option<u64>,
    /// physical cache line number of the resident data
    pub(crate) line_number: u64,
    pub(crate) state: CacheState,
    /// smaller means more recently used within the set
    pub(crate) lru_counter: u64,
    /// slice of the cache data arena owned by this line
    pub(crate) data: Range<usize>,
}

impl CacheLine {
    pub(crate) fn new(data: Range<usize>) -> Self {
        Self {
            tag: None,
            line_number: 0,
            state: CacheState::Invalid,
            lru_counter: 0,
            data,
        }
    }

    #[inline]
    pub fn tag(&self) -> Option<u64> {
        self.tag
    }

    /// same as the tag, the set index is taken entirely from the page offset
    #[inline]
    pub fn physical_page_number(&self) -> Option<u64> {
        self.tag
    }

    #[inline]
    pub fn line_number(&self) -> Option<u64> {
        self.tag.map(|_| self.line_number)
    }

    #[inline]
    pub fn state(&self) -> CacheState {
        self.state
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.state == CacheState::Modified
    }

    #[inline]
    pub fn lru_counter(&self) -> u64 {
        self.lru_counter
    }

    /// persistent status, either Empty or Filled
    /// the Hit/MustEvict classification only exists as a lookup result
    #[inline]
    pub fn status(&self) -> LineStatus {
        if self.tag.is_some() {
            LineStatus::Filled
        } else {
            LineStatus::Empty
        }
    }

    #[inline]
    pub fn data_range(&self) -> Range<usize> {
        self.data.clone()
    }

    pub(crate) fn retag(&mut self, line_number: u64, tag: u64) {
        self.line_number = line_number;
        self.tag = Some(tag);
        self.state = CacheState::Shared;
    }

    pub(crate) fn invalidate(&mut self) {
        self.tag = None;
        self.line_number = 0;
        self.state = CacheState::Invalid;
    }
}
