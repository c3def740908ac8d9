use std::fmt::Display;

/// running counters of a cache, never reset by the cache itself
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatistics {
    /// one per access, decided by the line holding the first byte of the value
    pub hit_count: u64,
    pub miss_count: u64,
    pub load_count: u64,
    pub store_count: u64,
    pub evicted_count: u64,
    /// dirty lines written back to memory
    pub writeback_count: u64,
}

impl CacheStatistics {
    /// None until the first cached access
    pub fn hit_rate(&self) -> Option<f64> {
        let accesses = self.hit_count + self.miss_count;
        if accesses == 0 {
            None
        } else {
            Some(self.hit_count as f64 / accesses as f64)
        }
    }
}

impl Display for CacheStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loads={} stores={} hits={} misses={} evictions={} writebacks={}",
            self.load_count,
            self.store_count,
            self.hit_count,
            self.miss_count,
            self.evicted_count,
            self.writeback_count
        )?;
        match self.hit_rate() {
            Some(rate) => write!(f, " hit_rate={:.2}%", rate * 100.0),
            None => write!(f, " hit_rate=n/a"),
        }
    }
}
