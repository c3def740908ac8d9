use std::ops::Range;
use std::path::Path;

use json::JsonValue;

use crate::cache::geometry::CacheGeometry;
use crate::cache::tagged_cache::{TaggedCache, WritePolicy};
use crate::error::{CacheError, ConfigError};
use crate::memory::memory_device::{Address, BackingStore, SharedMemory};

/// Per instance cache configuration, fixed once the cache is built.
///
/// Read from json such as:
/// ```json
/// { "total_size": 4096, "num_ways": 1, "line_size": "0x400",
///   "write_policy": "through", "cacheable": { "base": "0x20000", "size": "0x3FFE0000" } }
/// ```
/// Missing keys keep their default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub total_size: usize,
    pub num_ways: usize,
    pub line_size: usize,
    pub write_policy: WritePolicy,
    pub cacheable: Option<Range<Address>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            total_size: 32 * 1024,
            num_ways: 8,
            line_size: 64,
            write_policy: WritePolicy::Back,
            cacheable: None,
        }
    }
}

/// accepts plain json numbers as well as "0x" prefixed hex strings
fn parse_number(value: &JsonValue, field: &'static str) -> Result<Option<u64>, ConfigError> {
    if value.is_null() {
        return Ok(None);
    }
    let number = match value.as_str() {
        Some(text) => match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => text.parse().ok(),
        },
        None => value.as_u64(),
    };
    number.map(Some).ok_or(ConfigError::InvalidField(field))
}

fn parse_size(value: &JsonValue, field: &'static str) -> Result<Option<usize>, ConfigError> {
    parse_number(value, field)?
        .map(|number| usize::try_from(number).map_err(|_| ConfigError::InvalidField(field)))
        .transpose()
}

impl CacheConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let root = json::parse(text)?;
        if !root.is_object() {
            return Err(ConfigError::InvalidField("root"));
        }
        let mut config = Self::default();

        if let Some(total_size) = parse_size(&root["total_size"], "total_size")? {
            config.total_size = total_size;
        }
        if let Some(num_ways) = parse_size(&root["num_ways"], "num_ways")? {
            config.num_ways = num_ways;
        }
        if let Some(line_size) = parse_size(&root["line_size"], "line_size")? {
            config.line_size = line_size;
        }

        let policy = &root["write_policy"];
        if !policy.is_null() {
            let name = policy
                .as_str()
                .ok_or(ConfigError::InvalidField("write_policy"))?;
            config.write_policy = match name.to_ascii_lowercase().as_str() {
                "through" | "write_through" => WritePolicy::Through,
                "back" | "write_back" => WritePolicy::Back,
                _ => return Err(ConfigError::UnknownWritePolicy(name.to_string())),
            };
        }

        let window = &root["cacheable"];
        if !window.is_null() {
            let base = parse_number(&window["base"], "cacheable.base")?
                .ok_or(ConfigError::InvalidField("cacheable.base"))?;
            let size = parse_number(&window["size"], "cacheable.size")?
                .ok_or(ConfigError::InvalidField("cacheable.size"))?;
            let end = base
                .checked_add(size)
                .ok_or(ConfigError::InvalidField("cacheable.size"))?;
            config.cacheable = Some(base..end);
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn geometry(&self) -> Result<CacheGeometry, CacheError> {
        Ok(CacheGeometry::new(self.total_size, self.num_ways, self.line_size)?)
    }

    pub fn build<M: BackingStore>(
        &self,
        memory: SharedMemory<M>,
    ) -> Result<TaggedCache<M>, CacheError> {
        let cache = TaggedCache::new(memory, self.geometry()?, self.write_policy);
        match &self.cacheable {
            Some(window) => cache.with_cacheable_window(window.clone()),
            None => Ok(cache),
        }
    }
}
