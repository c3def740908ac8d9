pub mod cache_line;
pub mod config;
pub mod geometry;
pub mod statistics;
pub mod tagged_cache;
