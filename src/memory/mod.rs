pub mod memory_device;
pub mod user_memory;
