use std::sync::{Arc, RwLock};

use tagged_cache::{CacheConfig, CacheError, LineStatus, TaggedCache, UserMemory, WritePolicy};
use tracing_subscriber::{EnvFilter, fmt};

const RAM_BASE: u64 = 0x20_0000;
const RAM_END: u64 = 0x4000_0000;

/// replays a store/load/evict sequence on one set and checks what comes back
fn run_scenario(cache: &mut TaggedCache<UserMemory>) -> Result<(), CacheError> {
    let line_span = (cache.geometry().num_entries() * cache.geometry().line_size()) as u64;
    let first = 0x2A_BCDE;
    // same set, next tag
    let second = first + line_span;

    let steps: [(&str, u64, Option<u8>); 5] = [
        ("store", first, Some(23)),
        ("load", first, None),
        ("store", second, Some(75)),
        ("load", second, None),
        ("load", first, None),
    ];
    for (name, address, value) in steps {
        let (status, data) = match value {
            Some(value) => (cache.store_word(address, value)?, value),
            None => {
                let data = cache.load_word::<u8>(address)?;
                (cache.last_access().unwrap_or(LineStatus::Empty), data)
            }
        };
        tracing::info!("{} 0x{:X} = {} -> {:?}", name, address, data, status);
    }
    Ok(())
}

fn main() {
    fmt::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    tracing::info!("Initializing tagged cache emulation");

    let config = match std::env::args().nth(1) {
        Some(path) => match CacheConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("{path}: {e}");
                std::process::exit(1);
            }
        },
        None => CacheConfig {
            total_size: 4096,
            num_ways: 1,
            line_size: 1024,
            write_policy: WritePolicy::Through,
            cacheable: None,
        },
    };

    let mut memory = UserMemory::new();
    if let Err(e) = memory.add_ram(RAM_BASE, RAM_END - RAM_BASE) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
    let memory = Arc::new(RwLock::new(memory));

    let mut cache = match config.build(Arc::clone(&memory)) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Cache config: {:?}", config);

    let result = run_scenario(&mut cache).and_then(|_| cache.flush());
    match result {
        Ok(flushed) => tracing::info!("Flushed {} dirty lines", flushed),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
    tracing::info!("{}", cache.statistics());
}
