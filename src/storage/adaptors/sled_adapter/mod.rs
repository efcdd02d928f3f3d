mod sled_scavenge_map;
mod sled_state_backend;

pub use sled_scavenge_map::*;
pub use sled_state_backend::*;

#[cfg(test)]
mod sled_state_backend_test;

use std::path::Path;

use tracing::debug;
use tracing::warn;

use crate::Result;

#[doc(hidden)]
pub fn init_sled_scavenge_state_db(
    sled_db_root_path: impl AsRef<Path> + std::fmt::Debug,
    cache_capacity: u64,
) -> Result<sled::Db> {
    debug!(
        "init_sled_scavenge_state_db from path: {:?}",
        &sled_db_root_path
    );

    let path = sled_db_root_path.as_ref();
    let state_db_path = path.join("scavenge_state");

    sled::Config::default()
        .path(&state_db_path)
        .cache_capacity(cache_capacity)
        .flush_every_ms(Some(100))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                state_db_path, e
            );
            e.into()
        })
}
