use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Where the scavenge state lives.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateBackendConfig {
    /// Lost on restart; suitable for tests and one-shot scavenges
    #[default]
    Memory,

    /// Durable state in an embedded sled database
    Sled {
        /// Root directory of the state database
        path: PathBuf,

        /// Page cache size in bytes
        #[serde(default = "default_cache_capacity")]
        cache_capacity: u64,
    },
}

impl StateBackendConfig {
    pub fn validate(&self) -> Result<()> {
        if let StateBackendConfig::Sled {
            path,
            cache_capacity,
        } = self
        {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "state.path must not be empty".into(),
                )));
            }
            if *cache_capacity == 0 {
                return Err(Error::Config(ConfigError::Message(
                    "state.cache_capacity must be greater than 0".into(),
                )));
            }
        }
        Ok(())
    }
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024 //64MB
}
