//! Configuration management for the scavenging engine.
//!
//! Provides layered configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Config file given by the caller
//! 3. Config file named by `SCAVENGE_CONFIG_PATH`
//! 4. Environment variables (highest priority)

mod scavenge;
mod state_backend;
pub use scavenge::*;
pub use state_backend::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;

use crate::Result;

impl ScavengeConfig {
    /// Load and validate the configuration.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a TOML file overriding the defaults
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        if let Ok(path) = env::var("SCAVENGE_CONFIG_PATH") {
            config = config.add_source(File::with_name(&path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("SCAVENGE")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: ScavengeConfig = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
