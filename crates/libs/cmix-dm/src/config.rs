use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::capability::{RouterCapabilities, SchemaGeneration};
use crate::error::ConfigError;

/// Router settings, usually the `[router]` table of a client config file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    #[serde(default)]
    pub generation: SchemaGeneration,
}

impl RouterConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml(&contents)
    }

    pub fn capabilities(&self) -> RouterCapabilities {
        RouterCapabilities::for_generation(self.generation)
    }
}
