// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigSnapshot, RawConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the `RawConfig`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to get
/// a [`ConfigSnapshot`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and turn it into a read-only snapshot.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigSnapshot> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigSnapshot::try_from(raw_config)?;
    Ok(config)
}

/// `autoprd.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("autoprd.toml")
}
