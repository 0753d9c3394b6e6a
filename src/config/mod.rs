// src/config/mod.rs

//! Configuration loading for autoprd.
//!
//! - `model.rs`: the TOML-backed data model and the read-only
//!   [`ConfigSnapshot`] handed to the plan builder.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: structural checks applied when converting
//!   [`RawConfig`] into a [`ConfigSnapshot`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigSnapshot, ExecutorSection, FlagsSection, PhasesSection, RawConfig, RunnerSection,
    TimingsSection,
};
