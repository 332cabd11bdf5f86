// src/config/mod.rs

//! Configuration for the `workdag` runner.
//!
//! - `model.rs`: TOML-backed data model and conversion to [`EngineConfig`].
//! - `loader.rs`: read a config file from disk.
//! - `validate.rs`: reject malformed task graphs and compute the submission
//!   order.
//!
//! [`EngineConfig`]: crate::engine::EngineConfig

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, EngineSection, RawConfigFile, TaskConfig};
