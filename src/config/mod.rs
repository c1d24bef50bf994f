//! Configuration model for pullguard.
//!
//! This module defines the Config struct read from a YAML file
//! (`pullguard.yaml` by default). It supports forward-compatible YAML parsing
//! (unknown fields are ignored), defaults for every field, and validation of
//! the values the lock coordinator depends on.

mod model;
mod operations;
mod types;

#[cfg(test)]
mod tests;

pub use model::Config;
pub use operations::DEFAULT_CONFIG_FILE;
