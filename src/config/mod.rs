//! Configuration module for modkit.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and validating `config.<env>.yaml`
//! - Loading `.env` and applying `MODKIT_*` environment overrides
//! - Platform connection settings

mod environment;
mod parser;

pub use environment::{EnvironmentConfig, EnvironmentSection};
pub use parser::{
    variable_overrides, ConfigParser, PlatformSettings, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES,
    DEFAULT_TIMEOUT_SECS, ENV_BASE_URL, ENV_PROJECT, ENV_TOKEN, ENV_VAR_PREFIX,
};
