//! Configuration loading with `.env` support and environment overrides.

use crate::error::{ConfigError, ModkitError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

use super::environment::EnvironmentConfig;

/// Overrides `environment.project`.
pub const ENV_PROJECT: &str = "MODKIT_PROJECT";
/// Overrides the platform base URL.
pub const ENV_BASE_URL: &str = "MODKIT_BASE_URL";
/// Bearer token for the platform API.
pub const ENV_TOKEN: &str = "MODKIT_TOKEN";
/// Prefix of environment variables that supply global build variables.
pub const ENV_VAR_PREFIX: &str = "MODKIT_VAR_";

/// Default platform base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.cognitedata.com";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default retry count for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Loader for environment configuration files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory holding `config.<env>.yaml` and `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory configuration files are resolved against.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    fn resolve(&self, file_name: &str) -> PathBuf {
        self.base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(file_name), |p| p.join(file_name))
    }

    /// Loads `config.<env>.yaml` after `.env`, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparsable or invalid.
    pub fn load_environment(&self, env: &str) -> Result<EnvironmentConfig> {
        self.load_dotenv()?;
        let mut config = self.load_file(self.resolve(&EnvironmentConfig::file_name(env)))?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Loads and validates configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<EnvironmentConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ModkitError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ModkitError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses and validates configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a required field is empty.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<EnvironmentConfig> {
        debug!("Parsing environment configuration");

        let config: EnvironmentConfig = serde_yaml::from_str(content).map_err(|e| {
            ModkitError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        config.environment.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|k| format!("environment.{k}"))
                .collect();
            fields.sort();
            let field = fields.into_iter().next().unwrap_or_default();
            ModkitError::Config(ConfigError::validation(errors.to_string(), field))
        })?;

        debug!("Parsed configuration for project: {}", config.environment.project);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut EnvironmentConfig) {
        if let Ok(project) = std::env::var(ENV_PROJECT) {
            debug!("Overriding environment.project from environment");
            config.environment.project = project;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self.resolve(".env");

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ModkitError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Collects `MODKIT_VAR_<NAME>` variables as lowercased global variable names.
#[must_use]
pub fn variable_overrides() -> BTreeMap<String, String> {
    variable_overrides_from(std::env::vars())
}

fn variable_overrides_from(
    vars: impl IntoIterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(ENV_VAR_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_lowercase(), value))
        })
        .collect()
}

/// Connection settings for the platform API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSettings {
    /// API base URL.
    pub base_url: String,
    /// Project name.
    pub project: String,
    /// Bearer token, if configured.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retries for transient failures.
    pub max_retries: u32,
}

impl PlatformSettings {
    /// Builds settings for `project` from the process environment.
    #[must_use]
    pub fn from_env(project: impl Into<String>) -> Self {
        Self {
            base_url: std::env::var(ENV_BASE_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            project: project.into(),
            token: std::env::var(ENV_TOKEN).ok().filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Returns the bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured.
    pub fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or_else(|| {
            ModkitError::Config(ConfigError::MissingEnvVar {
                name: ENV_TOKEN.to_string(),
            })
        })
    }
}
