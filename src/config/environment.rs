//! Environment configuration file model.
//!
//! One `config.<env>.yaml` per target environment:
//!
//! ```yaml
//! environment:
//!   name: dev
//!   project: my-project
//!   type: dev
//!   selected:
//!     - modules/
//!   disabled_kinds: []
//! variables:
//!   dataset: ds_common
//!   modules:
//!     cdf_common:
//!       dataset: ds_common_dev
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use validator::Validate;

use crate::resources::FolderKind;

/// Parsed `config.<env>.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Target environment settings.
    pub environment: EnvironmentSection,

    /// Variable tree. Root scalars are global; nested mappings follow module
    /// paths.
    #[serde(default)]
    pub variables: Mapping,
}

/// The `environment:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EnvironmentSection {
    /// Environment name. Expected to match the `--env` argument.
    #[validate(length(min = 1))]
    pub name: String,

    /// Platform project to deploy into.
    #[validate(length(min = 1))]
    pub project: String,

    /// Free-text environment type, e.g. `dev` or `prod`.
    #[serde(rename = "type", default = "default_env_type")]
    pub env_type: String,

    /// Module names or path prefixes to build. Empty selects every module.
    #[serde(default)]
    pub selected: Vec<String>,

    /// Resource-folder kinds that are administratively disabled.
    #[serde(default)]
    pub disabled_kinds: Vec<FolderKind>,
}

fn default_env_type() -> String {
    String::from("dev")
}

impl EnvironmentConfig {
    /// File name of the configuration for `env`.
    #[must_use]
    pub fn file_name(env: &str) -> String {
        format!("config.{env}.yaml")
    }

    /// Returns true if `folder` is disabled in this environment.
    #[must_use]
    pub fn is_disabled(&self, folder: FolderKind) -> bool {
        self.environment.disabled_kinds.contains(&folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment_config() {
        let yaml = r"
environment:
  name: dev
  project: acme-dev
  selected: [cdf_common]
  disabled_kinds: [functions]
variables:
  dataset: ds_common
";
        let config: EnvironmentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.environment.project, "acme-dev");
        assert_eq!(config.environment.env_type, "dev");
        assert!(config.is_disabled(FolderKind::Functions));
        assert!(!config.is_disabled(FolderKind::Transformations));
        assert_eq!(config.variables.len(), 1);
    }

    #[test]
    fn test_empty_project_fails_validation() {
        let section = EnvironmentSection {
            name: String::from("dev"),
            project: String::new(),
            env_type: default_env_type(),
            selected: Vec::new(),
            disabled_kinds: Vec::new(),
        };
        let errors = section.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("project"));
    }

    #[test]
    fn test_config_file_name() {
        assert_eq!(EnvironmentConfig::file_name("prod"), "config.prod.yaml");
    }
}
