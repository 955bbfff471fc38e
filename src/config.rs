//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// OpenStack credentials and endpoint selection derived from environment
/// variables, configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OS")]
pub struct OpenStackConfig {
    /// Name of the cloud profile these credentials belong to. Endpoints
    /// select it through their `OSCloud` parameter.
    #[ortho_config(default = "openstack".to_owned())]
    pub cloud: String,
    /// Keystone v3 URL (for example `https://keystone.example.org:5000/v3`).
    pub auth_url: String,
    /// User name for password authentication.
    pub username: String,
    /// Password for password authentication.
    pub password: String,
    /// Project to scope the token to.
    pub project_name: String,
    /// Domain of the user. Defaults to `Default`.
    #[ortho_config(default = "Default".to_owned())]
    pub user_domain_name: String,
    /// Domain of the project. Defaults to `Default`.
    #[ortho_config(default = "Default".to_owned())]
    pub project_domain_name: String,
    /// Region used to pick catalog endpoints. Any region matches when unset.
    pub region_name: Option<String>,
    /// Catalog interface to use. Defaults to `public`.
    #[ortho_config(default = "public".to_owned())]
    pub interface: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl OpenStackConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [openstack] in nimbus.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("nimbus")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (
                &self.cloud,
                FieldMetadata::new("cloud profile name", "OS_CLOUD", "cloud"),
            ),
            (
                &self.auth_url,
                FieldMetadata::new("Keystone URL", "OS_AUTH_URL", "auth_url"),
            ),
            (
                &self.username,
                FieldMetadata::new("OpenStack user name", "OS_USERNAME", "username"),
            ),
            (
                &self.password,
                FieldMetadata::new("OpenStack password", "OS_PASSWORD", "password"),
            ),
            (
                &self.project_name,
                FieldMetadata::new("OpenStack project", "OS_PROJECT_NAME", "project_name"),
            ),
            (
                &self.user_domain_name,
                FieldMetadata::new("user domain", "OS_USER_DOMAIN_NAME", "user_domain_name"),
            ),
            (
                &self.project_domain_name,
                FieldMetadata::new(
                    "project domain",
                    "OS_PROJECT_DOMAIN_NAME",
                    "project_domain_name",
                ),
            ),
            (
                &self.interface,
                FieldMetadata::new("catalog interface", "OS_INTERFACE", "interface"),
            ),
        ];
        for (value, metadata) in &required {
            Self::require_field(value, metadata)?;
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
