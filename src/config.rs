//! Configuration loading via `ortho-config`.

use std::collections::BTreeMap;
use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::ec2::{ClientSettings, SubscriptionParameters};
use crate::snapshot::SnapshotSettings;

/// AWS configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "VMSNAP",
    discovery(
        app_name = "vmsnap",
        env_var = "VMSNAP_CONFIG_PATH",
        config_file_name = "vmsnap.toml",
        dotfile_name = ".vmsnap.toml",
        project_file_name = "vmsnap.toml"
    )
)]
pub struct AwsConfig {
    /// Access key identifier used to sign requests.
    pub access_key_id: String,
    /// Secret access key used to derive signing keys.
    pub secret_access_key: String,
    /// Region used for every call. Defaults to `eu-west-1`.
    #[ortho_config(default = "eu-west-1".to_owned())]
    pub default_region: String,
    /// Instance snapshotted and powered by the CLI.
    pub instance_id: Option<String>,
    /// Subscription the CLI acts for. Defaults to `0`.
    #[ortho_config(default = 0)]
    pub subscription_id: u32,
    /// Prefix of the subscription and audit tag keys.
    #[ortho_config(default = "vmsnap:".to_owned())]
    pub tag_prefix: String,
    /// First segment of created image names.
    #[ortho_config(default = "vmsnap-snapshot".to_owned())]
    pub image_name_prefix: String,
    /// Compute API version.
    #[ortho_config(default = "2016-11-15".to_owned())]
    pub api_version: String,
    /// Base URL replacing the regional endpoint, for proxies and tests.
    pub endpoint: Option<String>,
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

impl AwsConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to vmsnap.toml",
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

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("vmsnap")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks the fields every provider call needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// and TOML key to set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.access_key_id,
            &FieldMetadata::new(
                "AWS access key ID",
                "VMSNAP_ACCESS_KEY_ID",
                "access_key_id",
            ),
        )?;
        Self::require_field(
            &self.secret_access_key,
            &FieldMetadata::new(
                "AWS secret access key",
                "VMSNAP_SECRET_ACCESS_KEY",
                "secret_access_key",
            ),
        )?;
        Self::require_field(
            &self.default_region,
            &FieldMetadata::new("AWS region", "VMSNAP_DEFAULT_REGION", "default_region"),
        )?;
        Self::require_field(
            &self.api_version,
            &FieldMetadata::new("EC2 API version", "VMSNAP_API_VERSION", "api_version"),
        )?;
        Ok(())
    }

    /// Returns the configured instance identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no instance is configured.
    pub fn require_instance(&self) -> Result<&str, ConfigError> {
        let instance_id = self.instance_id.as_deref().unwrap_or_default();
        Self::require_field(
            instance_id,
            &FieldMetadata::new("instance ID", "VMSNAP_INSTANCE_ID", "instance_id"),
        )?;
        Ok(instance_id.trim())
    }

    /// Builds the parameter table serving the configured subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_parameters(&self) -> Result<BTreeMap<u32, SubscriptionParameters>, ConfigError> {
        self.validate()?;
        let parameters = SubscriptionParameters {
            access_key_id: self.access_key_id.trim().to_owned(),
            secret_access_key: self.secret_access_key.trim().to_owned(),
            region: Some(self.default_region.trim().to_owned()),
            instance_id: self
                .instance_id
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_owned(),
        };
        Ok(BTreeMap::from([(self.subscription_id, parameters)]))
    }

    /// Client settings derived from the region, API version and endpoint.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            default_region: self.default_region.trim().to_owned(),
            api_version: self.api_version.trim().to_owned(),
            endpoint: self
                .endpoint
                .as_deref()
                .map(str::trim)
                .filter(|endpoint| !endpoint.is_empty())
                .map(str::to_owned),
        }
    }

    /// Naming settings for created images.
    #[must_use]
    pub fn snapshot_settings(&self) -> SnapshotSettings {
        SnapshotSettings {
            tag_prefix: self.tag_prefix.clone(),
            name_prefix: self.image_name_prefix.clone(),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> AwsConfig {
        AwsConfig {
            access_key_id: String::from("AKIDEXAMPLE"),
            secret_access_key: String::from("secret"),
            default_region: String::from("eu-west-1"),
            instance_id: Some(String::from(" i-0abc ")),
            subscription_id: 4,
            tag_prefix: String::from("vmsnap:"),
            image_name_prefix: String::from("vmsnap-snapshot"),
            api_version: String::from("2016-11-15"),
            endpoint: None,
        }
    }

    #[rstest]
    fn parameters_serve_configured_subscription(config: AwsConfig) {
        let parameters = config
            .as_parameters()
            .unwrap_or_else(|err| panic!("parameters: {err}"));

        let served = parameters.get(&4).unwrap_or_else(|| panic!("subscription 4"));
        assert_eq!(served.instance_id, "i-0abc");
        assert_eq!(served.region.as_deref(), Some("eu-west-1"));
        assert!(!parameters.contains_key(&0));
    }

    #[rstest]
    fn missing_instance_is_reported(config: AwsConfig) {
        let cfg = AwsConfig {
            instance_id: None,
            ..config
        };

        let error = cfg.require_instance().expect_err("instance is required");
        assert!(error.to_string().contains("VMSNAP_INSTANCE_ID"), "{error}");
    }

    #[rstest]
    #[case::unset(None, None)]
    #[case::blank(Some("  "), None)]
    #[case::set(Some(" http://127.0.0.1:9000 "), Some("http://127.0.0.1:9000"))]
    fn client_settings_trim_endpoint(
        config: AwsConfig,
        #[case] endpoint: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let cfg = AwsConfig {
            endpoint: endpoint.map(str::to_owned),
            ..config
        };

        assert_eq!(cfg.client_settings().endpoint.as_deref(), expected);
    }

    #[rstest]
    fn snapshot_settings_follow_prefixes(config: AwsConfig) {
        let cfg = AwsConfig {
            tag_prefix: String::from("acme:"),
            image_name_prefix: String::from("acme"),
            ..config
        };

        let settings = cfg.snapshot_settings();
        assert_eq!(settings.tag_prefix, "acme:");
        assert_eq!(settings.name_prefix, "acme");
    }
}
