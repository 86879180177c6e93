use crate::account::{AccountIdentity, DEFAULT_ACCOUNT_KEY, DEFAULT_ACCOUNT_NAME};
use crate::ValidationResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_IMAGE: &str = "mcr.microsoft.com/azure-storage/azurite";
pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Settings for an emulator container, as read from a YAML file.
///
/// Every field is optional in the file; missing fields take the defaults of
/// a zero-configuration Azurite container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmulatorConfig {
    /// Storage account name announced to the emulator
    pub account_name: String,

    /// Base64 shared key paired with `account_name`
    pub account_key: String,

    /// Image repository, without tag
    pub image: String,

    pub tag: String,

    /// Keep all data in memory instead of on the container filesystem
    pub in_memory_persistence: bool,

    /// Ignore unsupported headers and parameters
    pub loose: bool,

    /// Accept requests from SDKs newer than the emulator
    pub skip_api_version_check: bool,

    /// Seconds to wait for every service to report it is listening
    pub startup_timeout_secs: u64,

    /// debug, info, warning or error. Ignored when -v or -d is passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            account_name: DEFAULT_ACCOUNT_NAME.to_string(),
            account_key: DEFAULT_ACCOUNT_KEY.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            tag: DEFAULT_TAG.to_string(),
            in_memory_persistence: false,
            loose: false,
            skip_api_version_check: false,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            log_level: None,
        }
    }
}

impl EmulatorConfig {
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, path)
    }

    pub fn identity(&self) -> AccountIdentity {
        AccountIdentity::new(self.account_name.clone(), self.account_key.clone())
    }

    /// `repository:tag` reference handed to the container runtime
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = self.identity().validate();

        if self.image.trim().is_empty() {
            result.add_issue("Image must not be empty".to_string());
        }
        if self.tag.trim().is_empty() {
            result.add_issue("Image tag must not be empty".to_string());
        }
        if self.startup_timeout_secs == 0 {
            result.add_issue("startup_timeout_secs must be greater than zero".to_string());
        }
        if let Some(level) = &self.log_level {
            if !matches!(
                level.to_ascii_lowercase().as_str(),
                "debug" | "info" | "warning" | "warn" | "error"
            ) {
                result.add_issue(format!("Unknown log level '{}'", level));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EmulatorConfig::from_yaml_str("account_name: custom\n", Path::new("inline"))
            .expect("config should parse");

        assert_eq!(config.account_name, "custom");
        assert_eq!(config.account_key, DEFAULT_ACCOUNT_KEY);
        assert_eq!(
            config.image_reference(),
            "mcr.microsoft.com/azure-storage/azurite:latest"
        );
        assert_eq!(config.startup_timeout_secs, DEFAULT_STARTUP_TIMEOUT_SECS);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = EmulatorConfig::from_yaml_str("acount_name: typo\n", Path::new("inline"))
            .expect_err("typo should not parse");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "account_name: custom\naccount_key: Y2JkZQ==\ntag: \"3.29.0\"\nloose: true"
        )
        .unwrap();

        let config = EmulatorConfig::load(file.path()).unwrap();
        assert_eq!(config.identity(), AccountIdentity::new("custom", "Y2JkZQ=="));
        assert_eq!(config.tag, "3.29.0");
        assert!(config.loose);
        assert!(config.validate().is_valid);
    }

    #[test]
    fn load_missing_file_is_an_io_error() {
        let err = EmulatorConfig::load(Path::new("/nonexistent/azurite-kit.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn validate_flags_bad_values() {
        let config = EmulatorConfig {
            account_name: "a:b".to_string(),
            startup_timeout_secs: 0,
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        let result = config.validate();
        assert!(!result.is_valid);
        assert!(result.issues.iter().any(|i| i.contains("reserved character ':'")));
        assert!(result.issues.iter().any(|i| i.contains("startup_timeout_secs")));
        assert!(result.issues.iter().any(|i| i.contains("loud")));
    }
}
