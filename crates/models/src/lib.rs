// models crate

pub mod account;
pub mod config;
pub mod connection;
pub mod ports;

pub use account::{AccountIdentity, StorageCredentials, DEFAULT_ACCOUNT_KEY, DEFAULT_ACCOUNT_NAME};
pub use config::{
    ConfigError, EmulatorConfig, DEFAULT_IMAGE, DEFAULT_STARTUP_TIMEOUT_SECS, DEFAULT_TAG,
};
pub use connection::{ConnectionString, ServiceEndpoints, EMULATOR_HOST};
pub use ports::{ServicePort, BLOB_PORT, QUEUE_PORT, TABLE_PORT};

pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult {
            is_valid: true,
            issues: Vec::new(),
        }
    }

    pub fn add_issue(&mut self, issue: String) {
        self.is_valid = false;
        self.issues.push(issue);
    }
}
