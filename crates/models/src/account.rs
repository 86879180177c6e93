use crate::ValidationResult;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;

// Well-known development account documented by the Azurite project:
// https://github.com/Azure/Azurite#default-storage-account
pub const DEFAULT_ACCOUNT_NAME: &str = "devstoreaccount1";
pub const DEFAULT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Characters that carry structure in `AZURITE_ACCOUNTS` or in a connection string
const RESERVED_CHARS: [char; 3] = [':', ';', '='];

/// Name and shared key of the storage account the emulator accepts
#[derive(Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub name: String,
    pub key: String,
}

impl Default for AccountIdentity {
    fn default() -> Self {
        AccountIdentity {
            name: DEFAULT_ACCOUNT_NAME.to_string(),
            key: DEFAULT_ACCOUNT_KEY.to_string(),
        }
    }
}

impl AccountIdentity {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        AccountIdentity {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Value of the `AZURITE_ACCOUNTS` variable describing this account.
    ///
    /// Neither field is escaped, so a colon in the name or key produces a
    /// value the emulator cannot parse.
    pub fn accounts_env_value(&self) -> String {
        format!("{}:{}", self.name, self.key)
    }

    pub fn credentials(&self) -> StorageCredentials {
        StorageCredentials {
            account_name: self.name.clone(),
            account_key: self.key.clone(),
        }
    }

    /// Check the identity for values that would break the env payload or the
    /// connection string. Starting a container never calls this; the emulator
    /// is the authority on what it accepts.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.name.is_empty() {
            result.add_issue("Account name must not be empty".to_string());
        } else if !self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            result.add_issue(format!(
                "Account name '{}' may only contain lowercase letters and digits",
                self.name
            ));
        }

        if self.key.is_empty() {
            result.add_issue("Account key must not be empty".to_string());
        } else {
            if let Some(c) = self.key.chars().find(|c| RESERVED_CHARS[..2].contains(c)) {
                result.add_issue(format!("Account key contains reserved character '{}'", c));
            }
            if !is_base64(&self.key) {
                result.add_issue("Account key is not valid base64".to_string());
            }
        }

        if let Some(c) = self.name.chars().find(|c| RESERVED_CHARS.contains(c)) {
            result.add_issue(format!("Account name contains reserved character '{}'", c));
        }

        result
    }
}

// Keys stay out of debug output
impl fmt::Debug for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountIdentity")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .finish()
    }
}

// Azurite decodes the key with a strict padded decoder
fn is_base64(value: &str) -> bool {
    BASE64.decode(value).is_ok()
}

/// Shared-key credential for clients that take the account name and key
/// directly instead of parsing a connection string
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub account_name: String,
    pub account_key: String,
}

impl StorageCredentials {
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn account_key(&self) -> &str {
        &self.account_key
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .finish()
    }
}
