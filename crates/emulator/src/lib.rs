// emulator crate

pub mod azurite;
pub mod error;


// Re-export public items
pub use azurite::{AzuriteContainer, ACCOUNTS_ENV_VAR};
pub use error::EmulatorError;
pub use models::{
    AccountIdentity, ConnectionString, ServiceEndpoints, ServicePort, StorageCredentials,
};
