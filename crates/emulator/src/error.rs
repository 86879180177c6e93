use runtime::container::ContainerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmulatorError {
    /// The runtime could not launch the container or it never became ready
    #[error("Emulator failed to start: {0}")]
    StartupFailure(#[source] ContainerError),

    /// No running container to resolve ports against
    #[error("Emulator is not running: {0}")]
    NotRunning(String),

    #[error("Invalid emulator configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Emulator is already running as {0}")]
    AlreadyStarted(String),

    /// A port lookup failed for a reason other than the container being gone
    #[error("Container runtime error: {0}")]
    Runtime(#[source] ContainerError),
}

impl EmulatorError {
    pub(crate) fn from_port_lookup(err: ContainerError) -> Self {
        match err {
            ContainerError::NotRunning(msg) => EmulatorError::NotRunning(msg),
            other => EmulatorError::Runtime(other),
        }
    }
}
