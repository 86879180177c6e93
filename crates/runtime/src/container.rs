use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Something that can run an OCI image with injected environment and
/// published ports.
///
/// `start` only returns once the runtime considers the container ready.
/// Callers own the returned handle and are responsible for calling `stop`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn start(&self, request: &ContainerRequest) -> Result<ContainerHandle, ContainerError>;

    /// Host port the given container port is published on
    async fn mapped_port(
        &self,
        handle: &ContainerHandle,
        container_port: u16,
    ) -> Result<u16, ContainerError>;

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError>;
}

/// Launch parameters for a single container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    /// Full `repository:tag` reference
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub exposed_ports: BTreeSet<u16>,
    /// Replaces the image's default command when set
    pub cmd: Option<Vec<String>>,
    /// Log lines that must all appear before the container counts as ready
    pub ready_messages: Vec<String>,
    pub startup_timeout: Duration,
}

impl ContainerRequest {
    pub fn new(image: impl Into<String>) -> Self {
        ContainerRequest {
            image: image.into(),
            env: BTreeMap::new(),
            exposed_ports: BTreeSet::new(),
            cmd: None,
            ready_messages: Vec::new(),
            startup_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_exposed_port(mut self, port: u16) -> Self {
        self.exposed_ports.insert(port);
        self
    }

    pub fn with_cmd(mut self, cmd: Vec<String>) -> Self {
        self.cmd = Some(cmd);
        self
    }

    pub fn with_ready_message(mut self, message: impl Into<String>) -> Self {
        self.ready_messages.push(message.into());
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

/// Reference to a container started by a [`ContainerRuntime`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    id: String,
    name: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        ContainerHandle {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub enum ContainerError {
    ConnectionFailed(String),
    ImagePullFailed(String),
    ContainerCreateFailed(String),
    ContainerStartFailed(String),
    StartupTimeout(String),
    NotRunning(String),
    PortResolutionFailed(String),
    ContainerStopFailed(String),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::ConnectionFailed(msg) => {
                write!(f, "Failed to connect to container runtime: {}", msg)
            }
            ContainerError::ImagePullFailed(msg) => write!(f, "Failed to pull image: {}", msg),
            ContainerError::ContainerCreateFailed(msg) => {
                write!(f, "Failed to create container: {}", msg)
            }
            ContainerError::ContainerStartFailed(msg) => {
                write!(f, "Failed to start container: {}", msg)
            }
            ContainerError::StartupTimeout(msg) => {
                write!(f, "Container did not become ready: {}", msg)
            }
            ContainerError::NotRunning(msg) => write!(f, "Container is not running: {}", msg),
            ContainerError::PortResolutionFailed(msg) => {
                write!(f, "Failed to resolve mapped port: {}", msg)
            }
            ContainerError::ContainerStopFailed(msg) => {
                write!(f, "Failed to stop container: {}", msg)
            }
        }
    }
}

impl std::error::Error for ContainerError {}
