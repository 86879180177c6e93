use crate::error::EmulatorError;
use models::{
    AccountIdentity, ConnectionString, EmulatorConfig, ServiceEndpoints, ServicePort,
    StorageCredentials, DEFAULT_IMAGE, DEFAULT_STARTUP_TIMEOUT_SECS, DEFAULT_TAG,
};
use runtime::container::{ContainerError, ContainerHandle, ContainerRequest, ContainerRuntime};
use std::sync::Arc;
use std::time::Duration;

/// Variable through which Azurite learns the accounts it should accept,
/// formatted as `name:key`
pub const ACCOUNTS_ENV_VAR: &str = "AZURITE_ACCOUNTS";

/// A disposable Azurite container serving blob, queue and table storage.
///
/// Configure the account and image with the `with_*` methods, call
/// [`start`](Self::start), then ask for the connection string. The container
/// is never stopped by this type: take the handle and pass it to the
/// runtime's `stop` when done.
///
/// ```ignore
/// let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::new()?);
/// let mut azurite = AzuriteContainer::new(runtime.clone())
///     .with_account_name("custom")
///     .with_account_key("Y2JkZQ==");
/// azurite.start().await?;
/// let connection_string = azurite.connection_string().await?.to_string();
/// // ...
/// if let Some(handle) = azurite.take_handle() {
///     runtime.stop(&handle).await?;
/// }
/// ```
pub struct AzuriteContainer {
    runtime: Arc<dyn ContainerRuntime>,
    identity: AccountIdentity,
    image: String,
    tag: String,
    in_memory_persistence: bool,
    loose: bool,
    skip_api_version_check: bool,
    startup_timeout: Duration,
    handle: Option<ContainerHandle>,
}

impl AzuriteContainer {
    /// A container using the default development account and the latest
    /// Azurite image
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        AzuriteContainer {
            runtime,
            identity: AccountIdentity::default(),
            image: DEFAULT_IMAGE.to_string(),
            tag: DEFAULT_TAG.to_string(),
            in_memory_persistence: false,
            loose: false,
            skip_api_version_check: false,
            startup_timeout: Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS),
            handle: None,
        }
    }

    pub fn from_config(runtime: Arc<dyn ContainerRuntime>, config: &EmulatorConfig) -> Self {
        AzuriteContainer {
            runtime,
            identity: config.identity(),
            image: config.image.clone(),
            tag: config.tag.clone(),
            in_memory_persistence: config.in_memory_persistence,
            loose: config.loose,
            skip_api_version_check: config.skip_api_version_check,
            startup_timeout: Duration::from_secs(config.startup_timeout_secs),
            handle: None,
        }
    }

    // Settings are frozen while a container is held: the running process was
    // launched with the old values and cannot pick up new ones.
    fn frozen(&self, setting: &str) -> bool {
        match &self.handle {
            Some(handle) => {
                logging::warning(&format!(
                    "Ignoring {} change: {} is already running",
                    setting,
                    handle.name()
                ));
                true
            }
            None => false,
        }
    }

    /// Replace the account name. Ignored once started.
    pub fn with_account_name(mut self, name: impl Into<String>) -> Self {
        if !self.frozen("account name") {
            self.identity.name = name.into();
        }
        self
    }

    /// Replace the account key. Ignored once started.
    pub fn with_account_key(mut self, key: impl Into<String>) -> Self {
        if !self.frozen("account key") {
            self.identity.key = key.into();
        }
        self
    }

    /// Image repository, without tag
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        if !self.frozen("image") {
            self.image = image.into();
        }
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        if !self.frozen("image tag") {
            self.tag = tag.into();
        }
        self
    }

    /// Keep all data in memory instead of on the container filesystem
    pub fn with_in_memory_persistence(mut self) -> Self {
        if !self.frozen("persistence mode") {
            self.in_memory_persistence = true;
        }
        self
    }

    /// Let the emulator ignore headers and parameters it does not support
    pub fn with_loose(mut self) -> Self {
        if !self.frozen("loose mode") {
            self.loose = true;
        }
        self
    }

    /// Accept requests from SDK versions newer than the emulator knows
    pub fn with_skip_api_version_check(mut self) -> Self {
        if !self.frozen("API version check") {
            self.skip_api_version_check = true;
        }
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        if !self.frozen("startup timeout") {
            self.startup_timeout = timeout;
        }
        self
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Check the account for values the emulator or the connection string
    /// cannot represent. `start` does not call this.
    pub fn validate(&self) -> Result<(), EmulatorError> {
        let result = self.identity.validate();
        if result.is_valid {
            Ok(())
        } else {
            Err(EmulatorError::InvalidConfiguration(result.issues.join("; ")))
        }
    }

    // None keeps the image's own command
    fn command(&self) -> Option<Vec<String>> {
        if !(self.in_memory_persistence || self.loose || self.skip_api_version_check) {
            return None;
        }

        let mut cmd: Vec<String> = vec!["azurite".to_string()];
        for service in ServicePort::ALL {
            cmd.push(format!("--{}Host", service.display_name().to_lowercase()));
            cmd.push("0.0.0.0".to_string());
        }
        if self.in_memory_persistence {
            cmd.push("--inMemoryPersistence".to_string());
        } else {
            cmd.push("--location".to_string());
            cmd.push("/data".to_string());
        }
        if self.loose {
            cmd.push("--loose".to_string());
        }
        if self.skip_api_version_check {
            cmd.push("--skipApiVersionCheck".to_string());
        }
        Some(cmd)
    }

    /// What will be handed to the runtime on `start`
    pub fn container_request(&self) -> ContainerRequest {
        let mut request = ContainerRequest::new(self.image_reference())
            .with_env(ACCOUNTS_ENV_VAR, self.identity.accounts_env_value())
            .with_startup_timeout(self.startup_timeout);

        for service in ServicePort::ALL {
            request = request
                .with_exposed_port(service.container_port())
                .with_ready_message(format!(
                    "Azurite {} service is successfully listening",
                    service.display_name()
                ));
        }

        if let Some(cmd) = self.command() {
            request = request.with_cmd(cmd);
        }

        request
    }

    /// Launch the container and wait until the runtime reports it ready.
    ///
    /// A runtime failure is returned as [`EmulatorError::StartupFailure`]
    /// without retrying, and leaves this value unstarted. Starting while a
    /// previous container is still running is rejected.
    pub async fn start(&mut self) -> Result<(), EmulatorError> {
        if let Some(handle) = &self.handle {
            match self
                .runtime
                .mapped_port(handle, ServicePort::Blob.container_port())
                .await
            {
                Err(ContainerError::NotRunning(_)) => {
                    logging::debug(&format!(
                        "Previous container {} is gone, starting a new one",
                        handle.name()
                    ));
                    self.handle = None;
                }
                Err(e) => return Err(EmulatorError::Runtime(e)),
                Ok(_) => return Err(EmulatorError::AlreadyStarted(handle.name().to_string())),
            }
        }

        let request = self.container_request();
        logging::info(&format!(
            "Starting Azurite ({}) for account {}",
            request.image, self.identity.name
        ));

        let handle = self
            .runtime
            .start(&request)
            .await
            .map_err(EmulatorError::StartupFailure)?;

        logging::info(&format!("Azurite is running as {}", handle.name()));
        self.handle = Some(handle);
        Ok(())
    }

    pub fn handle(&self) -> Option<&ContainerHandle> {
        self.handle.as_ref()
    }

    /// Hand the running container over to the caller, typically to stop it.
    /// Settings become editable again.
    pub fn take_handle(&mut self) -> Option<ContainerHandle> {
        self.handle.take()
    }

    /// Host port the given service is reachable on
    pub async fn mapped_port(&self, service: ServicePort) -> Result<u16, EmulatorError> {
        let handle = self.handle.as_ref().ok_or_else(|| {
            EmulatorError::NotRunning("the container has not been started".to_string())
        })?;

        self.runtime
            .mapped_port(handle, service.container_port())
            .await
            .map_err(EmulatorError::from_port_lookup)
    }

    /// Endpoint URLs for the three services, resolved from the current
    /// port mappings
    pub async fn service_endpoints(&self) -> Result<ServiceEndpoints, EmulatorError> {
        let blob = self.mapped_port(ServicePort::Blob).await?;
        let queue = self.mapped_port(ServicePort::Queue).await?;
        let table = self.mapped_port(ServicePort::Table).await?;

        Ok(ServiceEndpoints::new(&self.identity.name, blob, queue, table))
    }

    /// Connection string for the running emulator. Recomputed on every call
    /// so it always reflects the current port mappings.
    pub async fn connection_string(&self) -> Result<ConnectionString, EmulatorError> {
        let endpoints = self.service_endpoints().await?;
        Ok(ConnectionString::new(self.identity.clone(), endpoints))
    }

    /// Shared-key credential for the configured account. Available before
    /// start, though it only authenticates against a running emulator.
    pub fn credentials(&self) -> StorageCredentials {
        self.identity.credentials()
    }
}
