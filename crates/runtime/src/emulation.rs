use crate::container::{ContainerError, ContainerHandle, ContainerRequest, ContainerRuntime};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::net::TcpListener;
use std::sync::Mutex;

// Global registry of emulated containers, so cleanup can release every
// listener no matter which runtime instance created it
static EMULATED_CONTAINERS: Lazy<Mutex<HashMap<String, EmulatedContainer>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct EmulatedContainer {
    image: String,
    // container port -> listener holding the host port
    listeners: BTreeMap<u16, TcpListener>,
}

/// Runtime that executes nothing.
///
/// Each exposed port is backed by a real listener on an ephemeral
/// `127.0.0.1` port, so mapped ports are distinct and stay reserved until
/// the container is stopped. Every request is recorded for inspection.
pub struct EmulationRuntime {
    launches: Mutex<Vec<ContainerRequest>>,
    fail_with: Option<String>,
}

impl Default for EmulationRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulationRuntime {
    pub fn new() -> Self {
        EmulationRuntime {
            launches: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// A runtime whose every `start` fails with the given reason
    pub fn failing(reason: impl Into<String>) -> Self {
        EmulationRuntime {
            launches: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    /// Requests received so far, oldest first, including failed ones
    pub fn launches(&self) -> Vec<ContainerRequest> {
        match self.launches.lock() {
            Ok(launches) => launches.clone(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn get_tracked_containers() -> Vec<String> {
    match EMULATED_CONTAINERS.lock() {
        Ok(containers) => containers.keys().cloned().collect(),
        Err(_) => Vec::new(),
    }
}

/// Drop every emulated container and release its ports
pub async fn cleanup_resources() {
    let removed: Vec<(String, EmulatedContainer)> = match EMULATED_CONTAINERS.lock() {
        Ok(mut containers) => containers.drain().collect(),
        Err(_) => Vec::new(),
    };

    for (id, container) in removed {
        logging::debug(&format!(
            "Emulation: released {} port(s) of {} ({})",
            container.listeners.len(),
            id,
            container.image
        ));
    }
}

#[async_trait]
impl ContainerRuntime for EmulationRuntime {
    async fn start(&self, request: &ContainerRequest) -> Result<ContainerHandle, ContainerError> {
        if let Ok(mut launches) = self.launches.lock() {
            launches.push(request.clone());
        }

        if let Some(reason) = &self.fail_with {
            logging::error(&format!(
                "Emulation: refusing to start {}: {}",
                request.image, reason
            ));
            return Err(ContainerError::ContainerStartFailed(reason.clone()));
        }

        let mut listeners = BTreeMap::new();
        for port in &request.exposed_ports {
            let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(|e| {
                ContainerError::ContainerStartFailed(format!(
                    "could not reserve a host port for {}: {}",
                    port, e
                ))
            })?;
            listeners.insert(*port, listener);
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("emulated-{}", &id[..12]);

        logging::info(&format!(
            "Emulation: started {} as {} with {} exposed port(s)",
            request.image,
            name,
            listeners.len()
        ));

        let mut containers = EMULATED_CONTAINERS
            .lock()
            .map_err(|e| ContainerError::ContainerStartFailed(e.to_string()))?;
        containers.insert(
            id.clone(),
            EmulatedContainer {
                image: request.image.clone(),
                listeners,
            },
        );

        Ok(ContainerHandle::new(id, name))
    }

    async fn mapped_port(
        &self,
        handle: &ContainerHandle,
        container_port: u16,
    ) -> Result<u16, ContainerError> {
        let containers = EMULATED_CONTAINERS
            .lock()
            .map_err(|e| ContainerError::PortResolutionFailed(e.to_string()))?;

        let container = containers
            .get(handle.id())
            .ok_or_else(|| ContainerError::NotRunning(handle.name().to_string()))?;

        let listener = container.listeners.get(&container_port).ok_or_else(|| {
            ContainerError::NotRunning(format!(
                "{} has no mapping for port {}",
                handle.name(),
                container_port
            ))
        })?;

        listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(|e| ContainerError::PortResolutionFailed(e.to_string()))
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        let removed = EMULATED_CONTAINERS
            .lock()
            .map_err(|e| ContainerError::ContainerStopFailed(e.to_string()))?
            .remove(handle.id());

        match removed {
            Some(_) => {
                logging::info(&format!("Emulation: stopped {}", handle.name()));
                Ok(())
            }
            None => Err(ContainerError::NotRunning(handle.name().to_string())),
        }
    }
}
