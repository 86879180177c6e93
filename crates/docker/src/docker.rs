use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
        LogsOptions, RemoveContainerOptions, StopContainerOptions,
    },
    errors::Error as BollardError,
    models::{HostConfig, PortBinding},
    Docker,
};
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use runtime::container::{ContainerError, ContainerHandle, ContainerRequest, ContainerRuntime};
use std::collections::HashMap;
use std::sync::Mutex;

/// Label put on every container this runtime creates
pub const MANAGED_LABEL: &str = "azurite-kit.managed";

// Published ports are only reachable from the local machine
const BIND_ADDRESS: &str = "127.0.0.1";

// Seconds Docker waits for a graceful stop before killing
const STOP_TIMEOUT_SECS: i64 = 5;

static RUNNING_CONTAINERS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new() -> Result<Self, ContainerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::ConnectionFailed(e.to_string()))?;

        Ok(DockerRuntime { docker })
    }

    pub fn client(&self) -> &Docker {
        &self.docker
    }

    async fn pull_image(&self, image: &str) -> Result<(), ContainerError> {
        let options = bollard::image::CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                return Err(ContainerError::ImagePullFailed(e.to_string()));
            }
        }

        Ok(())
    }

    async fn launch(&self, id: &str, request: &ContainerRequest) -> Result<(), ContainerError> {
        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(|e| ContainerError::ContainerStartFailed(e.to_string()))?;

        match tokio::time::timeout(
            request.startup_timeout,
            self.wait_for_messages(id, &request.ready_messages),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ContainerError::StartupTimeout(format!(
                "{} not ready after {}s",
                request.image,
                request.startup_timeout.as_secs()
            ))),
        }
    }

    /// Follow the container logs until every expected line has been seen
    async fn wait_for_messages(&self, id: &str, expected: &[String]) -> Result<(), ContainerError> {
        if expected.is_empty() {
            return Ok(());
        }

        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(options));

        let mut output = String::new();
        let mut pending: Vec<&String> = expected.iter().collect();

        while let Some(chunk) = stream.next().await {
            let message = match chunk {
                Ok(LogOutput::StdOut { message })
                | Ok(LogOutput::StdErr { message })
                | Ok(LogOutput::Console { message }) => message,
                Ok(LogOutput::StdIn { .. }) => continue,
                Err(e) => return Err(ContainerError::ContainerStartFailed(e.to_string())),
            };

            output.push_str(&String::from_utf8_lossy(&message));
            pending.retain(|line| !output.contains(line.as_str()));

            if pending.is_empty() {
                logging::debug(&format!("Docker: container {} is ready", id));
                return Ok(());
            }
        }

        // The log stream only ends when the container exits
        Err(ContainerError::ContainerStartFailed(format!(
            "container exited before becoming ready; output: {}",
            output.trim()
        )))
    }

    // Remove a container whose startup failed, so no half-started state leaks
    async fn discard(&self, id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(id, Some(options)).await {
            logging::warning(&format!("Docker: failed to remove container {}: {}", id, e));
        }
        untrack_container(id);
    }
}

pub async fn is_available() -> bool {
    match Docker::connect_with_local_defaults() {
        Ok(docker) => match docker.ping().await {
            Ok(_) => true,
            Err(e) => {
                logging::debug(&format!("Docker ping failed: {}", e));
                false
            }
        },
        Err(e) => {
            logging::debug(&format!("Docker connection failed: {}", e));
            false
        }
    }
}

fn port_key(port: u16) -> String {
    format!("{}/tcp", port)
}

pub fn track_container(id: &str) {
    if let Ok(mut containers) = RUNNING_CONTAINERS.lock() {
        containers.push(id.to_string());
    }
}

pub fn untrack_container(id: &str) {
    if let Ok(mut containers) = RUNNING_CONTAINERS.lock() {
        containers.retain(|c| c != id);
    }
}

pub fn get_tracked_containers() -> Vec<String> {
    if let Ok(containers) = RUNNING_CONTAINERS.lock() {
        containers.clone()
    } else {
        vec![]
    }
}

/// Stop and remove every container started by this process
pub async fn cleanup_containers(docker: &Docker) {
    let containers_to_cleanup = get_tracked_containers();

    for container_id in containers_to_cleanup {
        match docker
            .stop_container(
                &container_id,
                Some(StopContainerOptions {
                    t: STOP_TIMEOUT_SECS,
                }),
            )
            .await
        {
            // Already stopped
            Ok(_)
            | Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {}
            Err(e) => logging::warning(&format!(
                "Docker: failed to stop container {}: {}",
                container_id, e
            )),
        }

        match docker
            .remove_container(
                &container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(_) => logging::debug(&format!("Docker: removed container {}", container_id)),
            Err(e) => logging::warning(&format!(
                "Docker: failed to remove container {}: {}",
                container_id, e
            )),
        }
        untrack_container(&container_id);
    }
}

/// Remove containers left behind by earlier processes, found by label.
/// Returns how many were removed.
pub async fn cleanup_labelled_containers(docker: &Docker) -> Result<usize, ContainerError> {
    let mut filters = HashMap::new();
    filters.insert("label".to_string(), vec![format!("{}=true", MANAGED_LABEL)]);

    let options = ListContainersOptions::<String> {
        all: true,
        filters,
        ..Default::default()
    };

    let containers = docker
        .list_containers(Some(options))
        .await
        .map_err(|e| ContainerError::ConnectionFailed(e.to_string()))?;

    let mut removed = 0;
    for id in containers.into_iter().filter_map(|summary| summary.id) {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match docker.remove_container(&id, Some(options)).await {
            Ok(_) => {
                logging::info(&format!("Docker: removed leftover container {}", id));
                untrack_container(&id);
                removed += 1;
            }
            Err(e) => {
                logging::warning(&format!("Docker: failed to remove container {}: {}", id, e))
            }
        }
    }

    Ok(removed)
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn start(&self, request: &ContainerRequest) -> Result<ContainerHandle, ContainerError> {
        logging::info(&format!("Docker: starting container from image {}", request.image));

        match self.pull_image(&request.image).await {
            Ok(_) => logging::debug(&format!("🐳 Pulled image: {}", request.image)),
            Err(e) => logging::warning(&format!(
                "🐳 {}. Continuing with the local image if available.",
                e
            )),
        }

        let env: Vec<String> = request
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        // Every exposed port is published on an ephemeral host port
        let mut exposed_ports = HashMap::new();
        let mut port_bindings = HashMap::new();
        for port in &request.exposed_ports {
            exposed_ports.insert(port_key(*port), HashMap::new());
            port_bindings.insert(
                port_key(*port),
                Some(vec![PortBinding {
                    host_ip: Some(BIND_ADDRESS.to_string()),
                    host_port: Some("0".to_string()),
                }]),
            );
        }

        let mut labels = HashMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());

        let name = format!("azurite-kit-{}", uuid::Uuid::new_v4());
        let options = Some(CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            ..Default::default()
        };

        let config = Config {
            image: Some(request.image.clone()),
            cmd: request.cmd.clone(),
            env: Some(env),
            exposed_ports: Some(exposed_ports),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container(options, config)
            .await
            .map_err(|e| ContainerError::ContainerCreateFailed(e.to_string()))?;

        track_container(&container.id);

        if let Err(e) = self.launch(&container.id, request).await {
            logging::error(&format!("Docker: {} failed to start: {}", name, e));
            self.discard(&container.id).await;
            return Err(e);
        }

        logging::info(&format!("Docker: {} is running", name));
        Ok(ContainerHandle::new(container.id, name))
    }

    async fn mapped_port(
        &self,
        handle: &ContainerHandle,
        container_port: u16,
    ) -> Result<u16, ContainerError> {
        let inspect = self
            .docker
            .inspect_container(handle.id(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                BollardError::DockerResponseServerError {
                    status_code: 404, ..
                } => ContainerError::NotRunning(handle.name().to_string()),
                other => ContainerError::PortResolutionFailed(other.to_string()),
            })?;

        let running = inspect
            .state
            .as_ref()
            .and_then(|state| state.running)
            .unwrap_or(false);
        if !running {
            return Err(ContainerError::NotRunning(handle.name().to_string()));
        }

        let host_port = inspect
            .network_settings
            .and_then(|settings| settings.ports)
            .and_then(|ports| ports.get(&port_key(container_port)).cloned().flatten())
            .and_then(|bindings| {
                bindings
                    .into_iter()
                    .find_map(|binding| binding.host_port.filter(|port| !port.is_empty()))
            })
            .ok_or_else(|| {
                ContainerError::NotRunning(format!(
                    "{} has no mapping for port {}",
                    handle.name(),
                    container_port
                ))
            })?;

        host_port.parse::<u16>().map_err(|e| {
            ContainerError::PortResolutionFailed(format!("invalid host port '{}': {}", host_port, e))
        })
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        let stopped = self
            .docker
            .stop_container(
                handle.id(),
                Some(StopContainerOptions {
                    t: STOP_TIMEOUT_SECS,
                }),
            )
            .await;

        match stopped {
            Ok(_)
            | Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => {}
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                untrack_container(handle.id());
                return Err(ContainerError::NotRunning(handle.name().to_string()));
            }
            Err(e) => return Err(ContainerError::ContainerStopFailed(e.to_string())),
        }

        self.docker
            .remove_container(
                handle.id(),
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| ContainerError::ContainerStopFailed(e.to_string()))?;

        untrack_container(handle.id());
        logging::info(&format!("Docker: stopped {}", handle.name()));
        Ok(())
    }
}
