use std::net::TcpListener;

use crate::{
    container::{ContainerError, ContainerRequest, ContainerRuntime},
    emulation::{self, EmulationRuntime},
};

#[cfg(test)]
mod emulation_runtime_tests {
    use super::*;

    fn request() -> ContainerRequest {
        ContainerRequest::new("example/image:1.0")
            .with_env("GREETING", "hello")
            .with_exposed_port(7000)
            .with_exposed_port(7001)
    }

    #[tokio::test]
    async fn start_maps_every_exposed_port_to_a_distinct_host_port() {
        let runtime = EmulationRuntime::new();
        let handle = runtime.start(&request()).await.expect("start");

        let first = runtime.mapped_port(&handle, 7000).await.unwrap();
        let second = runtime.mapped_port(&handle, 7001).await.unwrap();

        assert!(first > 0);
        assert!(second > 0);
        assert_ne!(first, second);

        // The host port stays reserved while the container runs
        assert!(TcpListener::bind(("127.0.0.1", first)).is_err());

        runtime.stop(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn unexposed_port_has_no_mapping() {
        let runtime = EmulationRuntime::new();
        let handle = runtime.start(&request()).await.unwrap();

        let err = runtime.mapped_port(&handle, 9999).await.unwrap_err();
        assert!(matches!(err, ContainerError::NotRunning(_)));

        runtime.stop(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn stop_invalidates_the_handle() {
        let runtime = EmulationRuntime::new();
        let handle = runtime.start(&request()).await.unwrap();
        assert!(emulation::get_tracked_containers().contains(&handle.id().to_string()));

        runtime.stop(&handle).await.unwrap();

        assert!(!emulation::get_tracked_containers().contains(&handle.id().to_string()));
        assert!(matches!(
            runtime.mapped_port(&handle, 7000).await,
            Err(ContainerError::NotRunning(_))
        ));
        assert!(matches!(
            runtime.stop(&handle).await,
            Err(ContainerError::NotRunning(_))
        ));
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let runtime = EmulationRuntime::new();
        let handle = runtime.start(&request()).await.unwrap();

        let launches = runtime.launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].image, "example/image:1.0");
        assert_eq!(launches[0].env.get("GREETING").map(String::as_str), Some("hello"));

        runtime.stop(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn failing_runtime_records_and_rejects() {
        let runtime = EmulationRuntime::failing("image not found");

        let err = runtime.start(&request()).await.unwrap_err();

        assert!(matches!(err, ContainerError::ContainerStartFailed(ref m) if m == "image not found"));
        assert_eq!(runtime.launches().len(), 1);
    }
}
