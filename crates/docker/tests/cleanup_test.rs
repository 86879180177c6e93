use docker::docker::{get_tracked_containers, track_container};
use docker::DockerRuntime;

// Lives in its own test binary: cleanup removes every container the process
// tracks.
#[tokio::test]
async fn test_cleanup_reports_containers_it_cannot_remove() {
    if std::env::var("AZURITE_KIT_TEST_SKIP_DOCKER").is_ok() || !docker::is_available().await {
        println!("Docker not available, skipping cleanup test");
        return;
    }

    let runtime = DockerRuntime::new().expect("docker client");
    let missing = format!("azurite-kit-missing-{}", uuid::Uuid::new_v4().simple());
    track_container(&missing);

    docker::cleanup_containers(runtime.client()).await;

    assert!(!get_tracked_containers().contains(&missing));
    let logs = logging::get_logs();
    assert!(
        logs.iter()
            .any(|line| line.contains(&format!("failed to stop container {}", missing))),
        "no stop warning in {:?}",
        logs
    );
    assert!(
        logs.iter()
            .any(|line| line.contains(&format!("failed to remove container {}", missing))),
        "no remove warning in {:?}",
        logs
    );
}
