//! Compose driver against a real Docker daemon.
//!
//! Run with: `cargo test -p stormdrill-docker -- --ignored`

use drill_core::SeededSelector;
use stormdrill_docker::ComposeCluster;
use drill_runner::config::DockerConfig;
use drill_runner::{
    Autoscaler, ClusterSizeController, Drivers, NodeLifecycle, RecoveryOptions,
    RecoveryValidator,
};
use drill_types::FaultKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn cluster() -> Arc<ComposeCluster> {
    let config = DockerConfig {
        compose_file: PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../demos/docker-compose.yml"
        )),
        project_name: format!("stormdrill-test-{}", std::process::id()),
        zone_prefix: "zone".to_string(),
    };
    Arc::new(ComposeCluster::new(&config).unwrap())
}

#[tokio::test]
#[ignore = "requires docker"]
async fn zones_and_nodes_discovered() {
    let cluster = cluster();
    cluster.setup().await.unwrap();

    let zones = cluster.get_zones().await.unwrap();
    let candidates = cluster.list_fault_candidate_nodes().await;
    let size = cluster.get_cluster_size().await.unwrap();

    cluster.teardown().await.unwrap();

    assert_eq!(zones.len(), 3);
    assert_eq!(candidates.len(), 3);
    assert_eq!(size, 3);
    assert_eq!(cluster.desired_per_zone(), Some(1));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn scale_up_then_down() {
    let cluster = cluster();
    cluster.setup().await.unwrap();
    let drivers = Drivers::from_cluster(cluster.clone());
    let controller = ClusterSizeController::new(&drivers);

    let result = async {
        let up = controller.scale_to(7).await?;
        controller.refresh_registries().await?;
        controller.validate_size(up.effective_total()).await?;

        let down = controller.scale_to(3).await?;
        controller.refresh_registries().await?;
        controller.validate_size(down.effective_total()).await
    }
    .await;

    cluster.teardown().await.unwrap();
    result.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn deleted_node_is_replaced_on_refresh() {
    let cluster = cluster();
    cluster.setup().await.unwrap();
    let drivers = Drivers::from_cluster(cluster.clone());
    let mut recovery = RecoveryValidator::new(
        &drivers,
        ClusterSizeController::new(&drivers),
        Box::new(SeededSelector::new(5)),
        RecoveryOptions {
            settle: Duration::from_secs(2),
            ..Default::default()
        },
    );

    let candidates = recovery.candidates().await;
    let result = recovery
        .run_fault_cycle(FaultKind::Delete, &candidates)
        .await;

    let endpoints = cluster.driver_endpoints();
    cluster.teardown().await.unwrap();
    result.unwrap();
    assert_eq!(endpoints.len(), 3);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn rebooted_node_comes_back() {
    let cluster = cluster();
    cluster.setup().await.unwrap();
    let drivers = Drivers::from_cluster(cluster.clone());
    let mut recovery = RecoveryValidator::new(
        &drivers,
        ClusterSizeController::new(&drivers),
        Box::new(SeededSelector::new(9)),
        RecoveryOptions::default(),
    );

    let candidates = recovery.candidates().await;
    let result = recovery
        .run_fault_cycle(FaultKind::Reboot, &candidates)
        .await;

    cluster.teardown().await.unwrap();
    result.unwrap();
}
