//! End-to-end scenarios against the in-memory cluster.
//!
//! Time is paused, so hour-long campaigns run instantly and deterministically.

use drill_core::{assert_zone_balance, ClusterTarget, SeededSelector, StopReason};
use stormdrill_runner::{
    Autoscaler, ChaosScheduler, ClusterSizeController, Config, Drivers, MockCluster,
    RecoveryOptions, RecoveryValidator, RunnerError, Scenario, ScenarioContext,
};
use drill_types::{ChaosBudget, FaultKind, TestContext};
use std::sync::Arc;
use std::time::Duration;

fn mock_config(zones: usize, nodes_per_zone: u32) -> Config {
    let mut config = Config::default();
    config.mock.zones = zones;
    config.mock.nodes_per_zone = nodes_per_zone;
    config.campaign.scale_factor = 2;
    config
}

fn setup(scenario: Scenario, config: &Config) -> (MockCluster, ScenarioContext) {
    let cluster = MockCluster::new(config.mock.zones, config.mock.nodes_per_zone);
    let drivers = Drivers::from_cluster(Arc::new(cluster.clone()));
    let ctx = ScenarioContext::new(scenario, &drivers, config, Box::new(SeededSelector::new(1)));
    (cluster, ctx)
}

#[tokio::test(start_paused = true)]
async fn scale_up_down_truncates_per_zone() {
    let config = mock_config(3, 3);
    let (cluster, mut ctx) = setup(Scenario::ScaleUpDown, &config);

    let report = Scenario::ScaleUpDown.run(&mut ctx).await;

    assert!(report.is_success(), "{:?}", report.failure);
    // 9 + 9/2 = 13 nodes over 3 zones: 4 per zone, 12 effective
    assert_eq!(cluster.set_size_calls(), vec![4, 3]);
    assert_eq!(cluster.registry_nodes().len(), 9);
    let balance = assert_zone_balance(
        &ClusterTarget::new(9, 3).unwrap(),
        &cluster.registry_nodes(),
    );
    assert!(balance.passed, "{:?}", balance.failure_details);
    assert_eq!(cluster.torn_down_contexts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn scale_up_down_waits_for_storage_recovery() {
    let config = mock_config(3, 3);
    let (_cluster, mut ctx) = setup(Scenario::ScaleUpDown, &config);

    let start = tokio::time::Instant::now();
    Scenario::ScaleUpDown.run(&mut ctx).await.into_result().unwrap();
    assert_eq!(start.elapsed(), config.recovery.storage_recovery_timeout());
}

#[tokio::test(start_paused = true)]
async fn failed_resize_still_tears_down() {
    let mut config = mock_config(3, 3);
    config.retry.scale_timeout_mins = 10;
    let (cluster, mut ctx) = setup(Scenario::ScaleUpDown, &config);
    cluster.reject_set_size(u32::MAX);

    let report = Scenario::ScaleUpDown.run(&mut ctx).await;

    assert!(matches!(report.failure, Some(RunnerError::Resize { .. })));
    assert_eq!(cluster.set_size_calls().len(), 5);
    assert_eq!(cluster.torn_down_contexts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn kill_random_nodes_one_shot() {
    let mut config = mock_config(3, 3);
    config.campaign.total_run_minutes = 0;
    let (cluster, mut ctx) = setup(Scenario::KillRandomNodes, &config);

    let report = Scenario::KillRandomNodes.run(&mut ctx).await;

    assert!(report.is_success(), "{:?}", report.failure);
    assert_eq!(report.rounds, 1);
    assert!(!report.expired);
    assert_eq!(cluster.deleted_nodes().len(), 1);
    assert_eq!(cluster.get_cluster_size().await.unwrap(), 9);
    // Once before the campaign, once after the cycle
    assert_eq!(cluster.validated_contexts().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn kill_random_nodes_until_deadline() {
    let mut config = mock_config(3, 3);
    config.campaign.total_run_minutes = 120;
    let (cluster, mut ctx) = setup(Scenario::KillRandomNodes, &config);

    let report = Scenario::KillRandomNodes.run(&mut ctx).await;

    assert!(report.is_success(), "{:?}", report.failure);
    assert!(report.expired);
    // Level 4: a cycle every 30 minutes, each cycle settling for 10
    assert!((4..=5).contains(&report.rounds), "rounds = {}", report.rounds);
    assert_eq!(cluster.deleted_nodes().len() as u32, report.rounds);
    assert_eq!(cluster.torn_down_contexts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn periodic_one_minute_for_five_minutes() {
    let cluster = MockCluster::new(3, 3);
    let drivers = Drivers::from_cluster(Arc::new(cluster.clone()));
    let mut recovery = RecoveryValidator::new(
        &drivers,
        ClusterSizeController::new(&drivers),
        Box::new(SeededSelector::new(3)),
        RecoveryOptions {
            settle: Duration::ZERO,
            ..Default::default()
        },
    );
    let contexts = vec![TestContext::new("postgres", "kill-random-nodes-0")];
    let budget = ChaosBudget {
        frequency: Duration::from_secs(60),
        total_run: Duration::from_secs(5 * 60),
    };

    let outcome = ChaosScheduler::new(budget, FaultKind::Delete)
        .run(&mut recovery, &contexts)
        .await;

    assert_eq!(outcome.reason, StopReason::Expired);
    let cycles = cluster.deleted_nodes().len();
    assert!((5..=6).contains(&cycles), "cycles = {cycles}");
}

#[tokio::test(start_paused = true)]
async fn one_shot_ignores_frequency() {
    for level in 1..=5 {
        let mut config = mock_config(2, 2);
        config.campaign.chaos_level = drill_types::ChaosLevel::new(level);
        let (cluster, mut ctx) = setup(Scenario::KillRandomNodes, &config);

        Scenario::KillRandomNodes.run(&mut ctx).await.into_result().unwrap();
        assert_eq!(cluster.deleted_nodes().len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn fault_cycle_restores_size_for_any_victim() {
    for seed in 0..20 {
        let cluster = MockCluster::new(3, 3);
        let drivers = Drivers::from_cluster(Arc::new(cluster.clone()));
        let mut recovery = RecoveryValidator::new(
            &drivers,
            ClusterSizeController::new(&drivers),
            Box::new(SeededSelector::new(seed)),
            RecoveryOptions::default(),
        );
        let candidates = recovery.candidates().await;

        recovery
            .run_fault_cycle(FaultKind::Delete, &candidates)
            .await
            .unwrap();
        assert_eq!(
            cluster.get_cluster_size().await.unwrap() as usize,
            candidates.len()
        );
    }
}

#[tokio::test(start_paused = true)]
async fn kill_random_nodes_initial_validation_failure() {
    let config = mock_config(3, 3);
    let (cluster, mut ctx) = setup(Scenario::KillRandomNodes, &config);
    cluster.fail_next_validate("pod crashlooping");

    let report = Scenario::KillRandomNodes.run(&mut ctx).await;

    assert!(matches!(
        report.failure,
        Some(RunnerError::ContextValidation { .. })
    ));
    assert!(cluster.deleted_nodes().is_empty());
    assert_eq!(cluster.torn_down_contexts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn reboot_nodes_reboots_every_candidate() {
    let config = mock_config(3, 2);
    let (cluster, mut ctx) = setup(Scenario::RebootNodes, &config);

    let report = Scenario::RebootNodes.run(&mut ctx).await;

    assert!(report.is_success(), "{:?}", report.failure);
    assert_eq!(report.rounds, 6);
    assert_eq!(cluster.rebooted_nodes().len(), 6);
    assert!(cluster.deleted_nodes().is_empty());
    assert_eq!(cluster.torn_down_contexts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn teardown_failure_does_not_mask_success() {
    let config = mock_config(1, 1);
    let (cluster, mut ctx) = setup(Scenario::RebootNodes, &config);
    cluster.fail_next_teardown("volume still attached");

    let report = Scenario::RebootNodes.run(&mut ctx).await;

    assert!(report.failure.is_none());
    assert_eq!(report.teardown_failures.len(), 1);
    assert!(matches!(
        report.into_result(),
        Err(RunnerError::Teardown { failed: 1 })
    ));
}

#[test]
fn contexts_are_named_after_scenario() {
    let mut config = mock_config(1, 1);
    config.campaign.apps = vec!["postgres".into(), "redis".into()];
    let (_cluster, ctx) = setup(Scenario::ScaleUpDown, &config);

    let names: Vec<String> = ctx.contexts().iter().map(|c| c.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "scale-up-down-0/postgres",
            "scale-up-down-0/redis",
            "scale-up-down-1/postgres",
            "scale-up-down-1/redis",
        ]
    );
}
