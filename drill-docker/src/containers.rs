//! Mapping between compose containers and cluster vocabulary.
//!
//! A node is a container labelled `stormdrill.role=node`; its compose
//! service is its zone. Application containers carry `stormdrill.app=<key>`.

use bollard::models::{ContainerState, ContainerSummary, HealthStatusEnum};
use drill_types::{Node, NodeId, Zone};
use std::collections::HashMap;

/// Label marking a container as a cluster node.
pub const ROLE_LABEL: &str = "stormdrill.role";
/// Value of [`ROLE_LABEL`] for nodes.
pub const NODE_ROLE: &str = "node";
/// Label marking nodes that run the storage driver.
pub const STORAGE_DRIVER_LABEL: &str = "stormdrill.storage-driver";
/// Label carrying the application key of an application container.
pub const APP_LABEL: &str = "stormdrill.app";
/// Label set by Docker Compose to the project name.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";
/// Label set by Docker Compose to the service name.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// List filters for running node containers of `project`.
pub fn node_filters(project: &str) -> HashMap<String, Vec<String>> {
    HashMap::from([
        (
            "label".to_string(),
            vec![
                format!("{COMPOSE_PROJECT_LABEL}={project}"),
                format!("{ROLE_LABEL}={NODE_ROLE}"),
            ],
        ),
        ("status".to_string(), vec!["running".to_string()]),
    ])
}

/// List filters for every container of application `app_key` in `project`.
pub fn app_filters(project: &str, app_key: &str) -> HashMap<String, Vec<String>> {
    HashMap::from([(
        "label".to_string(),
        vec![
            format!("{COMPOSE_PROJECT_LABEL}={project}"),
            format!("{APP_LABEL}={app_key}"),
        ],
    )])
}

/// Build a node from a container summary.
///
/// Returns `None` for containers without an ID or compose service label.
pub fn node_from_summary(summary: &ContainerSummary) -> Option<Node> {
    let id = summary.id.as_deref()?;
    let labels = summary.labels.as_ref()?;
    let zone = labels.get(COMPOSE_SERVICE_LABEL)?;
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_else(|| id.chars().take(12).collect());

    Some(Node {
        id: NodeId::new(id),
        name,
        zone: Zone::new(zone.as_str()),
        storage_driver_installed: labels
            .get(STORAGE_DRIVER_LABEL)
            .is_some_and(|v| v == "true"),
    })
}

/// Nodes from a container listing, sorted by name.
pub fn nodes_from_summaries(summaries: &[ContainerSummary]) -> Vec<Node> {
    let mut nodes: Vec<Node> = summaries.iter().filter_map(node_from_summary).collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    nodes
}

/// Largest node count observed in any one zone, or `None` without nodes.
///
/// Compose services start at their declared replica count, so right after
/// `up` this is the per-zone size the topology should be kept at.
pub fn observed_per_zone(nodes: &[Node]) -> Option<u32> {
    let mut per_zone: HashMap<&Zone, u32> = HashMap::new();
    for node in nodes {
        *per_zone.entry(&node.zone).or_default() += 1;
    }
    per_zone.into_values().max()
}

/// Zones from `docker compose config --services` output.
pub fn parse_zones(services: &str, prefix: &str) -> Vec<Zone> {
    let mut zones: Vec<Zone> = services
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.starts_with(prefix))
        .map(Zone::new)
        .collect();
    zones.sort();
    zones
}

/// `--scale` arguments putting `per_zone` replicas in every zone.
pub fn scale_args(zones: &[Zone], per_zone: u32) -> Vec<String> {
    zones
        .iter()
        .flat_map(|z| ["--scale".to_string(), format!("{}={per_zone}", z.name())])
        .collect()
}

/// Whether a container is running and, if it has a health check, healthy.
pub fn is_ready(state: &ContainerState) -> bool {
    let running = state.running.unwrap_or(false);
    let healthy = match state.health.as_ref().and_then(|h| h.status.as_ref()) {
        None | Some(HealthStatusEnum::EMPTY) | Some(HealthStatusEnum::NONE) => true,
        Some(status) => *status == HealthStatusEnum::HEALTHY,
    };
    running && healthy
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::Health;

    fn summary(id: &str, name: &str, service: &str, storage: bool) -> ContainerSummary {
        let mut labels = HashMap::from([
            (COMPOSE_SERVICE_LABEL.to_string(), service.to_string()),
            (ROLE_LABEL.to_string(), NODE_ROLE.to_string()),
        ]);
        if storage {
            labels.insert(STORAGE_DRIVER_LABEL.to_string(), "true".to_string());
        }
        ContainerSummary {
            id: Some(id.to_string()),
            names: Some(vec![format!("/{name}")]),
            labels: Some(labels),
            ..Default::default()
        }
    }

    #[test]
    fn node_from_labelled_container() {
        let node = node_from_summary(&summary("abc123", "drill-zone-a-1", "zone-a", true)).unwrap();
        assert_eq!(node.id.as_str(), "abc123");
        assert_eq!(node.name, "drill-zone-a-1");
        assert_eq!(node.zone, Zone::new("zone-a"));
        assert!(node.storage_driver_installed);
    }

    #[test]
    fn node_without_storage_label() {
        let node = node_from_summary(&summary("abc", "n", "zone-b", false)).unwrap();
        assert!(!node.storage_driver_installed);
    }

    #[test]
    fn container_without_service_is_skipped() {
        let bare = ContainerSummary {
            id: Some("abc".into()),
            ..Default::default()
        };
        assert!(node_from_summary(&bare).is_none());
    }

    #[test]
    fn nodes_sorted_by_name() {
        let nodes = nodes_from_summaries(&[
            summary("2", "p-zone-b-1", "zone-b", true),
            summary("1", "p-zone-a-1", "zone-a", true),
        ]);
        let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["p-zone-a-1", "p-zone-b-1"]);
    }

    #[test]
    fn observed_per_zone_takes_fullest_zone() {
        let nodes = nodes_from_summaries(&[
            summary("1", "p-zone-a-1", "zone-a", true),
            summary("2", "p-zone-a-2", "zone-a", true),
            summary("3", "p-zone-b-1", "zone-b", true),
        ]);
        assert_eq!(observed_per_zone(&nodes), Some(2));
        assert_eq!(observed_per_zone(&[]), None);
    }

    #[test]
    fn zones_filtered_by_prefix() {
        let zones = parse_zones("zone-b\npostgres\nzone-a\n\n", "zone");
        assert_eq!(zones, vec![Zone::new("zone-a"), Zone::new("zone-b")]);
    }

    #[test]
    fn scale_args_cover_every_zone() {
        let args = scale_args(&[Zone::new("zone-a"), Zone::new("zone-b")], 4);
        assert_eq!(args, vec!["--scale", "zone-a=4", "--scale", "zone-b=4"]);
    }

    #[test]
    fn node_filters_select_running_nodes() {
        let filters = node_filters("drill");
        assert_eq!(
            filters["label"],
            vec!["com.docker.compose.project=drill", "stormdrill.role=node"]
        );
        assert_eq!(filters["status"], vec!["running"]);
    }

    #[test]
    fn readiness_honours_health_check() {
        let mut state = ContainerState {
            running: Some(true),
            ..Default::default()
        };
        assert!(is_ready(&state));

        state.health = Some(Health {
            status: Some(HealthStatusEnum::STARTING),
            ..Default::default()
        });
        assert!(!is_ready(&state));

        state.health = Some(Health {
            status: Some(HealthStatusEnum::HEALTHY),
            ..Default::default()
        });
        assert!(is_ready(&state));

        state.running = Some(false);
        assert!(!is_ready(&state));
    }
}
