//! Assertion helpers for convergence checks.
//!
//! These are pure functions that verify observed cluster state after a
//! mutation or fault. They take state as input and return pass/fail.

use crate::sizing::ClusterTarget;
use drill_types::{Node, Zone};
use std::collections::BTreeMap;

/// Result of an assertion check.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }
}

/// Assert that the observed node set has exactly `expected` members.
///
/// No tolerance band: a replacement must restore the exact count.
pub fn assert_cluster_size(expected: u32, observed: &[Node]) -> AssertionResult {
    let actual = observed.len();
    if u32::try_from(actual).is_ok_and(|n| n == expected) {
        AssertionResult::pass(&format!("Cluster has {} nodes", expected))
    } else {
        AssertionResult::fail(
            "Cluster size check",
            &format!("expected {} nodes, observed {}", expected, actual),
        )
    }
}

/// Assert that every zone of `target` holds exactly its per-zone count.
pub fn assert_zone_balance(target: &ClusterTarget, observed: &[Node]) -> AssertionResult {
    let mut per_zone: BTreeMap<&Zone, u32> = BTreeMap::new();
    for node in observed {
        *per_zone.entry(&node.zone).or_default() += 1;
    }

    if u32::try_from(per_zone.len()).is_ok_and(|n| n != target.zone_count()) {
        return AssertionResult::fail(
            "Zone balance check",
            &format!(
                "expected nodes in {} zones, found {}",
                target.zone_count(),
                per_zone.len()
            ),
        );
    }

    for (zone, count) in &per_zone {
        if *count != target.per_zone_count() {
            return AssertionResult::fail(
                "Zone balance check",
                &format!(
                    "zone {} has {} nodes, expected {}",
                    zone,
                    count,
                    target.per_zone_count()
                ),
            );
        }
    }

    AssertionResult::pass(&format!(
        "All {} zones have {} nodes",
        target.zone_count(),
        target.per_zone_count()
    ))
}
