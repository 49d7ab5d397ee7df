//! Per-zone cluster sizing.
//!
//! Autoscaling groups spread across failure domains are resized per zone,
//! so a total node count has to be divided by the number of zones. The
//! division truncates: remainder nodes are never placed.

use drill_types::DrillError;

/// Desired cluster size across a set of zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterTarget {
    total: u32,
    zones: u32,
}

impl ClusterTarget {
    /// Build a target for `total` nodes spread over `zone_count` zones.
    ///
    /// # Errors
    ///
    /// Returns [`DrillError::NoZones`] when `zone_count` is zero.
    pub fn new(total: u32, zone_count: usize) -> Result<Self, DrillError> {
        let zones = u32::try_from(zone_count).unwrap_or(u32::MAX);
        if zones == 0 {
            return Err(DrillError::NoZones);
        }
        Ok(Self { total, zones })
    }

    /// The requested total.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of zones the total is spread over.
    pub fn zone_count(&self) -> u32 {
        self.zones
    }

    /// Nodes requested in each zone (`total / zones`, truncated).
    pub fn per_zone_count(&self) -> u32 {
        self.total / self.zones
    }

    /// Nodes the cluster will actually converge to.
    ///
    /// Lower than [`total`](Self::total) whenever the total is not divisible
    /// by the zone count.
    pub fn effective_total(&self) -> u32 {
        self.per_zone_count() * self.zones
    }

    /// Nodes silently dropped by the truncation.
    pub fn dropped(&self) -> u32 {
        self.total - self.effective_total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_over_three_zones() {
        let target = ClusterTarget::new(12, 3).unwrap();
        assert_eq!(target.per_zone_count(), 4);
        assert_eq!(target.effective_total(), 12);
        assert_eq!(target.dropped(), 0);
    }

    #[test]
    fn twelve_over_two_zones() {
        let target = ClusterTarget::new(12, 2).unwrap();
        assert_eq!(target.per_zone_count(), 6);
    }

    #[test]
    fn non_divisible_total_truncates() {
        // Known lossy behavior: 10 nodes over 3 zones lands on 9.
        let target = ClusterTarget::new(10, 3).unwrap();
        assert_eq!(target.per_zone_count(), 3);
        assert_eq!(target.effective_total(), 9);
        assert_eq!(target.dropped(), 1);
    }

    #[test]
    fn scale_up_from_nine_drops_remainder() {
        let initial = 9;
        let target = ClusterTarget::new(initial + initial / 2, 3).unwrap();
        assert_eq!(target.total(), 13);
        assert_eq!(target.per_zone_count(), 4);
        assert_eq!(target.effective_total(), 12);
    }

    #[test]
    fn zero_zones_rejected() {
        assert_eq!(ClusterTarget::new(6, 0), Err(DrillError::NoZones));
    }

    #[test]
    fn fewer_nodes_than_zones() {
        let target = ClusterTarget::new(2, 3).unwrap();
        assert_eq!(target.per_zone_count(), 0);
        assert_eq!(target.effective_total(), 0);
    }
}
