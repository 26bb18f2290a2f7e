use std::sync::Arc;

use crate::store::ZoneDirectory;
use crate::types::{GeoPoint, Zone};

/// Maps a coordinate to its administrative zone.
pub struct ZoneResolver {
    zones: Arc<dyn ZoneDirectory>,
    default_zone_name: String,
}

impl ZoneResolver {
    pub fn new(zones: Arc<dyn ZoneDirectory>, default_zone_name: impl Into<String>) -> Self {
        Self {
            zones,
            default_zone_name: default_zone_name.into(),
        }
    }

    /// Containing zone, else the default zone, else `None` (routing then
    /// goes straight to the global fallback department).
    pub async fn resolve(&self, point: GeoPoint) -> Option<Zone> {
        let zones = match self.zones.list_zones().await {
            Ok(zones) => zones,
            Err(e) => {
                tracing::warn!("Zone lookup failed, trying default zone: {}", e);
                Vec::new()
            }
        };

        if let Some(zone) = smallest_containing_zone(&zones, point) {
            return Some(zone.clone());
        }

        match self.zones.find_zone_by_name(&self.default_zone_name).await {
            Ok(Some(zone)) => Some(zone),
            Ok(None) => {
                let flagged = zones.into_iter().find(|z| z.is_default);
                if flagged.is_none() {
                    tracing::warn!(
                        "No zone contains ({}, {}) and default zone '{}' is missing",
                        point.latitude,
                        point.longitude,
                        self.default_zone_name
                    );
                }
                flagged
            }
            Err(e) => {
                tracing::warn!("Default zone lookup failed: {}", e);
                None
            }
        }
    }
}

/// Overlapping boundaries resolve to the smallest area, then name, then id,
/// so the answer never depends on storage order.
pub fn smallest_containing_zone(zones: &[Zone], point: GeoPoint) -> Option<&Zone> {
    zones
        .iter()
        .filter(|z| z.boundary.contains(point))
        .min_by(|a, b| {
            a.boundary
                .area()
                .cmp(&b.boundary.area())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.zone_id.cmp(&b.zone_id))
        })
}
