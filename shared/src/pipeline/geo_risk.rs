use std::sync::Arc;

use crate::store::ComplaintStore;
use crate::types::{GeoPoint, GeoWindow};

/// Half-span of the hot-zone window, about 1 km.
pub const GEO_RISK_RADIUS_DEGREES: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoRisk {
    pub nearby_open: usize,
    pub bonus: u8,
}

/// 0-1 nearby: +0, 2-4: +1, 5-9: +2, 10+: +3.
pub fn bonus_for_count(nearby_open: usize) -> u8 {
    match nearby_open {
        0..=1 => 0,
        2..=4 => 1,
        5..=9 => 2,
        _ => 3,
    }
}

/// Raises priority for reports landing in clusters of unresolved complaints.
pub struct GeoRiskScorer {
    complaints: Arc<dyn ComplaintStore>,
}

impl GeoRiskScorer {
    pub fn new(complaints: Arc<dyn ComplaintStore>) -> Self {
        Self { complaints }
    }

    /// Never fails: a query error scores as +0.
    pub async fn score(&self, point: GeoPoint) -> GeoRisk {
        let window = GeoWindow::around(point, GEO_RISK_RADIUS_DEGREES);
        match self.complaints.find_open_in_window(&window, None).await {
            Ok(nearby) => GeoRisk {
                nearby_open: nearby.len(),
                bonus: bonus_for_count(nearby.len()),
            },
            Err(e) => {
                tracing::warn!("Geo-risk query failed, scoring +0: {}", e);
                GeoRisk {
                    nearby_open: 0,
                    bonus: 0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures::complaint;
    use crate::store::MemoryStore;
    use crate::types::{Category, ComplaintStatus};
    use chrono::Utc;

    #[test]
    fn test_bonus_table() {
        let expected = [(0, 0), (1, 0), (2, 1), (4, 1), (5, 2), (9, 2), (10, 3), (250, 3)];
        for (count, bonus) in expected {
            assert_eq!(bonus_for_count(count), bonus, "count {}", count);
        }
    }

    #[tokio::test]
    async fn test_counts_open_complaints_of_any_category_within_radius() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let center = GeoPoint::new(19.0760, 72.8777);

        let nearby = [
            ("a", Category::Road, 19.0760, 72.8777, ComplaintStatus::Submitted),
            ("b", Category::Water, 19.0860, 72.8777, ComplaintStatus::Assigned), // on the edge
            ("c", Category::Garbage, 19.0700, 72.8700, ComplaintStatus::Escalated),
        ];
        for (id, category, lat, lng, status) in nearby {
            store
                .insert_complaint(complaint(id, category, GeoPoint::new(lat, lng), status, now))
                .await;
        }
        // Resolved and far away complaints do not count
        store
            .insert_complaint(complaint("d", Category::Road, center, ComplaintStatus::Resolved, now))
            .await;
        store
            .insert_complaint(complaint(
                "e",
                Category::Road,
                GeoPoint::new(19.0870, 72.8777),
                ComplaintStatus::Submitted,
                now,
            ))
            .await;

        let risk = GeoRiskScorer::new(store).score(center).await;
        assert_eq!(risk, GeoRisk { nearby_open: 3, bonus: 1 });
    }
}
