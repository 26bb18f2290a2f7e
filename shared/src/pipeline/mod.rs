pub mod classification;
pub mod duplicates;
pub mod geo_risk;
pub mod intake;
pub mod monitor;
pub mod routing;
pub mod sla;
pub mod zones;

pub use classification::{ClassificationAdapter, Classifier, HttpClassifier};
pub use intake::IntakeService;
pub use monitor::SlaMonitor;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, Duration, Utc};

    use crate::types::{
        BoundingBox, Category, Complaint, ComplaintStatus, Department, GeoPoint, Zone,
        ZoneBoundary,
    };

    pub fn zone(id: &str, name: &str, bbox: (f64, f64, f64, f64), is_default: bool) -> Zone {
        Zone {
            zone_id: id.to_string(),
            name: name.to_string(),
            boundary: ZoneBoundary::BBox(BoundingBox {
                min_lat: bbox.0,
                max_lat: bbox.1,
                min_lng: bbox.2,
                max_lng: bbox.3,
            }),
            is_default,
            created_at: Utc::now(),
        }
    }

    pub fn department(id: &str, name: &str, zone_id: Option<&str>) -> Department {
        Department {
            department_id: id.to_string(),
            name: name.to_string(),
            zone_id: zone_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    pub fn complaint(
        id: &str,
        category: Category,
        location: GeoPoint,
        status: ComplaintStatus,
        created_at: DateTime<Utc>,
    ) -> Complaint {
        Complaint {
            complaint_id: id.to_string(),
            category,
            description: format!("fixture complaint {}", id),
            location,
            address: None,
            photo_url: None,
            priority: 5,
            status,
            assigned_department_id: None,
            sla_deadline: created_at + Duration::hours(48),
            sla_breached: false,
            duplicate_count: 0,
            validation_count: 0,
            submitted_by: format!("reporter-{}", id),
            needs_manual_triage: false,
            created_at,
            updated_at: created_at,
        }
    }
}
