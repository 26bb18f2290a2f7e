use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinates are compared as integer micro-degrees so window bounds are exact.
pub const MICRO_DEGREES_PER_DEGREE: f64 = 1_000_000.0;

pub fn to_micro_degrees(degrees: f64) -> i64 {
    (degrees * MICRO_DEGREES_PER_DEGREE).round() as i64
}

// ========== GEO ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn lat_e6(&self) -> i64 {
        to_micro_degrees(self.latitude)
    }

    pub fn lng_e6(&self) -> i64 {
        to_micro_degrees(self.longitude)
    }
}

/// Square window of `half_span` degrees on each axis around a center point.
/// Both edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoWindow {
    pub min_lat_e6: i64,
    pub max_lat_e6: i64,
    pub min_lng_e6: i64,
    pub max_lng_e6: i64,
}

impl GeoWindow {
    pub fn around(center: GeoPoint, half_span_degrees: f64) -> Self {
        let half = to_micro_degrees(half_span_degrees);
        Self {
            min_lat_e6: center.lat_e6() - half,
            max_lat_e6: center.lat_e6() + half,
            min_lng_e6: center.lng_e6() - half,
            max_lng_e6: center.lng_e6() + half,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        let (lat, lng) = (point.lat_e6(), point.lng_e6());
        self.min_lat_e6 <= lat && lat <= self.max_lat_e6 && self.min_lng_e6 <= lng && lng <= self.max_lng_e6
    }
}

// ========== COMPLAINT ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Road,
    Water,
    Garbage,
    Streetlight,
    Sanitation,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Road,
        Category::Water,
        Category::Garbage,
        Category::Streetlight,
        Category::Sanitation,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Road => "ROAD",
            Category::Water => "WATER",
            Category::Garbage => "GARBAGE",
            Category::Streetlight => "STREETLIGHT",
            Category::Sanitation => "SANITATION",
            Category::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Department name a complaint of this category is routed to when the
    /// classifier does not suggest one. `None` means "use the fallback".
    pub fn department_hint(&self) -> Option<&'static str> {
        match self {
            Category::Road => Some("Roads"),
            Category::Water => Some("Water Supply"),
            Category::Garbage => Some("Solid Waste"),
            Category::Streetlight => Some("Street Lighting"),
            Category::Sanitation => Some("Sanitation"),
            Category::Other => None,
        }
    }
}

/// SUBMITTED -> ASSIGNED -> IN_PROGRESS -> RESOLVED, with ESCALATED reachable
/// from any non-resolved state on SLA breach.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    Submitted,
    Assigned,
    InProgress,
    Resolved,
    Escalated,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Submitted => "SUBMITTED",
            ComplaintStatus::Assigned => "ASSIGNED",
            ComplaintStatus::InProgress => "IN_PROGRESS",
            ComplaintStatus::Resolved => "RESOLVED",
            ComplaintStatus::Escalated => "ESCALATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SUBMITTED" => Some(ComplaintStatus::Submitted),
            "ASSIGNED" => Some(ComplaintStatus::Assigned),
            "IN_PROGRESS" => Some(ComplaintStatus::InProgress),
            "RESOLVED" => Some(ComplaintStatus::Resolved),
            "ESCALATED" => Some(ComplaintStatus::Escalated),
            _ => None,
        }
    }

    /// Everything except RESOLVED counts as open, ESCALATED included.
    pub fn is_open(&self) -> bool {
        !matches!(self, ComplaintStatus::Resolved)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Complaint {
    pub complaint_id: String,
    pub category: Category,
    pub description: String,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub photo_url: Option<String>,
    pub priority: u8, // 1..=10
    pub status: ComplaintStatus,
    pub assigned_department_id: Option<String>,
    pub sla_deadline: DateTime<Utc>,
    pub sla_breached: bool,
    pub duplicate_count: u32,
    pub validation_count: u32,
    pub submitted_by: String, // USER id from the identity provider
    pub needs_manual_triage: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Short human title used in events.
    pub fn title(&self) -> String {
        const MAX_CHARS: usize = 80;
        let trimmed = self.description.trim();
        if trimmed.chars().count() <= MAX_CHARS {
            trimmed.to_string()
        } else {
            let mut title: String = trimmed.chars().take(MAX_CHARS - 3).collect();
            title.push_str("...");
            title
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubmitComplaintRequest {
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub photo_url: Option<String>,
    /// Category picked by the citizen; only used by the heuristic classifier.
    pub category: Option<Category>,
}

// ========== ASSIGNMENT ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingTier {
    ExactInZone,
    PartialInZone,
    GlobalFallback,
}

impl RoutingTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingTier::ExactInZone => "exact_in_zone",
            RoutingTier::PartialInZone => "partial_in_zone",
            RoutingTier::GlobalFallback => "global_fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exact_in_zone" => Some(RoutingTier::ExactInZone),
            "partial_in_zone" => Some(RoutingTier::PartialInZone),
            "global_fallback" => Some(RoutingTier::GlobalFallback),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Assignment {
    pub assignment_id: String,
    pub complaint_id: String,
    pub department_id: String,
    pub department_name: String,
    pub routing_tier: RoutingTier,
    pub note: String,
    pub active: bool,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusHistoryEntry {
    pub entry_id: String,
    pub complaint_id: String,
    pub status: ComplaintStatus,
    pub changed_by: String, // USER id or "system"
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    pub fn new(
        complaint_id: &str,
        status: ComplaintStatus,
        changed_by: &str,
        note: Option<String>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            complaint_id: complaint_id.to_string(),
            status,
            changed_by: changed_by.to_string(),
            note,
            changed_at,
        }
    }
}

// ========== ZONE ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn is_well_formed(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lng, self.max_lng]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        let (lat, lng) = (point.lat_e6(), point.lng_e6());
        to_micro_degrees(self.min_lat) <= lat
            && lat <= to_micro_degrees(self.max_lat)
            && to_micro_degrees(self.min_lng) <= lng
            && lng <= to_micro_degrees(self.max_lng)
    }

    /// Area in square micro-degrees.
    pub fn area(&self) -> i128 {
        let height = (to_micro_degrees(self.max_lat) - to_micro_degrees(self.min_lat)) as i128;
        let width = (to_micro_degrees(self.max_lng) - to_micro_degrees(self.min_lng)) as i128;
        height * width
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ZoneBoundary {
    #[serde(rename = "bbox")]
    BBox(BoundingBox),
}

impl ZoneBoundary {
    pub fn contains(&self, point: GeoPoint) -> bool {
        match self {
            ZoneBoundary::BBox(bbox) => bbox.contains(point),
        }
    }

    pub fn area(&self) -> i128 {
        match self {
            ZoneBoundary::BBox(bbox) => bbox.area(),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match self {
            ZoneBoundary::BBox(bbox) => bbox.is_well_formed(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Zone {
    pub zone_id: String,
    pub name: String,
    pub boundary: ZoneBoundary,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateZoneRequest {
    pub name: String,
    pub boundary: ZoneBoundary,
    #[serde(default)]
    pub is_default: bool,
}

// ========== DEPARTMENT ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Department {
    pub department_id: String,
    pub name: String,
    pub zone_id: Option<String>, // None = city-wide
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub zone_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_resolved_is_closed() {
        use ComplaintStatus::*;

        for status in [Submitted, Assigned, InProgress, Escalated] {
            assert!(status.is_open(), "{} should be open", status.as_str());
        }
        assert!(!Resolved.is_open());
    }

    #[test]
    fn test_window_is_inclusive_to_the_micro_degree() {
        let window = GeoWindow::around(GeoPoint::new(12.971600, 77.594600), 0.005);

        assert!(window.contains(GeoPoint::new(12.976600, 77.594600)));
        assert!(window.contains(GeoPoint::new(12.966600, 77.589600)));
        assert!(!window.contains(GeoPoint::new(12.976601, 77.594600)));
        assert!(!window.contains(GeoPoint::new(12.971600, 77.599601)));
    }

    #[test]
    fn test_category_parse_and_hint() {
        assert_eq!(Category::parse("road"), Some(Category::Road));
        assert_eq!(Category::parse(" STREETLIGHT "), Some(Category::Streetlight));
        assert_eq!(Category::parse("potholes"), None);
        assert_eq!(Category::Other.department_hint(), None);
        assert_eq!(
            serde_json::to_string(&Category::Sanitation).unwrap(),
            "\"SANITATION\""
        );
    }

    #[test]
    fn test_zone_boundary_serde() {
        let boundary: ZoneBoundary = serde_json::from_str(
            r#"{"type":"bbox","min_lat":1.0,"max_lat":2.0,"min_lng":3.0,"max_lng":4.0}"#,
        )
        .unwrap();
        assert!(boundary.contains(GeoPoint::new(1.5, 3.5)));
        assert!(boundary.contains(GeoPoint::new(2.0, 4.0)));
        assert!(!boundary.contains(GeoPoint::new(2.1, 3.5)));
    }

    #[test]
    fn test_title_truncates_long_descriptions() {
        let now = Utc::now();
        let complaint = Complaint {
            complaint_id: "c1".into(),
            category: Category::Road,
            description: "x".repeat(200),
            location: GeoPoint::new(0.0, 0.0),
            address: None,
            photo_url: None,
            priority: 5,
            status: ComplaintStatus::Submitted,
            assigned_department_id: None,
            sla_deadline: now,
            sla_breached: false,
            duplicate_count: 0,
            validation_count: 0,
            submitted_by: "u1".into(),
            needs_manual_triage: false,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(complaint.title().chars().count(), 80);
        assert!(complaint.title().ends_with("..."));
    }
}
