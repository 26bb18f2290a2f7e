use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{
    Assignment, Category, Complaint, Department, GeoWindow, StatusHistoryEntry, Zone,
};

pub mod dynamo;
pub mod memory;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// Read on every call, never cached.
#[async_trait]
pub trait ZoneDirectory: Send + Sync {
    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError>;

    /// Case-insensitive lookup by name.
    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>, StoreError>;

    async fn put_zone(&self, zone: &Zone) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DepartmentDirectory: Send + Sync {
    async fn list_departments(&self) -> Result<Vec<Department>, StoreError>;

    async fn list_departments_in_zone(&self, zone_id: &str) -> Result<Vec<Department>, StoreError>;

    async fn put_department(&self, department: &Department) -> Result<(), StoreError>;
}

/// Everything written when a complaint is created. Persisted atomically.
#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub complaint: Complaint,
    pub assignment: Option<Assignment>,
    pub history: Vec<StatusHistoryEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorroborationKind {
    /// A second report of the same issue folded into the canonical complaint.
    DuplicateReport,
    /// An explicit "I see this too" from the community.
    Validation,
}

#[derive(Debug, Clone)]
pub struct Corroboration {
    pub complaint_id: String,
    pub user_id: String,
    pub kind: CorroborationKind,
    pub reward_points: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorroborationOutcome {
    Recorded,
    /// This user already corroborated the complaint; nothing was changed.
    AlreadyRecorded,
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn create_complaint(&self, record: &NewComplaint) -> Result<(), StoreError>;

    async fn get_complaint(&self, complaint_id: &str) -> Result<Option<Complaint>, StoreError>;

    /// Open (non-RESOLVED) complaints whose coordinate lies inside `window`,
    /// optionally restricted to one category.
    async fn find_open_in_window(
        &self,
        window: &GeoWindow,
        category: Option<Category>,
    ) -> Result<Vec<Complaint>, StoreError>;

    /// Adds one to the validation counter and credits the user, at most once
    /// per user and complaint.
    async fn record_corroboration(
        &self,
        corroboration: &Corroboration,
    ) -> Result<CorroborationOutcome, StoreError>;

    /// Unresolved, not yet breached complaints whose deadline is before `now`.
    async fn list_breach_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Complaint>, StoreError>;

    /// Moves the complaint to ESCALATED, sets the breach flag and appends
    /// `entry`. Returns false when the complaint was already breached or
    /// resolved in the meantime.
    async fn mark_breached(
        &self,
        complaint_id: &str,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, StoreError>;

    async fn list_assignments(&self, complaint_id: &str) -> Result<Vec<Assignment>, StoreError>;

    async fn list_history(&self, complaint_id: &str) -> Result<Vec<StatusHistoryEntry>, StoreError>;
}
