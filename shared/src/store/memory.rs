use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    ComplaintStore, Corroboration, CorroborationKind, CorroborationOutcome, DepartmentDirectory,
    NewComplaint, ZoneDirectory,
};
use crate::error::StoreError;
use crate::types::{
    Assignment, Category, Complaint, ComplaintStatus, Department, GeoWindow, StatusHistoryEntry,
    Zone,
};

#[derive(Default)]
struct MemoryState {
    zones: Vec<Zone>,
    departments: Vec<Department>,
    complaints: HashMap<String, Complaint>,
    assignments: Vec<Assignment>,
    history: Vec<StatusHistoryEntry>,
    validations: HashSet<(String, String)>, // (complaint_id, user_id)
    points: HashMap<String, u64>,
}

/// In-process store with the same semantics as the DynamoDB table.
/// Each method holds the lock for its whole read-then-write.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn points_for(&self, user_id: &str) -> u64 {
        self.state
            .read()
            .await
            .points
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn complaint_count(&self) -> usize {
        self.state.read().await.complaints.len()
    }

    /// Writes a complaint directly, bypassing intake. Used to set up fixtures.
    pub async fn insert_complaint(&self, complaint: Complaint) {
        self.state
            .write()
            .await
            .complaints
            .insert(complaint.complaint_id.clone(), complaint);
    }
}

#[async_trait]
impl ZoneDirectory for MemoryStore {
    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError> {
        Ok(self.state.read().await.zones.clone())
    }

    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .zones
            .iter()
            .find(|z| z.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn put_zone(&self, zone: &Zone) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.zones.retain(|z| z.zone_id != zone.zone_id);
        state.zones.push(zone.clone());
        Ok(())
    }
}

#[async_trait]
impl DepartmentDirectory for MemoryStore {
    async fn list_departments(&self) -> Result<Vec<Department>, StoreError> {
        Ok(self.state.read().await.departments.clone())
    }

    async fn list_departments_in_zone(&self, zone_id: &str) -> Result<Vec<Department>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .departments
            .iter()
            .filter(|d| d.zone_id.as_deref() == Some(zone_id))
            .cloned()
            .collect())
    }

    async fn put_department(&self, department: &Department) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .departments
            .retain(|d| d.department_id != department.department_id);
        state.departments.push(department.clone());
        Ok(())
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    async fn create_complaint(&self, record: &NewComplaint) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let id = &record.complaint.complaint_id;
        if state.complaints.contains_key(id) {
            return Err(StoreError::Backend(format!("complaint {} already exists", id)));
        }
        state.complaints.insert(id.clone(), record.complaint.clone());
        if let Some(assignment) = &record.assignment {
            state.assignments.push(assignment.clone());
        }
        state.history.extend(record.history.iter().cloned());
        Ok(())
    }

    async fn get_complaint(&self, complaint_id: &str) -> Result<Option<Complaint>, StoreError> {
        Ok(self.state.read().await.complaints.get(complaint_id).cloned())
    }

    async fn find_open_in_window(
        &self,
        window: &GeoWindow,
        category: Option<Category>,
    ) -> Result<Vec<Complaint>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Complaint> = state
            .complaints
            .values()
            .filter(|c| c.is_open())
            .filter(|c| category.map_or(true, |cat| c.category == cat))
            .filter(|c| window.contains(c.location))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn record_corroboration(
        &self,
        corroboration: &Corroboration,
    ) -> Result<CorroborationOutcome, StoreError> {
        let mut state = self.state.write().await;
        let key = (
            corroboration.complaint_id.clone(),
            corroboration.user_id.clone(),
        );
        if state.validations.contains(&key) {
            return Ok(CorroborationOutcome::AlreadyRecorded);
        }

        let complaint = state
            .complaints
            .get_mut(&corroboration.complaint_id)
            .ok_or_else(|| {
                StoreError::Backend(format!(
                    "complaint {} does not exist",
                    corroboration.complaint_id
                ))
            })?;
        complaint.validation_count += 1;
        if corroboration.kind == CorroborationKind::DuplicateReport {
            complaint.duplicate_count += 1;
        }
        complaint.updated_at = corroboration.at;

        state.validations.insert(key);
        *state
            .points
            .entry(corroboration.user_id.clone())
            .or_insert(0) += u64::from(corroboration.reward_points);
        Ok(CorroborationOutcome::Recorded)
    }

    async fn list_breach_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Complaint>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Complaint> = state
            .complaints
            .values()
            .filter(|c| c.is_open() && !c.sla_breached && c.sla_deadline < now)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.sla_deadline.cmp(&b.sla_deadline));
        Ok(found)
    }

    async fn mark_breached(
        &self,
        complaint_id: &str,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(complaint) = state.complaints.get_mut(complaint_id) else {
            return Ok(false);
        };
        if complaint.sla_breached || !complaint.is_open() {
            return Ok(false);
        }
        complaint.status = ComplaintStatus::Escalated;
        complaint.sla_breached = true;
        complaint.updated_at = entry.changed_at;
        state.history.push(entry.clone());
        Ok(true)
    }

    async fn list_assignments(&self, complaint_id: &str) -> Result<Vec<Assignment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.complaint_id == complaint_id)
            .cloned()
            .collect())
    }

    async fn list_history(&self, complaint_id: &str) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let state = self.state.read().await;
        let mut entries: Vec<StatusHistoryEntry> = state
            .history
            .iter()
            .filter(|h| h.complaint_id == complaint_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.changed_at.cmp(&b.changed_at));
        Ok(entries)
    }
}
