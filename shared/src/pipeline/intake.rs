use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::classification::{Classification, ClassificationAdapter, ClassificationRequest, Classifier};
use super::duplicates::DuplicateDetector;
use super::geo_risk::GeoRiskScorer;
use super::routing::{DepartmentRouter, RoutingDecision};
use super::sla::{compute_sla_deadline, final_priority};
use super::zones::ZoneResolver;
use crate::config::PipelineConfig;
use crate::error::IntakeError;
use crate::events::{emit, ComplaintEvent, EventSink};
use crate::store::{
    ComplaintStore, Corroboration, CorroborationKind, CorroborationOutcome, DepartmentDirectory,
    NewComplaint, ZoneDirectory,
};
use crate::types::{
    Assignment, Complaint, ComplaintStatus, GeoPoint, StatusHistoryEntry, SubmitComplaintRequest,
};

const MAX_DESCRIPTION_CHARS: usize = 2_000;
const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeResponse {
    pub is_duplicate: bool,
    pub complaint: Complaint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub manual_queue: bool,
}

/// Runs one submission through the pipeline and persists the result.
pub struct IntakeService {
    config: PipelineConfig,
    complaints: Arc<dyn ComplaintStore>,
    events: Arc<dyn EventSink>,
    zones: ZoneResolver,
    classifier: ClassificationAdapter,
    duplicates: DuplicateDetector,
    geo_risk: GeoRiskScorer,
    router: DepartmentRouter,
}

impl IntakeService {
    pub fn new(
        config: PipelineConfig,
        zones: Arc<dyn ZoneDirectory>,
        departments: Arc<dyn DepartmentDirectory>,
        complaints: Arc<dyn ComplaintStore>,
        classifier: Option<Arc<dyn Classifier>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            zones: ZoneResolver::new(zones, config.default_zone_name.clone()),
            classifier: ClassificationAdapter::new(classifier, config.classifier_timeout),
            duplicates: DuplicateDetector::new(complaints.clone()),
            geo_risk: GeoRiskScorer::new(complaints.clone()),
            router: DepartmentRouter::new(departments, config.fallback_department_name.clone()),
            config,
            complaints,
            events,
        }
    }

    pub async fn submit(
        &self,
        request: SubmitComplaintRequest,
        submitter: &str,
    ) -> Result<IntakeResponse, IntakeError> {
        self.submit_at(request, submitter, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        request: SubmitComplaintRequest,
        submitter: &str,
        now: DateTime<Utc>,
    ) -> Result<IntakeResponse, IntakeError> {
        let location = validate_request(&request)?;

        let zone = self.zones.resolve(location).await;

        let classification = self
            .classifier
            .classify(&ClassificationRequest {
                description: request.description.trim().to_string(),
                photo_url: request.photo_url.clone(),
                location,
                category_hint: request.category,
            })
            .await;

        let duplicate = match self
            .duplicates
            .find_duplicate(classification.category, location)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Duplicate check failed, treating as new complaint: {}", e);
                None
            }
        };
        if let Some(canonical) = duplicate {
            return self.fold_duplicate(canonical, submitter, classification, now).await;
        }

        let risk = self.geo_risk.score(location).await;
        let priority = final_priority(classification.priority_score, risk.bonus);
        let sla_deadline = compute_sla_deadline(priority, now);

        let predicted = self.predicted_department(&classification);
        let decision = self.router.route(Some(&predicted), zone.as_ref()).await;

        tracing::info!(
            "Triaged submission from {}: category {}, priority {} (classifier {}, geo +{} from {} nearby), zone {}",
            submitter,
            classification.category.as_str(),
            priority,
            classification.priority_score,
            risk.bonus,
            risk.nearby_open,
            zone.as_ref().map(|z| z.name.as_str()).unwrap_or("none"),
        );

        let complaint = Complaint {
            complaint_id: uuid::Uuid::new_v4().to_string(),
            category: classification.category,
            description: request.description.trim().to_string(),
            location,
            address: request.address.clone().filter(|a| !a.trim().is_empty()),
            photo_url: request.photo_url.clone().filter(|p| !p.trim().is_empty()),
            priority,
            status: ComplaintStatus::Submitted,
            assigned_department_id: None,
            sla_deadline,
            sla_breached: false,
            duplicate_count: 0,
            validation_count: 0,
            submitted_by: submitter.to_string(),
            needs_manual_triage: false,
            created_at: now,
            updated_at: now,
        };

        let record = build_record(complaint, decision, submitter, now);
        let created = self.complaints.create_complaint(&record).await;
        let (record, manual_queue) = match created {
            Ok(()) => (record, false),
            Err(e) => {
                tracing::error!(
                    "Failed to persist complaint {}, retrying as manual triage: {}",
                    record.complaint.complaint_id,
                    e
                );
                let fallback = manual_queue_record(record.complaint, submitter, now);
                match self.complaints.create_complaint(&fallback).await {
                    Ok(()) => (fallback, true),
                    Err(retry_err) => {
                        // The first write may have committed before its error came back
                        match self.stored_record(&fallback.complaint.complaint_id).await {
                            Some(stored) => {
                                tracing::warn!(
                                    "Complaint {} was already stored, using the committed record",
                                    stored.complaint.complaint_id
                                );
                                (stored, false)
                            }
                            None => return Err(retry_err.into()),
                        }
                    }
                }
            }
        };

        let NewComplaint {
            complaint,
            assignment,
            ..
        } = record;

        tracing::info!(
            "Complaint {} created ({}), deadline {}",
            complaint.complaint_id,
            complaint.status.as_str(),
            complaint.sla_deadline.to_rfc3339()
        );

        emit(self.events.as_ref(), &ComplaintEvent::created(&complaint, now)).await;
        if let Some(assignment) = &assignment {
            emit(
                self.events.as_ref(),
                &ComplaintEvent::assigned(&complaint, &assignment.department_id, now),
            )
            .await;
        }

        Ok(IntakeResponse {
            is_duplicate: false,
            complaint,
            assignment,
            classification: Some(classification),
            manual_queue,
        })
    }

    pub async fn validate(&self, complaint_id: &str, user_id: &str) -> Result<Complaint, IntakeError> {
        self.validate_at(complaint_id, user_id, Utc::now()).await
    }

    /// Explicit community corroboration of an existing complaint.
    pub async fn validate_at(
        &self,
        complaint_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Complaint, IntakeError> {
        let complaint = self
            .complaints
            .get_complaint(complaint_id)
            .await?
            .ok_or_else(|| IntakeError::NotFound(format!("complaint {}", complaint_id)))?;

        if complaint.status == ComplaintStatus::Resolved {
            return Err(IntakeError::Conflict(format!(
                "complaint {} is already resolved",
                complaint_id
            )));
        }
        if complaint.submitted_by == user_id {
            return Err(IntakeError::Validation(
                "you cannot validate your own complaint".to_string(),
            ));
        }

        let outcome = self
            .complaints
            .record_corroboration(&Corroboration {
                complaint_id: complaint_id.to_string(),
                user_id: user_id.to_string(),
                kind: CorroborationKind::Validation,
                reward_points: self.config.validation_reward_points,
                at: now,
            })
            .await?;
        if outcome == CorroborationOutcome::AlreadyRecorded {
            return Err(IntakeError::Conflict(format!(
                "complaint {} already validated by this user",
                complaint_id
            )));
        }

        tracing::info!("Complaint {} validated by {}", complaint_id, user_id);
        Ok(self
            .complaints
            .get_complaint(complaint_id)
            .await?
            .unwrap_or(complaint))
    }

    /// Reads back a complaint with its active assignment, if it exists.
    async fn stored_record(&self, complaint_id: &str) -> Option<NewComplaint> {
        let complaint = match self.complaints.get_complaint(complaint_id).await {
            Ok(Some(complaint)) => complaint,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("Failed to re-read complaint {}: {}", complaint_id, e);
                return None;
            }
        };
        let assignment = match self.complaints.list_assignments(complaint_id).await {
            Ok(assignments) => assignments.into_iter().find(|a| a.active),
            Err(e) => {
                tracing::warn!("Failed to read assignments of complaint {}: {}", complaint_id, e);
                None
            }
        };
        Some(NewComplaint {
            complaint,
            assignment,
            history: Vec::new(),
        })
    }

    fn predicted_department(&self, classification: &Classification) -> String {
        classification
            .suggested_department
            .clone()
            .or_else(|| classification.category.department_hint().map(str::to_string))
            .unwrap_or_else(|| self.config.fallback_department_name.clone())
    }

    /// Folds a second report into the canonical complaint. Retrying is safe:
    /// a user corroborates a complaint at most once.
    async fn fold_duplicate(
        &self,
        canonical: Complaint,
        submitter: &str,
        classification: Classification,
        now: DateTime<Utc>,
    ) -> Result<IntakeResponse, IntakeError> {
        let complaint_id = canonical.complaint_id.clone();

        // Same rule as explicit validation: reporters cannot corroborate their
        // own complaint, so the counters stay as they are.
        if canonical.submitted_by == submitter {
            tracing::info!(
                "Submitter {} re-reported their own complaint {}",
                submitter,
                complaint_id
            );
        } else {
            let outcome = self
                .complaints
                .record_corroboration(&Corroboration {
                    complaint_id: complaint_id.clone(),
                    user_id: submitter.to_string(),
                    kind: CorroborationKind::DuplicateReport,
                    reward_points: self.config.validation_reward_points,
                    at: now,
                })
                .await?;
            tracing::info!(
                "Duplicate of complaint {} from {} ({:?})",
                complaint_id,
                submitter,
                outcome
            );
        }

        let complaint = self
            .complaints
            .get_complaint(&complaint_id)
            .await?
            .unwrap_or(canonical);

        Ok(IntakeResponse {
            is_duplicate: true,
            complaint,
            assignment: None,
            classification: Some(classification),
            manual_queue: false,
        })
    }
}

fn validate_request(request: &SubmitComplaintRequest) -> Result<GeoPoint, IntakeError> {
    let description = request.description.trim();
    if description.is_empty() {
        return Err(IntakeError::Validation("description is required".to_string()));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(IntakeError::Validation(format!(
            "description must be at most {} characters",
            MAX_DESCRIPTION_CHARS
        )));
    }

    let location = GeoPoint::new(request.latitude, request.longitude);
    if !location.is_valid() {
        return Err(IntakeError::Validation(format!(
            "invalid coordinate ({}, {})",
            request.latitude, request.longitude
        )));
    }
    Ok(location)
}

fn build_record(
    mut complaint: Complaint,
    decision: RoutingDecision,
    submitter: &str,
    now: DateTime<Utc>,
) -> NewComplaint {
    let mut history = vec![StatusHistoryEntry::new(
        &complaint.complaint_id,
        ComplaintStatus::Submitted,
        submitter,
        None,
        now,
    )];

    let assignment = match (decision.department, decision.tier) {
        (Some(department), Some(tier)) => {
            complaint.status = ComplaintStatus::Assigned;
            complaint.assigned_department_id = Some(department.department_id.clone());
            history.push(StatusHistoryEntry::new(
                &complaint.complaint_id,
                ComplaintStatus::Assigned,
                SYSTEM_ACTOR,
                Some(decision.note.clone()),
                now,
            ));
            Some(Assignment {
                assignment_id: uuid::Uuid::new_v4().to_string(),
                complaint_id: complaint.complaint_id.clone(),
                department_id: department.department_id,
                department_name: department.name,
                routing_tier: tier,
                note: decision.note,
                active: true,
                assigned_at: now,
            })
        }
        _ => {
            complaint.needs_manual_triage = true;
            None
        }
    };

    NewComplaint {
        complaint,
        assignment,
        history,
    }
}

fn manual_queue_record(mut complaint: Complaint, submitter: &str, now: DateTime<Utc>) -> NewComplaint {
    complaint.status = ComplaintStatus::Submitted;
    complaint.assigned_department_id = None;
    complaint.needs_manual_triage = true;

    let history = vec![StatusHistoryEntry::new(
        &complaint.complaint_id,
        ComplaintStatus::Submitted,
        submitter,
        Some("queued for manual triage after a storage failure".to_string()),
        now,
    )];

    NewComplaint {
        complaint,
        assignment: None,
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;

    use crate::error::StoreError;
    use crate::events::{EventKind, MemoryEventSink};
    use crate::pipeline::fixtures;
    use crate::pipeline::geo_risk::GeoRisk;
    use crate::store::MemoryStore;
    use crate::types::{Category, GeoWindow, RoutingTier};

    const LAT: f64 = 12.9716;
    const LNG: f64 = 77.5946;

    struct Harness {
        store: Arc<MemoryStore>,
        events: Arc<MemoryEventSink>,
        service: IntakeService,
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put_zone(&fixtures::zone("z-central", "Central", (12.90, 13.05, 77.50, 77.70), false))
            .await
            .unwrap();
        store
            .put_zone(&fixtures::zone("z-city", "City-Wide", (0.0, 0.0, 0.0, 0.0), true))
            .await
            .unwrap();
        for department in [
            fixtures::department("d-roads", "Roads", Some("z-central")),
            fixtures::department("d-water", "Water Supply", Some("z-central")),
            fixtures::department("d-admin", "General Administration", None),
        ] {
            store.put_department(&department).await.unwrap();
        }
        store
    }

    fn harness_with(store: Arc<MemoryStore>, complaints: Arc<dyn ComplaintStore>) -> Harness {
        let events = Arc::new(MemoryEventSink::new());
        let service = IntakeService::new(
            PipelineConfig::default(),
            store.clone(),
            store.clone(),
            complaints,
            None,
            events.clone(),
        );
        Harness {
            store,
            events,
            service,
        }
    }

    async fn harness() -> Harness {
        let store = seeded_store().await;
        harness_with(store.clone(), store)
    }

    fn request(description: &str, latitude: f64, longitude: f64) -> SubmitComplaintRequest {
        SubmitComplaintRequest {
            description: description.to_string(),
            latitude,
            longitude,
            address: Some("MG Road".to_string()),
            photo_url: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn test_severe_report_in_hot_zone_gets_six_hour_deadline() {
        let h = harness().await;
        let now = Utc::now();
        // Six open ROAD complaints within 1 km but outside the duplicate window
        let offsets = [
            (0.007, 0.0),
            (-0.007, 0.0),
            (0.0, 0.007),
            (0.0, -0.007),
            (0.008, 0.008),
            (-0.008, -0.008),
        ];
        for (i, (dlat, dlng)) in offsets.iter().enumerate() {
            h.store
                .insert_complaint(fixtures::complaint(
                    &format!("near-{}", i),
                    Category::Road,
                    GeoPoint::new(LAT + dlat, LNG + dlng),
                    ComplaintStatus::Assigned,
                    now - Duration::hours(2),
                ))
                .await;
        }

        let response = h
            .service
            .submit_at(
                request("Huge sinkhole opened in the road, cars swerving", LAT, LNG),
                "citizen-1",
                now,
            )
            .await
            .unwrap();

        assert!(!response.is_duplicate);
        let complaint = &response.complaint;
        assert_eq!(complaint.category, Category::Road);
        assert!(complaint.priority >= 9, "priority was {}", complaint.priority);
        assert!(complaint.priority <= 10);
        assert_eq!(complaint.sla_deadline, now + Duration::hours(6));
        assert_eq!(complaint.status, ComplaintStatus::Assigned);

        let assignment = response.assignment.unwrap();
        assert_eq!(assignment.department_id, "d-roads");
        assert_eq!(assignment.routing_tier, RoutingTier::ExactInZone);

        assert_eq!(h.store.complaint_count().await, 7);
        assert_eq!(h.events.count(EventKind::Created), 1);
        assert_eq!(h.events.count(EventKind::Assigned), 1);

        let history = h.store.list_history(&complaint.complaint_id).await.unwrap();
        let statuses: Vec<_> = history.iter().map(|e| e.status).collect();
        assert!(statuses.contains(&ComplaintStatus::Submitted));
        assert!(statuses.contains(&ComplaintStatus::Assigned));
    }

    #[tokio::test]
    async fn test_nearby_same_category_report_is_folded_into_original() {
        let h = harness().await;
        let now = Utc::now();
        h.store
            .insert_complaint(fixtures::complaint(
                "original",
                Category::Road,
                GeoPoint::new(LAT + 0.002, LNG - 0.001),
                ComplaintStatus::Assigned,
                now - Duration::hours(10),
            ))
            .await;

        let response = h
            .service
            .submit_at(request("Deep pothole on the road", LAT, LNG), "citizen-2", now)
            .await
            .unwrap();

        assert!(response.is_duplicate);
        assert_eq!(response.complaint.complaint_id, "original");
        assert_eq!(response.complaint.validation_count, 1);
        assert_eq!(response.complaint.duplicate_count, 1);
        assert_eq!(h.store.complaint_count().await, 1);
        assert_eq!(h.store.points_for("citizen-2").await, 10);
        assert!(h.events.events().is_empty());

        // A retried submission does not count twice
        let retry = h
            .service
            .submit_at(request("Deep pothole on the road", LAT, LNG), "citizen-2", now)
            .await
            .unwrap();
        assert!(retry.is_duplicate);
        assert_eq!(retry.complaint.validation_count, 1);
        assert_eq!(h.store.points_for("citizen-2").await, 10);
    }

    #[tokio::test]
    async fn test_own_duplicate_is_not_rewarded() {
        let h = harness().await;
        let now = Utc::now();
        h.store
            .insert_complaint(fixtures::complaint(
                "mine",
                Category::Road,
                GeoPoint::new(LAT, LNG),
                ComplaintStatus::Submitted,
                now - Duration::hours(1),
            ))
            .await;

        let response = h
            .service
            .submit_at(request("pothole on the road", LAT, LNG), "reporter-mine", now)
            .await
            .unwrap();

        assert!(response.is_duplicate);
        assert_eq!(response.complaint.validation_count, 0);
        assert_eq!(h.store.points_for("reporter-mine").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_area_routes_to_fallback() {
        let h = harness().await;
        let response = h
            .service
            .submit(request("Water pipe leaking", 40.7128, -74.0060), "citizen-3")
            .await
            .unwrap();

        assert_eq!(response.complaint.category, Category::Water);
        let assignment = response.assignment.unwrap();
        assert_eq!(assignment.department_id, "d-admin");
        assert_eq!(assignment.routing_tier, RoutingTier::GlobalFallback);
        assert!(!response.manual_queue);
    }

    #[tokio::test]
    async fn test_missing_fallback_still_creates_complaint() {
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(store.clone(), store);

        let response = h
            .service
            .submit(request("Streetlight flickering all night", LAT, LNG), "citizen-4")
            .await
            .unwrap();

        assert!(response.assignment.is_none());
        assert_eq!(response.complaint.status, ComplaintStatus::Submitted);
        assert!(response.complaint.needs_manual_triage);
        assert_eq!(h.events.count(EventKind::Created), 1);
        assert_eq!(h.events.count(EventKind::Assigned), 0);
    }

    #[tokio::test]
    async fn test_invalid_submission_is_rejected() {
        let h = harness().await;
        let err = h
            .service
            .submit(request("   ", LAT, LNG), "citizen-5")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = h
            .service
            .submit(request("pothole", 91.0, LNG), "citizen-5")
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Validation(_)));
        assert_eq!(h.store.complaint_count().await, 0);
    }

    #[derive(Clone, Copy)]
    enum Fault {
        /// Rejects the first N creates.
        RejectCreates(usize),
        /// Commits the first create but reports it as failed.
        LostCreateAck,
        /// Every window query fails.
        WindowQuery,
    }

    /// Delegates to a [`MemoryStore`] and injects one kind of fault.
    struct FlakyStore {
        inner: Arc<MemoryStore>,
        fault: Fault,
        attempts: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: Arc<MemoryStore>, fault: Fault) -> Self {
            Self {
                inner,
                fault,
                attempts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ComplaintStore for FlakyStore {
        async fn create_complaint(&self, record: &NewComplaint) -> Result<(), StoreError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.fault {
                Fault::RejectCreates(failures) if attempt < failures => {
                    return Err(StoreError::Backend("TransactionCanceledException".into()));
                }
                Fault::LostCreateAck if attempt == 0 => {
                    self.inner.create_complaint(record).await?;
                    return Err(StoreError::Backend("RequestTimeout".into()));
                }
                _ => {}
            }
            self.inner.create_complaint(record).await
        }

        async fn get_complaint(&self, complaint_id: &str) -> Result<Option<Complaint>, StoreError> {
            self.inner.get_complaint(complaint_id).await
        }

        async fn find_open_in_window(
            &self,
            window: &GeoWindow,
            category: Option<Category>,
        ) -> Result<Vec<Complaint>, StoreError> {
            if matches!(self.fault, Fault::WindowQuery) {
                return Err(StoreError::Backend("scan throttled".into()));
            }
            self.inner.find_open_in_window(window, category).await
        }

        async fn record_corroboration(
            &self,
            corroboration: &Corroboration,
        ) -> Result<CorroborationOutcome, StoreError> {
            self.inner.record_corroboration(corroboration).await
        }

        async fn list_breach_candidates(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<Complaint>, StoreError> {
            self.inner.list_breach_candidates(now).await
        }

        async fn mark_breached(
            &self,
            complaint_id: &str,
            entry: &StatusHistoryEntry,
        ) -> Result<bool, StoreError> {
            self.inner.mark_breached(complaint_id, entry).await
        }

        async fn list_assignments(&self, complaint_id: &str) -> Result<Vec<Assignment>, StoreError> {
            self.inner.list_assignments(complaint_id).await
        }

        async fn list_history(
            &self,
            complaint_id: &str,
        ) -> Result<Vec<StatusHistoryEntry>, StoreError> {
            self.inner.list_history(complaint_id).await
        }
    }

    async fn flaky_harness(fault: Fault) -> Harness {
        let store = seeded_store().await;
        let flaky = Arc::new(FlakyStore::new(store.clone(), fault));
        harness_with(store, flaky)
    }

    #[tokio::test]
    async fn test_persistence_failure_falls_back_to_manual_queue() {
        let h = flaky_harness(Fault::RejectCreates(1)).await;

        let response = h
            .service
            .submit(request("Garbage not collected for a week", LAT, LNG), "citizen-6")
            .await
            .unwrap();

        assert!(response.manual_queue);
        assert!(response.assignment.is_none());
        assert_eq!(response.complaint.status, ComplaintStatus::Submitted);
        assert!(response.complaint.needs_manual_triage);
        assert!(response.complaint.assigned_department_id.is_none());
        assert_eq!(h.store.complaint_count().await, 1);
        assert!(h
            .store
            .list_assignments(&response.complaint.complaint_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_persistence_unavailable_is_retryable_error() {
        let h = flaky_harness(Fault::RejectCreates(usize::MAX)).await;

        let err = h
            .service
            .submit(request("Garbage not collected for a week", LAT, LNG), "citizen-7")
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 503);
        assert_eq!(h.store.complaint_count().await, 0);
        assert!(h.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_committed_create_with_lost_ack_is_not_requeued() {
        let h = flaky_harness(Fault::LostCreateAck).await;

        let response = h
            .service
            .submit(request("Garbage not collected for a week", LAT, LNG), "citizen-8")
            .await
            .unwrap();

        assert!(!response.manual_queue);
        assert_eq!(response.complaint.status, ComplaintStatus::Assigned);
        assert!(!response.complaint.needs_manual_triage);
        assert_eq!(response.assignment.unwrap().department_id, "d-admin");
        assert_eq!(h.store.complaint_count().await, 1);
        assert_eq!(h.events.count(EventKind::Created), 1);
        assert_eq!(h.events.count(EventKind::Assigned), 1);
    }

    #[tokio::test]
    async fn test_window_query_failure_scores_zero_and_skips_duplicate_check() {
        let store = seeded_store().await;
        let flaky = Arc::new(FlakyStore::new(store.clone(), Fault::WindowQuery));
        let now = Utc::now();
        // A duplicate if the window query worked
        insert_open_road_complaint(&store, "original", now).await;

        let risk = GeoRiskScorer::new(flaky.clone())
            .score(GeoPoint::new(LAT, LNG))
            .await;
        assert_eq!(risk, GeoRisk { nearby_open: 0, bonus: 0 });

        let h = harness_with(store, flaky);
        let response = h
            .service
            .submit_at(request("Huge sinkhole opened in the road", LAT, LNG), "citizen-9", now)
            .await
            .unwrap();

        assert!(!response.is_duplicate);
        let classification = response.classification.unwrap();
        assert_eq!(response.complaint.priority, classification.priority_score);
        assert_eq!(response.complaint.priority, 8);
        assert_eq!(response.complaint.sla_deadline, now + Duration::hours(24));
        assert_eq!(h.store.complaint_count().await, 2);
    }

    async fn insert_open_road_complaint(store: &MemoryStore, id: &str, now: DateTime<Utc>) {
        store
            .insert_complaint(fixtures::complaint(
                id,
                Category::Road,
                GeoPoint::new(LAT, LNG),
                ComplaintStatus::Assigned,
                now - Duration::hours(3),
            ))
            .await;
    }

    #[tokio::test]
    async fn test_explicit_validation_rules() {
        let h = harness().await;
        let now = Utc::now();
        h.store
            .insert_complaint(fixtures::complaint(
                "open",
                Category::Water,
                GeoPoint::new(LAT, LNG),
                ComplaintStatus::InProgress,
                now,
            ))
            .await;
        h.store
            .insert_complaint(fixtures::complaint(
                "closed",
                Category::Water,
                GeoPoint::new(LAT, LNG),
                ComplaintStatus::Resolved,
                now,
            ))
            .await;

        let updated = h.service.validate_at("open", "neighbour", now).await.unwrap();
        assert_eq!(updated.validation_count, 1);
        assert_eq!(updated.duplicate_count, 0);
        assert_eq!(h.store.points_for("neighbour").await, 10);

        let again = h.service.validate_at("open", "neighbour", now).await.unwrap_err();
        assert_eq!(again.status_code(), 409);

        let own = h.service.validate_at("open", "reporter-open", now).await.unwrap_err();
        assert_eq!(own.status_code(), 400);

        let resolved = h.service.validate_at("closed", "neighbour", now).await.unwrap_err();
        assert_eq!(resolved.status_code(), 409);

        let missing = h.service.validate_at("nope", "neighbour", now).await.unwrap_err();
        assert_eq!(missing.status_code(), 404);
    }
}
