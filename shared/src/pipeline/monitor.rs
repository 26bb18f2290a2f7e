use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::StoreError;
use crate::events::{emit, ComplaintEvent, EventSink};
use crate::store::ComplaintStore;
use crate::types::{ComplaintStatus, StatusHistoryEntry};

const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub candidates: usize,
    pub escalated: usize,
    /// Changed by someone else between the query and the write.
    pub skipped: usize,
    pub failed: usize,
}

/// Escalates unresolved complaints past their deadline. The breach flag is set
/// in the same conditional write as the status change, so a second sweep (or
/// a concurrent one) finds nothing left to escalate.
pub struct SlaMonitor {
    complaints: Arc<dyn ComplaintStore>,
    events: Arc<dyn EventSink>,
}

impl SlaMonitor {
    pub fn new(complaints: Arc<dyn ComplaintStore>, events: Arc<dyn EventSink>) -> Self {
        Self { complaints, events }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let candidates = self.complaints.list_breach_candidates(now).await?;
        let mut report = SweepReport {
            candidates: candidates.len(),
            ..SweepReport::default()
        };

        for mut complaint in candidates {
            let entry = StatusHistoryEntry::new(
                &complaint.complaint_id,
                ComplaintStatus::Escalated,
                SYSTEM_ACTOR,
                Some(format!(
                    "SLA deadline {} missed (was {})",
                    complaint.sla_deadline.to_rfc3339(),
                    complaint.status.as_str()
                )),
                now,
            );

            match self.complaints.mark_breached(&complaint.complaint_id, &entry).await {
                Ok(true) => {
                    complaint.status = ComplaintStatus::Escalated;
                    complaint.sla_breached = true;
                    complaint.updated_at = now;
                    tracing::warn!(
                        "Complaint {} breached its SLA ({} overdue), escalated",
                        complaint.complaint_id,
                        format_overdue(now - complaint.sla_deadline)
                    );
                    emit(self.events.as_ref(), &ComplaintEvent::sla_breached(&complaint, now)).await;
                    report.escalated += 1;
                }
                Ok(false) => {
                    tracing::info!(
                        "Complaint {} changed since the query, not escalated",
                        complaint.complaint_id
                    );
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to escalate complaint {}: {}", complaint.complaint_id, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "SLA sweep: {} candidates, {} escalated, {} skipped, {} failed",
            report.candidates,
            report.escalated,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Runs a sweep every `period`, starting immediately. Each sweep runs in
    /// its own task so a panic in one sweep does not stop the schedule.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tracing::info!("Starting SLA monitor, sweeping every {}s", period.as_secs());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let monitor = Arc::clone(&self);
                match tokio::spawn(async move { monitor.sweep(Utc::now()).await }).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::error!("SLA sweep failed: {}", e),
                    Err(e) => tracing::error!("SLA sweep task aborted: {}", e),
                }
            }
        })
    }
}

fn format_overdue(overdue: chrono::Duration) -> String {
    let minutes = overdue.num_minutes().max(0);
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use crate::config::PipelineConfig;
    use crate::events::{EventKind, MemoryEventSink};
    use crate::pipeline::{fixtures, IntakeService};
    use crate::store::{
        Corroboration, CorroborationOutcome, DepartmentDirectory, MemoryStore, NewComplaint,
    };
    use crate::types::{
        Assignment, Category, Complaint, GeoPoint, GeoWindow, SubmitComplaintRequest,
    };

    fn monitor(store: &Arc<MemoryStore>) -> (Arc<SlaMonitor>, Arc<MemoryEventSink>) {
        let events = Arc::new(MemoryEventSink::new());
        (
            Arc::new(SlaMonitor::new(store.clone(), events.clone())),
            events,
        )
    }

    fn point() -> GeoPoint {
        GeoPoint::new(18.5204, 73.8567)
    }

    #[tokio::test]
    async fn test_intake_complaint_breaches_after_49_hours() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_department(&fixtures::department("d-admin", "General Administration", None))
            .await
            .unwrap();
        let (monitor, events) = monitor(&store);
        let intake = IntakeService::new(
            PipelineConfig::default(),
            store.clone(),
            store.clone(),
            store.clone(),
            None,
            events.clone(),
        );

        let created = Utc::now();
        let response = intake
            .submit_at(
                SubmitComplaintRequest {
                    description: "Deep pothole on the main road".to_string(),
                    latitude: 18.5204,
                    longitude: 73.8567,
                    address: None,
                    photo_url: None,
                    category: None,
                },
                "citizen-late",
                created,
            )
            .await
            .unwrap();
        let id = response.complaint.complaint_id.clone();
        assert_eq!(response.complaint.priority, 5);
        assert_eq!(response.complaint.sla_deadline, created + ChronoDuration::hours(48));

        let before = monitor.sweep(created + ChronoDuration::hours(47)).await.unwrap();
        assert_eq!(before.escalated, 0);

        let report = monitor.sweep(created + ChronoDuration::hours(49)).await.unwrap();
        assert_eq!(report.escalated, 1);

        let complaint = store.get_complaint(&id).await.unwrap().unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Escalated);
        assert!(complaint.sla_breached);
        assert_eq!(complaint.sla_deadline, created + ChronoDuration::hours(48));

        let breaches: Vec<_> = events
            .events()
            .into_iter()
            .filter(|e| e.kind == EventKind::SlaBreached)
            .collect();
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].complaint_id, id);
        assert_eq!(breaches[0].channel, "administrators");
        assert_eq!(breaches[0].status, ComplaintStatus::Escalated);

        let history = store.list_history(&id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.status, ComplaintStatus::Escalated);
        assert_eq!(last.changed_by, "system");
    }

    /// Resolves every candidate right after it is listed, as an operator
    /// closing the complaint mid-sweep would.
    struct OperatorResolvesStore {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl ComplaintStore for OperatorResolvesStore {
        async fn create_complaint(&self, record: &NewComplaint) -> Result<(), StoreError> {
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
            let candidates = self.inner.list_breach_candidates(now).await?;
            for candidate in &candidates {
                let mut resolved = candidate.clone();
                resolved.status = ComplaintStatus::Resolved;
                self.inner.insert_complaint(resolved).await;
            }
            Ok(candidates)
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

    #[tokio::test]
    async fn test_complaint_resolved_during_sweep_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .insert_complaint(fixtures::complaint(
                "racing",
                Category::Water,
                point(),
                ComplaintStatus::InProgress,
                now - ChronoDuration::days(3),
            ))
            .await;
        let events = Arc::new(MemoryEventSink::new());
        let monitor = SlaMonitor::new(
            Arc::new(OperatorResolvesStore {
                inner: store.clone(),
            }),
            events.clone(),
        );

        let report = monitor.sweep(now).await.unwrap();

        assert_eq!(report.candidates, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.escalated, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(events.count(EventKind::SlaBreached), 0);

        let complaint = store.get_complaint("racing").await.unwrap().unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Resolved);
        assert!(!complaint.sla_breached);
        assert!(store.list_history("racing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        for (id, status) in [
            ("a", ComplaintStatus::Submitted),
            ("b", ComplaintStatus::InProgress),
            ("c", ComplaintStatus::Resolved),
        ] {
            store
                .insert_complaint(fixtures::complaint(
                    id,
                    Category::Road,
                    point(),
                    status,
                    now - ChronoDuration::days(3),
                ))
                .await;
        }
        let (monitor, events) = monitor(&store);

        let first = monitor.sweep(now).await.unwrap();
        let second = monitor.sweep(now).await.unwrap();

        assert_eq!(first.escalated, 2);
        assert_eq!(second.candidates, 0);
        assert_eq!(second.escalated, 0);
        assert_eq!(events.count(EventKind::SlaBreached), 2);

        let resolved = store.get_complaint("c").await.unwrap().unwrap();
        assert_eq!(resolved.status, ComplaintStatus::Resolved);
        assert!(!resolved.sla_breached);
    }

    #[tokio::test]
    async fn test_deadline_exactly_now_is_not_breached() {
        let store = Arc::new(MemoryStore::new());
        let created = Utc::now();
        store
            .insert_complaint(fixtures::complaint(
                "on-time",
                Category::Garbage,
                point(),
                ComplaintStatus::Assigned,
                created,
            ))
            .await;
        let (monitor, _) = monitor(&store);

        let report = monitor.sweep(created + ChronoDuration::hours(48)).await.unwrap();
        assert_eq!(report.candidates, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_monitor_sweeps_on_schedule() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_complaint(fixtures::complaint(
                "overdue",
                Category::Sanitation,
                point(),
                ComplaintStatus::Assigned,
                Utc::now() - ChronoDuration::days(5),
            ))
            .await;
        let (monitor, events) = monitor(&store);

        let handle = monitor.spawn(Duration::from_secs(900));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(events.count(EventKind::SlaBreached), 1);

        // Later ticks find nothing new
        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(events.count(EventKind::SlaBreached), 1);

        handle.abort();
    }

    #[test]
    fn test_format_overdue() {
        assert_eq!(format_overdue(ChronoDuration::minutes(61)), "1h01m");
        assert_eq!(format_overdue(ChronoDuration::minutes(-5)), "0h00m");
    }
}
