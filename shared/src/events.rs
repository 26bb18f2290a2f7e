use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::types::{Category, Complaint, ComplaintStatus};

pub const ADMINISTRATORS_CHANNEL: &str = "administrators";

pub fn user_channel(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn department_channel(department_id: &str) -> String {
    format!("department:{}", department_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "complaint.created")]
    Created,
    #[serde(rename = "complaint.assigned")]
    Assigned,
    #[serde(rename = "complaint.slaBreached")]
    SlaBreached,
}

/// Message handed to the event channel. Fan-out is the sink's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub complaint_id: String,
    pub title: String,
    pub category: Category,
    pub status: ComplaintStatus,
    pub channel: String,
    pub occurred_at: DateTime<Utc>,
}

impl ComplaintEvent {
    fn new(kind: EventKind, complaint: &Complaint, channel: String, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            complaint_id: complaint.complaint_id.clone(),
            title: complaint.title(),
            category: complaint.category,
            status: complaint.status,
            channel,
            occurred_at: at,
        }
    }

    pub fn created(complaint: &Complaint, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::Created,
            complaint,
            user_channel(&complaint.submitted_by),
            at,
        )
    }

    pub fn assigned(complaint: &Complaint, department_id: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::Assigned,
            complaint,
            department_channel(department_id),
            at,
        )
    }

    pub fn sla_breached(complaint: &Complaint, at: DateTime<Utc>) -> Self {
        Self::new(
            EventKind::SlaBreached,
            complaint,
            ADMINISTRATORS_CHANNEL.to_string(),
            at,
        )
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &ComplaintEvent) -> Result<(), EventError>;
}

/// Publishes and logs a failure. Events are never allowed to fail the caller.
pub async fn emit(sink: &dyn EventSink, event: &ComplaintEvent) {
    if let Err(e) = sink.publish(event).await {
        tracing::warn!(
            "Failed to publish {:?} for complaint {}: {}",
            event.kind,
            event.complaint_id,
            e
        );
    }
}

/// Writes events to the log only. Used when no WebSocket endpoint is configured.
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn publish(&self, event: &ComplaintEvent) -> Result<(), EventError> {
        let json = serde_json::to_string(event).map_err(|e| EventError::Delivery(e.to_string()))?;
        tracing::info!("Event on {}: {}", event.channel, json);
        Ok(())
    }
}

/// Collects events in memory.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<ComplaintEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ComplaintEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn publish(&self, event: &ComplaintEvent) -> Result<(), EventError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| EventError::Delivery("event buffer poisoned".into()))?;
        events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures;
    use crate::types::GeoPoint;

    #[test]
    fn test_event_wire_format() {
        let at = Utc::now();
        let complaint = fixtures::complaint(
            "c-1",
            Category::Road,
            GeoPoint::new(19.07, 72.87),
            ComplaintStatus::Escalated,
            at,
        );

        let json = serde_json::to_value(ComplaintEvent::sla_breached(&complaint, at)).unwrap();
        assert_eq!(json["type"], "complaint.slaBreached");
        assert_eq!(json["complaint_id"], "c-1");
        assert_eq!(json["category"], "ROAD");
        assert_eq!(json["status"], "ESCALATED");
        assert_eq!(json["channel"], "administrators");

        let created = ComplaintEvent::created(&complaint, at);
        assert_eq!(created.channel, "user:reporter-c-1");
        let assigned = ComplaintEvent::assigned(&complaint, "d-roads", at);
        assert_eq!(assigned.channel, "department:d-roads");
    }

    #[tokio::test]
    async fn test_memory_sink_collects() {
        let sink = MemoryEventSink::new();
        let complaint = fixtures::complaint(
            "c-2",
            Category::Water,
            GeoPoint::new(0.0, 0.0),
            ComplaintStatus::Submitted,
            Utc::now(),
        );
        emit(&sink, &ComplaintEvent::created(&complaint, Utc::now())).await;
        emit(&sink, &ComplaintEvent::created(&complaint, Utc::now())).await;
        assert_eq!(sink.count(EventKind::Created), 2);
        assert_eq!(sink.count(EventKind::SlaBreached), 0);
    }
}
