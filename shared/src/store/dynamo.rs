use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem, Update};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{
    ComplaintStore, Corroboration, CorroborationKind, CorroborationOutcome, DepartmentDirectory,
    NewComplaint, ZoneDirectory,
};
use crate::error::StoreError;
use crate::types::{
    Assignment, Category, Complaint, ComplaintStatus, Department, GeoPoint, GeoWindow,
    RoutingTier, StatusHistoryEntry, Zone, ZoneBoundary,
};

type Item = HashMap<String, AttributeValue>;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

/// Single-table DynamoDB store.
///
/// | entity     | PK                 | SK                             |
/// |------------|--------------------|--------------------------------|
/// | zone       | `ZONE#{id}`        | `ZONE#{id}`                    |
/// | department | `DEPARTMENT#{id}`  | `DEPARTMENT#{id}`              |
/// | complaint  | `COMPLAINT#{id}`   | `COMPLAINT#{id}`               |
/// | assignment | `COMPLAINT#{id}`   | `ASSIGNMENT#{at}#{id}`         |
/// | history    | `COMPLAINT#{id}`   | `HISTORY#{at}#{id}`            |
/// | validation | `COMPLAINT#{id}`   | `VALIDATION#{user_id}`         |
/// | points     | `USER#{id}`        | `USER#{id}`                    |
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn client(&self) -> &DynamoClient {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Full-table scan with a filter, following `LastEvaluatedKey` until done.
    async fn scan_all(
        &self,
        filter: &str,
        names: &[(&str, &str)],
        values: Vec<(&str, AttributeValue)>,
    ) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut req = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(filter)
                .set_exclusive_start_key(start_key.take());
            for (k, v) in names {
                req = req.expression_attribute_names(*k, *v);
            }
            for (k, v) in &values {
                req = req.expression_attribute_values(*k, v.clone());
            }

            let resp = req.send().await.map_err(|e| backend("scan", e))?;
            items.extend(resp.items().iter().cloned());

            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn query_prefix(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let resp = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
                .expression_attribute_values(":sk_prefix", AttributeValue::S(sk_prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| backend("query", e))?;
            items.extend(resp.items().iter().cloned());

            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }

    fn put(&self, item: Item, condition: Option<&str>) -> Result<TransactWriteItem, StoreError> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .set_condition_expression(condition.map(str::to_string))
            .build()
            .map_err(|e| StoreError::Backend(format!("invalid put: {}", e)))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    async fn transact(&self, items: Vec<TransactWriteItem>) -> Result<(), TransactFailure> {
        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| {
                let failed_conditions: Vec<bool> = match err.as_service_error() {
                    Some(TransactWriteItemsError::TransactionCanceledException(e)) => e
                        .cancellation_reasons()
                        .iter()
                        .map(|r| r.code() == Some(CONDITIONAL_CHECK_FAILED))
                        .collect(),
                    _ => Vec::new(),
                };
                if failed_conditions.iter().any(|failed| *failed) {
                    TransactFailure::Condition(failed_conditions)
                } else {
                    TransactFailure::Store(backend("transact_write_items", err))
                }
            })
    }
}

enum TransactFailure {
    /// Per-item flags, true where that item's condition failed.
    Condition(Vec<bool>),
    Store(StoreError),
}

pub(crate) fn backend<E>(op: &str, err: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::Backend(format!("{} failed: {}", op, DisplayErrorContext(err)))
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed precision keeps lexical order equal to time order.
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

fn get_s<'a>(item: &'a Item, key: &str) -> Option<&'a str> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|v| v.as_str())
}

fn get_n<T: FromStr>(item: &Item, key: &str) -> Option<T> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|v| v.parse().ok())
}

fn get_bool(item: &Item, key: &str) -> bool {
    item.get(key)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false)
}

fn get_ts(item: &Item, key: &str) -> Option<DateTime<Utc>> {
    get_s(item, key)
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|v| v.with_timezone(&Utc))
}

fn item_key(item: &Item) -> String {
    format!(
        "{}/{}",
        get_s(item, "PK").unwrap_or("?"),
        get_s(item, "SK").unwrap_or("?")
    )
}

fn required<T>(item: &Item, key: &str, value: Option<T>) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::corrupt(item_key(item), format!("missing or invalid {}", key)))
}

// ========== ITEM MAPPING ==========

fn complaint_pk(complaint_id: &str) -> String {
    format!("COMPLAINT#{}", complaint_id)
}

fn complaint_to_item(c: &Complaint) -> Item {
    let pk = complaint_pk(&c.complaint_id);
    let mut item = Item::new();
    item.insert("PK".to_string(), s(pk.clone()));
    item.insert("SK".to_string(), s(pk));
    item.insert("entity_type".to_string(), s("complaint"));
    item.insert("complaint_id".to_string(), s(c.complaint_id.clone()));
    item.insert("category".to_string(), s(c.category.as_str()));
    item.insert("description".to_string(), s(c.description.clone()));
    item.insert("latitude".to_string(), n(c.location.latitude));
    item.insert("longitude".to_string(), n(c.location.longitude));
    item.insert("lat_e6".to_string(), n(c.location.lat_e6()));
    item.insert("lng_e6".to_string(), n(c.location.lng_e6()));
    item.insert("priority".to_string(), n(c.priority));
    item.insert("status".to_string(), s(c.status.as_str()));
    item.insert("sla_deadline".to_string(), s(timestamp(c.sla_deadline)));
    item.insert("sla_breached".to_string(), AttributeValue::Bool(c.sla_breached));
    item.insert("duplicate_count".to_string(), n(c.duplicate_count));
    item.insert("validation_count".to_string(), n(c.validation_count));
    item.insert("submitted_by".to_string(), s(c.submitted_by.clone()));
    item.insert(
        "needs_manual_triage".to_string(),
        AttributeValue::Bool(c.needs_manual_triage),
    );
    item.insert("created_at".to_string(), s(timestamp(c.created_at)));
    item.insert("updated_at".to_string(), s(timestamp(c.updated_at)));
    if let Some(address) = &c.address {
        item.insert("address".to_string(), s(address.clone()));
    }
    if let Some(photo_url) = &c.photo_url {
        item.insert("photo_url".to_string(), s(photo_url.clone()));
    }
    if let Some(department_id) = &c.assigned_department_id {
        item.insert("assigned_department_id".to_string(), s(department_id.clone()));
    }
    item
}

fn complaint_from_item(item: &Item) -> Result<Complaint, StoreError> {
    Ok(Complaint {
        complaint_id: required(item, "complaint_id", get_s(item, "complaint_id"))?.to_string(),
        category: required(item, "category", get_s(item, "category").and_then(Category::parse))?,
        description: get_s(item, "description").unwrap_or_default().to_string(),
        location: GeoPoint::new(
            required(item, "latitude", get_n(item, "latitude"))?,
            required(item, "longitude", get_n(item, "longitude"))?,
        ),
        address: get_s(item, "address").map(str::to_string),
        photo_url: get_s(item, "photo_url").map(str::to_string),
        priority: required(item, "priority", get_n(item, "priority"))?,
        status: required(item, "status", get_s(item, "status").and_then(ComplaintStatus::parse))?,
        assigned_department_id: get_s(item, "assigned_department_id").map(str::to_string),
        sla_deadline: required(item, "sla_deadline", get_ts(item, "sla_deadline"))?,
        sla_breached: get_bool(item, "sla_breached"),
        duplicate_count: get_n(item, "duplicate_count").unwrap_or(0),
        validation_count: get_n(item, "validation_count").unwrap_or(0),
        submitted_by: get_s(item, "submitted_by").unwrap_or_default().to_string(),
        needs_manual_triage: get_bool(item, "needs_manual_triage"),
        created_at: required(item, "created_at", get_ts(item, "created_at"))?,
        updated_at: required(item, "updated_at", get_ts(item, "updated_at"))?,
    })
}

fn assignment_to_item(a: &Assignment) -> Item {
    let mut item = Item::new();
    item.insert("PK".to_string(), s(complaint_pk(&a.complaint_id)));
    item.insert(
        "SK".to_string(),
        s(format!("ASSIGNMENT#{}#{}", timestamp(a.assigned_at), a.assignment_id)),
    );
    item.insert("entity_type".to_string(), s("assignment"));
    item.insert("assignment_id".to_string(), s(a.assignment_id.clone()));
    item.insert("complaint_id".to_string(), s(a.complaint_id.clone()));
    item.insert("department_id".to_string(), s(a.department_id.clone()));
    item.insert("department_name".to_string(), s(a.department_name.clone()));
    item.insert("routing_tier".to_string(), s(a.routing_tier.as_str()));
    item.insert("note".to_string(), s(a.note.clone()));
    item.insert("active".to_string(), AttributeValue::Bool(a.active));
    item.insert("assigned_at".to_string(), s(timestamp(a.assigned_at)));
    item
}

fn assignment_from_item(item: &Item) -> Result<Assignment, StoreError> {
    Ok(Assignment {
        assignment_id: required(item, "assignment_id", get_s(item, "assignment_id"))?.to_string(),
        complaint_id: required(item, "complaint_id", get_s(item, "complaint_id"))?.to_string(),
        department_id: required(item, "department_id", get_s(item, "department_id"))?.to_string(),
        department_name: get_s(item, "department_name").unwrap_or_default().to_string(),
        routing_tier: required(
            item,
            "routing_tier",
            get_s(item, "routing_tier").and_then(RoutingTier::parse),
        )?,
        note: get_s(item, "note").unwrap_or_default().to_string(),
        active: get_bool(item, "active"),
        assigned_at: required(item, "assigned_at", get_ts(item, "assigned_at"))?,
    })
}

fn history_to_item(h: &StatusHistoryEntry) -> Item {
    let mut item = Item::new();
    item.insert("PK".to_string(), s(complaint_pk(&h.complaint_id)));
    item.insert(
        "SK".to_string(),
        s(format!("HISTORY#{}#{}", timestamp(h.changed_at), h.entry_id)),
    );
    item.insert("entity_type".to_string(), s("status_history"));
    item.insert("entry_id".to_string(), s(h.entry_id.clone()));
    item.insert("complaint_id".to_string(), s(h.complaint_id.clone()));
    item.insert("status".to_string(), s(h.status.as_str()));
    item.insert("changed_by".to_string(), s(h.changed_by.clone()));
    item.insert("changed_at".to_string(), s(timestamp(h.changed_at)));
    if let Some(note) = &h.note {
        item.insert("note".to_string(), s(note.clone()));
    }
    item
}

fn history_from_item(item: &Item) -> Result<StatusHistoryEntry, StoreError> {
    Ok(StatusHistoryEntry {
        entry_id: required(item, "entry_id", get_s(item, "entry_id"))?.to_string(),
        complaint_id: required(item, "complaint_id", get_s(item, "complaint_id"))?.to_string(),
        status: required(item, "status", get_s(item, "status").and_then(ComplaintStatus::parse))?,
        changed_by: get_s(item, "changed_by").unwrap_or("system").to_string(),
        note: get_s(item, "note").map(str::to_string),
        changed_at: required(item, "changed_at", get_ts(item, "changed_at"))?,
    })
}

fn zone_from_item(item: &Item) -> Result<Zone, StoreError> {
    let boundary: ZoneBoundary = get_s(item, "boundary")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .ok_or_else(|| StoreError::corrupt(item_key(item), "missing or invalid boundary"))?;
    Ok(Zone {
        zone_id: required(item, "zone_id", get_s(item, "zone_id"))?.to_string(),
        name: required(item, "name", get_s(item, "name"))?.to_string(),
        boundary,
        is_default: get_bool(item, "is_default"),
        created_at: get_ts(item, "created_at").unwrap_or_default(),
    })
}

fn department_from_item(item: &Item) -> Result<Department, StoreError> {
    Ok(Department {
        department_id: required(item, "department_id", get_s(item, "department_id"))?.to_string(),
        name: required(item, "name", get_s(item, "name"))?.to_string(),
        zone_id: get_s(item, "zone_id").map(str::to_string),
        created_at: get_ts(item, "created_at").unwrap_or_default(),
    })
}

/// Corrupt rows are skipped with a warning so one bad item cannot take the
/// whole directory or sweep down.
fn parse_all<T>(items: &[Item], parse: fn(&Item) -> Result<T, StoreError>) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match parse(item) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Skipping unreadable item: {}", e);
                None
            }
        })
        .collect()
}

// ========== DIRECTORIES ==========

#[async_trait]
impl ZoneDirectory for DynamoStore {
    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError> {
        let items = self
            .scan_all("entity_type = :type", &[], vec![(":type", s("zone"))])
            .await?;
        Ok(parse_all(&items, zone_from_item))
    }

    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>, StoreError> {
        Ok(self
            .list_zones()
            .await?
            .into_iter()
            .find(|z| z.name.eq_ignore_ascii_case(name)))
    }

    async fn put_zone(&self, zone: &Zone) -> Result<(), StoreError> {
        let pk = format!("ZONE#{}", zone.zone_id);
        let boundary = serde_json::to_string(&zone.boundary)
            .map_err(|e| StoreError::Backend(format!("failed to encode boundary: {}", e)))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", s(pk.clone()))
            .item("SK", s(pk))
            .item("entity_type", s("zone"))
            .item("zone_id", s(zone.zone_id.clone()))
            .item("name", s(zone.name.clone()))
            .item("boundary", s(boundary))
            .item("is_default", AttributeValue::Bool(zone.is_default))
            .item("created_at", s(timestamp(zone.created_at)))
            .send()
            .await
            .map_err(|e| backend("put_item", e))?;
        Ok(())
    }
}

#[async_trait]
impl DepartmentDirectory for DynamoStore {
    async fn list_departments(&self) -> Result<Vec<Department>, StoreError> {
        let items = self
            .scan_all("entity_type = :type", &[], vec![(":type", s("department"))])
            .await?;
        Ok(parse_all(&items, department_from_item))
    }

    async fn list_departments_in_zone(&self, zone_id: &str) -> Result<Vec<Department>, StoreError> {
        let items = self
            .scan_all(
                "entity_type = :type AND zone_id = :zone",
                &[],
                vec![(":type", s("department")), (":zone", s(zone_id))],
            )
            .await?;
        Ok(parse_all(&items, department_from_item))
    }

    async fn put_department(&self, department: &Department) -> Result<(), StoreError> {
        let pk = format!("DEPARTMENT#{}", department.department_id);
        let mut req = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("PK", s(pk.clone()))
            .item("SK", s(pk))
            .item("entity_type", s("department"))
            .item("department_id", s(department.department_id.clone()))
            .item("name", s(department.name.clone()))
            .item("created_at", s(timestamp(department.created_at)));
        if let Some(zone_id) = &department.zone_id {
            req = req.item("zone_id", s(zone_id.clone()));
        }
        req.send().await.map_err(|e| backend("put_item", e))?;
        Ok(())
    }
}

// ========== COMPLAINTS ==========

#[async_trait]
impl ComplaintStore for DynamoStore {
    async fn create_complaint(&self, record: &NewComplaint) -> Result<(), StoreError> {
        let mut items = vec![self.put(
            complaint_to_item(&record.complaint),
            Some("attribute_not_exists(PK)"),
        )?];
        if let Some(assignment) = &record.assignment {
            items.push(self.put(assignment_to_item(assignment), None)?);
        }
        for entry in &record.history {
            items.push(self.put(history_to_item(entry), None)?);
        }

        match self.transact(items).await {
            Ok(()) => Ok(()),
            Err(TransactFailure::Condition(_)) => Err(StoreError::Backend(format!(
                "complaint {} already exists",
                record.complaint.complaint_id
            ))),
            Err(TransactFailure::Store(e)) => Err(e),
        }
    }

    async fn get_complaint(&self, complaint_id: &str) -> Result<Option<Complaint>, StoreError> {
        let pk = complaint_pk(complaint_id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", s(pk.clone()))
            .key("SK", s(pk))
            .send()
            .await
            .map_err(|e| backend("get_item", e))?;

        result.item().map(complaint_from_item).transpose()
    }

    async fn find_open_in_window(
        &self,
        window: &GeoWindow,
        category: Option<Category>,
    ) -> Result<Vec<Complaint>, StoreError> {
        let mut filter = String::from(
            "entity_type = :type AND #status <> :resolved \
             AND lat_e6 BETWEEN :min_lat AND :max_lat \
             AND lng_e6 BETWEEN :min_lng AND :max_lng",
        );
        let mut values = vec![
            (":type", s("complaint")),
            (":resolved", s(ComplaintStatus::Resolved.as_str())),
            (":min_lat", n(window.min_lat_e6)),
            (":max_lat", n(window.max_lat_e6)),
            (":min_lng", n(window.min_lng_e6)),
            (":max_lng", n(window.max_lng_e6)),
        ];
        if let Some(category) = category {
            filter.push_str(" AND category = :category");
            values.push((":category", s(category.as_str())));
        }

        let items = self
            .scan_all(&filter, &[("#status", "status")], values)
            .await?;
        let mut complaints: Vec<Complaint> = parse_all(&items, complaint_from_item)
            .into_iter()
            .filter(|c| c.is_open() && window.contains(c.location))
            .collect();
        complaints.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(complaints)
    }

    async fn record_corroboration(
        &self,
        corroboration: &Corroboration,
    ) -> Result<CorroborationOutcome, StoreError> {
        let pk = complaint_pk(&corroboration.complaint_id);
        let now = timestamp(corroboration.at);
        let kind = match corroboration.kind {
            CorroborationKind::DuplicateReport => "duplicate_report",
            CorroborationKind::Validation => "validation",
        };

        // 1. One validation record per (complaint, user)
        let mut validation = Item::new();
        validation.insert("PK".to_string(), s(pk.clone()));
        validation.insert(
            "SK".to_string(),
            s(format!("VALIDATION#{}", corroboration.user_id)),
        );
        validation.insert("entity_type".to_string(), s("validation"));
        validation.insert("user_id".to_string(), s(corroboration.user_id.clone()));
        validation.insert("kind".to_string(), s(kind));
        validation.insert("created_at".to_string(), s(now.clone()));
        let mut items = vec![self.put(validation, Some("attribute_not_exists(PK)"))?];

        // 2. Bump counters on the complaint
        let mut set = vec![
            "validation_count = if_not_exists(validation_count, :zero) + :one",
            "updated_at = :now",
        ];
        if corroboration.kind == CorroborationKind::DuplicateReport {
            set.push("duplicate_count = if_not_exists(duplicate_count, :zero) + :one");
        }
        let update = Update::builder()
            .table_name(&self.table_name)
            .key("PK", s(pk.clone()))
            .key("SK", s(pk))
            .update_expression(format!("SET {}", set.join(", ")))
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_values(":zero", n(0))
            .expression_attribute_values(":one", n(1))
            .expression_attribute_values(":now", s(now))
            .build()
            .map_err(|e| StoreError::Backend(format!("invalid update: {}", e)))?;
        items.push(TransactWriteItem::builder().update(update).build());

        // 3. Reward points
        if corroboration.reward_points > 0 {
            let user_pk = format!("USER#{}", corroboration.user_id);
            let reward = Update::builder()
                .table_name(&self.table_name)
                .key("PK", s(user_pk.clone()))
                .key("SK", s(user_pk))
                .update_expression("SET #points = if_not_exists(#points, :zero) + :points")
                .expression_attribute_names("#points", "points")
                .expression_attribute_values(":zero", n(0))
                .expression_attribute_values(":points", n(corroboration.reward_points))
                .build()
                .map_err(|e| StoreError::Backend(format!("invalid update: {}", e)))?;
            items.push(TransactWriteItem::builder().update(reward).build());
        }

        match self.transact(items).await {
            Ok(()) => Ok(CorroborationOutcome::Recorded),
            Err(TransactFailure::Condition(failed)) if failed.first() == Some(&true) => {
                Ok(CorroborationOutcome::AlreadyRecorded)
            }
            Err(TransactFailure::Condition(_)) => Err(StoreError::Backend(format!(
                "complaint {} does not exist",
                corroboration.complaint_id
            ))),
            Err(TransactFailure::Store(e)) => Err(e),
        }
    }

    async fn list_breach_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Complaint>, StoreError> {
        let items = self
            .scan_all(
                "entity_type = :type AND #status <> :resolved AND sla_deadline < :now \
                 AND (attribute_not_exists(sla_breached) OR sla_breached = :false)",
                &[("#status", "status")],
                vec![
                    (":type", s("complaint")),
                    (":resolved", s(ComplaintStatus::Resolved.as_str())),
                    (":now", s(timestamp(now))),
                    (":false", AttributeValue::Bool(false)),
                ],
            )
            .await?;
        let mut complaints = parse_all(&items, complaint_from_item);
        complaints.sort_by(|a, b| a.sla_deadline.cmp(&b.sla_deadline));
        Ok(complaints)
    }

    async fn mark_breached(
        &self,
        complaint_id: &str,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, StoreError> {
        let pk = complaint_pk(complaint_id);
        let update = Update::builder()
            .table_name(&self.table_name)
            .key("PK", s(pk.clone()))
            .key("SK", s(pk))
            .update_expression("SET #status = :escalated, sla_breached = :true, updated_at = :now")
            .condition_expression(
                "attribute_exists(PK) AND #status <> :resolved \
                 AND (attribute_not_exists(sla_breached) OR sla_breached = :false)",
            )
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":escalated", s(ComplaintStatus::Escalated.as_str()))
            .expression_attribute_values(":resolved", s(ComplaintStatus::Resolved.as_str()))
            .expression_attribute_values(":true", AttributeValue::Bool(true))
            .expression_attribute_values(":false", AttributeValue::Bool(false))
            .expression_attribute_values(":now", s(timestamp(entry.changed_at)))
            .build()
            .map_err(|e| StoreError::Backend(format!("invalid update: {}", e)))?;

        let items = vec![
            TransactWriteItem::builder().update(update).build(),
            self.put(history_to_item(entry), None)?,
        ];

        match self.transact(items).await {
            Ok(()) => Ok(true),
            Err(TransactFailure::Condition(_)) => Ok(false),
            Err(TransactFailure::Store(e)) => Err(e),
        }
    }

    async fn list_assignments(&self, complaint_id: &str) -> Result<Vec<Assignment>, StoreError> {
        let items = self
            .query_prefix(&complaint_pk(complaint_id), "ASSIGNMENT#")
            .await?;
        Ok(parse_all(&items, assignment_from_item))
    }

    async fn list_history(&self, complaint_id: &str) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let items = self
            .query_prefix(&complaint_pk(complaint_id), "HISTORY#")
            .await?;
        Ok(parse_all(&items, history_from_item))
    }
}
