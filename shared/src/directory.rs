use chrono::{DateTime, Utc};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Response,
};
use serde::de::DeserializeOwned;

use crate::error::IntakeError;
use crate::responses::{error_response, intake_error_response, json_response, method_not_allowed};
use crate::store::{DepartmentDirectory, ZoneDirectory};
use crate::types::{CreateDepartmentRequest, CreateZoneRequest, Department, Zone};

/// At most one default zone, and names are unique case-insensitively.
pub async fn create_zone(
    zones: &dyn ZoneDirectory,
    request: CreateZoneRequest,
    now: DateTime<Utc>,
) -> Result<Zone, IntakeError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(IntakeError::Validation("zone name is required".to_string()));
    }
    if !request.boundary.is_well_formed() {
        return Err(IntakeError::Validation(
            "bounding box must have min <= max on both axes".to_string(),
        ));
    }

    let existing = zones.list_zones().await?;
    if existing.iter().any(|z| z.name.eq_ignore_ascii_case(name)) {
        return Err(IntakeError::Conflict(format!("zone '{}' already exists", name)));
    }
    if request.is_default {
        if let Some(current) = existing.iter().find(|z| z.is_default) {
            return Err(IntakeError::Conflict(format!(
                "zone '{}' is already the default",
                current.name
            )));
        }
    }

    let zone = Zone {
        zone_id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        boundary: request.boundary,
        is_default: request.is_default,
        created_at: now,
    };
    zones.put_zone(&zone).await?;
    tracing::info!("Zone created: {} ({})", zone.name, zone.zone_id);
    Ok(zone)
}

pub async fn create_department(
    zones: &dyn ZoneDirectory,
    departments: &dyn DepartmentDirectory,
    request: CreateDepartmentRequest,
    now: DateTime<Utc>,
) -> Result<Department, IntakeError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(IntakeError::Validation("department name is required".to_string()));
    }

    let zone_id = request
        .zone_id
        .map(|z| z.trim().to_string())
        .filter(|z| !z.is_empty());

    let siblings = match &zone_id {
        Some(zone_id) => {
            if !zones.list_zones().await?.iter().any(|z| &z.zone_id == zone_id) {
                return Err(IntakeError::NotFound(format!("zone {}", zone_id)));
            }
            departments.list_departments_in_zone(zone_id).await?
        }
        None => departments
            .list_departments()
            .await?
            .into_iter()
            .filter(|d| d.zone_id.is_none())
            .collect(),
    };
    if siblings.iter().any(|d| d.name.eq_ignore_ascii_case(name)) {
        return Err(IntakeError::Conflict(format!(
            "department '{}' already exists in this zone",
            name
        )));
    }

    let department = Department {
        department_id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        zone_id,
        created_at: now,
    };
    departments.put_department(&department).await?;
    tracing::info!(
        "Department created: {} ({}) in zone {}",
        department.name,
        department.department_id,
        department.zone_id.as_deref().unwrap_or("city-wide")
    );
    Ok(department)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, String> {
    serde_json::from_slice(body).map_err(|e| format!("Invalid request body: {}", e))
}

/// GET/POST /zones
pub async fn handle_zones(
    zones: &dyn ZoneDirectory,
    method: &Method,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    match method {
        &Method::GET => match zones.list_zones().await {
            Ok(mut list) => {
                list.sort_by(|a, b| a.name.cmp(&b.name));
                json_response(StatusCode::OK, &list)
            }
            Err(e) => intake_error_response(&e.into()),
        },
        &Method::POST => {
            let request = match parse_body(body) {
                Ok(request) => request,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
            };
            match create_zone(zones, request, Utc::now()).await {
                Ok(zone) => json_response(StatusCode::CREATED, &zone),
                Err(e) => intake_error_response(&e),
            }
        }
        _ => method_not_allowed(),
    }
}

/// GET/POST /departments
pub async fn handle_departments(
    zones: &dyn ZoneDirectory,
    departments: &dyn DepartmentDirectory,
    method: &Method,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    match method {
        &Method::GET => match departments.list_departments().await {
            Ok(mut list) => {
                list.sort_by(|a, b| a.name.cmp(&b.name));
                json_response(StatusCode::OK, &list)
            }
            Err(e) => intake_error_response(&e.into()),
        },
        &Method::POST => {
            let request = match parse_body(body) {
                Ok(request) => request,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
            };
            match create_department(zones, departments, request, Utc::now()).await {
                Ok(department) => json_response(StatusCode::CREATED, &department),
                Err(e) => intake_error_response(&e),
            }
        }
        _ => method_not_allowed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{BoundingBox, ZoneBoundary};

    fn zone_request(name: &str, is_default: bool) -> CreateZoneRequest {
        CreateZoneRequest {
            name: name.to_string(),
            boundary: ZoneBoundary::BBox(BoundingBox {
                min_lat: 12.9,
                max_lat: 13.1,
                min_lng: 77.5,
                max_lng: 77.7,
            }),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_only_one_default_zone() {
        let store = MemoryStore::new();
        create_zone(&store, zone_request("City-Wide", true), Utc::now())
            .await
            .unwrap();

        let err = create_zone(&store, zone_request("Other", true), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        create_zone(&store, zone_request("Ward 7", false), Utc::now())
            .await
            .unwrap();
        assert_eq!(store.list_zones().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_inverted_bbox_rejected() {
        let store = MemoryStore::new();
        let mut request = zone_request("Ward 1", false);
        request.boundary = ZoneBoundary::BBox(BoundingBox {
            min_lat: 13.1,
            max_lat: 12.9,
            min_lng: 77.5,
            max_lng: 77.7,
        });
        let err = create_zone(&store, request, Utc::now()).await.unwrap_err();
        assert!(matches!(err, IntakeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_department_name_unique_within_zone() {
        let store = MemoryStore::new();
        let north = create_zone(&store, zone_request("North", false), Utc::now())
            .await
            .unwrap();
        let south = create_zone(&store, zone_request("South", false), Utc::now())
            .await
            .unwrap();

        let request = |name: &str, zone: Option<&Zone>| CreateDepartmentRequest {
            name: name.to_string(),
            zone_id: zone.map(|z| z.zone_id.clone()),
        };

        create_department(&store, &store, request("Roads", Some(&north)), Utc::now())
            .await
            .unwrap();
        create_department(&store, &store, request("Roads", Some(&south)), Utc::now())
            .await
            .unwrap();
        let err = create_department(&store, &store, request("ROADS", Some(&north)), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        create_department(&store, &store, request("General Administration", None), Utc::now())
            .await
            .unwrap();
        let err = create_department(&store, &store, request("general administration", None), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let unknown = CreateDepartmentRequest {
            name: "Parks".to_string(),
            zone_id: Some("z-missing".to_string()),
        };
        let err = create_department(&store, &store, unknown, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
