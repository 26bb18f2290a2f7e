use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::error::IntakeError;
use crate::responses::{error_response, intake_error_response, json_response};
use crate::store::ComplaintStore;
use crate::types::SubmitComplaintRequest;
use crate::AppState;

/// POST /complaints
pub async fn submit_complaint(
    state: &AppState,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let request: SubmitComplaintRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e))
        }
    };

    match state.intake.submit(request, user_id).await {
        Ok(response) if response.is_duplicate => json_response(StatusCode::OK, &response),
        Ok(response) => json_response(StatusCode::CREATED, &response),
        Err(e) => intake_error_response(&e),
    }
}

/// GET /complaints/{id}
pub async fn get_complaint(state: &AppState, complaint_id: &str) -> Result<Response<Body>, Error> {
    match state.store.get_complaint(complaint_id).await {
        Ok(Some(complaint)) => json_response(StatusCode::OK, &complaint),
        Ok(None) => intake_error_response(&IntakeError::NotFound(format!(
            "complaint {}",
            complaint_id
        ))),
        Err(e) => intake_error_response(&e.into()),
    }
}

/// GET /complaints/{id}/assignments
pub async fn list_assignments(
    state: &AppState,
    complaint_id: &str,
) -> Result<Response<Body>, Error> {
    match state.store.list_assignments(complaint_id).await {
        Ok(assignments) => json_response(StatusCode::OK, &assignments),
        Err(e) => intake_error_response(&e.into()),
    }
}

/// GET /complaints/{id}/history
pub async fn list_history(state: &AppState, complaint_id: &str) -> Result<Response<Body>, Error> {
    match state.store.list_history(complaint_id).await {
        Ok(history) => json_response(StatusCode::OK, &history),
        Err(e) => intake_error_response(&e.into()),
    }
}

/// POST /complaints/{id}/validate
pub async fn validate_complaint(
    state: &AppState,
    complaint_id: &str,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    match state.intake.validate(complaint_id, user_id).await {
        Ok(complaint) => json_response(StatusCode::OK, &complaint),
        Err(e) => intake_error_response(&e),
    }
}
