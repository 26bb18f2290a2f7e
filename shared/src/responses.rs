use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::IntakeError;

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(body)?.into())
        .map_err(Box::new)?)
}

pub fn error_response(status: StatusCode, message: &str) -> Result<Response<Body>, Error> {
    json_response(status, &serde_json::json!({ "error": message }))
}

pub fn intake_error_response(err: &IntakeError) -> Result<Response<Body>, Error> {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if err.is_retryable() {
        tracing::error!("Request failed: {}", err);
    }
    json_response(
        status,
        &serde_json::json!({ "error": err.to_string(), "retryable": err.is_retryable() }),
    )
}

pub fn not_found() -> Result<Response<Body>, Error> {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        match response.body() {
            Body::Text(text) => serde_json::from_str(text).unwrap(),
            Body::Binary(bytes) => serde_json::from_slice(bytes).unwrap(),
            Body::Empty => serde_json::Value::Null,
        }
    }

    #[test]
    fn test_intake_error_response_shape() {
        let err = IntakeError::Persistence(StoreError::Backend("timeout".into()));
        let response = intake_error_response(&err).unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(&response);
        assert_eq!(body["retryable"], true);

        let response = intake_error_response(&IntakeError::Conflict("resolved".into())).unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(&response)["error"], "resolved");
    }
}
