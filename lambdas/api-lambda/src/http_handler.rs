use civic_shared::responses::{error_response, not_found};
use civic_shared::{complaints, directory, s3, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::sync::Arc;

/// Main Lambda handler - routes HTTP requests
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("Civic API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET,POST,OPTIONS")
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type,Authorization,X-User-Id",
            )
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    // Identity comes from the JWT authorizer; X-User-Id is a local development override
    let Some(user_id) = requester_id(&event) else {
        tracing::warn!("Rejecting {} {} without identity", method, path);
        return error_response(StatusCode::UNAUTHORIZED, "Missing user identity");
    };

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, parts.as_slice()) {
        // --- COMPLAINTS ---
        // POST /complaints - submit complaint
        (&Method::POST, ["complaints"]) => {
            complaints::submit_complaint(&state, &user_id, body).await
        }
        // GET /complaints/{id}
        (&Method::GET, ["complaints", complaint_id]) => {
            complaints::get_complaint(&state, complaint_id).await
        }
        // GET /complaints/{id}/assignments
        (&Method::GET, ["complaints", complaint_id, "assignments"]) => {
            complaints::list_assignments(&state, complaint_id).await
        }
        // GET /complaints/{id}/history
        (&Method::GET, ["complaints", complaint_id, "history"]) => {
            complaints::list_history(&state, complaint_id).await
        }
        // POST /complaints/{id}/validate - community corroboration
        (&Method::POST, ["complaints", complaint_id, "validate"]) => {
            complaints::validate_complaint(&state, complaint_id, &user_id).await
        }

        // --- UPLOADS ---
        (&Method::POST, ["uploads", "photo"]) => {
            s3::generate_photo_upload_url(
                &state.s3_client,
                &state.config.photo_bucket,
                &user_id,
                body,
            )
            .await
        }

        // --- DIRECTORY ---
        (_, ["zones"]) => directory::handle_zones(state.store.as_ref(), method, body).await,
        (_, ["departments"]) => {
            directory::handle_departments(
                state.store.as_ref(),
                state.store.as_ref(),
                method,
                body,
            )
            .await
        }

        _ => not_found(),
    }
}

fn requester_id(event: &Request) -> Option<String> {
    event
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            event
                .request_context()
                .authorizer()
                .and_then(|auth| auth.jwt.as_ref())
                .and_then(|jwt| jwt.claims.get("sub"))
                .map(|s| s.to_string())
        })
}
