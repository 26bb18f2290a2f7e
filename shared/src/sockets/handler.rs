use lambda_http::request::RequestContext;
use lambda_http::{http::StatusCode, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;

use super::connections::{remove_connection, save_connection};
use crate::events::user_channel;
use crate::AppState;

/// True for API Gateway WebSocket events.
pub fn is_websocket_event(event: &Request) -> bool {
    matches!(event.request_context_ref(), Some(RequestContext::WebSocket(_)))
        || event.headers().contains_key("connectionid")
}

/// Handle WebSocket events ($connect, $disconnect)
pub async fn handle_websocket_event(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let ws_context = match event.request_context_ref() {
        Some(RequestContext::WebSocket(ctx)) => Some(ctx),
        _ => None,
    };

    // Older integrations pass the connection ID and route key as headers
    let connection_id = ws_context
        .and_then(|ctx| ctx.connection_id.clone())
        .or_else(|| {
            event
                .headers()
                .get("connectionid")
                .or_else(|| event.headers().get("connectionId"))
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let route_key = ws_context
        .and_then(|ctx| ctx.route_key.clone())
        .or_else(|| {
            event
                .headers()
                .get("routekey")
                .or_else(|| event.headers().get("routeKey"))
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| event.uri().path().to_string());

    tracing::info!("WebSocket event: {} for connection: {}", route_key, connection_id);

    match route_key.as_str() {
        "$connect" => handle_connect(&event, &state, &connection_id).await,
        "$disconnect" => handle_disconnect(&state, &connection_id).await,
        _ => {
            // Clients only listen; nothing is accepted on $default
            tracing::warn!("Unsupported WebSocket route: {}", route_key);
            Ok(Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::Empty)
                .map_err(Box::new)?)
        }
    }
}

async fn handle_connect(
    event: &Request,
    state: &AppState,
    connection_id: &str,
) -> Result<Response<Body>, Error> {
    let user_id = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("user_id"))
        .map(|s| s.to_string())
        .or_else(|| {
            event
                .request_context()
                .authorizer()
                .and_then(|auth| auth.jwt.as_ref())
                .and_then(|jwt| jwt.claims.get("sub"))
                .map(|s| s.to_string())
        });

    let Some(user_id) = user_id else {
        tracing::warn!("Rejecting WebSocket connect without identity: {}", connection_id);
        return Ok(Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(Body::Empty)
            .map_err(Box::new)?);
    };

    let channel = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("channel"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| user_channel(&user_id));

    save_connection(
        state.store.client(),
        state.store.table_name(),
        connection_id,
        &user_id,
        &channel,
    )
    .await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(Box::new)?)
}

async fn handle_disconnect(state: &AppState, connection_id: &str) -> Result<Response<Body>, Error> {
    tracing::info!("WebSocket disconnect: {}", connection_id);

    remove_connection(state.store.client(), state.store.table_name(), connection_id).await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(Box::new)?)
}
