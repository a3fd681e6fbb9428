//! HTTP request handlers for the gateway API.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use gateway_core::{ChatRequest, GatewayError, StreamEvent};
use gateway_providers::ProviderSummary;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApiError,
    extractors::{JsonBody, RequestId},
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.registry.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no providers configured")
    } else {
        (StatusCode::OK, "ready")
    }
}

/// Liveness check endpoint
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.gather();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
}

/// Provider listing
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Providers in configuration order
    pub providers: Vec<ProviderSummary>,
}

/// List providers endpoint
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.registry.list_providers(),
    })
}

/// Query parameters for the model listing
#[derive(Debug, Default, Deserialize)]
pub struct ModelsQuery {
    /// Bypass the catalog cache
    #[serde(default)]
    pub refresh: bool,
}

/// Model listing for one provider
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Bare model names
    pub models: Vec<String>,
    /// Whether the configured fallback list was served
    pub fallback: bool,
}

/// List models endpoint
#[instrument(skip(state))]
pub async fn list_models(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<ModelsResponse>, ApiError> {
    let resolved = state.registry.resolve(&provider, query.refresh).await?;

    if resolved.used_fallback {
        state.metrics.record_catalog_fallback(&provider);
        if let Some(cause) = &resolved.fetch_error {
            debug!(provider = %provider, cause = %cause, "Serving fallback model list");
        }
    }

    if resolved.models.is_empty() {
        return Err(ApiError::not_found(format!(
            "No models found for provider '{provider}'"
        )));
    }

    Ok(Json(ModelsResponse {
        models: resolved.models,
        fallback: resolved.used_fallback,
    }))
}

/// Chat endpoint.
///
/// Answers with a single JSON message, or with server-sent events when the
/// request sets `stream`.
#[instrument(skip(state, body), fields(model = %body.model, stream = body.stream))]
pub async fn chat(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<ChatRequest>,
) -> Result<Response, ApiError> {
    debug!(request_id = %request_id, "Processing chat request");

    if !body.stream {
        let response = state.chat.complete(&body).await?;
        return Ok(Json(response).into_response());
    }

    let prepared = match state.chat.prepare(&body) {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Rejected streaming request");
            return Err(e.into());
        }
    };

    let (tx, mut rx) = mpsc::channel::<StreamEvent>(state.config.server.stream_buffer);
    let service = state.chat.clone();
    tokio::spawn(async move { service.stream(prepared, tx).await });

    let events = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Event::default().json_data(&event);
        }
    };

    info!(request_id = %request_id, "Streaming chat response");
    Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
}

/// WebSocket chat endpoint.
///
/// The first text frame carries the request; streaming is always on.
pub async fn chat_stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let Some(text) = first_text_frame(&mut socket).await else {
        debug!("WebSocket closed before a request arrived");
        return;
    };

    let (tx, mut rx) = mpsc::channel::<StreamEvent>(state.config.server.stream_buffer);

    match serde_json::from_str::<ChatRequest>(&text) {
        Ok(mut request) => {
            request.stream = true;
            match state.chat.prepare(&request) {
                Ok(prepared) => {
                    let service = state.chat.clone();
                    tokio::spawn(async move { service.stream(prepared, tx).await });
                }
                Err(e) => state.chat.reject(&e, &tx).await,
            }
        }
        Err(e) => {
            let error = GatewayError::validation(
                format!("Invalid JSON: {e}"),
                None,
                "invalid_json",
            );
            state.chat.reject(&error, &tx).await;
        }
    }

    while let Some(event) = rx.recv().await {
        let terminal = event.is_terminal();
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode stream unit");
                break;
            }
        };
        if socket.send(Message::Text(payload)).await.is_err() {
            debug!("WebSocket peer went away");
            return;
        }
        if terminal {
            break;
        }
    }

    if let Err(e) = socket.send(Message::Close(None)).await {
        debug!(error = %e, "WebSocket already closed");
    }
}

async fn first_text_frame(socket: &mut WebSocket) -> Option<String> {
    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}
