//! HTTP surface driving the handshake, one route per step.
//!
//! Successes are `{"message": ...}` with 200, failures `{"error": ...}` with
//! 400. Requests act on the default session unless an `x-session-id` header
//! names another one, opened beforehand through `POST /api/sessions`. An id
//! the registry does not know is a 404.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use kyma_handshake::error::HandshakeError;
use kyma_handshake::protocol::{ConnectionType, HandshakeStep};
use kyma_handshake::session::{SessionId, SessionRegistry, SharedHandshake};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

pub const SESSION_HEADER: &str = "x-session-id";

pub struct AppState {
    pub sessions: SessionRegistry,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("invalid session id: {0}")]
    InvalidSession(String),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("the default session cannot be closed")]
    DefaultSession,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownSession(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub step: HandshakeStep,
    pub connection_type: Option<ConnectionType>,
    pub event_url: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<MessageResponse>, ApiError>;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/callTokenURL", post(call_token_url))
        .route("/api/createSecureConnection", post(create_secure_connection))
        .route("/api/getAppInfo", get(get_app_info))
        .route("/api/sendAPISpec", post(send_api_spec))
        .route("/api/sendEventSpec", post(send_event_spec))
        .route("/orders/sendOrderCreatedEvent", post(send_order_created_event))
        .route("/api/status", get(status))
        .route("/api/sessions", post(open_session))
        .route("/api/sessions/{id}", delete(close_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidSession(raw.to_string()))
}

/// Only the default session comes into existence on first use.
async fn session(state: &AppState, headers: &HeaderMap) -> Result<SharedHandshake, ApiError> {
    let id = match headers.get(SESSION_HEADER) {
        None => SessionId::DEFAULT,
        Some(value) => match value.to_str() {
            Ok(raw) => parse_session_id(raw)?,
            Err(_) => {
                let raw = String::from_utf8_lossy(value.as_bytes()).into_owned();
                return Err(ApiError::InvalidSession(raw));
            }
        },
    };
    if id.is_default() {
        return Ok(state.sessions.get_or_create(id).await?);
    }
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::UnknownSession(id))
}

/// Undecodable certificate material from the platform stops the process.
fn reply(result: kyma_handshake::Result<String>) -> ApiResult {
    match result {
        Ok(message) => Ok(Json(MessageResponse { message })),
        Err(e) if e.is_fatal() => {
            error!(error = %e, "fatal handshake failure, shutting down");
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

async fn call_token_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let session = session(&state, &headers).await?;
    let mut handshake = session.lock().await;
    reply(handshake.redeem_token(&body).await)
}

async fn create_secure_connection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult {
    let session = session(&state, &headers).await?;
    let mut handshake = session.lock().await;
    reply(handshake.establish_secure_channel().await)
}

async fn get_app_info(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult {
    let session = session(&state, &headers).await?;
    let mut handshake = session.lock().await;
    reply(handshake.fetch_app_info().await)
}

async fn send_api_spec(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let session = session(&state, &headers).await?;
    let mut handshake = session.lock().await;
    reply(handshake.register_api_spec(&body).await)
}

async fn send_event_spec(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult {
    let session = session(&state, &headers).await?;
    let mut handshake = session.lock().await;
    reply(handshake.register_event_spec().await)
}

async fn send_order_created_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let session = session(&state, &headers).await?;
    let handshake = session.lock().await;
    reply(handshake.send_order_created_event(&body).await)
}

async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = session(&state, &headers).await?;
    let handshake = session.lock().await;
    Ok(Json(StatusResponse {
        status: handshake.connection_status().to_string(),
        step: handshake.step(),
        connection_type: handshake.connection_type(),
        event_url: handshake.event_url().map(str::to_string),
    }))
}

async fn open_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let (id, _) = state.sessions.create().await?;
    let body = SessionResponse {
        session_id: id.to_string(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

async fn close_session(State(state): State<Arc<AppState>>, Path(raw): Path<String>) -> ApiResult {
    let id = parse_session_id(&raw)?;
    if id.is_default() {
        return Err(ApiError::DefaultSession);
    }
    state
        .sessions
        .remove(id)
        .await
        .ok_or(ApiError::UnknownSession(id))?;
    Ok(Json(MessageResponse {
        message: format!("session {id} closed"),
    }))
}
