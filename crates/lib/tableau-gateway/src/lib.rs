//! HTTP message gateway for tableau-mcp.
//!
//! Serves the `introspect` / `execute` protocol on `/messages`, dispatching
//! through the same operation table as the MCP tools. Replies are plain JSON
//! unless the caller sends `Accept: text/event-stream`, in which case the
//! reply is an event stream: a `retry` hint, an `executing` status event for
//! `execute`, then one data event with the response or the error.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::{HeaderMap, StatusCode, header::ACCEPT};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tableau_core::control::{DispatchError, OPERATIONS, Operation};
use tableau_core::error::ValidationError;
use tableau_core::{TableauControlPlane, TableauError};
use tracing::{info, warn};

pub const DEFAULT_GATEWAY_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4010);

/// Reconnect delay advertised at the start of every event stream.
pub const SSE_RETRY: Duration = Duration::from_millis(1000);

const EVENT_STREAM: &str = "text/event-stream";

/// Configuration for the gateway HTTP server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_ADDR)
    }
}

/// Gateway HTTP server wrapper.
pub struct GatewayServer {
    config: GatewayConfig,
    control: Arc<TableauControlPlane>,
}

impl GatewayServer {
    #[must_use]
    pub const fn new(control: Arc<TableauControlPlane>, config: GatewayConfig) -> Self {
        Self { config, control }
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = router(self.control, &self.config);

        info!("tableau-gateway listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Builds the gateway routes over a shared control plane.
#[must_use]
pub fn router(control: Arc<TableauControlPlane>, config: &GatewayConfig) -> Router {
    let state = AppState {
        control,
        request_timeout: config.request_timeout,
    };
    Router::new()
        .route("/health", get(health))
        .route("/messages", post(messages))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
}

#[derive(Clone)]
struct AppState {
    control: Arc<TableauControlPlane>,
    request_timeout: Duration,
}

/// Inbound message; `action` selects the variant.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum Message {
    Introspect,
    Execute {
        tool: String,
        #[serde(default)]
        data: Option<Value>,
    },
}

#[derive(Debug, Serialize)]
struct Reply {
    #[serde(rename = "type")]
    kind: &'static str,
    data: Value,
}

impl Reply {
    const fn response(data: Value) -> Self {
        Self {
            kind: "response",
            data,
        }
    }
}

/// Error payload; `status` and `body` carry the upstream response when there
/// was one.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    status: Option<u16>,
    body: Option<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    upstream_status: Option<u16>,
    upstream_body: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            upstream_status: None,
            upstream_body: None,
        }
    }

    fn payload(self) -> ErrorResponse {
        ErrorResponse {
            error: self.message,
            kind: self.kind,
            status: self.upstream_status,
            body: self.upstream_body,
        }
    }

    fn timeout() -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            "Timeout",
            "gateway request timed out",
        )
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", message)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownOperation(_) => Self::new(
                StatusCode::NOT_FOUND,
                "DispatchError.UnknownOperation",
                err.to_string(),
            ),
            DispatchError::InvalidParams { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                "DispatchError.InvalidParams",
                err.to_string(),
            ),
        }
    }
}

impl From<TableauError> for ApiError {
    fn from(err: TableauError) -> Self {
        let status = match &err {
            TableauError::Validation(ValidationError::BlankInput(_)) => StatusCode::BAD_REQUEST,
            TableauError::Validation(ValidationError::NotFound(_)) => StatusCode::NOT_FOUND,
            TableauError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TableauError::Config(_) | TableauError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TableauError::Auth(_)
            | TableauError::MetadataApi { .. }
            | TableauError::VdsApi { .. }
            | TableauError::Validation(ValidationError::Empty(_))
            | TableauError::Transport { .. }
            | TableauError::Decode { .. } => StatusCode::BAD_GATEWAY,
        };
        Self {
            upstream_status: err.status(),
            upstream_body: err.body().map(str::to_string),
            ..Self::new(status, err.kind(), err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self.payload())).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(message): Json<Message>,
) -> Response {
    let resolved = resolve(message);
    if wants_event_stream(&headers) {
        return event_stream(state, resolved).into_response();
    }
    match respond(&state, resolved).await {
        Ok(data) => Json(Reply::response(data)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains(EVENT_STREAM))
}

/// `Ok(None)` is an introspect request.
fn resolve(message: Message) -> Result<Option<Operation>, ApiError> {
    match message {
        Message::Introspect => Ok(None),
        Message::Execute { tool, data } => Ok(Some(Operation::from_call(&tool, data)?)),
    }
}

async fn respond(
    state: &AppState,
    resolved: Result<Option<Operation>, ApiError>,
) -> Result<Value, ApiError> {
    match resolved? {
        None => Ok(introspect()),
        Some(operation) => execute(state, operation).await,
    }
}

async fn execute(state: &AppState, operation: Operation) -> Result<Value, ApiError> {
    let tool = operation.name();
    let output = tokio::time::timeout(state.request_timeout, state.control.execute(operation))
        .await
        .map_err(|_| ApiError::timeout())?
        .inspect_err(|err| warn!(tool, kind = err.kind(), "gateway execute failed"))?;

    output
        .to_value()
        .map_err(|err| ApiError::internal(err.to_string()))
}

fn event_stream(
    state: AppState,
    resolved: Result<Option<Operation>, ApiError>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static> {
    let mut head = vec![Ok(Event::default().retry(SSE_RETRY))];
    if let Ok(Some(operation)) = &resolved {
        head.push(Event::default().json_data(json!({
            "status": "executing",
            "tool": operation.name(),
        })));
    }
    let outcome = stream::once(async move {
        match respond(&state, resolved).await {
            Ok(data) => Event::default().json_data(Reply::response(data)),
            Err(err) => Event::default().json_data(err.payload()),
        }
    });
    Sse::new(stream::iter(head).chain(outcome))
}

fn introspect() -> Value {
    let tools: Vec<Value> = OPERATIONS
        .iter()
        .map(|spec| {
            json!({
                "name": spec.name,
                "description": spec.description,
                "required": spec.required,
            })
        })
        .collect();
    json!({ "tools": tools })
}
