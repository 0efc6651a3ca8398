//! HTTP transport implementation.
//!
//! REST routes over the live catalogue plus two streaming endpoints:
//! `/stream` (newline-delimited JSON call outcomes) and `/sse/tools`
//! (server-sent events over the tool list).

use std::convert::Infallible;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use bytes::Bytes;
use http::{StatusCode, header};
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use super::{TransportError, TransportResult, config::HttpConfig};
use crate::core::Gateway;
use crate::domains::tools::{CallRequest, ToolDefinition, ToolError};

const NDJSON: &str = "application/x-ndjson";

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Run the HTTP transport.
    pub async fn run(self, gateway: Gateway) -> TransportResult<()> {
        let addr = self.address();
        let app = router(gateway, self.config.enable_cors);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!("Ready - listening on {} (CORS {})", addr, cors_status);
        info!("  → Tools:  GET|POST /tools, POST /tools/reload, GET /tools/{{name}}");
        info!("  → Calls:  POST /call, GET /stream");
        info!("  → SSE:    GET /sse/tools");

        axum::serve(listener, app)
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        Ok(())
    }
}

/// Build the gateway's HTTP router.
pub fn router(gateway: Gateway, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/tools", get(list_tools).post(register_tool))
        .route("/tools/reload", post(reload_tools))
        .route("/tools/{tool_name}", get(get_tool))
        .route("/call", post(call_tool))
        .route("/stream", get(stream_outcomes))
        .route("/sse/tools", get(sse_tools))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway);

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

// ============================================================================
// Errors
// ============================================================================

/// A [`ToolError`] rendered as a JSON error response.
struct ApiError(ToolError);

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ToolError::NotFound(_) => StatusCode::NOT_FOUND,
            ToolError::DuplicateName(_) => StatusCode::CONFLICT,
            ToolError::InvalidDefinition(_) => StatusCode::BAD_REQUEST,
            ToolError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ToolError::PersistenceFailed(_) | ToolError::ExecutionFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Root handler - provides API info.
async fn root_handler(State(gateway): State<Gateway>) -> impl IntoResponse {
    Json(json!({
        "name": gateway.name(),
        "version": gateway.version(),
        "transport": "HTTP",
        "endpoints": {
            "tools": "/tools",
            "reload": "/tools/reload",
            "call": "/call",
            "stream": "/stream",
            "sse": "/sse/tools",
            "health": "/health"
        }
    }))
}

/// Health check endpoint.
async fn health_check(State(gateway): State<Gateway>) -> impl IntoResponse {
    let catalogue = gateway.registry().snapshot();
    Json(json!({
        "status": "healthy",
        "tools": catalogue.len(),
        "generation": catalogue.generation(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_tools(State(gateway): State<Gateway>) -> Json<Vec<ToolDefinition>> {
    Json(gateway.registry().list())
}

#[instrument(skip_all)]
async fn register_tool(
    State(gateway): State<Gateway>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let definition: ToolDefinition = serde_json::from_value(body)
        .map_err(|e| ToolError::invalid_definition(e.to_string()))?;

    let tool = gateway.registry().register(definition, true).await?;
    let name = &tool.definition.name;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Tool '{}' registered", name),
            "id": tool.definition.id,
            "name": name,
        })),
    ))
}

#[instrument(skip_all)]
async fn reload_tools(State(gateway): State<Gateway>) -> Result<impl IntoResponse, ApiError> {
    let count = gateway.registry().reload().await?;
    Ok(Json(json!({
        "message": format!("Reloaded {} tool(s)", count),
        "count": count,
        "generation": gateway.registry().snapshot().generation(),
    })))
}

async fn get_tool(
    State(gateway): State<Gateway>,
    Path(tool_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    gateway
        .registry()
        .lookup(&tool_name)
        .map(|tool| Json(tool.definition.summary()))
        .ok_or_else(|| ToolError::not_found(tool_name).into())
}

#[instrument(skip_all, fields(cid = %request.cid, tool = %request.name))]
async fn call_tool(State(gateway): State<Gateway>, Json(request): Json<CallRequest>) -> impl IntoResponse {
    info!("Call received");
    Json(gateway.dispatcher().invoke(request).await)
}

/// Stream every call outcome as one JSON document per line.
async fn stream_outcomes(State(gateway): State<Gateway>) -> impl IntoResponse {
    let lines = BroadcastStream::new(gateway.events().subscribe()).filter_map(|item| match item {
        Ok(outcome) => match serde_json::to_string(&outcome) {
            Ok(mut line) => {
                line.push('\n');
                Some(Ok::<_, Infallible>(Bytes::from(line)))
            }
            Err(e) => {
                warn!(cid = %outcome.cid, "Failed to encode outcome: {}", e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "Stream subscriber lagged, outcomes dropped");
            None
        }
    });

    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines))
}

/// One `tool` event per definition, then a closing `end` event.
async fn sse_tools(
    State(gateway): State<Gateway>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut events: Vec<Result<Event, Infallible>> = gateway
        .registry()
        .list()
        .iter()
        .filter_map(|definition| match serde_json::to_string(definition) {
            Ok(data) => Some(Ok(Event::default().event("tool").data(data))),
            Err(e) => {
                warn!(tool = %definition.name, "Failed to encode tool: {}", e);
                None
            }
        })
        .collect();
    events.push(Ok(Event::default().event("end").data("done")));

    Sse::new(tokio_stream::iter(events)).keep_alive(KeepAlive::default())
}
