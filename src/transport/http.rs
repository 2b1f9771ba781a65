//! Streamable HTTP transport: JSON-RPC over `POST /mcp`

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::error::rpc_codes;
use crate::gateway::McpHandler;
use crate::protocol::JsonRpcResponse;
use crate::{Error, Result};

/// Header carrying the MCP session identifier
const SESSION_HEADER: &str = "mcp-session-id";

/// Build the HTTP router
pub fn router(handler: McpHandler, max_body_size: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/mcp", post(mcp_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// Serve MCP over HTTP until Ctrl+C or SIGTERM
pub async fn serve_http(handler: McpHandler, config: &ServerConfig) -> Result<()> {
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
        config.port,
    );
    let listener = TcpListener::bind(addr).await?;

    info!(version = env!("CARGO_PKG_VERSION"), "LimeSurvey MCP server");
    info!(host = %config.host, port = config.port, "Listening");
    info!("  POST http://{}:{}/mcp", config.host, config.port);

    axum::serve(listener, router(handler, config.max_body_size))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /mcp
async fn mcp_handler(
    State(handler): State<McpHandler>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string);

    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            return build_response(
                &JsonRpcResponse::error(None, rpc_codes::PARSE_ERROR, format!("Invalid JSON: {e}")),
                &session_id,
                StatusCode::BAD_REQUEST,
            );
        }
    };

    match handler.handle(message).await {
        Some(response) => build_response(&response, &session_id, StatusCode::OK),
        None => {
            debug!("Notification accepted");
            with_session_header(StatusCode::ACCEPTED.into_response(), &session_id)
        }
    }
}

/// Build an HTTP response with a `mcp-session-id` header and a given status
fn build_response(rpc: &JsonRpcResponse, session_id: &str, status: StatusCode) -> Response {
    with_session_header((status, Json(rpc)).into_response(), session_id)
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SESSION_HEADER), value);
    }
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
