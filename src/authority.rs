//! HTTP key authority.
//!
//! Serves the batch endpoint that [`HttpKeySource`](crate::keygen::HttpKeySource)
//! consumes, backed by any [`KeyBatchSource`]. The `serve` command runs it
//! over a [`LocalKeySource`](crate::keygen::LocalKeySource) so several
//! processes can share one disjoint key stream during development.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/keys` | Issue `count` fresh keys (`1..=max_batch`) |
//! | `GET` | `/health` | Liveness probe |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::config::AuthorityConfig;
use crate::keygen::KeyBatchSource;
use crate::keygen::http::{FetchKeysRequest, FetchKeysResponse};
use crate::{Error, Result};

#[derive(Clone)]
struct AuthorityState {
    source: Arc<dyn KeyBatchSource>,
    max_batch: usize,
}

/// Build the authority routes.
pub fn router(source: Arc<dyn KeyBatchSource>, max_batch: usize) -> Router {
    Router::new()
        .route("/keys", post(issue_keys))
        .route("/health", get(health))
        .with_state(AuthorityState { source, max_batch })
}

/// Bind and serve until Ctrl+C / SIGTERM.
pub async fn serve(config: &AuthorityConfig, source: Arc<dyn KeyBatchSource>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Config(format!("invalid authority address: {e}")))?;

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, max_batch = config.max_batch, "Key authority listening");

    axum::serve(listener, router(source, config.max_batch))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Key authority stopped");
    Ok(())
}

/// `POST /keys`: issue a batch of fresh keys.
async fn issue_keys(
    State(state): State<AuthorityState>,
    Json(body): Json<FetchKeysRequest>,
) -> Response {
    if body.count == 0 || body.count > state.max_batch {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_count",
            &format!("count must be between 1 and {}", state.max_batch),
        );
    }

    match state.source.fetch_batch(body.count).await {
        Ok(keys) => Json(FetchKeysResponse { keys }).into_response(),
        Err(e) => {
            warn!(error = %e, count = body.count, "Key batch request failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "source_unavailable", &e.to_string())
        }
    }
}

/// `GET /health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({"error": error, "message": message})),
    )
        .into_response()
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
