//! Switchboard Server
//!
//! HTTP front for a [`Hub`], built with Axum.
//!
//! # Endpoints
//!
//! - `GET /ws` - WebSocket connection attached to the hub
//! - `GET /health` - Hub status
//! - `GET /health/live` - Liveness check

pub mod health;
pub mod ws;

use axum::{routing::get, Router};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::hub::{Hub, HubError};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Build the router with all routes and middleware
pub fn build_router(hub: Hub) -> Router {
    let health_routes = Router::new()
        .route("/live", get(health::liveness))
        .route("/", get(health::full_health));

    Router::new()
        .route("/ws", get(ws::websocket_handler))
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

/// Run the hub and serve it until a shutdown signal arrives
pub async fn serve(hub: Hub, config: &ServerConfig) -> Result<(), ServerError> {
    let router = build_router(hub.clone());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Switchboard listening on {}", addr);

    let runner = hub.clone();
    let hub_task = tokio::spawn(async move { runner.run().await });

    // Upgraded sockets must be closed before the server can drain
    let stopping = hub.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            stopping.shutdown().await;
        })
        .await?;

    hub_task
        .await
        .map_err(|e| ServerError::Internal(format!("Hub task failed: {}", e)))??;

    tracing::info!("Switchboard shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::register_builtin;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let hub = Hub::default();
        register_builtin(&hub).unwrap();
        build_router(hub)
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["connections"], 0);
        assert_eq!(json["processors"], serde_json::json!(["broadcast", "echo"]));
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
