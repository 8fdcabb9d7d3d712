//! Chronos REST API
//!
//! HTTP API layer for Chronos, built with Axum.
//!
//! # Endpoints
//!
//! ## Search
//! - `GET /search?source=..&contains=..` - Scan all flushed segments
//!
//! ## Ingest
//! - `POST /ingest` - Publish one event to the bus
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use chronos::api::{serve, shutdown_signal, ApiConfig, AppState};
//! use chronos::storage::{open_backend, BackendConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = open_backend(&BackendConfig::local("./data"))?;
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(backend, config.clone());
//!     serve(state, &config, shutdown_signal()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use crate::config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let max_body_size = state.config.max_body_size;

    let api_routes = Router::new()
        .route("/search", get(routes::search::search))
        .route("/ingest", post(routes::ingest::ingest))
        .layer(DefaultBodyLimit::max(max_body_size));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .merge(api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server, stopping once `shutdown` resolves
pub async fn serve<F>(state: AppState, config: &ApiConfig, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    serve_on(listener, state, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve_on<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);

    // Reports the real port when the configured one is 0
    let local_addr = listener.local_addr()?;
    tracing::info!("Chronos API listening on {}", local_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Chronos API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
    use crate::bus::{self, MessageSource};
    use crate::indexer::{FlushPolicy, Indexer};
    use crate::storage::backend::testing::MemoryBackend;
    use crate::storage::{
        BlobBackend, Event, EventPayload, LocalBackend, MemTable, SegmentKeyGenerator,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_serve_on_ephemeral_port() {
        let backend: Arc<dyn BlobBackend> = Arc::new(MemoryBackend::new());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_on(
            listener,
            AppState::new(backend, ApiConfig::default()),
            async move {
                let _ = stop_rx.await;
            },
        ));

        let response = reqwest::get(format!("http://{}/health/live", addr))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    fn create_test_app(backend: Arc<dyn BlobBackend>) -> Router {
        build_router(AppState::new(backend, ApiConfig::default()))
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Three single-event segments: web/"boot ok", web/"disk failure", db/"disk failure"
    async fn seeded_backend(dir: &std::path::Path) -> Arc<dyn BlobBackend> {
        let backend: Arc<dyn BlobBackend> = Arc::new(LocalBackend::new(dir));
        let mut keys = SegmentKeyGenerator::default();
        for (source, message) in [("web", "boot ok"), ("web", "disk failure"), ("db", "disk failure")] {
            let mut table = MemTable::new();
            table.add(Event::new(source, message).timestamp(1_700_000_000_000));
            table.flush(backend.as_ref(), &mut keys).await.unwrap();
        }
        backend
    }

    #[tokio::test]
    async fn test_health_live() {
        let dir = tempdir().unwrap();
        let app = create_test_app(Arc::new(LocalBackend::new(dir.path())));

        let response = get(app, "/health/live").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let dir = tempdir().unwrap();
        let app = create_test_app(Arc::new(LocalBackend::new(dir.path())));

        let response = get(app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_when_backend_down() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_lists.store(true, Ordering::SeqCst);
        let app = create_test_app(backend);

        let response = get(app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_full() {
        let dir = tempdir().unwrap();
        let app = create_test_app(Arc::new(LocalBackend::new(dir.path())));

        let response = get(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "local");
        assert_eq!(body["ingest"], false);
        assert!(body.get("indexer").is_none());
    }

    #[tokio::test]
    async fn test_search_requires_a_filter() {
        let backend = Arc::new(MemoryBackend::new());
        let app = create_test_app(backend.clone());

        let response = get(app.clone(), "/search").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(app, "/search?source=&contains=").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_by_source() {
        let dir = tempdir().unwrap();
        let app = create_test_app(seeded_backend(dir.path()).await);

        let response = get(app, "/search?source=web").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-chronos-unreadable-segments"], "0");

        let body = body_json(response).await;
        let messages: Vec<&str> = body["matches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, vec!["boot ok", "disk failure"]);
        assert_eq!(body["stats"]["scanned_segments"], 3);
        assert_eq!(body["stats"]["scanned_events"], 3);
        assert_eq!(body["stats"]["match_count"], 2);
        assert!(body["stats"]["duration"].is_string());
    }

    #[tokio::test]
    async fn test_search_source_and_contains() {
        let dir = tempdir().unwrap();
        let app = create_test_app(seeded_backend(dir.path()).await);

        let response = get(app, "/search?source=web&contains=failure").await;
        let body = body_json(response).await;
        assert_eq!(
            body["matches"],
            serde_json::json!([{
                "timestamp": "2023-11-14T22:13:20Z",
                "source": "web",
                "message": "disk failure"
            }])
        );
    }

    #[tokio::test]
    async fn test_search_reports_unreadable_segments() {
        let dir = tempdir().unwrap();
        let backend = seeded_backend(dir.path()).await;
        std::fs::write(dir.path().join("segment_1.json.gz"), b"corrupt").unwrap();
        let app = create_test_app(backend);

        let response = get(app, "/search?contains=disk").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-chronos-unreadable-segments"], "1");

        let body = body_json(response).await;
        assert_eq!(body["stats"]["scanned_segments"], 4);
        assert_eq!(body["stats"]["match_count"], 2);
    }

    #[tokio::test]
    async fn test_search_backend_failure() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_lists.store(true, Ordering::SeqCst);
        let app = create_test_app(backend);

        let response = get(app, "/search?source=web").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BACKEND_ERROR");
    }

    #[tokio::test]
    async fn test_ingest_publishes_to_bus() {
        let (producer, mut consumer) = bus::channel(8);
        let state = AppState::new(Arc::new(MemoryBackend::new()), ApiConfig::default())
            .with_ingest(Arc::new(producer));
        let app = build_router(state);

        let response = post_json(app, "/ingest", r#"{"msg": "hello", "source": "web"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());

        let message = consumer.fetch().await.unwrap().unwrap();
        let payload = EventPayload::from_bytes(&message.payload).unwrap();
        assert_eq!(payload.msg, "hello");
        assert_eq!(payload.source, "web");
        assert!(payload.id.is_some_and(|id| !id.is_empty()));
        assert!(payload.ts > 0);
    }

    #[tokio::test]
    async fn test_ingest_keeps_supplied_id_and_timestamp() {
        let (producer, mut consumer) = bus::channel(8);
        let state = AppState::new(Arc::new(MemoryBackend::new()), ApiConfig::default())
            .with_ingest(Arc::new(producer));

        let response = post_json(
            build_router(state),
            "/ingest",
            r#"{"id": "evt-1", "ts": 42, "msg": "m", "source": "s"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let message = consumer.fetch().await.unwrap().unwrap();
        let payload = EventPayload::from_bytes(&message.payload).unwrap();
        assert_eq!(payload.id.as_deref(), Some("evt-1"));
        assert_eq!(payload.ts, 42);
    }

    #[tokio::test]
    async fn test_ingest_invalid_json() {
        let (producer, _consumer) = bus::channel(8);
        let state = AppState::new(Arc::new(MemoryBackend::new()), ApiConfig::default())
            .with_ingest(Arc::new(producer));

        let response = post_json(build_router(state), "/ingest", "not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_bus_closed() {
        let (producer, mut consumer) = bus::channel(8);
        consumer.close();
        let state = AppState::new(Arc::new(MemoryBackend::new()), ApiConfig::default())
            .with_ingest(Arc::new(producer));

        let response = post_json(build_router(state), "/ingest", r#"{"msg": "x"}"#).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_ingest_disabled() {
        let app = create_test_app(Arc::new(MemoryBackend::new()));
        let response = post_json(app, "/ingest", r#"{"msg": "x"}"#).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ingest_then_search() {
        let dir = tempdir().unwrap();
        let backend: Arc<dyn BlobBackend> = Arc::new(LocalBackend::new(dir.path()));
        let (producer, mut consumer) = bus::channel(8);
        let mut indexer = Indexer::new(
            Arc::clone(&backend),
            SegmentKeyGenerator::default(),
            FlushPolicy::new(2).unwrap(),
        );

        let state = AppState::new(Arc::clone(&backend), ApiConfig::default())
            .with_ingest(Arc::new(producer))
            .with_indexer_stats(indexer.stats());
        let app = build_router(state);

        for body in [
            r#"{"msg": "payment accepted", "source": "billing"}"#,
            r#"{"msg": "payment declined", "source": "billing"}"#,
        ] {
            let response = post_json(app.clone(), "/ingest", body).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        // Buffered events are not searchable yet
        let body = body_json(get(app.clone(), "/search?source=billing").await).await;
        assert_eq!(body["stats"]["match_count"], 0);

        for _ in 0..2 {
            let message = consumer.fetch().await.unwrap().unwrap();
            indexer.process(&mut consumer, message).await.unwrap();
        }

        let body = body_json(get(app.clone(), "/search?contains=declined").await).await;
        assert_eq!(body["stats"]["match_count"], 1);
        assert_eq!(body["matches"][0]["source"], "billing");

        let health = body_json(get(app, "/health").await).await;
        assert_eq!(health["ingest"], true);
        assert_eq!(health["indexer"]["events_indexed"], 2);
        assert_eq!(health["indexer"]["flushes"], 1);
    }
}
