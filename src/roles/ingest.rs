//! Ingestion boundary: accepts play events over HTTP and forwards them to the durable log.

use crate::config::Settings;
use crate::model::PlayEvent;
use crate::transport::config::connect_options;
use crate::transport::{LogProducer, ProducerBuilder};
use crate::wire;
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

pub const FORWARD_FAILED: &str = "Failed to forward event to Kafka.";
pub const RECEIVED: &str = "Play event received";

#[derive(Clone)]
pub struct IngestState {
    producer: Arc<dyn LogProducer>,
}

impl IngestState {
    pub fn new(producer: Arc<dyn LogProducer>) -> Self {
        Self { producer }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayAccepted {
    pub event_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
        .into_response()
}

pub fn create_router(state: IngestState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/play", post(play_handler))
        .with_state(state)
}

/// Handler for `GET /health` - liveness only, no dependency checks.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Handler for `POST /play` - forward one event to the log.
pub async fn play_handler(
    State(state): State<IngestState>,
    payload: Result<Json<PlayEvent>, JsonRejection>,
) -> Response {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    if let Err(reason) = event.validate() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, reason);
    }

    let forwarded = match wire::encode(&event) {
        Ok(bytes) => state
            .producer
            .send(Some(wire::record_key(&event)), bytes)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match forwarded {
        Ok(()) => (
            StatusCode::CREATED,
            Json(PlayAccepted {
                event_id: event.event_id,
                message: RECEIVED.to_string(),
            }),
        )
            .into_response(),
        Err(cause) => {
            error!(event_id = %event.event_id, error = %cause, "failed to forward event to log");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, FORWARD_FAILED)
        }
    }
}

/// Serve the ingestion API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: IngestState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn run_ingest(settings: Settings) -> Result<()> {
    println!("Starting ingestion API:");
    println!("  Listen: {}", settings.bind_addr());
    println!("  Log backend: {}", settings.log.backend);
    println!("  Topic: {}", settings.log.topic);

    let opts = connect_options(
        &settings.log.bootstrap_servers,
        &settings.log.topic,
        settings.log.producer_opts.clone(),
    );
    let producer: Arc<dyn LogProducer> = ProducerBuilder::connect(settings.log.backend, opts)
        .await
        .map_err(|e| anyhow::Error::msg(format!("log producer connect error: {}", e)))?
        .into();
    if let Err(e) = producer.health_check().await {
        // Not fatal: each request reports its own forward failure
        warn!(error = %e, "durable log not reachable at startup");
    }

    let listener = TcpListener::bind(settings.bind_addr())
        .await
        .with_context(|| format!("bind {}", settings.bind_addr()))?;
    info!(addr = %listener.local_addr()?, "ingestion API listening");

    serve(listener, IngestState::new(producer.clone()), async {
        let _ = signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down ingestion API");
    })
    .await?;

    producer
        .flush(Duration::from_millis(settings.log.flush_timeout_ms))
        .await
        .map_err(|e| anyhow::Error::msg(format!("log flush error: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryLog;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_is_constant() {
        let app = create_router(IngestState::new(Arc::new(MemoryLog::failing())));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn zero_duration_is_unprocessable() {
        let log = MemoryLog::new();
        let app = create_router(IngestState::new(Arc::new(log.clone())));
        let body = r#"{"event_id":"e1","song_id":"s","user_id":"u","location_id":"l",
            "played_at":"2023-01-01T00:00:00Z","play_duration_ms":0,"device_type":"mobile"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/play")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn offsetless_timestamp_is_accepted_as_utc() {
        let log = MemoryLog::new();
        let app = create_router(IngestState::new(Arc::new(log.clone())));
        let body = r#"{"event_id":"e2","song_id":"s","user_id":"u","location_id":"l",
            "played_at":"2023-01-01T00:00:00","play_duration_ms":15000,"device_type":"desktop"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/play")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let records = log.records();
        assert_eq!(records.len(), 1);
        let forwarded = wire::decode(&records[0].payload).unwrap();
        assert_eq!(forwarded.played_at.to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }
}
