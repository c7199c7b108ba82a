use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use rackbot_sheets::TableBackend;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    backend: Arc<dyn TableBackend>,
    started_at: DateTime<Utc>,
}

impl HealthState {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self { backend, started_at: Utc::now() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub spreadsheet: HealthCheck,
    pub started_at: String,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    backend: Arc<dyn TableBackend>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(event_name = "system.health.start", bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(HealthState::new(backend))).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let spreadsheet = spreadsheet_check(state.backend.as_ref()).await;
    let ready = spreadsheet.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "rackbot-server runtime initialized".to_string(),
        },
        spreadsheet,
        started_at: state.started_at.to_rfc3339(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn spreadsheet_check(backend: &dyn TableBackend) -> HealthCheck {
    match backend.list_tables().await {
        Ok(tables) => HealthCheck {
            status: "ready",
            detail: format!("spreadsheet reachable, {} table(s)", tables.len()),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("spreadsheet unreachable: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::{extract::State, Json};
    use rackbot_sheets::{BackendError, InMemoryTableBackend, TableBackend};
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_spreadsheet_is_reachable() {
        let backend = Arc::new(InMemoryTableBackend::new());
        backend.create_table("AB12").await.expect("create table");

        let (status, Json(payload)) = health(State(HealthState::new(backend))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.spreadsheet.status, "ready");
        assert!(payload.spreadsheet.detail.contains("1 table(s)"));
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_spreadsheet_fails() {
        let backend = Arc::new(InMemoryTableBackend::new());
        backend.fail_next("list_tables", BackendError::Transient("503".to_string())).await;

        let (status, Json(payload)) = health(State(HealthState::new(backend))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.spreadsheet.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_route_serves_json() {
        let app = router(HealthState::new(Arc::new(InMemoryTableBackend::new())));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(payload["status"], "ready");
    }
}
