//! Liveness / readiness endpoints served next to the webhook.

use std::{sync::Arc, time::Instant};

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    started: Instant,
}

impl HealthState {
    pub fn new(started: Instant) -> Self {
        Self { started }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    /// RFC 3339, UTC.
    pub timestamp: String,
    /// Seconds since startup.
    pub uptime: f64,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub ready: bool,
}

/// `GET /health` and `GET /ready`.
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(Arc::new(state))
}

async fn health(State(state): State<Arc<HealthState>>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: state.started.elapsed().as_secs_f64(),
    })
}

async fn ready() -> Json<Readiness> {
    Json(Readiness { ready: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn health_reports_status_and_uptime() {
        let started = Instant::now() - Duration::from_secs(2);
        let Json(report) = health(State(Arc::new(HealthState::new(started)))).await;
        let body = serde_json::to_value(&report).unwrap();

        assert_eq!(body["status"], "ok");
        assert!(body["uptime"].as_f64().unwrap() >= 2.0);
        let ts = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn ready_is_static() {
        let Json(body) = ready().await;
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({ "ready": true }));
    }
}
