//! Liveness and status endpoints.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/ping` | Liveness, always `{"message":"pong"}` |
//! | GET | `/status` | Last successful cycle report, `null` before the first |

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::watch;

use promoter_pipeline::CycleReport;

#[derive(Clone)]
pub struct HealthState {
    pub reports: watch::Receiver<Option<CycleReport>>,
}

pub fn router(reports: watch::Receiver<Option<CycleReport>>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/status", get(status))
        .with_state(HealthState { reports })
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

async fn status(State(state): State<HealthState>) -> Json<Option<CycleReport>> {
    Json(state.reports.borrow().clone())
}
