use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::payment_handlers;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(payments_health))
        // Donation flow
        .route("/", post(payment_handlers::initiate_payment))
        .route("/status", get(payment_handlers::check_status))
        .route("/webhook", post(payment_handlers::webhook))
}

async fn payments_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "momo",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["request-to-pay", "status-poll", "webhook"]
    }))
}
