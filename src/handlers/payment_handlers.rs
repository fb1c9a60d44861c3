// handlers/payment_handlers.rs
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::errors::{AppError, Result};
use crate::services::payment_service::{PaymentService, WebhookPayload};
use crate::state::AppState;

const WEBHOOK_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    // The UI sends the amount as either a JSON number or a string.
    pub amount: Option<Value>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
}

fn payment_service(state: &AppState) -> Result<&Arc<PaymentService>> {
    state.payment_service.as_ref().ok_or_else(|| {
        error!("Payment service not available");
        AppError::service_unavailable("Mobile money service is not available")
    })
}

fn amount_as_string(amount: &Value) -> Result<String> {
    match amount {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(AppError::invalid_data("amount must be a number")),
    }
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<Json<Value>> {
    let service = payment_service(&state)?;

    let (amount, phone_number) = match (&request.amount, &request.phone_number) {
        (Some(amount), Some(phone_number)) => (amount_as_string(amount)?, phone_number),
        _ => {
            return Err(AppError::invalid_data(
                "amount and phoneNumber are required",
            ))
        }
    };

    let transaction_id = service.initiate_payment(&amount, phone_number).await?;
    info!("Payment initiated: {}", transaction_id);

    Ok(Json(json!({
        "message": "Payment request sent. Check your phone to authorize.",
        "transactionId": transaction_id,
        "success": true,
    })))
}

pub async fn check_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>> {
    let service = payment_service(&state)?;

    let transaction_id = query
        .transaction_id
        .as_deref()
        .ok_or_else(|| AppError::invalid_data("transactionId is required"))?;

    let status = service.check_status(transaction_id).await?;

    Ok(Json(json!({
        "message": "Status fetched",
        "data": status,
        "success": true,
    })))
}

/// Provider push endpoint. The body is untouched until the shared-secret
/// header has been verified.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let service = payment_service(&state)?;

    let provided = headers
        .get(WEBHOOK_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if !service.webhook_key_matches(provided) {
        return Err(AppError::Unauthorized);
    }

    // Once the key check has passed the provider always gets a 200, even
    // for a body we cannot read; anything else triggers its redelivery
    // storm for a problem on our side.
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Webhook accepted but body was unparsable: {}", e);
            return Ok(Json(json!({
                "message": "Webhook received",
                "success": true,
            })));
        }
    };

    info!(
        "Webhook received for external id {} ({})",
        payload.external_id, payload.status
    );

    // Always ack once authenticated; a persistence problem on our side must
    // not trigger the provider's redelivery storm.
    if let Err(e) = service.record_webhook(payload).await {
        error!("Webhook accepted but not persisted: {}", e);
    }

    Ok(Json(json!({
        "message": "Webhook received",
        "success": true,
    })))
}
