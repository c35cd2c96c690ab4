use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::application::webhook::{GatewayNotification, WebhookOutcome};
use crate::errors::AppError;
use crate::Engine;

/// Notification body as the gateway posts it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GatewayNotificationRequest {
    /// The gateway's transaction reference for the order.
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub transaction_status: String,
    pub signature_key: String,
}

/// POST /payments/webhook
///
/// Gateway payment callback. The signature is the only authentication on
/// this route and is verified before anything is looked up. Redeliveries and
/// out-of-sequence statuses answer 200 so the gateway stops retrying.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = GatewayNotificationRequest,
    responses(
        (status = 200, description = "Notification processed or ignored"),
        (status = 401, description = "Signature mismatch"),
        (status = 404, description = "Unknown transaction reference"),
    ),
    tag = "payments"
)]
pub async fn payment_webhook(
    engine: web::Data<Engine>,
    body: web::Json<GatewayNotificationRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let notification = GatewayNotification {
        order_ref: body.order_id,
        status_code: body.status_code,
        gross_amount: body.gross_amount,
        transaction_status: body.transaction_status,
        signature: body.signature_key,
    };

    let handler = engine.webhook.clone();
    let outcome = web::block(move || handler.handle(&notification))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let status = match outcome {
        WebhookOutcome::Settled => "settled",
        WebhookOutcome::Cancelled => "cancelled",
        WebhookOutcome::Ignored => "ignored",
    };
    Ok(HttpResponse::Ok().json(json!({ "status": status })))
}
