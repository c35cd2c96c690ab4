use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::application::checkout::{CheckoutOutcome, CheckoutRequest};
use crate::domain::order::{CheckoutItem, PaymentMethod};
use crate::errors::AppError;
use crate::Engine;

use super::{user_id, OrderResponse};

// ── Request DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    /// Explicit fulfilling store; defaults to the configured store.
    pub store_id: Option<i64>,
    /// Delivery address; defaults to the user's primary address.
    pub address_id: Option<i64>,
    /// "MANUAL_TRANSFER" (default) or "GATEWAY".
    pub payment_method: Option<String>,
    pub shipping_method_id: Option<i64>,
    pub items: Vec<CheckoutItemRequest>,
}

// ── Handler ──────────────────────────────────────────────────────────────────

/// POST /checkout
///
/// Creates an order from the user's cart lines: reserves stock, snapshots
/// prices, opens the payment window. Repeating the request with the same
/// `Idempotency-Key` header replays the original order instead of creating a
/// second one.
#[utoipa::path(
    post,
    path = "/checkout",
    request_body = CreateCheckoutRequest,
    params(
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ("Idempotency-Key" = Option<String>, Header, description = "Retry-safety key"),
    ),
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 200, description = "Idempotent replay of an earlier checkout", body = OrderResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Insufficient stock, or the same key is still in flight"),
    ),
    tag = "checkout"
)]
pub async fn create_checkout(
    engine: web::Data<Engine>,
    req: HttpRequest,
    body: web::Json<CreateCheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = user_id(&req)?;
    let idempotency_key = req
        .headers()
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = body.into_inner();

    let payment_method = match body.payment_method.as_deref() {
        Some(s) => PaymentMethod::parse(s).map_err(AppError::Domain)?,
        None => PaymentMethod::ManualTransfer,
    };

    let request = CheckoutRequest {
        user_id,
        store_id: body.store_id,
        address_id: body.address_id,
        payment_method,
        shipping_method_id: body.shipping_method_id,
        items: body
            .items
            .into_iter()
            .map(|i| CheckoutItem {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
        idempotency_key,
    };

    let service = engine.checkout.clone();
    let outcome = web::block(move || service.create_checkout(request))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    match outcome {
        CheckoutOutcome::Created(order) => {
            Ok(HttpResponse::Created().json(OrderResponse::from(order)))
        }
        CheckoutOutcome::Replayed(order) => {
            Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
        }
        CheckoutOutcome::InFlight => Ok(HttpResponse::Conflict().json(json!({
            "error": "a checkout with this idempotency key is still being processed"
        }))),
    }
}
