use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::errors::DomainError;
use crate::errors::AppError;
use crate::Engine;

use super::{user_id, OrderResponse, TransitionResponse};

// ── Request DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitProofRequest {
    /// Location of the uploaded transfer receipt.
    pub proof_url: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /orders/{id}
///
/// Returns the order with its items. A user sees only their own orders;
/// admins (X-Admin-Id) see any order. Non-owners get 404, not 403, so order
/// ids are not probeable.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-User-Id" = Option<i64>, Header, description = "Authenticated user id"),
        ("X-Admin-Id" = Option<i64>, Header, description = "Authenticated admin id"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let is_admin = req.headers().contains_key("X-Admin-Id");
    let caller = if is_admin { None } else { Some(user_id(&req)?) };

    let store = engine.orders.clone();
    let order = web::block(move || store.find_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    if let Some(user) = caller {
        if order.user_id != user {
            return Err(AppError::Domain(DomainError::not_found(
                "order",
                order_id.to_string(),
            )));
        }
    }
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders/{id}/payment-proof
///
/// Attaches a manual-transfer receipt and moves the order to PAYMENT_REVIEW.
#[utoipa::path(
    post,
    path = "/orders/{id}/payment-proof",
    request_body = SubmitProofRequest,
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Proof recorded, order in review", body = TransitionResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not awaiting payment"),
    ),
    tag = "orders"
)]
pub async fn submit_payment_proof(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<SubmitProofRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let user = user_id(&req)?;
    let proof_url = body.into_inner().proof_url;

    let service = engine.fulfillment.clone();
    let outcome = web::block(move || service.submit_payment_proof(order_id, user, proof_url))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(TransitionResponse {
        id: outcome.order_id,
        from: outcome.from.as_str().to_string(),
        status: outcome.to.as_str().to_string(),
    }))
}

/// POST /orders/{id}/confirm
///
/// User confirms receipt of a shipped order. Terminal: CONFIRMED.
#[utoipa::path(
    post,
    path = "/orders/{id}/confirm",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Order confirmed", body = TransitionResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not shipped"),
    ),
    tag = "orders"
)]
pub async fn confirm_receipt(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let user = user_id(&req)?;

    let service = engine.fulfillment.clone();
    let outcome = web::block(move || service.confirm_receipt(order_id, user))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(TransitionResponse {
        id: outcome.order_id,
        from: outcome.from.as_str().to_string(),
        status: outcome.to.as_str().to_string(),
    }))
}

/// POST /orders/{id}/cancel
///
/// User cancels an order that is still awaiting payment. Reserved stock is
/// returned in the same transaction.
#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
    ),
    responses(
        (status = 200, description = "Order cancelled", body = TransitionResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order can no longer be cancelled by the user"),
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let user = user_id(&req)?;

    let service = engine.fulfillment.clone();
    let outcome = web::block(move || service.cancel_by_user(order_id, user))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(TransitionResponse {
        id: outcome.order_id,
        from: outcome.from.as_str().to_string(),
        status: outcome.to.as_str().to_string(),
    }))
}
