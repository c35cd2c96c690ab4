//! Back-office order actions. All routes require the `X-Admin-Id` header
//! injected by the upstream auth layer.

use actix_web::{web, HttpRequest, HttpResponse};

use crate::domain::errors::DomainError;
use crate::domain::ports::TransitionOutcome;
use crate::errors::AppError;
use crate::Engine;

use super::{admin_id, TransitionResponse};

fn respond(outcome: TransitionOutcome) -> HttpResponse {
    HttpResponse::Ok().json(TransitionResponse {
        id: outcome.order_id,
        from: outcome.from.as_str().to_string(),
        status: outcome.to.as_str().to_string(),
    })
}

async fn run<F>(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
    f: F,
) -> Result<HttpResponse, AppError>
where
    F: FnOnce(&crate::application::fulfillment::FulfillmentService, i64, i64)
            -> Result<TransitionOutcome, DomainError>
        + Send
        + 'static,
{
    let order_id = path.into_inner();
    let admin = admin_id(&req)?;
    let service = engine.fulfillment.clone();
    let outcome = web::block(move || f(&service, order_id, admin))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(respond(outcome))
}

/// POST /admin/orders/{id}/approve
///
/// Accepts a manual-transfer proof under review; payment becomes PAID and the
/// order moves to PROCESSING.
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/approve",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-Admin-Id" = i64, Header, description = "Authenticated admin id"),
    ),
    responses(
        (status = 200, description = "Payment approved", body = TransitionResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not in payment review"),
    ),
    tag = "admin"
)]
pub async fn approve_payment(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    run(engine, req, path, |s, order, admin| {
        s.approve_payment(order, admin)
    })
    .await
}

/// POST /admin/orders/{id}/reject
///
/// Rejects the submitted proof; the order returns to PENDING_PAYMENT with a
/// fresh payment window.
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/reject",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-Admin-Id" = i64, Header, description = "Authenticated admin id"),
    ),
    responses(
        (status = 200, description = "Payment rejected", body = TransitionResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not in payment review"),
    ),
    tag = "admin"
)]
pub async fn reject_payment(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    run(engine, req, path, |s, order, admin| {
        s.reject_payment(order, admin)
    })
    .await
}

/// POST /admin/orders/{id}/ship
///
/// Marks a PROCESSING order as shipped and starts the auto-confirm window.
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/ship",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-Admin-Id" = i64, Header, description = "Authenticated admin id"),
    ),
    responses(
        (status = 200, description = "Order shipped", body = TransitionResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not in processing"),
    ),
    tag = "admin"
)]
pub async fn ship_order(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    run(engine, req, path, |s, order, admin| s.ship_order(order, admin)).await
}

/// POST /admin/orders/{id}/cancel
///
/// Cancels an order that has not shipped yet; stock and vouchers are returned
/// in the same transaction. Shipped and confirmed orders are never
/// cancellable.
#[utoipa::path(
    post,
    path = "/admin/orders/{id}/cancel",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-Admin-Id" = i64, Header, description = "Authenticated admin id"),
    ),
    responses(
        (status = 200, description = "Order cancelled", body = TransitionResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order can no longer be cancelled"),
    ),
    tag = "admin"
)]
pub async fn cancel_order(
    engine: web::Data<Engine>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    run(engine, req, path, |s, order, admin| {
        s.cancel_by_admin(order, admin)
    })
    .await
}
