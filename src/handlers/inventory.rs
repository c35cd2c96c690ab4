use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::errors::DomainError;
use crate::domain::inventory::StockItem;
use crate::domain::order::Actor;
use crate::errors::AppError;
use crate::Engine;

use super::admin_id;

// ── Request DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct StockItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestoreStockRequest {
    pub store_id: i64,
    pub items: Vec<StockItemRequest>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferStockRequest {
    pub from_store_id: i64,
    pub to_store_id: i64,
    pub items: Vec<StockItemRequest>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AvailabilityParams {
    pub store_id: i64,
    pub product_id: i64,
    pub quantity: i32,
}

fn as_stock_items(items: Vec<StockItemRequest>) -> Vec<StockItem> {
    items
        .into_iter()
        .map(|i| StockItem::new(i.product_id, i.quantity))
        .collect()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /admin/inventory/restore
///
/// Manually adds stock to a store, journaled under the calling admin.
#[utoipa::path(
    post,
    path = "/admin/inventory/restore",
    request_body = RestoreStockRequest,
    params(
        ("X-Admin-Id" = i64, Header, description = "Authenticated admin id"),
    ),
    responses(
        (status = 200, description = "Stock added"),
        (status = 400, description = "Invalid items"),
    ),
    tag = "inventory"
)]
pub async fn restore_stock(
    engine: web::Data<Engine>,
    req: HttpRequest,
    body: web::Json<RestoreStockRequest>,
) -> Result<HttpResponse, AppError> {
    let admin = admin_id(&req)?;
    let body = body.into_inner();
    let items = as_stock_items(body.items);

    let ledger = engine.ledger.clone();
    web::block(move || {
        ledger.restore(
            body.store_id,
            &items,
            Actor::Admin(admin),
            body.note.as_deref(),
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

/// POST /admin/inventory/transfer
///
/// Moves stock between stores. The whole batch succeeds or nothing moves;
/// destination inventory rows are created on first use.
#[utoipa::path(
    post,
    path = "/admin/inventory/transfer",
    request_body = TransferStockRequest,
    params(
        ("X-Admin-Id" = i64, Header, description = "Authenticated admin id"),
    ),
    responses(
        (status = 200, description = "Stock transferred"),
        (status = 400, description = "Invalid items or same-store transfer"),
        (status = 409, description = "Source store lacks the requested quantity"),
    ),
    tag = "inventory"
)]
pub async fn transfer_stock(
    engine: web::Data<Engine>,
    req: HttpRequest,
    body: web::Json<TransferStockRequest>,
) -> Result<HttpResponse, AppError> {
    let admin = admin_id(&req)?;
    let body = body.into_inner();
    let items = as_stock_items(body.items);

    let ledger = engine.ledger.clone();
    web::block(move || {
        ledger.transfer(
            body.from_store_id,
            body.to_store_id,
            &items,
            Actor::Admin(admin),
            body.note.as_deref(),
        )
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

/// GET /inventory/availability
///
/// Read-only stock check. Always answers 200; shortage is reported in the
/// body, not as an error, because nothing was reserved.
#[utoipa::path(
    get,
    path = "/inventory/availability",
    params(
        ("store_id" = i64, Query, description = "Store to check"),
        ("product_id" = i64, Query, description = "Product to check"),
        ("quantity" = i32, Query, description = "Wanted quantity"),
    ),
    responses(
        (status = 200, description = "Availability verdict"),
        (status = 400, description = "Invalid quantity"),
    ),
    tag = "inventory"
)]
pub async fn check_availability(
    engine: web::Data<Engine>,
    query: web::Query<AvailabilityParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let items = vec![StockItem::new(params.product_id, params.quantity)];

    let ledger = engine.ledger.clone();
    let verdict = web::block(move || ledger.check_availability(params.store_id, &items))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    match verdict {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "available": true }))),
        Err(
            e @ (DomainError::InsufficientStock { .. } | DomainError::NoInventory { .. }),
        ) => Ok(HttpResponse::Ok().json(json!({
            "available": false,
            "reason": e.to_string()
        }))),
        Err(e) => Err(AppError::Domain(e)),
    }
}
