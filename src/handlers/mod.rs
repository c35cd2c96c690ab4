pub mod admin;
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod webhook;

use actix_web::HttpRequest;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::errors::DomainError;
use crate::domain::order::OrderView;
use crate::errors::AppError;

// ── Actor headers ────────────────────────────────────────────────────────────
//
// Authentication happens upstream; the gateway injects the authenticated
// identity as a header. The handlers only parse it.

pub(crate) fn user_id(req: &HttpRequest) -> Result<i64, AppError> {
    header_id(req, "X-User-Id")
}

pub(crate) fn admin_id(req: &HttpRequest) -> Result<i64, AppError> {
    header_id(req, "X-Admin-Id")
}

fn header_id(req: &HttpRequest, name: &str) -> Result<i64, AppError> {
    let value = req
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Domain(DomainError::Validation(format!("missing {name} header")))
        })?;
    value.parse::<i64>().map_err(|_| {
        AppError::Domain(DomainError::Validation(format!(
            "invalid {name} header '{value}'"
        )))
    })
}

// ── Shared response DTOs ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    /// Product name as it was at order time.
    pub product_name: String,
    /// Decimal amounts are serialized as strings, e.g. "9.99".
    pub unit_price: String,
    pub quantity: i32,
    pub line_total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub store_id: i64,
    pub address_id: i64,
    pub status: String,
    pub payment_method: String,
    pub subtotal: String,
    pub shipping_cost: String,
    pub discount_total: String,
    pub grand_total: String,
    pub total_items: i32,
    pub payment_deadline: String,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        OrderResponse {
            id: order.id,
            user_id: order.user_id,
            store_id: order.store_id,
            address_id: order.address_id,
            status: order.status.as_str().to_string(),
            payment_method: order.payment_method.as_str().to_string(),
            subtotal: order.subtotal.to_string(),
            shipping_cost: order.shipping_cost.to_string(),
            discount_total: order.discount_total.to_string(),
            grand_total: order.grand_total.to_string(),
            total_items: order.total_items,
            payment_deadline: order.payment_deadline.to_rfc3339(),
            created_at: order.created_at.to_rfc3339(),
            items: order
                .items
                .into_iter()
                .map(|i| OrderItemResponse {
                    id: i.id,
                    product_id: i.product_id,
                    product_name: i.snapshot.name,
                    unit_price: i.unit_price.to_string(),
                    quantity: i.quantity,
                    line_total: i.line_total.to_string(),
                })
                .collect(),
        }
    }
}

/// Minimal response for transition endpoints: the order and where it landed.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    pub id: i64,
    pub from: String,
    pub status: String,
}
