use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ── Status enums ─────────────────────────────────────────────────────────────

/// Lifecycle states of an order. `Confirmed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingPayment,
    PaymentReview,
    Processing,
    Shipped,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::PendingPayment,
        OrderStatus::PaymentReview,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Confirmed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::PaymentReview => "PAYMENT_REVIEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING_PAYMENT" => Ok(OrderStatus::PendingPayment),
            "PAYMENT_REVIEW" => Ok(OrderStatus::PaymentReview),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::Internal(format!(
                "unknown order status '{other}' in storage"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REJECTED" => Ok(PaymentStatus::Rejected),
            other => Err(DomainError::Internal(format!(
                "unknown payment status '{other}' in storage"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    ManualTransfer,
    Gateway,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::ManualTransfer => "MANUAL_TRANSFER",
            PaymentMethod::Gateway => "GATEWAY",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "MANUAL_TRANSFER" => Ok(PaymentMethod::ManualTransfer),
            "GATEWAY" => Ok(PaymentMethod::Gateway),
            other => Err(DomainError::Validation(format!(
                "unknown payment method '{other}'"
            ))),
        }
    }
}

/// Who is asking for a transition. Ownership checks run before status guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(i64),
    Admin(i64),
    System,
}

impl Actor {
    /// Numeric id recorded in the stock journal for this actor.
    /// System actions (timers, webhooks) journal as actor 0.
    pub fn journal_id(&self) -> i64 {
        match self {
            Actor::User(id) | Actor::Admin(id) => *id,
            Actor::System => 0,
        }
    }
}

// ── Views and inputs ─────────────────────────────────────────────────────────

/// Frozen copy of the catalog product at order time, stored as JSONB on the
/// order item so history survives later catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: i64,
    pub name: String,
    pub price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub id: i64,
    pub product_id: i64,
    pub snapshot: ProductSnapshot,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: i64,
    pub user_id: i64,
    pub store_id: i64,
    pub address_id: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub discount_total: BigDecimal,
    pub grand_total: BigDecimal,
    pub total_items: i32,
    pub payment_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone)]
pub struct PaymentView {
    pub id: i64,
    pub order_id: i64,
    pub method: PaymentMethod,
    pub gateway_ref: Option<String>,
    pub amount: BigDecimal,
    pub status: PaymentStatus,
}

/// One requested line of a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutItem {
    pub product_id: i64,
    pub quantity: i32,
}

/// Fully-resolved input to the atomic checkout transaction: every external
/// lookup (store, address, shipping quote) has already happened.
#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub user_id: i64,
    pub store_id: i64,
    pub address_id: i64,
    pub payment_method: PaymentMethod,
    pub shipping_method_id: i64,
    pub shipping_cost: BigDecimal,
    pub payment_deadline: DateTime<Utc>,
    pub items: Vec<CheckoutItem>,
}

/// Recompute the grand total from its parts, enforcing the invariant that it
/// never goes negative.
pub fn grand_total(
    subtotal: &BigDecimal,
    discount: &BigDecimal,
    shipping: &BigDecimal,
) -> Result<BigDecimal, DomainError> {
    let total = subtotal - discount + shipping;
    if total < BigDecimal::from(0) {
        return Err(DomainError::Validation(format!(
            "grand total would be negative ({total})"
        )));
    }
    Ok(total)
}
