use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use crate::schema::{
    order_items, orders, payments, products, shipments, stock_journal, store_inventory, stores,
    user_addresses,
};

// ── Orders ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: i64,
    pub user_id: i64,
    pub store_id: i64,
    pub address_id: i64,
    pub status: String,
    pub payment_method: String,
    pub subtotal: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub discount_total: BigDecimal,
    pub grand_total: BigDecimal,
    pub total_items: i32,
    pub payment_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub user_id: i64,
    pub store_id: i64,
    pub address_id: i64,
    pub status: String,
    pub payment_method: String,
    pub subtotal: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub discount_total: BigDecimal,
    pub grand_total: BigDecimal,
    pub total_items: i32,
    pub payment_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_snapshot: Value,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub order_id: i64,
    pub product_id: i64,
    pub product_snapshot: Value,
    pub unit_price: BigDecimal,
    pub quantity: i32,
    pub line_total: BigDecimal,
}

// ── Payments & shipments ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentRow {
    pub id: i64,
    pub order_id: i64,
    pub method: String,
    pub gateway_ref: Option<String>,
    pub amount: BigDecimal,
    pub status: String,
    pub proof_url: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPaymentRow {
    pub order_id: i64,
    pub method: String,
    pub gateway_ref: Option<String>,
    pub amount: BigDecimal,
    pub status: String,
    pub proof_url: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = shipments)]
pub struct NewShipmentRow {
    pub order_id: i64,
    pub method_id: i64,
    pub cost: BigDecimal,
    pub status: String,
}

// ── Inventory & journal ──────────────────────────────────────────────────────

#[derive(Debug, Insertable)]
#[diesel(table_name = store_inventory)]
pub struct NewInventoryRow {
    pub store_id: i64,
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = stock_journal)]
pub struct NewJournalRow {
    pub store_id: i64,
    pub product_id: i64,
    pub delta: i32,
    pub reason: String,
    pub actor_id: i64,
    pub note: Option<String>,
}

// ── Directory & catalog ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = stores)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StoreRow {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub price: BigDecimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = user_addresses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AddressRow {
    pub id: i64,
    pub user_id: i64,
    pub label: String,
    pub is_primary: bool,
}
