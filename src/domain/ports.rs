//! Interfaces the application layer depends on. Infrastructure provides the
//! Diesel-backed implementations; tests swap in in-memory fakes.

use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use super::errors::DomainError;
use super::inventory::StockItem;
use super::order::{Actor, NewCheckout, OrderStatus, OrderView, PaymentView};
use super::state_machine::{JobKind, TransitionPlan, Trigger};

// ── Stock ledger ─────────────────────────────────────────────────────────────

/// Atomic stock mutations over the per-store inventory counters, each call
/// one storage transaction. Oversell prevention rests on the backing store's
/// conditional-decrement primitive, not on read-then-write.
pub trait StockLedger: Send + Sync + 'static {
    /// Conditionally decrement every item or fail the whole batch with
    /// `InsufficientStock` — no partial decrements survive.
    fn reserve(&self, store_id: i64, items: &[StockItem], actor: Actor)
        -> Result<(), DomainError>;

    /// Unconditional increment (manual replenishment, cancellation rollback).
    fn restore(
        &self,
        store_id: i64,
        items: &[StockItem],
        actor: Actor,
        note: Option<&str>,
    ) -> Result<(), DomainError>;

    /// Move stock between stores; destination rows are created on first use.
    fn transfer(
        &self,
        from_store_id: i64,
        to_store_id: i64,
        items: &[StockItem],
        actor: Actor,
        note: Option<&str>,
    ) -> Result<(), DomainError>;

    /// Read-only pre-flight check; raises the same errors as `reserve`
    /// without mutating anything.
    fn check_availability(&self, store_id: i64, items: &[StockItem]) -> Result<(), DomainError>;
}

// ── Order store ──────────────────────────────────────────────────────────────

/// Per-transition inputs that are not derivable from the trigger itself.
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    /// Manual payment proof location (SubmitPaymentProof).
    pub proof_url: Option<String>,
    /// Fresh deadline when the plan says to re-open the payment window.
    pub new_payment_deadline: Option<DateTime<Utc>>,
}

/// Committed result of a transition; `plan` tells the caller which delayed
/// jobs to arm or disarm post-commit.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order_id: i64,
    pub user_id: i64,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub plan: TransitionPlan,
}

pub trait OrderStore: Send + Sync + 'static {
    /// The single atomic checkout transaction: order + items + shipment stub
    /// + payment row + stock reservation, all-or-nothing.
    fn create_checkout(&self, checkout: NewCheckout) -> Result<OrderView, DomainError>;

    fn find_order(&self, order_id: i64) -> Result<OrderView, DomainError>;

    /// Atomic read-guard-write of the order's status under a row lock,
    /// applying the state machine's plan (including in-transaction
    /// compensation on cancellation).
    fn transition(
        &self,
        order_id: i64,
        trigger: Trigger,
        actor: Actor,
        ctx: TransitionContext,
    ) -> Result<TransitionOutcome, DomainError>;

    fn find_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<PaymentView, DomainError>;
}

// ── Delayed jobs ─────────────────────────────────────────────────────────────

/// Time-delayed order actions, at most one live job per (order, kind).
/// Scheduling the same key again replaces the pending job; cancelling an
/// absent job is not an error. Liveness only — the state machine's guards
/// stay correct if a timer never fires.
pub trait JobScheduler: Send + Sync + 'static {
    fn schedule(&self, order_id: i64, kind: JobKind, delay: Duration) -> Result<(), DomainError>;
    fn cancel(&self, order_id: i64, kind: JobKind) -> Result<(), DomainError>;
}

// ── Idempotency ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyBegin {
    /// No record existed; a PENDING entry is now registered for this caller.
    Started,
    /// Another attempt with this key is still running.
    InFlight,
    /// A completed result is cached and unexpired.
    Done { order_id: i64 },
}

/// Keyed store collapsing retried checkout requests. Must guarantee at most
/// one in-flight execution per key regardless of backing implementation.
pub trait IdempotencyStore: Send + Sync + 'static {
    fn begin(&self, key: &str) -> IdempotencyBegin;
    fn complete(&self, key: &str, order_id: i64, ttl: Duration);
    fn evict(&self, key: &str);
}

// ── External collaborators ───────────────────────────────────────────────────

pub trait StoreDirectory: Send + Sync + 'static {
    /// Explicit store id (validated), or derive the fulfilling store from
    /// the user's address.
    fn resolve_store(
        &self,
        explicit: Option<i64>,
        user_id: i64,
        address_id: Option<i64>,
    ) -> Result<i64, DomainError>;

    /// Explicit address id (validated as the user's), or their primary one.
    fn resolve_address(&self, user_id: i64, explicit: Option<i64>) -> Result<i64, DomainError>;
}

#[derive(Debug, Clone)]
pub struct ShippingQuote {
    pub method_id: i64,
    pub cost: BigDecimal,
}

pub trait ShippingResolver: Send + Sync + 'static {
    fn quote(
        &self,
        store_id: i64,
        address_id: i64,
        method_id: Option<i64>,
    ) -> Result<ShippingQuote, DomainError>;
}

/// Post-checkout cart cleanup; best-effort, caller logs failures.
pub trait CartGateway: Send + Sync + 'static {
    fn remove_items(
        &self,
        user_id: i64,
        store_id: i64,
        product_ids: &[i64],
    ) -> Result<(), DomainError>;
}

#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub id: i64,
    pub name: String,
    pub price: BigDecimal,
    pub is_active: bool,
}

/// Read access to the product catalog for price snapshotting and
/// existence/active checks.
pub trait Catalog: Send + Sync + 'static {
    fn product(&self, product_id: i64) -> Result<Option<ProductInfo>, DomainError>;
}
