//! Checkout orchestration: validation, idempotency, resolution of external
//! collaborators, the single atomic checkout transaction, and post-commit
//! best-effort effects.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::DomainError;
use crate::domain::inventory::{validate_items, StockItem};
use crate::domain::order::{CheckoutItem, NewCheckout, OrderView, PaymentMethod};
use crate::domain::ports::{
    CartGateway, Catalog, IdempotencyBegin, IdempotencyStore, JobScheduler, OrderStore,
    ShippingResolver, StockLedger, StoreDirectory,
};
use crate::domain::state_machine::JobKind;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: i64,
    pub store_id: Option<i64>,
    pub address_id: Option<i64>,
    pub payment_method: PaymentMethod,
    pub shipping_method_id: Option<i64>,
    pub items: Vec<CheckoutItem>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// A new order was created by this request.
    Created(OrderView),
    /// The idempotency key matched a cached, unexpired result.
    Replayed(OrderView),
    /// An identical request is still running; the client should retry.
    InFlight,
}

#[derive(Debug, Clone)]
pub struct CheckoutPolicy {
    /// How long an unpaid order stays alive before auto-cancellation.
    pub payment_window: Duration,
    /// How long a completed checkout result answers retries.
    pub idempotency_ttl: Duration,
}

pub struct CheckoutService {
    store: Arc<dyn OrderStore>,
    ledger: Arc<dyn StockLedger>,
    directory: Arc<dyn StoreDirectory>,
    shipping: Arc<dyn ShippingResolver>,
    cart: Arc<dyn CartGateway>,
    catalog: Arc<dyn Catalog>,
    idempotency: Arc<dyn IdempotencyStore>,
    scheduler: Arc<dyn JobScheduler>,
    policy: CheckoutPolicy,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn OrderStore>,
        ledger: Arc<dyn StockLedger>,
        directory: Arc<dyn StoreDirectory>,
        shipping: Arc<dyn ShippingResolver>,
        cart: Arc<dyn CartGateway>,
        catalog: Arc<dyn Catalog>,
        idempotency: Arc<dyn IdempotencyStore>,
        scheduler: Arc<dyn JobScheduler>,
        policy: CheckoutPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
            shipping,
            cart,
            catalog,
            idempotency,
            scheduler,
            policy,
        }
    }

    pub fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, DomainError> {
        let stock_items = as_stock_items(&request.items);
        validate_items(&stock_items)?;

        let Some(key) = request.idempotency_key.clone() else {
            let order = self.perform(&request, &stock_items)?;
            self.post_commit(&order);
            return Ok(CheckoutOutcome::Created(order));
        };

        match self.idempotency.begin(&key) {
            IdempotencyBegin::InFlight => Ok(CheckoutOutcome::InFlight),
            IdempotencyBegin::Done { order_id } => {
                let order = self.store.find_order(order_id)?;
                Ok(CheckoutOutcome::Replayed(order))
            }
            IdempotencyBegin::Started => match self.perform(&request, &stock_items) {
                Ok(order) => {
                    self.idempotency
                        .complete(&key, order.id, self.policy.idempotency_ttl);
                    self.post_commit(&order);
                    Ok(CheckoutOutcome::Created(order))
                }
                Err(e) => {
                    // Free the key so a legitimate retry is not blocked.
                    self.idempotency.evict(&key);
                    Err(e)
                }
            },
        }
    }

    /// Everything up to and including the atomic checkout transaction.
    fn perform(
        &self,
        request: &CheckoutRequest,
        stock_items: &[StockItem],
    ) -> Result<OrderView, DomainError> {
        let store_id =
            self.directory
                .resolve_store(request.store_id, request.user_id, request.address_id)?;

        for item in &request.items {
            let product = self
                .catalog
                .product(item.product_id)?
                .ok_or_else(|| DomainError::not_found("product", item.product_id.to_string()))?;
            if !product.is_active {
                return Err(DomainError::Validation(format!(
                    "product {} is no longer available",
                    product.id
                )));
            }
        }

        // Fail fast on obviously short carts; the reservation inside the
        // transaction is the authoritative oversell gate.
        self.ledger.check_availability(store_id, stock_items)?;

        let address_id = self
            .directory
            .resolve_address(request.user_id, request.address_id)?;
        let quote = self
            .shipping
            .quote(store_id, address_id, request.shipping_method_id)?;

        let payment_window = chrono::Duration::from_std(self.policy.payment_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(60));

        self.store.create_checkout(NewCheckout {
            user_id: request.user_id,
            store_id,
            address_id,
            payment_method: request.payment_method,
            shipping_method_id: quote.method_id,
            shipping_cost: quote.cost,
            payment_deadline: chrono::Utc::now() + payment_window,
            items: request.items.clone(),
        })
    }

    /// Best-effort side effects after the transaction committed. The order is
    /// already durable and its stock reserved; failures here are logged, not
    /// surfaced.
    fn post_commit(&self, order: &OrderView) {
        if let Err(e) =
            self.scheduler
                .schedule(order.id, JobKind::AutoCancel, self.policy.payment_window)
        {
            log::warn!("failed to arm auto-cancel for order {}: {e}", order.id);
        }

        let product_ids: Vec<i64> = order.items.iter().map(|i| i.product_id).collect();
        if let Err(e) = self
            .cart
            .remove_items(order.user_id, order.store_id, &product_ids)
        {
            log::warn!("failed to clear cart after order {}: {e}", order.id);
        }
    }
}

fn as_stock_items(items: &[CheckoutItem]) -> Vec<StockItem> {
    items
        .iter()
        .map(|i| StockItem::new(i.product_id, i.quantity))
        .collect()
}
