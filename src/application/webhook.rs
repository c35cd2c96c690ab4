//! Payment-gateway webhook handling.
//!
//! The signature check is the only authentication on this path, so it runs
//! before any lookup or mutation. Gateways redeliver notifications, so every
//! already-applied or out-of-window status resolves to `Ignored` rather than
//! an error.

use std::sync::Arc;

use sha2::{Digest, Sha512};

use crate::domain::errors::DomainError;
use crate::domain::ports::OrderStore;

use super::fulfillment::FulfillmentService;

/// Asynchronous notification as delivered by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayNotification {
    /// Gateway transaction reference, matched against `payments.gateway_ref`.
    pub order_ref: String,
    pub status_code: String,
    pub gross_amount: String,
    pub transaction_status: String,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment captured; order moved to PROCESSING.
    Settled,
    /// Payment denied/expired; order cancelled and compensated.
    Cancelled,
    /// Duplicate delivery or status not applicable to the order's state.
    Ignored,
}

enum GatewayStatus {
    Settled,
    Denied,
    Pending,
    Unknown,
}

fn map_status(transaction_status: &str) -> GatewayStatus {
    match transaction_status {
        "capture" | "settlement" => GatewayStatus::Settled,
        "deny" | "cancel" | "expire" => GatewayStatus::Denied,
        "pending" => GatewayStatus::Pending,
        _ => GatewayStatus::Unknown,
    }
}

/// SHA-512 hex digest over the gateway's signed fields plus the shared key.
pub fn signature_for(
    order_ref: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_ref.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct PaymentWebhookHandler {
    store: Arc<dyn OrderStore>,
    fulfillment: Arc<FulfillmentService>,
    server_key: String,
}

impl PaymentWebhookHandler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        fulfillment: Arc<FulfillmentService>,
        server_key: String,
    ) -> Self {
        Self {
            store,
            fulfillment,
            server_key,
        }
    }

    pub fn handle(&self, n: &GatewayNotification) -> Result<WebhookOutcome, DomainError> {
        let expected = signature_for(
            &n.order_ref,
            &n.status_code,
            &n.gross_amount,
            &self.server_key,
        );
        if expected != n.signature {
            return Err(DomainError::InvalidSignature);
        }

        let payment = self.store.find_payment_by_gateway_ref(&n.order_ref)?;

        match map_status(&n.transaction_status) {
            GatewayStatus::Settled => {
                match self.fulfillment.gateway_settled(payment.order_id) {
                    Ok(_) => Ok(WebhookOutcome::Settled),
                    // Already settled, or the order has moved past payment.
                    Err(DomainError::InvalidTransition { .. }) => Ok(WebhookOutcome::Ignored),
                    Err(e) => Err(e),
                }
            }
            GatewayStatus::Denied => match self.fulfillment.gateway_denied(payment.order_id) {
                Ok(_) => Ok(WebhookOutcome::Cancelled),
                Err(DomainError::InvalidTransition { .. }) => Ok(WebhookOutcome::Ignored),
                Err(e) => Err(e),
            },
            GatewayStatus::Pending => Ok(WebhookOutcome::Ignored),
            GatewayStatus::Unknown => {
                log::warn!(
                    "unrecognized gateway status '{}' for ref {}",
                    n.transaction_status,
                    n.order_ref
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use bigdecimal::BigDecimal;

    use super::*;
    use crate::application::fulfillment::FulfillmentPolicy;
    use crate::domain::order::{
        Actor, NewCheckout, OrderStatus, OrderView, PaymentMethod, PaymentStatus, PaymentView,
    };
    use crate::domain::ports::{JobScheduler, TransitionContext, TransitionOutcome};
    use crate::domain::state_machine::{self, JobKind, Trigger};

    const KEY: &str = "server-key";
    const OWNER: i64 = 7;

    struct FakeStore {
        orders: Mutex<HashMap<i64, OrderStatus>>,
        payments: HashMap<String, i64>,
        lookups: AtomicUsize,
    }

    impl FakeStore {
        fn new(order_id: i64, status: OrderStatus, gateway_ref: &str) -> Self {
            Self {
                orders: Mutex::new(HashMap::from([(order_id, status)])),
                payments: HashMap::from([(gateway_ref.to_string(), order_id)]),
                lookups: AtomicUsize::new(0),
            }
        }

        fn status(&self, order_id: i64) -> OrderStatus {
            self.orders.lock().unwrap()[&order_id]
        }
    }

    impl OrderStore for FakeStore {
        fn create_checkout(&self, _: NewCheckout) -> Result<OrderView, DomainError> {
            unimplemented!("not exercised by webhook tests")
        }

        fn find_order(&self, _: i64) -> Result<OrderView, DomainError> {
            unimplemented!("not exercised by webhook tests")
        }

        fn transition(
            &self,
            order_id: i64,
            trigger: Trigger,
            actor: Actor,
            _ctx: TransitionContext,
        ) -> Result<TransitionOutcome, DomainError> {
            let mut orders = self.orders.lock().unwrap();
            let current = *orders
                .get(&order_id)
                .ok_or_else(|| DomainError::not_found("order", order_id.to_string()))?;
            let plan = state_machine::plan(current, OWNER, trigger, actor)?;
            orders.insert(order_id, plan.next);
            Ok(TransitionOutcome {
                order_id,
                user_id: OWNER,
                from: current,
                to: plan.next,
                plan,
            })
        }

        fn find_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<PaymentView, DomainError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let order_id = *self
                .payments
                .get(gateway_ref)
                .ok_or_else(|| DomainError::not_found("payment", gateway_ref.to_string()))?;
            Ok(PaymentView {
                id: 1,
                order_id,
                method: PaymentMethod::Gateway,
                gateway_ref: Some(gateway_ref.to_string()),
                amount: BigDecimal::from(100),
                status: PaymentStatus::Pending,
            })
        }
    }

    struct NoopScheduler;

    impl JobScheduler for NoopScheduler {
        fn schedule(&self, _: i64, _: JobKind, _: Duration) -> Result<(), DomainError> {
            Ok(())
        }
        fn cancel(&self, _: i64, _: JobKind) -> Result<(), DomainError> {
            Ok(())
        }
    }

    fn handler(status: OrderStatus) -> (PaymentWebhookHandler, Arc<FakeStore>) {
        let store = Arc::new(FakeStore::new(1, status, "TX-1"));
        let fulfillment = Arc::new(FulfillmentService::new(
            store.clone(),
            Arc::new(NoopScheduler),
            FulfillmentPolicy {
                payment_window: Duration::from_secs(3600),
                confirm_window: Duration::from_secs(3600),
            },
        ));
        (
            PaymentWebhookHandler::new(store.clone(), fulfillment, KEY.to_string()),
            store,
        )
    }

    fn notification(transaction_status: &str) -> GatewayNotification {
        GatewayNotification {
            order_ref: "TX-1".to_string(),
            status_code: "200".to_string(),
            gross_amount: "100.00".to_string(),
            transaction_status: transaction_status.to_string(),
            signature: signature_for("TX-1", "200", "100.00", KEY),
        }
    }

    #[test]
    fn bad_signature_is_rejected_before_any_lookup() {
        let (handler, store) = handler(OrderStatus::PendingPayment);
        let mut n = notification("settlement");
        n.signature = "forged".to_string();
        assert!(matches!(
            handler.handle(&n),
            Err(DomainError::InvalidSignature)
        ));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(store.status(1), OrderStatus::PendingPayment);
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let (handler, _) = handler(OrderStatus::PendingPayment);
        let mut n = notification("settlement");
        n.order_ref = "TX-404".to_string();
        n.signature = signature_for("TX-404", "200", "100.00", KEY);
        assert!(matches!(
            handler.handle(&n),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn settlement_moves_a_pending_order_to_processing() {
        let (handler, store) = handler(OrderStatus::PendingPayment);
        let outcome = handler.handle(&notification("settlement")).unwrap();
        assert_eq!(outcome, WebhookOutcome::Settled);
        assert_eq!(store.status(1), OrderStatus::Processing);
    }

    #[test]
    fn settlement_also_applies_from_payment_review() {
        let (handler, store) = handler(OrderStatus::PaymentReview);
        assert_eq!(
            handler.handle(&notification("capture")).unwrap(),
            WebhookOutcome::Settled
        );
        assert_eq!(store.status(1), OrderStatus::Processing);
    }

    #[test]
    fn duplicate_settlement_is_a_noop() {
        let (handler, store) = handler(OrderStatus::PendingPayment);
        assert_eq!(
            handler.handle(&notification("settlement")).unwrap(),
            WebhookOutcome::Settled
        );
        assert_eq!(
            handler.handle(&notification("settlement")).unwrap(),
            WebhookOutcome::Ignored
        );
        assert_eq!(store.status(1), OrderStatus::Processing);
    }

    #[test]
    fn expiry_cancels_an_unpaid_order() {
        let (handler, store) = handler(OrderStatus::PendingPayment);
        assert_eq!(
            handler.handle(&notification("expire")).unwrap(),
            WebhookOutcome::Cancelled
        );
        assert_eq!(store.status(1), OrderStatus::Cancelled);
    }

    #[test]
    fn denial_after_settlement_is_ignored() {
        let (handler, store) = handler(OrderStatus::Processing);
        assert_eq!(
            handler.handle(&notification("deny")).unwrap(),
            WebhookOutcome::Ignored
        );
        assert_eq!(store.status(1), OrderStatus::Processing);
    }

    #[test]
    fn pending_and_unknown_statuses_are_ignored() {
        let (handler, store) = handler(OrderStatus::PendingPayment);
        assert_eq!(
            handler.handle(&notification("pending")).unwrap(),
            WebhookOutcome::Ignored
        );
        assert_eq!(
            handler.handle(&notification("refund")).unwrap(),
            WebhookOutcome::Ignored
        );
        assert_eq!(store.status(1), OrderStatus::PendingPayment);
    }
}
