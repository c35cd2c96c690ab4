//! Drives order transitions requested by users, admins, the payment gateway,
//! and timers, then keeps the delayed-job schedule in sync with the outcome.
//!
//! The transition itself (guard, status write, compensation) is atomic inside
//! the order store; arming/disarming jobs afterwards is best-effort and only
//! affects liveness.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::DomainError;
use crate::domain::ports::{JobScheduler, OrderStore, TransitionContext, TransitionOutcome};
use crate::domain::order::Actor;
use crate::domain::state_machine::{JobKind, Trigger};

use super::scheduler::JobHandler;

#[derive(Debug, Clone)]
pub struct FulfillmentPolicy {
    /// Window before an unpaid order is auto-cancelled.
    pub payment_window: Duration,
    /// Window after shipping before the order is auto-confirmed.
    pub confirm_window: Duration,
}

pub struct FulfillmentService {
    store: Arc<dyn OrderStore>,
    scheduler: Arc<dyn JobScheduler>,
    policy: FulfillmentPolicy,
}

impl FulfillmentService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        scheduler: Arc<dyn JobScheduler>,
        policy: FulfillmentPolicy,
    ) -> Self {
        Self {
            store,
            scheduler,
            policy,
        }
    }

    // ── User actions ─────────────────────────────────────────────────────────

    pub fn submit_payment_proof(
        &self,
        order_id: i64,
        user_id: i64,
        proof_url: String,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::SubmitPaymentProof,
            Actor::User(user_id),
            TransitionContext {
                proof_url: Some(proof_url),
                ..TransitionContext::default()
            },
        )
    }

    pub fn confirm_receipt(
        &self,
        order_id: i64,
        user_id: i64,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::ConfirmReceipt,
            Actor::User(user_id),
            TransitionContext::default(),
        )
    }

    pub fn cancel_by_user(
        &self,
        order_id: i64,
        user_id: i64,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::CancelByUser,
            Actor::User(user_id),
            TransitionContext::default(),
        )
    }

    // ── Admin actions ────────────────────────────────────────────────────────

    pub fn approve_payment(
        &self,
        order_id: i64,
        admin_id: i64,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::ApprovePayment,
            Actor::Admin(admin_id),
            TransitionContext::default(),
        )
    }

    pub fn reject_payment(
        &self,
        order_id: i64,
        admin_id: i64,
    ) -> Result<TransitionOutcome, DomainError> {
        let window = chrono::Duration::from_std(self.policy.payment_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(60));
        self.run(
            order_id,
            Trigger::RejectPayment,
            Actor::Admin(admin_id),
            TransitionContext {
                new_payment_deadline: Some(chrono::Utc::now() + window),
                ..TransitionContext::default()
            },
        )
    }

    pub fn ship_order(
        &self,
        order_id: i64,
        admin_id: i64,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::Ship,
            Actor::Admin(admin_id),
            TransitionContext::default(),
        )
    }

    pub fn cancel_by_admin(
        &self,
        order_id: i64,
        admin_id: i64,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::CancelByAdmin,
            Actor::Admin(admin_id),
            TransitionContext::default(),
        )
    }

    // ── Gateway callbacks (invoked by the webhook handler) ───────────────────

    pub fn gateway_settled(&self, order_id: i64) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::GatewaySettled,
            Actor::System,
            TransitionContext::default(),
        )
    }

    pub fn gateway_denied(&self, order_id: i64) -> Result<TransitionOutcome, DomainError> {
        self.run(
            order_id,
            Trigger::GatewayDenied,
            Actor::System,
            TransitionContext::default(),
        )
    }

    // ── Core ─────────────────────────────────────────────────────────────────

    fn run(
        &self,
        order_id: i64,
        trigger: Trigger,
        actor: Actor,
        ctx: TransitionContext,
    ) -> Result<TransitionOutcome, DomainError> {
        let outcome = self.store.transition(order_id, trigger, actor, ctx)?;
        self.sync_jobs(&outcome);
        Ok(outcome)
    }

    fn sync_jobs(&self, outcome: &TransitionOutcome) {
        for &kind in outcome.plan.disarm {
            if let Err(e) = self.scheduler.cancel(outcome.order_id, kind) {
                log::warn!(
                    "failed to disarm {kind:?} for order {}: {e}",
                    outcome.order_id
                );
            }
        }
        if let Some(kind) = outcome.plan.arm {
            let delay = match kind {
                JobKind::AutoCancel => self.policy.payment_window,
                JobKind::AutoConfirm => self.policy.confirm_window,
            };
            if let Err(e) = self.scheduler.schedule(outcome.order_id, kind, delay) {
                log::warn!("failed to arm {kind:?} for order {}: {e}", outcome.order_id);
            }
        }
    }
}

/// Timer firings arrive here. A stale timer losing its race against a human
/// action is expected and quiet; anything else is worth a log line.
impl JobHandler for FulfillmentService {
    fn run(&self, order_id: i64, kind: JobKind) {
        let trigger = match kind {
            JobKind::AutoCancel => Trigger::AutoCancel,
            JobKind::AutoConfirm => Trigger::AutoConfirm,
        };
        match self.run(order_id, trigger, Actor::System, TransitionContext::default()) {
            Ok(outcome) => log::info!(
                "timer {trigger} moved order {order_id} from {} to {}",
                outcome.from,
                outcome.to
            ),
            Err(DomainError::InvalidTransition { from, .. }) => {
                log::debug!("stale {trigger} timer for order {order_id} (now {from}), ignoring")
            }
            Err(e) => log::error!("timer {trigger} failed for order {order_id}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::domain::order::{NewCheckout, OrderStatus, OrderView, PaymentView};
    use crate::domain::state_machine;

    const OWNER: i64 = 7;
    const ADMIN: i64 = 99;

    /// In-memory order store that applies the real state-machine plan, so
    /// these tests exercise the same guard logic production uses.
    struct FakeOrderStore {
        orders: Mutex<HashMap<i64, OrderStatus>>,
        compensated: Mutex<Vec<i64>>,
    }

    impl FakeOrderStore {
        fn with_order(order_id: i64, status: OrderStatus) -> Self {
            Self {
                orders: Mutex::new(HashMap::from([(order_id, status)])),
                compensated: Mutex::new(vec![]),
            }
        }

        fn status(&self, order_id: i64) -> OrderStatus {
            self.orders.lock().unwrap()[&order_id]
        }
    }

    impl OrderStore for FakeOrderStore {
        fn create_checkout(&self, _: NewCheckout) -> Result<OrderView, DomainError> {
            unimplemented!("not exercised by fulfillment tests")
        }

        fn find_order(&self, _: i64) -> Result<OrderView, DomainError> {
            unimplemented!("not exercised by fulfillment tests")
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
            if plan.compensate {
                self.compensated.lock().unwrap().push(order_id);
            }
            Ok(TransitionOutcome {
                order_id,
                user_id: OWNER,
                from: current,
                to: plan.next,
                plan,
            })
        }

        fn find_payment_by_gateway_ref(&self, _: &str) -> Result<PaymentView, DomainError> {
            unimplemented!("not exercised by fulfillment tests")
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        fail: AtomicBool,
        scheduled: Mutex<Vec<(i64, JobKind, Duration)>>,
        cancelled: Mutex<Vec<(i64, JobKind)>>,
    }

    impl JobScheduler for RecordingScheduler {
        fn schedule(&self, order_id: i64, kind: JobKind, delay: Duration) -> Result<(), DomainError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DomainError::Internal("queue down".into()));
            }
            self.scheduled.lock().unwrap().push((order_id, kind, delay));
            Ok(())
        }
        fn cancel(&self, order_id: i64, kind: JobKind) -> Result<(), DomainError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DomainError::Internal("queue down".into()));
            }
            self.cancelled.lock().unwrap().push((order_id, kind));
            Ok(())
        }
    }

    fn service(
        status: OrderStatus,
    ) -> (FulfillmentService, Arc<FakeOrderStore>, Arc<RecordingScheduler>) {
        let store = Arc::new(FakeOrderStore::with_order(1, status));
        let scheduler = Arc::new(RecordingScheduler::default());
        let svc = FulfillmentService::new(
            store.clone(),
            scheduler.clone(),
            FulfillmentPolicy {
                payment_window: Duration::from_secs(3600),
                confirm_window: Duration::from_secs(7 * 24 * 3600),
            },
        );
        (svc, store, scheduler)
    }

    #[test]
    fn shipping_arms_the_auto_confirm_job() {
        let (svc, store, scheduler) = service(OrderStatus::Processing);
        svc.ship_order(1, ADMIN).unwrap();
        assert_eq!(store.status(1), OrderStatus::Shipped);
        assert_eq!(
            scheduler.scheduled.lock().unwrap().as_slice(),
            &[(1, JobKind::AutoConfirm, Duration::from_secs(7 * 24 * 3600))]
        );
    }

    #[test]
    fn confirmation_disarms_pending_jobs() {
        let (svc, store, scheduler) = service(OrderStatus::Shipped);
        svc.confirm_receipt(1, OWNER).unwrap();
        assert_eq!(store.status(1), OrderStatus::Confirmed);
        let cancelled = scheduler.cancelled.lock().unwrap();
        assert!(cancelled.contains(&(1, JobKind::AutoConfirm)));
        assert!(cancelled.contains(&(1, JobKind::AutoCancel)));
    }

    #[test]
    fn rejection_reverts_and_rearms_auto_cancel_with_a_fresh_window() {
        let (svc, store, scheduler) = service(OrderStatus::PaymentReview);
        svc.reject_payment(1, ADMIN).unwrap();
        assert_eq!(store.status(1), OrderStatus::PendingPayment);
        assert_eq!(
            scheduler.scheduled.lock().unwrap().as_slice(),
            &[(1, JobKind::AutoCancel, Duration::from_secs(3600))]
        );
    }

    #[test]
    fn user_cancel_compensates_and_disarms() {
        let (svc, store, scheduler) = service(OrderStatus::PendingPayment);
        svc.cancel_by_user(1, OWNER).unwrap();
        assert_eq!(store.status(1), OrderStatus::Cancelled);
        assert_eq!(store.compensated.lock().unwrap().as_slice(), &[1]);
        assert!(scheduler
            .cancelled
            .lock()
            .unwrap()
            .contains(&(1, JobKind::AutoCancel)));
    }

    #[test]
    fn non_owner_cannot_cancel() {
        let (svc, store, _) = service(OrderStatus::PendingPayment);
        let result = svc.cancel_by_user(1, OWNER + 1);
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(store.status(1), OrderStatus::PendingPayment);
    }

    #[test]
    fn admin_cannot_cancel_a_shipped_order() {
        let (svc, store, _) = service(OrderStatus::Shipped);
        let result = svc.cancel_by_admin(1, ADMIN);
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(store.status(1), OrderStatus::Shipped);
        assert!(store.compensated.lock().unwrap().is_empty());
    }

    #[test]
    fn auto_confirm_timer_confirms_a_shipped_order() {
        let (svc, store, _) = service(OrderStatus::Shipped);
        JobHandler::run(&svc, 1, JobKind::AutoConfirm);
        assert_eq!(store.status(1), OrderStatus::Confirmed);
    }

    #[test]
    fn confirm_after_auto_confirm_is_an_invalid_transition() {
        let (svc, store, _) = service(OrderStatus::Shipped);
        JobHandler::run(&svc, 1, JobKind::AutoConfirm);
        let result = svc.confirm_receipt(1, OWNER);
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(store.status(1), OrderStatus::Confirmed);
    }

    #[test]
    fn stale_auto_cancel_timer_is_swallowed() {
        // Payment was approved before the timer fired; the guard rejects the
        // trigger and the handler must not panic or change anything.
        let (svc, store, _) = service(OrderStatus::Processing);
        JobHandler::run(&svc, 1, JobKind::AutoCancel);
        assert_eq!(store.status(1), OrderStatus::Processing);
        assert!(store.compensated.lock().unwrap().is_empty());
    }

    #[test]
    fn auto_cancel_timer_cancels_an_unpaid_order() {
        let (svc, store, _) = service(OrderStatus::PendingPayment);
        JobHandler::run(&svc, 1, JobKind::AutoCancel);
        assert_eq!(store.status(1), OrderStatus::Cancelled);
        assert_eq!(store.compensated.lock().unwrap().as_slice(), &[1]);
    }

    #[test]
    fn scheduler_outage_does_not_fail_the_transition() {
        let (svc, store, scheduler) = service(OrderStatus::Processing);
        scheduler.fail.store(true, Ordering::SeqCst);
        svc.ship_order(1, ADMIN).unwrap();
        assert_eq!(store.status(1), OrderStatus::Shipped);
    }

    #[test]
    fn approval_settles_payment_and_moves_to_processing() {
        let (svc, store, scheduler) = service(OrderStatus::PaymentReview);
        let outcome = svc.approve_payment(1, ADMIN).unwrap();
        assert_eq!(store.status(1), OrderStatus::Processing);
        assert!(outcome.plan.payment.is_some());
        assert!(scheduler
            .cancelled
            .lock()
            .unwrap()
            .contains(&(1, JobKind::AutoCancel)));
    }
}
