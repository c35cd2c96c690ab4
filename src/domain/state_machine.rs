//! Pure transition table for the order lifecycle.
//!
//! `plan` decides, without touching storage, whether a trigger is legal from
//! the current status for the given actor, and what has to change if it is.
//! The order store executes the returned plan inside one row-locked
//! transaction, so a racing pair of transitions resolves to one winner and
//! one `InvalidTransition` once the loser re-reads the committed status.

use super::errors::DomainError;
use super::order::{Actor, OrderStatus, PaymentStatus};

/// Everything that can move an order to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Owner uploads a manual bank-transfer proof.
    SubmitPaymentProof,
    /// Gateway webhook reports capture/settlement.
    GatewaySettled,
    /// Gateway webhook reports deny/cancel/expire.
    GatewayDenied,
    /// Admin accepts a manual payment proof.
    ApprovePayment,
    /// Admin rejects a manual payment proof; the payment window re-opens.
    RejectPayment,
    /// Admin hands the order to the courier.
    Ship,
    /// Owner confirms receipt.
    ConfirmReceipt,
    /// Post-ship grace window elapsed with no user action.
    AutoConfirm,
    CancelByUser,
    CancelByAdmin,
    /// Payment deadline elapsed unpaid.
    AutoCancel,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::SubmitPaymentProof => "SUBMIT_PAYMENT_PROOF",
            Trigger::GatewaySettled => "GATEWAY_SETTLED",
            Trigger::GatewayDenied => "GATEWAY_DENIED",
            Trigger::ApprovePayment => "APPROVE_PAYMENT",
            Trigger::RejectPayment => "REJECT_PAYMENT",
            Trigger::Ship => "SHIP",
            Trigger::ConfirmReceipt => "CONFIRM_RECEIPT",
            Trigger::AutoConfirm => "AUTO_CONFIRM",
            Trigger::CancelByUser => "CANCEL_BY_USER",
            Trigger::CancelByAdmin => "CANCEL_BY_ADMIN",
            Trigger::AutoCancel => "AUTO_CANCEL",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delayed-job families, at most one live job per (order, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    AutoCancel,
    AutoConfirm,
}

/// What should happen to the payment row as part of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentEffect {
    pub status: PaymentStatus,
    /// Record the reviewing admin id (admin approve/reject only).
    pub stamp_reviewer: bool,
    /// Record paid-at (settlement/approval only).
    pub stamp_paid_at: bool,
}

/// The full effect of a legal transition. The status/payment/compensation
/// parts are transactional; arm/disarm are post-commit best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next: OrderStatus,
    pub payment: Option<PaymentEffect>,
    /// Restore reserved stock and revert voucher use, in-transaction.
    pub compensate: bool,
    pub arm: Option<JobKind>,
    pub disarm: &'static [JobKind],
    /// Push the order's payment deadline out by a fresh window.
    pub reset_payment_deadline: bool,
}

impl TransitionPlan {
    fn to(next: OrderStatus) -> Self {
        Self {
            next,
            payment: None,
            compensate: false,
            arm: None,
            disarm: &[],
            reset_payment_deadline: false,
        }
    }
}

fn invalid(from: OrderStatus, trigger: Trigger) -> DomainError {
    DomainError::InvalidTransition {
        from: from.as_str().to_string(),
        trigger: trigger.as_str().to_string(),
    }
}

/// Decide the effect of `trigger` on an order currently in `current`,
/// owned by `owner_id`, requested by `actor`.
///
/// The actor check runs first: a non-owner user, or the wrong actor class
/// entirely, fails before the status is even consulted.
pub fn plan(
    current: OrderStatus,
    owner_id: i64,
    trigger: Trigger,
    actor: Actor,
) -> Result<TransitionPlan, DomainError> {
    check_actor(owner_id, trigger, actor).map_err(|_| invalid(current, trigger))?;

    let plan = match (trigger, current) {
        (Trigger::SubmitPaymentProof, OrderStatus::PendingPayment) => TransitionPlan {
            payment: Some(PaymentEffect {
                status: PaymentStatus::Pending,
                stamp_reviewer: false,
                stamp_paid_at: false,
            }),
            ..TransitionPlan::to(OrderStatus::PaymentReview)
        },

        (Trigger::GatewaySettled, OrderStatus::PendingPayment | OrderStatus::PaymentReview) => {
            TransitionPlan {
                payment: Some(PaymentEffect {
                    status: PaymentStatus::Paid,
                    stamp_reviewer: false,
                    stamp_paid_at: true,
                }),
                disarm: &[JobKind::AutoCancel],
                ..TransitionPlan::to(OrderStatus::Processing)
            }
        }

        (Trigger::GatewayDenied, OrderStatus::PendingPayment) => TransitionPlan {
            payment: Some(PaymentEffect {
                status: PaymentStatus::Failed,
                stamp_reviewer: false,
                stamp_paid_at: false,
            }),
            compensate: true,
            disarm: &[JobKind::AutoCancel],
            ..TransitionPlan::to(OrderStatus::Cancelled)
        },

        (Trigger::ApprovePayment, OrderStatus::PaymentReview) => TransitionPlan {
            payment: Some(PaymentEffect {
                status: PaymentStatus::Paid,
                stamp_reviewer: true,
                stamp_paid_at: true,
            }),
            disarm: &[JobKind::AutoCancel],
            ..TransitionPlan::to(OrderStatus::Processing)
        },

        (Trigger::RejectPayment, OrderStatus::PaymentReview) => TransitionPlan {
            payment: Some(PaymentEffect {
                status: PaymentStatus::Rejected,
                stamp_reviewer: true,
                stamp_paid_at: false,
            }),
            arm: Some(JobKind::AutoCancel),
            reset_payment_deadline: true,
            ..TransitionPlan::to(OrderStatus::PendingPayment)
        },

        (Trigger::Ship, OrderStatus::Processing) => TransitionPlan {
            arm: Some(JobKind::AutoConfirm),
            ..TransitionPlan::to(OrderStatus::Shipped)
        },

        (Trigger::ConfirmReceipt | Trigger::AutoConfirm, OrderStatus::Shipped) => TransitionPlan {
            disarm: &[JobKind::AutoConfirm, JobKind::AutoCancel],
            ..TransitionPlan::to(OrderStatus::Confirmed)
        },

        (Trigger::CancelByUser | Trigger::AutoCancel, OrderStatus::PendingPayment) => {
            TransitionPlan {
                compensate: true,
                disarm: &[JobKind::AutoCancel],
                ..TransitionPlan::to(OrderStatus::Cancelled)
            }
        }

        (
            Trigger::CancelByAdmin,
            OrderStatus::PendingPayment | OrderStatus::PaymentReview | OrderStatus::Processing,
        ) => TransitionPlan {
            compensate: true,
            disarm: &[JobKind::AutoCancel],
            ..TransitionPlan::to(OrderStatus::Cancelled)
        },

        (trigger, current) => return Err(invalid(current, trigger)),
    };

    Ok(plan)
}

/// Actor-class and ownership guard, per trigger.
fn check_actor(owner_id: i64, trigger: Trigger, actor: Actor) -> Result<(), ()> {
    match trigger {
        Trigger::SubmitPaymentProof | Trigger::ConfirmReceipt | Trigger::CancelByUser => {
            match actor {
                Actor::User(id) if id == owner_id => Ok(()),
                _ => Err(()),
            }
        }
        Trigger::ApprovePayment
        | Trigger::RejectPayment
        | Trigger::Ship
        | Trigger::CancelByAdmin => match actor {
            Actor::Admin(_) => Ok(()),
            _ => Err(()),
        },
        Trigger::GatewaySettled
        | Trigger::GatewayDenied
        | Trigger::AutoConfirm
        | Trigger::AutoCancel => match actor {
            Actor::System => Ok(()),
            _ => Err(()),
        },
    }
}
