pub mod checkout;
pub mod fulfillment;
pub mod idempotency;
pub mod scheduler;
pub mod webhook;
