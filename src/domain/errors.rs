use thiserror::Error;

/// Error taxonomy shared by every engine operation.
///
/// Anything raised inside a transactional step aborts the whole transaction;
/// the HTTP layer maps each variant to a status code in `crate::errors`.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{kind} not found: {detail}")]
    NotFound { kind: &'static str, detail: String },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("No inventory row for product {product_id} at store {store_id}")]
    NoInventory { store_id: i64, product_id: i64 },

    #[error("Invalid transition: {trigger} not allowed from {from}")]
    InvalidTransition { from: String, trigger: String },

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(kind: &'static str, detail: impl Into<String>) -> Self {
        DomainError::NotFound {
            kind,
            detail: detail.into(),
        }
    }
}
