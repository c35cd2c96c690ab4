pub mod collaborators;
pub mod ledger;
pub mod models;
pub mod order_store;
pub mod rollback;
pub mod stock;

#[cfg(test)]
pub(crate) mod testutil;

use crate::domain::errors::DomainError;

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}
