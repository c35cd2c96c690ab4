use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A (product, quantity) pair for reservation, restoration, and transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub product_id: i64,
    pub quantity: i32,
}

impl StockItem {
    pub fn new(product_id: i64, quantity: i32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Validate a batch of stock items: non-empty, strictly positive quantities.
pub fn validate_items(items: &[StockItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::Validation("item list is empty".into()));
    }
    for item in items {
        if item.quantity <= 0 {
            return Err(DomainError::Validation(format!(
                "quantity for product {} must be positive, got {}",
                item.product_id, item.quantity
            )));
        }
    }
    Ok(())
}

/// Reason code recorded on every stock journal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalReason {
    Add,
    Remove,
    TransferIn,
    TransferOut,
}

impl JournalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalReason::Add => "ADD",
            JournalReason::Remove => "REMOVE",
            JournalReason::TransferIn => "TRANSFER_IN",
            JournalReason::TransferOut => "TRANSFER_OUT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_items(&[]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn zero_or_negative_quantity_is_rejected() {
        assert!(validate_items(&[StockItem::new(1, 0)]).is_err());
        assert!(validate_items(&[StockItem::new(1, -3)]).is_err());
        assert!(validate_items(&[StockItem::new(1, 2), StockItem::new(2, 0)]).is_err());
    }

    #[test]
    fn positive_quantities_pass() {
        assert!(validate_items(&[StockItem::new(1, 1), StockItem::new(2, 10)]).is_ok());
    }
}
