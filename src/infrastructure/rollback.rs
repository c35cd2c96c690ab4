//! Compensation for cancelled orders, run inside the same transaction as the
//! CANCELLED status write. A cancelled order with un-restored stock is a
//! correctness bug, so this is never invoked post-commit.

use chrono::Duration;
use diesel::prelude::*;
use diesel::PgConnection;

use crate::domain::errors::DomainError;
use crate::domain::inventory::StockItem;
use crate::domain::order::Actor;
use crate::schema::voucher_redemptions;

use super::models::{OrderItemRow, OrderRow};
use super::stock;

/// Vouchers are not foreign-keyed to orders in this domain; redemptions are
/// associated heuristically by proximity to the order's creation time.
const VOUCHER_WINDOW_MINUTES: i64 = 10;

/// Restore every reserved line of `order` and revert voucher redemptions
/// made around its creation.
pub fn compensate(
    conn: &mut PgConnection,
    order: &OrderRow,
    items: &[OrderItemRow],
    actor: Actor,
) -> Result<(), DomainError> {
    let stock_items: Vec<StockItem> = items
        .iter()
        .map(|i| StockItem::new(i.product_id, i.quantity))
        .collect();

    if !stock_items.is_empty() {
        let note = format!("rollback of cancelled order {}", order.id);
        stock::restore_items(conn, order.store_id, &stock_items, actor, Some(&note))?;
    }

    let window = Duration::minutes(VOUCHER_WINDOW_MINUTES);
    diesel::update(
        voucher_redemptions::table.filter(
            voucher_redemptions::user_id
                .eq(order.user_id)
                .and(voucher_redemptions::reverted_at.is_null())
                .and(voucher_redemptions::redeemed_at.ge(order.created_at - window))
                .and(voucher_redemptions::redeemed_at.le(order.created_at + window)),
        ),
    )
    .set(voucher_redemptions::reverted_at.eq(diesel::dsl::now))
    .execute(conn)?;

    Ok(())
}
