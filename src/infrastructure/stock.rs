//! Connection-scoped stock-ledger primitives.
//!
//! These run inside a transaction owned by the caller, which is what lets
//! the checkout and cancellation paths mutate stock atomically with their
//! own writes. Oversell prevention is the conditional decrement: the
//! `quantity >= wanted` predicate and the subtraction execute as one atomic
//! UPDATE in the database, never as an application-level read-then-write.

use diesel::prelude::*;
use diesel::PgConnection;

use crate::domain::errors::DomainError;
use crate::domain::inventory::{JournalReason, StockItem};
use crate::domain::order::Actor;
use crate::schema::{stock_journal, store_inventory};

use super::models::{NewInventoryRow, NewJournalRow};

/// Conditionally decrement every item, journaling a REMOVE per success.
/// Any shortfall aborts with `InsufficientStock` and the caller's transaction
/// rolls the earlier decrements back.
pub fn reserve_items(
    conn: &mut PgConnection,
    store_id: i64,
    items: &[StockItem],
    actor: Actor,
) -> Result<(), DomainError> {
    for item in items {
        let affected = diesel::update(
            store_inventory::table.filter(
                store_inventory::store_id
                    .eq(store_id)
                    .and(store_inventory::product_id.eq(item.product_id))
                    .and(store_inventory::quantity.ge(item.quantity)),
            ),
        )
        .set((
            store_inventory::quantity.eq(store_inventory::quantity - item.quantity),
            store_inventory::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;

        if affected == 0 {
            return Err(shortfall_error(conn, store_id, item)?);
        }

        journal(
            conn,
            store_id,
            item.product_id,
            -item.quantity,
            JournalReason::Remove,
            actor,
            None,
        )?;
    }
    Ok(())
}

/// Unconditional increment, creating the inventory row at the new quantity
/// when it does not exist yet. Journals an ADD per item.
pub fn restore_items(
    conn: &mut PgConnection,
    store_id: i64,
    items: &[StockItem],
    actor: Actor,
    note: Option<&str>,
) -> Result<(), DomainError> {
    for item in items {
        upsert_increment(conn, store_id, item)?;
        journal(
            conn,
            store_id,
            item.product_id,
            item.quantity,
            JournalReason::Add,
            actor,
            note,
        )?;
    }
    Ok(())
}

/// Move stock between stores. Sources are read-checked up front so an
/// obviously short transfer fails before any mutation; the conditional
/// decrement still guards each source against concurrent reservations.
pub fn transfer_items(
    conn: &mut PgConnection,
    from_store_id: i64,
    to_store_id: i64,
    items: &[StockItem],
    actor: Actor,
    note: Option<&str>,
) -> Result<(), DomainError> {
    check_items(conn, from_store_id, items)?;

    for item in items {
        let affected = diesel::update(
            store_inventory::table.filter(
                store_inventory::store_id
                    .eq(from_store_id)
                    .and(store_inventory::product_id.eq(item.product_id))
                    .and(store_inventory::quantity.ge(item.quantity)),
            ),
        )
        .set((
            store_inventory::quantity.eq(store_inventory::quantity - item.quantity),
            store_inventory::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
        if affected == 0 {
            return Err(shortfall_error(conn, from_store_id, item)?);
        }
        journal(
            conn,
            from_store_id,
            item.product_id,
            -item.quantity,
            JournalReason::TransferOut,
            actor,
            note,
        )?;

        upsert_increment(conn, to_store_id, item)?;
        journal(
            conn,
            to_store_id,
            item.product_id,
            item.quantity,
            JournalReason::TransferIn,
            actor,
            note,
        )?;
    }
    Ok(())
}

/// Read-only availability check with the same error surface as `reserve_items`.
pub fn check_items(
    conn: &mut PgConnection,
    store_id: i64,
    items: &[StockItem],
) -> Result<(), DomainError> {
    for item in items {
        let available = current_quantity(conn, store_id, item.product_id)?.ok_or(
            DomainError::NoInventory {
                store_id,
                product_id: item.product_id,
            },
        )?;
        if available < item.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: item.product_id,
                requested: item.quantity,
                available,
            });
        }
    }
    Ok(())
}

fn current_quantity(
    conn: &mut PgConnection,
    store_id: i64,
    product_id: i64,
) -> Result<Option<i32>, DomainError> {
    Ok(store_inventory::table
        .filter(
            store_inventory::store_id
                .eq(store_id)
                .and(store_inventory::product_id.eq(product_id)),
        )
        .select(store_inventory::quantity)
        .first::<i32>(conn)
        .optional()?)
}

/// A conditional decrement affected zero rows: either the row is missing or
/// a concurrent reservation drained it. Re-read for the error detail.
fn shortfall_error(
    conn: &mut PgConnection,
    store_id: i64,
    item: &StockItem,
) -> Result<DomainError, DomainError> {
    Ok(match current_quantity(conn, store_id, item.product_id)? {
        None => DomainError::NoInventory {
            store_id,
            product_id: item.product_id,
        },
        Some(available) => DomainError::InsufficientStock {
            product_id: item.product_id,
            requested: item.quantity,
            available,
        },
    })
}

fn upsert_increment(
    conn: &mut PgConnection,
    store_id: i64,
    item: &StockItem,
) -> Result<(), DomainError> {
    diesel::insert_into(store_inventory::table)
        .values(&NewInventoryRow {
            store_id,
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .on_conflict((store_inventory::store_id, store_inventory::product_id))
        .do_update()
        .set((
            store_inventory::quantity.eq(store_inventory::quantity + item.quantity),
            store_inventory::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
    Ok(())
}

fn journal(
    conn: &mut PgConnection,
    store_id: i64,
    product_id: i64,
    delta: i32,
    reason: JournalReason,
    actor: Actor,
    note: Option<&str>,
) -> Result<(), DomainError> {
    diesel::insert_into(stock_journal::table)
        .values(&NewJournalRow {
            store_id,
            product_id,
            delta,
            reason: reason.as_str().to_string(),
            actor_id: actor.journal_id(),
            note: note.map(String::from),
        })
        .execute(conn)?;
    Ok(())
}
