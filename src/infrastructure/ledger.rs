//! `StockLedger` over Postgres: one transaction per call, delegating to the
//! connection-scoped primitives in `stock`.

use diesel::Connection;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::inventory::{validate_items, StockItem};
use crate::domain::order::Actor;
use crate::domain::ports::StockLedger;

use super::stock;

pub struct DieselStockLedger {
    pool: DbPool,
}

impl DieselStockLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl StockLedger for DieselStockLedger {
    fn reserve(
        &self,
        store_id: i64,
        items: &[StockItem],
        actor: Actor,
    ) -> Result<(), DomainError> {
        validate_items(items)?;
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| stock::reserve_items(conn, store_id, items, actor))
    }

    fn restore(
        &self,
        store_id: i64,
        items: &[StockItem],
        actor: Actor,
        note: Option<&str>,
    ) -> Result<(), DomainError> {
        validate_items(items)?;
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| stock::restore_items(conn, store_id, items, actor, note))
    }

    fn transfer(
        &self,
        from_store_id: i64,
        to_store_id: i64,
        items: &[StockItem],
        actor: Actor,
        note: Option<&str>,
    ) -> Result<(), DomainError> {
        validate_items(items)?;
        if from_store_id == to_store_id {
            return Err(DomainError::Validation(
                "source and destination store are the same".into(),
            ));
        }
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| {
            stock::transfer_items(conn, from_store_id, to_store_id, items, actor, note)
        })
    }

    fn check_availability(&self, store_id: i64, items: &[StockItem]) -> Result<(), DomainError> {
        validate_items(items)?;
        let mut conn = self.pool.get()?;
        stock::check_items(&mut conn, store_id, items)
    }
}
