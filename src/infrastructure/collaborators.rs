//! Diesel-backed adapters for the external collaborators the checkout flow
//! consults: store/address resolution, shipping quotes, cart cleanup, and
//! catalog reads.

use bigdecimal::BigDecimal;
use diesel::prelude::*;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::{
    CartGateway, Catalog, ProductInfo, ShippingQuote, ShippingResolver, StoreDirectory,
};
use crate::schema::{carts, products, stores, user_addresses};

use super::models::{AddressRow, ProductRow, StoreRow};

// ── Store & address resolution ───────────────────────────────────────────────

/// Resolves explicit store ids against the directory and falls back to the
/// configured default store. Geolocation-based nearest-store selection lives
/// upstream of this engine.
pub struct DieselStoreDirectory {
    pool: DbPool,
    default_store_id: i64,
}

impl DieselStoreDirectory {
    pub fn new(pool: DbPool, default_store_id: i64) -> Self {
        Self {
            pool,
            default_store_id,
        }
    }
}

impl StoreDirectory for DieselStoreDirectory {
    fn resolve_store(
        &self,
        explicit: Option<i64>,
        _user_id: i64,
        _address_id: Option<i64>,
    ) -> Result<i64, DomainError> {
        let store_id = explicit.unwrap_or(self.default_store_id);
        let mut conn = self.pool.get()?;
        let store: StoreRow = stores::table
            .find(store_id)
            .select(StoreRow::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| DomainError::not_found("store", store_id.to_string()))?;
        if !store.is_active {
            return Err(DomainError::Validation(format!(
                "store {} is not accepting orders",
                store.id
            )));
        }
        Ok(store.id)
    }

    fn resolve_address(&self, user_id: i64, explicit: Option<i64>) -> Result<i64, DomainError> {
        let mut conn = self.pool.get()?;
        match explicit {
            Some(address_id) => {
                let address: Option<AddressRow> = user_addresses::table
                    .find(address_id)
                    .select(AddressRow::as_select())
                    .first(&mut conn)
                    .optional()?;
                match address {
                    Some(a) if a.user_id == user_id => Ok(a.id),
                    _ => Err(DomainError::not_found("address", address_id.to_string())),
                }
            }
            None => {
                let primary: Option<AddressRow> = user_addresses::table
                    .filter(
                        user_addresses::user_id
                            .eq(user_id)
                            .and(user_addresses::is_primary.eq(true)),
                    )
                    .select(AddressRow::as_select())
                    .first(&mut conn)
                    .optional()?;
                primary.map(|a| a.id).ok_or_else(|| {
                    DomainError::not_found("address", format!("no primary address for user {user_id}"))
                })
            }
        }
    }
}

// ── Shipping ─────────────────────────────────────────────────────────────────

/// Flat-rate quote. Carrier rate lookups are an external service in
/// production; the engine only needs a method id and a cost.
pub struct FlatRateShipping {
    method_id: i64,
    cost: BigDecimal,
}

impl FlatRateShipping {
    pub fn new(method_id: i64, cost: BigDecimal) -> Self {
        Self { method_id, cost }
    }
}

impl ShippingResolver for FlatRateShipping {
    fn quote(
        &self,
        _store_id: i64,
        _address_id: i64,
        method_id: Option<i64>,
    ) -> Result<ShippingQuote, DomainError> {
        Ok(ShippingQuote {
            method_id: method_id.unwrap_or(self.method_id),
            cost: self.cost.clone(),
        })
    }
}

// ── Cart ─────────────────────────────────────────────────────────────────────

pub struct DieselCartGateway {
    pool: DbPool,
}

impl DieselCartGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl CartGateway for DieselCartGateway {
    fn remove_items(
        &self,
        user_id: i64,
        store_id: i64,
        product_ids: &[i64],
    ) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        diesel::delete(
            carts::table.filter(
                carts::user_id
                    .eq(user_id)
                    .and(carts::store_id.eq(store_id))
                    .and(carts::product_id.eq_any(product_ids)),
            ),
        )
        .execute(&mut conn)?;
        Ok(())
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────────

pub struct DieselCatalog {
    pool: DbPool,
}

impl DieselCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Catalog for DieselCatalog {
    fn product(&self, product_id: i64) -> Result<Option<ProductInfo>, DomainError> {
        let mut conn = self.pool.get()?;
        let row: Option<ProductRow> = products::table
            .find(product_id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(|p| ProductInfo {
            id: p.id,
            name: p.name,
            price: p.price,
            is_active: p.is_active,
        }))
    }
}
