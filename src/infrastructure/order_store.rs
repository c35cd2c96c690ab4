//! Diesel-backed order store: the atomic checkout transaction and the
//! row-locked, guard-checked status transitions.

use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel::PgConnection;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::inventory::StockItem;
use crate::domain::order::{
    Actor, NewCheckout, OrderItemView, OrderStatus, OrderView, PaymentMethod, PaymentStatus,
    PaymentView, ProductSnapshot,
};
use crate::domain::order::grand_total;
use crate::domain::ports::{OrderStore, TransitionContext, TransitionOutcome};
use crate::domain::state_machine::{self, PaymentEffect, Trigger};
use crate::schema::{order_items, orders, payments, products, shipments};

use super::models::{
    NewOrderItemRow, NewOrderRow, NewPaymentRow, NewShipmentRow, OrderItemRow, OrderRow,
    PaymentRow, ProductRow,
};
use super::{rollback, stock};

pub struct DieselOrderStore {
    pool: DbPool,
}

impl DieselOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for DieselOrderStore {
    fn create_checkout(&self, checkout: NewCheckout) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let zero = BigDecimal::from(0);

            // 1. Order shell in PENDING_PAYMENT with zeroed totals; the real
            //    numbers are written once every line is priced.
            let order: OrderRow = diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    user_id: checkout.user_id,
                    store_id: checkout.store_id,
                    address_id: checkout.address_id,
                    status: OrderStatus::PendingPayment.as_str().to_string(),
                    payment_method: checkout.payment_method.as_str().to_string(),
                    subtotal: zero.clone(),
                    shipping_cost: checkout.shipping_cost.clone(),
                    discount_total: zero.clone(),
                    grand_total: zero.clone(),
                    total_items: 0,
                    payment_deadline: checkout.payment_deadline,
                })
                .returning(OrderRow::as_returning())
                .get_result(conn)?;

            // 2. Shipment stub.
            diesel::insert_into(shipments::table)
                .values(&NewShipmentRow {
                    order_id: order.id,
                    method_id: checkout.shipping_method_id,
                    cost: checkout.shipping_cost.clone(),
                    status: "PENDING".to_string(),
                })
                .execute(conn)?;

            // 3. Line items with frozen product snapshots.
            let mut subtotal = zero.clone();
            let mut total_items = 0;
            for item in &checkout.items {
                let product: ProductRow = products::table
                    .find(item.product_id)
                    .select(ProductRow::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| {
                        DomainError::not_found("product", item.product_id.to_string())
                    })?;

                let snapshot = ProductSnapshot {
                    product_id: product.id,
                    name: product.name.clone(),
                    price: product.price.clone(),
                };
                let line_total = &product.price * BigDecimal::from(item.quantity);

                diesel::insert_into(order_items::table)
                    .values(&NewOrderItemRow {
                        order_id: order.id,
                        product_id: item.product_id,
                        product_snapshot: serde_json::to_value(&snapshot)
                            .map_err(|e| DomainError::Internal(e.to_string()))?,
                        unit_price: product.price.clone(),
                        quantity: item.quantity,
                        line_total: line_total.clone(),
                    })
                    .execute(conn)?;

                subtotal += line_total;
                total_items += item.quantity;
            }

            // 4. The oversell gate. A shortfall here rolls the whole
            //    checkout back even though the pre-flight check passed.
            let stock_items: Vec<StockItem> = checkout
                .items
                .iter()
                .map(|i| StockItem::new(i.product_id, i.quantity))
                .collect();
            stock::reserve_items(
                conn,
                checkout.store_id,
                &stock_items,
                Actor::User(checkout.user_id),
            )?;

            // 5. Final totals.
            let total = grand_total(&subtotal, &zero, &checkout.shipping_cost)?;
            diesel::update(orders::table.find(order.id))
                .set((
                    orders::subtotal.eq(&subtotal),
                    orders::grand_total.eq(&total),
                    orders::total_items.eq(total_items),
                    orders::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;

            // 6. Payment row. Gateway payments get the reference the webhook
            //    will later match on.
            let gateway_ref = match checkout.payment_method {
                PaymentMethod::Gateway => Some(format!("ORDER-{}", order.id)),
                PaymentMethod::ManualTransfer => None,
            };
            diesel::insert_into(payments::table)
                .values(&NewPaymentRow {
                    order_id: order.id,
                    method: checkout.payment_method.as_str().to_string(),
                    gateway_ref,
                    amount: total,
                    status: PaymentStatus::Pending.as_str().to_string(),
                    proof_url: None,
                })
                .execute(conn)?;

            load_order_view(conn, order.id)
        })
    }

    fn find_order(&self, order_id: i64) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;
        load_order_view(&mut conn, order_id)
    }

    fn transition(
        &self,
        order_id: i64,
        trigger: Trigger,
        actor: Actor,
        ctx: TransitionContext,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // Row lock so concurrent transitions on this order serialize;
            // the loser re-reads the committed status and fails its guard.
            let order: OrderRow = orders::table
                .find(order_id)
                .select(OrderRow::as_select())
                .for_update()
                .first(conn)
                .optional()?
                .ok_or_else(|| DomainError::not_found("order", order_id.to_string()))?;

            let current = OrderStatus::parse(&order.status)?;
            let plan = state_machine::plan(current, order.user_id, trigger, actor)?;

            diesel::update(orders::table.find(order.id))
                .set((
                    orders::status.eq(plan.next.as_str()),
                    orders::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;

            if plan.reset_payment_deadline {
                let deadline = ctx
                    .new_payment_deadline
                    .unwrap_or_else(|| chrono::Utc::now() + chrono::Duration::minutes(60));
                diesel::update(orders::table.find(order.id))
                    .set(orders::payment_deadline.eq(deadline))
                    .execute(conn)?;
            }

            if let Some(effect) = plan.payment {
                apply_payment_effect(conn, &order, effect, actor, &ctx)?;
            }

            if plan.compensate {
                let items: Vec<OrderItemRow> = order_items::table
                    .filter(order_items::order_id.eq(order.id))
                    .select(OrderItemRow::as_select())
                    .load(conn)?;
                rollback::compensate(conn, &order, &items, actor)?;
            }

            Ok(TransitionOutcome {
                order_id: order.id,
                user_id: order.user_id,
                from: current,
                to: plan.next,
                plan,
            })
        })
    }

    fn find_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<PaymentView, DomainError> {
        let mut conn = self.pool.get()?;
        let row: PaymentRow = payments::table
            .filter(payments::gateway_ref.eq(gateway_ref))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| DomainError::not_found("payment", gateway_ref.to_string()))?;

        Ok(PaymentView {
            id: row.id,
            order_id: row.order_id,
            method: PaymentMethod::parse(&row.method)?,
            gateway_ref: row.gateway_ref,
            amount: row.amount,
            status: PaymentStatus::parse(&row.status)?,
        })
    }
}

fn apply_payment_effect(
    conn: &mut PgConnection,
    order: &OrderRow,
    effect: PaymentEffect,
    actor: Actor,
    ctx: &TransitionContext,
) -> Result<(), DomainError> {
    let target = || payments::table.filter(payments::order_id.eq(order.id));

    let updated = diesel::update(target())
        .set((
            payments::status.eq(effect.status.as_str()),
            payments::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
    if updated == 0 {
        diesel::insert_into(payments::table)
            .values(&NewPaymentRow {
                order_id: order.id,
                method: order.payment_method.clone(),
                gateway_ref: None,
                amount: order.grand_total.clone(),
                status: effect.status.as_str().to_string(),
                proof_url: ctx.proof_url.clone(),
            })
            .execute(conn)?;
        return Ok(());
    }

    if let Some(url) = &ctx.proof_url {
        diesel::update(target())
            .set(payments::proof_url.eq(url))
            .execute(conn)?;
    }
    if effect.stamp_reviewer {
        if let Actor::Admin(admin_id) = actor {
            diesel::update(target())
                .set((
                    payments::reviewed_by.eq(admin_id),
                    payments::reviewed_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;
        }
    }
    if effect.stamp_paid_at {
        diesel::update(target())
            .set(payments::paid_at.eq(diesel::dsl::now))
            .execute(conn)?;
    }
    Ok(())
}

fn load_order_view(conn: &mut PgConnection, order_id: i64) -> Result<OrderView, DomainError> {
    let order: OrderRow = orders::table
        .find(order_id)
        .select(OrderRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainError::not_found("order", order_id.to_string()))?;

    let items: Vec<OrderItemRow> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .select(OrderItemRow::as_select())
        .load(conn)?;

    let item_views = items
        .into_iter()
        .map(|row| {
            let snapshot: ProductSnapshot = serde_json::from_value(row.product_snapshot)
                .map_err(|e| DomainError::Internal(format!("corrupt product snapshot: {e}")))?;
            Ok(OrderItemView {
                id: row.id,
                product_id: row.product_id,
                snapshot,
                unit_price: row.unit_price,
                quantity: row.quantity,
                line_total: row.line_total,
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;

    Ok(OrderView {
        id: order.id,
        user_id: order.user_id,
        store_id: order.store_id,
        address_id: order.address_id,
        status: OrderStatus::parse(&order.status)?,
        payment_method: PaymentMethod::parse(&order.payment_method)?,
        subtotal: order.subtotal,
        shipping_cost: order.shipping_cost,
        discount_total: order.discount_total,
        grand_total: order.grand_total,
        total_items: order.total_items,
        payment_deadline: order.payment_deadline,
        created_at: order.created_at,
        items: item_views,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use diesel::prelude::*;

    use super::super::testutil::{seed_inventory, seed_product, seed_store, setup_db};
    use super::*;
    use crate::domain::order::CheckoutItem;
    use crate::schema::{stock_journal, store_inventory};

    fn checkout(user_id: i64, store_id: i64, items: Vec<CheckoutItem>) -> NewCheckout {
        NewCheckout {
            user_id,
            store_id,
            address_id: 10,
            payment_method: PaymentMethod::ManualTransfer,
            shipping_method_id: 1,
            shipping_cost: BigDecimal::from(3),
            payment_deadline: Utc::now() + chrono::Duration::minutes(60),
            items,
        }
    }

    fn stock_of(pool: &crate::db::DbPool, store_id: i64, product_id: i64) -> i32 {
        let mut conn = pool.get().unwrap();
        store_inventory::table
            .filter(
                store_inventory::store_id
                    .eq(store_id)
                    .and(store_inventory::product_id.eq(product_id)),
            )
            .select(store_inventory::quantity)
            .first(&mut conn)
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires Docker for the Postgres testcontainer"]
    async fn checkout_creates_order_items_shipment_payment_and_reserves_stock() {
        let (_c, pool) = setup_db().await;
        seed_store(&pool, 1);
        seed_product(&pool, 100, "7.50");
        seed_product(&pool, 101, "2.00");
        seed_inventory(&pool, 1, 100, 10);
        seed_inventory(&pool, 1, 101, 10);
        let store = DieselOrderStore::new(pool.clone());

        let order = store
            .create_checkout(checkout(
                7,
                1,
                vec![
                    CheckoutItem {
                        product_id: 100,
                        quantity: 2,
                    },
                    CheckoutItem {
                        product_id: 101,
                        quantity: 3,
                    },
                ],
            ))
            .unwrap();

        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total_items, 5);
        // 2 * 7.50 + 3 * 2.00 = 21.00; plus 3 shipping.
        assert_eq!(order.subtotal, "21.00".parse::<BigDecimal>().unwrap());
        assert_eq!(order.grand_total, "24.00".parse::<BigDecimal>().unwrap());
        assert_eq!(stock_of(&pool, 1, 100), 8);
        assert_eq!(stock_of(&pool, 1, 101), 7);
    }

    #[tokio::test]
    #[ignore = "requires Docker for the Postgres testcontainer"]
    async fn short_stock_rolls_back_the_entire_checkout() {
        let (_c, pool) = setup_db().await;
        seed_store(&pool, 1);
        seed_product(&pool, 100, "7.50");
        seed_product(&pool, 101, "2.00");
        seed_inventory(&pool, 1, 100, 10);
        seed_inventory(&pool, 1, 101, 1);
        let store = DieselOrderStore::new(pool.clone());

        let result = store.create_checkout(checkout(
            7,
            1,
            vec![
                CheckoutItem {
                    product_id: 100,
                    quantity: 2,
                },
                CheckoutItem {
                    product_id: 101,
                    quantity: 5,
                },
            ],
        ));

        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock { .. })
        ));
        let mut conn = pool.get().unwrap();
        let orders_count: i64 = orders::table.count().get_result(&mut conn).unwrap();
        assert_eq!(orders_count, 0, "no partial order may survive");
        assert_eq!(stock_of(&pool, 1, 100), 10);
        assert_eq!(stock_of(&pool, 1, 101), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker for the Postgres testcontainer"]
    async fn cancelling_restores_stock_in_the_same_transaction() {
        let (_c, pool) = setup_db().await;
        seed_store(&pool, 1);
        seed_product(&pool, 100, "7.50");
        seed_inventory(&pool, 1, 100, 10);
        let store = DieselOrderStore::new(pool.clone());

        let order = store
            .create_checkout(checkout(
                7,
                1,
                vec![CheckoutItem {
                    product_id: 100,
                    quantity: 4,
                }],
            ))
            .unwrap();
        assert_eq!(stock_of(&pool, 1, 100), 6);

        let outcome = store
            .transition(
                order.id,
                Trigger::CancelByUser,
                Actor::User(7),
                TransitionContext::default(),
            )
            .unwrap();
        assert_eq!(outcome.to, OrderStatus::Cancelled);
        assert_eq!(stock_of(&pool, 1, 100), 10);

        // Journal nets to zero: REMOVE at checkout, ADD at rollback.
        use diesel::dsl::sum;
        let mut conn = pool.get().unwrap();
        let net: Option<i64> = stock_journal::table
            .filter(stock_journal::product_id.eq(100))
            .select(sum(stock_journal::delta))
            .first(&mut conn)
            .unwrap();
        assert_eq!(net, Some(0));
    }

    #[tokio::test]
    #[ignore = "requires Docker for the Postgres testcontainer"]
    async fn racing_transitions_produce_one_winner() {
        let (_c, pool) = setup_db().await;
        seed_store(&pool, 1);
        seed_product(&pool, 100, "7.50");
        seed_inventory(&pool, 1, 100, 10);
        let store = std::sync::Arc::new(DieselOrderStore::new(pool.clone()));

        let order = store
            .create_checkout(checkout(
                7,
                1,
                vec![CheckoutItem {
                    product_id: 100,
                    quantity: 1,
                }],
            ))
            .unwrap();

        // User cancel vs. admin cancel on the same PENDING_PAYMENT order.
        let a = {
            let store = store.clone();
            let id = order.id;
            std::thread::spawn(move || {
                store.transition(
                    id,
                    Trigger::CancelByUser,
                    Actor::User(7),
                    TransitionContext::default(),
                )
            })
        };
        let b = {
            let store = store.clone();
            let id = order.id;
            std::thread::spawn(move || {
                store.transition(
                    id,
                    Trigger::CancelByAdmin,
                    Actor::Admin(1),
                    TransitionContext::default(),
                )
            })
        };
        let results = [a.join().unwrap(), b.join().unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one cancellation may commit");
        // Compensation ran exactly once.
        assert_eq!(stock_of(&pool, 1, 100), 10);
    }

    #[tokio::test]
    #[ignore = "requires Docker for the Postgres testcontainer"]
    async fn reject_resets_the_payment_deadline() {
        let (_c, pool) = setup_db().await;
        seed_store(&pool, 1);
        seed_product(&pool, 100, "7.50");
        seed_inventory(&pool, 1, 100, 10);
        let store = DieselOrderStore::new(pool.clone());

        let order = store
            .create_checkout(checkout(
                7,
                1,
                vec![CheckoutItem {
                    product_id: 100,
                    quantity: 1,
                }],
            ))
            .unwrap();
        store
            .transition(
                order.id,
                Trigger::SubmitPaymentProof,
                Actor::User(7),
                TransitionContext {
                    proof_url: Some("https://proofs/1.jpg".into()),
                    ..TransitionContext::default()
                },
            )
            .unwrap();

        let fresh = Utc::now() + chrono::Duration::minutes(90);
        store
            .transition(
                order.id,
                Trigger::RejectPayment,
                Actor::Admin(3),
                TransitionContext {
                    new_payment_deadline: Some(fresh),
                    ..TransitionContext::default()
                },
            )
            .unwrap();

        let reloaded = store.find_order(order.id).unwrap();
        assert_eq!(reloaded.status, OrderStatus::PendingPayment);
        assert!((reloaded.payment_deadline - fresh).num_seconds().abs() < 1);

        let mut conn = pool.get().unwrap();
        let payment: PaymentRow = payments::table
            .filter(payments::order_id.eq(order.id))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .unwrap();
        assert_eq!(payment.status, "REJECTED");
        assert_eq!(payment.reviewed_by, Some(3));
        assert_eq!(payment.proof_url.as_deref(), Some("https://proofs/1.jpg"));
    }

    #[tokio::test]
    #[ignore = "requires Docker for the Postgres testcontainer"]
    async fn gateway_checkout_is_findable_by_reference() {
        let (_c, pool) = setup_db().await;
        seed_store(&pool, 1);
        seed_product(&pool, 100, "7.50");
        seed_inventory(&pool, 1, 100, 10);
        let store = DieselOrderStore::new(pool.clone());

        let mut new_checkout = checkout(
            7,
            1,
            vec![CheckoutItem {
                product_id: 100,
                quantity: 1,
            }],
        );
        new_checkout.payment_method = PaymentMethod::Gateway;
        let order = store.create_checkout(new_checkout).unwrap();

        let payment = store
            .find_payment_by_gateway_ref(&format!("ORDER-{}", order.id))
            .unwrap();
        assert_eq!(payment.order_id, order.id);
        assert_eq!(payment.status, PaymentStatus::Pending);
    }
}
