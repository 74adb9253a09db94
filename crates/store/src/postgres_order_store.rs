use async_trait::async_trait;
use domain::{Delivery, Item, Order, Payment};
use sqlx::postgres::{PgArguments, PgQueryResult, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::debug;

use crate::rows::{
    self, nullable, nullable_int, OrderRow, DELIVERY_COLUMNS, ITEM_COLUMNS, ORDER_COLUMNS,
    PAYMENT_COLUMNS,
};
use crate::transaction::PgTransaction;
use crate::{OrderStore, StoreError};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Postgres rejects statements with more bind parameters than this.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;
const ITEM_BINDS: usize = 12;
/// Items per `INSERT` statement; large orders are written in several.
const ITEM_BATCH_SIZE: usize = 1_000;

/// PostgreSQL implementation of the order store
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute(
        &self,
        tx: Option<&PgTransaction>,
        query: PgQuery<'_>,
    ) -> Result<PgQueryResult, StoreError> {
        match tx {
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionFinished)?;
                Ok(query.execute(&mut **conn).await?)
            }
            None => Ok(query.execute(&self.pool).await?),
        }
    }

    async fn fetch_all(
        &self,
        tx: Option<&PgTransaction>,
        query: PgQuery<'_>,
    ) -> Result<Vec<PgRow>, StoreError> {
        match tx {
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionFinished)?;
                Ok(query.fetch_all(&mut **conn).await?)
            }
            None => Ok(query.fetch_all(&self.pool).await?),
        }
    }

    async fn fetch_optional(
        &self,
        tx: Option<&PgTransaction>,
        query: PgQuery<'_>,
    ) -> Result<Option<PgRow>, StoreError> {
        match tx {
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.as_mut().ok_or(StoreError::TransactionFinished)?;
                Ok(query.fetch_optional(&mut **conn).await?)
            }
            None => Ok(query.fetch_optional(&self.pool).await?),
        }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    type Tx = PgTransaction;

    async fn save_order(&self, tx: Option<&PgTransaction>, order: &Order) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature,
                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO NOTHING
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(nullable(&order.entry))
        .bind(nullable(&order.locale))
        .bind(nullable(&order.internal_signature))
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(nullable(&order.shardkey))
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(nullable(&order.oof_shard));

        let result = self.execute(tx, query).await?;
        debug!(
            order_uid = %order.order_uid,
            inserted = result.rows_affected(),
            "Saved order header"
        );
        Ok(())
    }

    async fn save_delivery(
        &self,
        tx: Option<&PgTransaction>,
        order_uid: &str,
        delivery: &Delivery,
    ) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_uid) DO NOTHING
            "#,
        )
        .bind(order_uid)
        .bind(nullable(&delivery.name))
        .bind(nullable(&delivery.phone))
        .bind(nullable(&delivery.zip))
        .bind(nullable(&delivery.city))
        .bind(nullable(&delivery.address))
        .bind(nullable(&delivery.region))
        .bind(nullable(&delivery.email));

        self.execute(tx, query).await?;
        Ok(())
    }

    async fn save_payment(
        &self,
        tx: Option<&PgTransaction>,
        order_uid: &str,
        payment: &Payment,
    ) -> Result<(), StoreError> {
        let query = sqlx::query(
            r#"
            INSERT INTO payments (
                order_uid, transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO NOTHING
            "#,
        )
        .bind(order_uid)
        .bind(&payment.transaction)
        .bind(nullable(&payment.request_id))
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(nullable(&payment.bank))
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(nullable_int(payment.custom_fee));

        self.execute(tx, query).await?;
        Ok(())
    }

    async fn save_items(
        &self,
        tx: Option<&PgTransaction>,
        order_uid: &str,
        items: &[Item],
    ) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut inserted = 0;
        for batch in items.chunks(ITEM_BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO items ({}) ", ITEM_COLUMNS));
            builder.push_values(batch, |mut row, item| {
                row.push_bind(&item.rid)
                    .push_bind(order_uid)
                    .push_bind(item.chrt_id)
                    .push_bind(&item.track_number)
                    .push_bind(item.price)
                    .push_bind(&item.name)
                    .push_bind(nullable_int(item.sale))
                    .push_bind(nullable(&item.size))
                    .push_bind(item.total_price)
                    .push_bind(item.nm_id)
                    .push_bind(nullable(&item.brand))
                    .push_bind(item.status);
            });
            builder.push(" ON CONFLICT (rid) DO NOTHING");

            inserted += self.execute(tx, builder.build()).await?.rows_affected();
        }

        debug!(
            order_uid,
            items = items.len(),
            inserted,
            "Saved order items"
        );
        Ok(())
    }

    async fn get_order_by_id(
        &self,
        tx: Option<&PgTransaction>,
        order_uid: &str,
    ) -> Result<Order, StoreError> {
        let order_sql = format!("SELECT {} FROM orders WHERE order_uid = $1", ORDER_COLUMNS);
        let header = self
            .fetch_optional(tx, sqlx::query(&order_sql).bind(order_uid))
            .await?
            .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;
        let header = OrderRow::from_row(&header)?;

        let delivery_sql = format!(
            "SELECT {} FROM deliveries WHERE order_uid = $1",
            DELIVERY_COLUMNS
        );
        let delivery = self
            .fetch_optional(tx, sqlx::query(&delivery_sql).bind(order_uid))
            .await?
            .ok_or_else(|| missing(order_uid, "delivery"))?;

        let payment_sql = format!("SELECT {} FROM payments WHERE order_uid = $1", PAYMENT_COLUMNS);
        let payment = self
            .fetch_optional(tx, sqlx::query(&payment_sql).bind(order_uid))
            .await?
            .ok_or_else(|| missing(order_uid, "payment"))?;

        let items_sql = format!(
            "SELECT {} FROM items WHERE order_uid = $1 ORDER BY id",
            ITEM_COLUMNS
        );
        let items = self
            .fetch_all(tx, sqlx::query(&items_sql).bind(order_uid))
            .await?
            .iter()
            .map(rows::item_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(header.into_order(
            rows::delivery_from_row(&delivery)?,
            rows::payment_from_row(&payment)?,
            items,
        ))
    }

    async fn latest_orders(
        &self,
        tx: Option<&PgTransaction>,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let order_sql = format!(
            "SELECT {} FROM orders ORDER BY date_created DESC LIMIT $1",
            ORDER_COLUMNS
        );
        let headers = self
            .fetch_all(tx, sqlx::query(&order_sql).bind(i64::from(limit)))
            .await?
            .iter()
            .map(OrderRow::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = headers.iter().map(|h| h.order_uid.clone()).collect();

        let delivery_sql = format!(
            "SELECT {} FROM deliveries WHERE order_uid = ANY($1)",
            DELIVERY_COLUMNS
        );
        let mut deliveries = HashMap::with_capacity(ids.len());
        for row in self
            .fetch_all(tx, sqlx::query(&delivery_sql).bind(&ids))
            .await?
        {
            deliveries.insert(rows::order_uid(&row)?, rows::delivery_from_row(&row)?);
        }

        let payment_sql = format!(
            "SELECT {} FROM payments WHERE order_uid = ANY($1)",
            PAYMENT_COLUMNS
        );
        let mut payments = HashMap::with_capacity(ids.len());
        for row in self
            .fetch_all(tx, sqlx::query(&payment_sql).bind(&ids))
            .await?
        {
            payments.insert(rows::order_uid(&row)?, rows::payment_from_row(&row)?);
        }

        let items_sql = format!(
            "SELECT {} FROM items WHERE order_uid = ANY($1) ORDER BY id",
            ITEM_COLUMNS
        );
        let mut items: HashMap<String, Vec<Item>> = HashMap::with_capacity(ids.len());
        for row in self.fetch_all(tx, sqlx::query(&items_sql).bind(&ids)).await? {
            items
                .entry(rows::order_uid(&row)?)
                .or_default()
                .push(rows::item_from_row(&row)?);
        }

        let mut orders = Vec::with_capacity(headers.len());
        for header in headers {
            let delivery = deliveries
                .remove(&header.order_uid)
                .ok_or_else(|| missing(&header.order_uid, "delivery"))?;
            let payment = payments
                .remove(&header.order_uid)
                .ok_or_else(|| missing(&header.order_uid, "payment"))?;
            let order_items = items.remove(&header.order_uid).unwrap_or_default();
            orders.push(header.into_order(delivery, payment, order_items));
        }

        debug!(requested = limit, loaded = orders.len(), "Loaded latest orders");
        Ok(orders)
    }
}

fn missing(order_uid: &str, relation: &'static str) -> StoreError {
    StoreError::MissingRelation {
        order_uid: order_uid.to_string(),
        relation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_batch_fits_bind_limit() {
        assert_eq!(ITEM_COLUMNS.split(',').count(), ITEM_BINDS);
        assert!(ITEM_BATCH_SIZE * ITEM_BINDS <= MAX_BIND_PARAMS);
    }
}
