use chrono::{DateTime, Utc};
use domain::{Delivery, Item, Order, Payment};
use sqlx::postgres::PgRow;
use sqlx::Row;

pub(crate) const ORDER_COLUMNS: &str = "order_uid, track_number, entry, locale, internal_signature, \
     customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard";

pub(crate) const DELIVERY_COLUMNS: &str =
    "order_uid, name, phone, zip, city, address, region, email";

pub(crate) const PAYMENT_COLUMNS: &str = "order_uid, transaction, request_id, currency, provider, \
     amount, payment_dt, bank, delivery_cost, goods_total, custom_fee";

pub(crate) const ITEM_COLUMNS: &str = "rid, order_uid, chrt_id, track_number, price, name, sale, \
     size, total_price, nm_id, brand, status";

/// Empty strings are stored as NULL.
pub(crate) fn nullable(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Zero is stored as NULL.
pub(crate) fn nullable_int(value: i32) -> Option<i32> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

fn text(row: &PgRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn int(row: &PgRow, column: &str) -> Result<i32, sqlx::Error> {
    Ok(row.try_get::<Option<i32>, _>(column)?.unwrap_or_default())
}

/// Header columns of an `orders` row, before its relations are attached.
pub(crate) struct OrderRow {
    pub order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

impl OrderRow {
    pub fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            order_uid: row.try_get("order_uid")?,
            track_number: row.try_get("track_number")?,
            entry: text(row, "entry")?,
            locale: text(row, "locale")?,
            internal_signature: text(row, "internal_signature")?,
            customer_id: row.try_get("customer_id")?,
            delivery_service: row.try_get("delivery_service")?,
            shardkey: text(row, "shardkey")?,
            sm_id: row.try_get("sm_id")?,
            date_created: row.try_get("date_created")?,
            oof_shard: text(row, "oof_shard")?,
        })
    }

    pub fn into_order(self, delivery: Delivery, payment: Payment, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
            delivery,
            payment,
            items,
        }
    }
}

pub(crate) fn order_uid(row: &PgRow) -> Result<String, sqlx::Error> {
    row.try_get("order_uid")
}

pub(crate) fn delivery_from_row(row: &PgRow) -> Result<Delivery, sqlx::Error> {
    Ok(Delivery {
        name: text(row, "name")?,
        phone: text(row, "phone")?,
        zip: text(row, "zip")?,
        city: text(row, "city")?,
        address: text(row, "address")?,
        region: text(row, "region")?,
        email: text(row, "email")?,
    })
}

pub(crate) fn payment_from_row(row: &PgRow) -> Result<Payment, sqlx::Error> {
    Ok(Payment {
        transaction: row.try_get("transaction")?,
        request_id: text(row, "request_id")?,
        currency: row.try_get("currency")?,
        provider: row.try_get("provider")?,
        amount: row.try_get("amount")?,
        payment_dt: row.try_get("payment_dt")?,
        bank: text(row, "bank")?,
        delivery_cost: row.try_get("delivery_cost")?,
        goods_total: row.try_get("goods_total")?,
        custom_fee: int(row, "custom_fee")?,
    })
}

pub(crate) fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: int(row, "sale")?,
        size: text(row, "size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: text(row, "brand")?,
        status: row.try_get("status")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_null() {
        assert_eq!(nullable(""), None);
        assert_eq!(nullable("WBILM"), Some("WBILM"));
    }

    #[test]
    fn test_zero_int_is_null() {
        assert_eq!(nullable_int(0), None);
        assert_eq!(nullable_int(30), Some(30));
    }
}
