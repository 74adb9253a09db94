use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::entities::{Delivery, Item, Order, Payment};
use crate::errors::DomainError;

lazy_static! {
    static ref E164_PHONE: Regex = Regex::new(r"^\+[1-9][0-9]{1,14}$").expect("valid E.164 pattern");
}

/// Wire representation of an order as published to the orders topic and
/// returned by the HTTP API.
///
/// `delivery`, `payment` and `items` have no serde default, so a document
/// missing any of them fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderMessage {
    #[validate(length(min = 1, message = "order_uid is required"))]
    pub order_uid: String,

    #[validate(length(min = 1, message = "track_number is required"))]
    pub track_number: String,

    #[serde(default)]
    pub entry: String,

    #[validate(nested)]
    pub delivery: DeliveryMessage,

    #[validate(nested)]
    pub payment: PaymentMessage,

    #[validate(nested)]
    pub items: Vec<ItemMessage>,

    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub internal_signature: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_service: String,
    #[serde(default)]
    pub shardkey: String,
    #[serde(default)]
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub oof_shard: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeliveryMessage {
    #[validate(length(min = 1, message = "delivery name is required"))]
    #[serde(default)]
    pub name: String,

    #[validate(custom(function = "validate_e164"))]
    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub region: String,

    #[validate(email(message = "delivery email must be a valid address"))]
    #[serde(default)]
    pub email: String,
}

/// Payment block. `payment_dt` is epoch seconds on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentMessage {
    #[validate(length(min = 1, message = "payment transaction is required"))]
    #[serde(default)]
    pub transaction: String,

    #[serde(default)]
    pub request_id: String,

    #[validate(length(min = 1, message = "payment currency is required"))]
    #[serde(default)]
    pub currency: String,

    #[validate(length(min = 1, message = "payment provider is required"))]
    #[serde(default)]
    pub provider: String,

    #[validate(range(min = 0, message = "payment amount cannot be negative"))]
    #[serde(default)]
    pub amount: i64,

    #[validate(range(min = 1, message = "payment_dt is required"))]
    #[serde(default)]
    pub payment_dt: i64,

    #[serde(default)]
    pub bank: String,
    #[serde(default)]
    pub delivery_cost: i64,
    #[serde(default)]
    pub goods_total: i64,
    #[serde(default)]
    pub custom_fee: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemMessage {
    #[validate(range(min = 1, message = "item chrt_id is required"))]
    #[serde(default)]
    pub chrt_id: i64,

    #[validate(length(min = 1, message = "item track_number is required"))]
    #[serde(default)]
    pub track_number: String,

    #[serde(default)]
    pub price: i64,
    #[validate(length(min = 1, message = "item rid is required"))]
    #[serde(default)]
    pub rid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sale: i32,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub total_price: i64,
    #[serde(default)]
    pub nm_id: i64,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub status: i32,
}

fn validate_e164(phone: &str) -> Result<(), ValidationError> {
    if E164_PHONE.is_match(phone) {
        Ok(())
    } else {
        let mut err = ValidationError::new("e164");
        err.message = Some("delivery phone must be in E.164 format".into());
        Err(err)
    }
}

impl OrderMessage {
    /// Decode a raw message body, validate it and convert it into an [`Order`].
    pub fn decode(payload: &[u8]) -> Result<Order, DomainError> {
        let message: OrderMessage = serde_json::from_slice(payload)?;
        message.validate()?;
        Order::try_from(message)
    }
}

impl TryFrom<OrderMessage> for Order {
    type Error = DomainError;

    fn try_from(msg: OrderMessage) -> Result<Self, Self::Error> {
        let payment_dt = DateTime::from_timestamp(msg.payment.payment_dt, 0)
            .ok_or(DomainError::InvalidTimestamp(msg.payment.payment_dt))?;

        Ok(Order {
            order_uid: msg.order_uid,
            track_number: msg.track_number,
            entry: msg.entry,
            locale: msg.locale,
            internal_signature: msg.internal_signature,
            customer_id: msg.customer_id,
            delivery_service: msg.delivery_service,
            shardkey: msg.shardkey,
            sm_id: msg.sm_id,
            date_created: msg.date_created,
            oof_shard: msg.oof_shard,
            delivery: Delivery {
                name: msg.delivery.name,
                phone: msg.delivery.phone,
                zip: msg.delivery.zip,
                city: msg.delivery.city,
                address: msg.delivery.address,
                region: msg.delivery.region,
                email: msg.delivery.email,
            },
            payment: Payment {
                transaction: msg.payment.transaction,
                request_id: msg.payment.request_id,
                currency: msg.payment.currency,
                provider: msg.payment.provider,
                amount: msg.payment.amount,
                payment_dt,
                bank: msg.payment.bank,
                delivery_cost: msg.payment.delivery_cost,
                goods_total: msg.payment.goods_total,
                custom_fee: msg.payment.custom_fee,
            },
            items: msg.items.into_iter().map(Item::from).collect(),
        })
    }
}

impl From<ItemMessage> for Item {
    fn from(item: ItemMessage) -> Self {
        Item {
            chrt_id: item.chrt_id,
            track_number: item.track_number,
            price: item.price,
            rid: item.rid,
            name: item.name,
            sale: item.sale,
            size: item.size,
            total_price: item.total_price,
            nm_id: item.nm_id,
            brand: item.brand,
            status: item.status,
        }
    }
}

impl From<&Order> for OrderMessage {
    fn from(order: &Order) -> Self {
        OrderMessage {
            order_uid: order.order_uid.clone(),
            track_number: order.track_number.clone(),
            entry: order.entry.clone(),
            delivery: DeliveryMessage {
                name: order.delivery.name.clone(),
                phone: order.delivery.phone.clone(),
                zip: order.delivery.zip.clone(),
                city: order.delivery.city.clone(),
                address: order.delivery.address.clone(),
                region: order.delivery.region.clone(),
                email: order.delivery.email.clone(),
            },
            payment: PaymentMessage {
                transaction: order.payment.transaction.clone(),
                request_id: order.payment.request_id.clone(),
                currency: order.payment.currency.clone(),
                provider: order.payment.provider.clone(),
                amount: order.payment.amount,
                payment_dt: order.payment.payment_dt.timestamp(),
                bank: order.payment.bank.clone(),
                delivery_cost: order.payment.delivery_cost,
                goods_total: order.payment.goods_total,
                custom_fee: order.payment.custom_fee,
            },
            items: order
                .items
                .iter()
                .map(|item| ItemMessage {
                    chrt_id: item.chrt_id,
                    track_number: item.track_number.clone(),
                    price: item.price,
                    rid: item.rid.clone(),
                    name: item.name.clone(),
                    sale: item.sale,
                    size: item.size.clone(),
                    total_price: item.total_price,
                    nm_id: item.nm_id,
                    brand: item.brand.clone(),
                    status: item.status,
                })
                .collect(),
            locale: order.locale.clone(),
            internal_signature: order.internal_signature.clone(),
            customer_id: order.customer_id.clone(),
            delivery_service: order.delivery_service.clone(),
            shardkey: order.shardkey.clone(),
            sm_id: order.sm_id,
            date_created: order.date_created,
            oof_shard: order.oof_shard.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> serde_json::Value {
        json!({
            "order_uid": "b563feb7b2b84b6test",
            "track_number": "WBILMTESTTRACK",
            "entry": "WBIL",
            "delivery": {
                "name": "Test Testov",
                "phone": "+9720000000",
                "zip": "2639809",
                "city": "Kiryat Mozkin",
                "address": "Ploshad Mira 15",
                "region": "Kraiot",
                "email": "test@gmail.com"
            },
            "payment": {
                "transaction": "b563feb7b2b84b6test",
                "request_id": "",
                "currency": "USD",
                "provider": "wbpay",
                "amount": 1817,
                "payment_dt": 1637907727,
                "bank": "alpha",
                "delivery_cost": 1500,
                "goods_total": 317,
                "custom_fee": 0
            },
            "items": [{
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }],
            "locale": "en",
            "internal_signature": "",
            "customer_id": "test",
            "delivery_service": "meest",
            "shardkey": "9",
            "sm_id": 99,
            "date_created": "2021-11-26T06:22:19Z",
            "oof_shard": "1"
        })
    }

    fn decode(doc: &serde_json::Value) -> Result<Order, DomainError> {
        OrderMessage::decode(&serde_json::to_vec(doc).unwrap())
    }

    #[test]
    fn test_valid_document_decodes() {
        let order = decode(&valid_document()).unwrap();
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.payment.payment_dt.timestamp(), 1637907727);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].rid, "ab4219087a764ae0btest");
    }

    #[test]
    fn test_missing_delivery_fails_to_decode() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("delivery");
        assert!(matches!(decode(&doc), Err(DomainError::Decode(_))));
    }

    #[test]
    fn test_missing_items_fails_to_decode() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("items");
        assert!(matches!(decode(&doc), Err(DomainError::Decode(_))));
    }

    #[test]
    fn test_empty_items_are_accepted() {
        let mut doc = valid_document();
        doc["items"] = json!([]);
        let order = decode(&doc).unwrap();
        assert!(order.items.is_empty());
    }

    #[test]
    fn test_blank_order_uid_fails_validation() {
        let mut doc = valid_document();
        doc["order_uid"] = json!("");
        assert!(matches!(decode(&doc), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_phone_must_be_e164() {
        let mut doc = valid_document();
        doc["delivery"]["phone"] = json!("972-000-0000");
        assert!(matches!(decode(&doc), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_email_must_be_valid() {
        let mut doc = valid_document();
        doc["delivery"]["email"] = json!("not-an-email");
        assert!(matches!(decode(&doc), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_item_requires_rid() {
        let mut doc = valid_document();
        doc["items"][0].as_object_mut().unwrap().remove("rid");
        assert!(matches!(decode(&doc), Err(DomainError::Validation(_))));

        doc["items"][0]["rid"] = json!("");
        assert!(matches!(decode(&doc), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_item_requires_chrt_id() {
        let mut doc = valid_document();
        doc["items"][0].as_object_mut().unwrap().remove("chrt_id");
        assert!(matches!(decode(&doc), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_missing_payment_dt_fails_validation() {
        let mut doc = valid_document();
        doc["payment"].as_object_mut().unwrap().remove("payment_dt");
        assert!(matches!(decode(&doc), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_garbage_payload_fails_to_decode() {
        assert!(matches!(
            OrderMessage::decode(b"not json"),
            Err(DomainError::Decode(_))
        ));
    }

    #[test]
    fn test_order_to_message_uses_epoch_seconds() {
        let order = decode(&valid_document()).unwrap();
        let message = OrderMessage::from(&order);
        assert_eq!(message.payment.payment_dt, 1637907727);
        assert_eq!(message.items[0].chrt_id, 9934930);
        assert!(message.validate().is_ok());
    }
}
