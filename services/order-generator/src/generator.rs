use chrono::Utc;
use domain::messages::{DeliveryMessage, ItemMessage, OrderMessage, PaymentMessage};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

fn random_string<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Build a random order that passes message validation.
pub fn random_order<R: Rng>(rng: &mut R) -> OrderMessage {
    let order_uid = Uuid::new_v4().simple().to_string();
    let track_number = format!("TRACK{}", random_string(rng, 6).to_uppercase());
    let item_count = rng.gen_range(1..=3);

    let items = (0..item_count)
        .map(|_| {
            let price = rng.gen_range(100..1_100);
            let sale = rng.gen_range(0..50);
            ItemMessage {
                chrt_id: rng.gen_range(1..10_000_000),
                track_number: track_number.clone(),
                price,
                rid: Uuid::new_v4().simple().to_string(),
                name: format!("Item {}", random_string(rng, 5)),
                sale,
                size: rng.gen_range(0..50).to_string(),
                total_price: price * i64::from(100 - sale) / 100,
                nm_id: rng.gen_range(1..1_000_000),
                brand: format!("Brand{}", random_string(rng, 3)),
                status: 200 + rng.gen_range(0..10),
            }
        })
        .collect::<Vec<_>>();

    let goods_total = items.iter().map(|item| item.total_price).sum::<i64>();
    let delivery_cost = rng.gen_range(0..1_000);

    OrderMessage {
        order_uid: order_uid.clone(),
        track_number,
        entry: "WBIL".to_string(),
        delivery: DeliveryMessage {
            name: "John Doe".to_string(),
            phone: format!("+{}", rng.gen_range(1_000_000_000u64..10_000_000_000)),
            zip: format!("{:06}", rng.gen_range(0..1_000_000)),
            city: format!("City{}", random_string(rng, 4)),
            address: format!("Street {}", rng.gen_range(1..100)),
            region: format!("Region{}", random_string(rng, 3)),
            email: format!("user{}@example.com", rng.gen_range(0..1_000)),
        },
        payment: PaymentMessage {
            transaction: order_uid,
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: Utc::now().timestamp(),
            bank: format!("bank{}", random_string(rng, 4)),
            delivery_cost,
            goods_total,
            custom_fee: 0,
        },
        items,
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: format!("customer_{}", random_string(rng, 5)),
        delivery_service: "meest".to_string(),
        shardkey: rng.gen_range(0..10).to_string(),
        sm_id: rng.gen_range(0..1_000),
        date_created: Utc::now(),
        oof_shard: rng.gen_range(0..5).to_string(),
    }
}

/// Build an order the service must dead-letter: no track number, a blank
/// delivery name and a malformed phone.
pub fn invalid_order<R: Rng>(rng: &mut R) -> OrderMessage {
    let mut order = random_order(rng);
    order.track_number.clear();
    order.delivery.name.clear();
    order.delivery.phone = "not-a-phone".to_string();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_random_order_is_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let order = random_order(&mut rng);
            assert!(order.validate().is_ok(), "{:?}", order.validate());
            assert!(!order.items.is_empty());
        }
    }

    #[test]
    fn test_random_order_decodes() {
        let order = random_order(&mut rand::thread_rng());
        let payload = serde_json::to_vec(&order).unwrap();

        let decoded = OrderMessage::decode(&payload).unwrap();
        assert_eq!(decoded.order_uid, order.order_uid);
        assert_eq!(decoded.items.len(), order.items.len());
    }

    #[test]
    fn test_invalid_order_fails_decode() {
        let order = invalid_order(&mut rand::thread_rng());
        let payload = serde_json::to_vec(&order).unwrap();

        assert!(OrderMessage::decode(&payload).is_err());
    }
}
