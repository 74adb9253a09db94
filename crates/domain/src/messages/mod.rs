pub mod order_message;

pub use order_message::{DeliveryMessage, ItemMessage, OrderMessage, PaymentMessage};
