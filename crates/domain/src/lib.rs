pub mod entities;
pub mod errors;
pub mod messages;

pub use entities::{Delivery, Item, Order, Payment};
pub use errors::DomainError;
pub use messages::OrderMessage;
