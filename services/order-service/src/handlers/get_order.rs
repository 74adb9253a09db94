use axum::extract::{Path, State};
use axum::Json;
use domain::OrderMessage;
use serde::Deserialize;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct OrderPath {
    #[validate(custom(function = "not_blank"))]
    pub order_uid: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Get order by uid
pub async fn get_order_handler(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
) -> Result<Json<OrderMessage>, ApiError> {
    path.validate().map_err(ApiError::Validation)?;
    let order_uid = path.order_uid.trim();

    match state.orders.get_order_by_id(order_uid).await {
        Ok(order) => Ok(Json(OrderMessage::from(&order))),
        Err(err) if err.is_not_found() => {
            info!(order_uid, "Order not found");
            Err(ApiError::NotFound)
        }
        Err(err) => {
            error!(order_uid, error = %err, "Failed to get order");
            Err(ApiError::Internal)
        }
    }
}
