pub mod get_order;
pub mod health;

pub use get_order::get_order_handler;
pub use health::health_check;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use validator::ValidationErrors;

/// Error body returned by the HTTP API.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    NotFound,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => {
                let fields = errors
                    .field_errors()
                    .into_iter()
                    .filter_map(|(field, errs)| {
                        errs.first().map(|err| (field.to_string(), err.code.to_string()))
                    })
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        message: "invalid request".to_string(),
                        fields,
                    },
                )
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    message: "order not found".to_string(),
                    fields: BTreeMap::new(),
                },
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    message: "internal server error".to_string(),
                    fields: BTreeMap::new(),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
