use crate::error::RentalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rental(#[from] RentalError),

    #[error("Bad request: {message}")]
    BadRequest { message: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Rental(e) => match e {
                RentalError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                RentalError::InvalidState { .. } => StatusCode::CONFLICT,
                RentalError::VehicleUnavailable { .. } => StatusCode::CONFLICT,
                RentalError::NotFound { .. } => StatusCode::NOT_FOUND,
                RentalError::Notification { .. } => StatusCode::BAD_GATEWAY,
                RentalError::DatabaseError { .. }
                | RentalError::Serialization(_)
                | RentalError::FileStorage { .. }
                | RentalError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Rental(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), "Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::VehicleStatus;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RentalError::invalid_input("bad"), StatusCode::BAD_REQUEST),
            (
                RentalError::invalid_state("rental", "r1", "already completed"),
                StatusCode::CONFLICT,
            ),
            (
                RentalError::VehicleUnavailable {
                    vehicle_id: "v1".to_string(),
                    status: VehicleStatus::Maintenance,
                },
                StatusCode::CONFLICT,
            ),
            (RentalError::not_found("vehicle", "v1"), StatusCode::NOT_FOUND),
            (
                RentalError::FileStorage {
                    message: "disk full".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status_code(), expected);
        }
    }
}
