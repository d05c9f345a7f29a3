use crate::domain::types::VehicleStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RentalError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid state for {entity} {id}: {message}")]
    InvalidState {
        entity: &'static str,
        id: String,
        message: String,
    },

    #[error("Vehicle {vehicle_id} is not available (status: {status})")]
    VehicleUnavailable {
        vehicle_id: String,
        status: VehicleStatus,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error during {operation}: {source}")]
    DatabaseError {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Notification error: {message}")]
    Notification { message: String },

    #[error("File storage error: {message}")]
    FileStorage { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, RentalError>;

impl RentalError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RentalError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn invalid_state(
        entity: &'static str,
        id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        RentalError::InvalidState {
            entity,
            id: id.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RentalError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn database(operation: &str, source: sqlx::Error) -> Self {
        RentalError::DatabaseError {
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }

    /// Stable machine-readable code used in API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            RentalError::InvalidInput { .. } => "INVALID_INPUT",
            RentalError::InvalidState { .. } => "INVALID_STATE",
            RentalError::VehicleUnavailable { .. } => "VEHICLE_UNAVAILABLE",
            RentalError::NotFound { .. } => "NOT_FOUND",
            RentalError::DatabaseError { .. } => "DATABASE_ERROR",
            RentalError::Serialization(_) => "SERIALIZATION_ERROR",
            RentalError::Notification { .. } => "NOTIFICATION_ERROR",
            RentalError::FileStorage { .. } => "FILE_STORAGE_ERROR",
            RentalError::Configuration { .. } => "CONFIGURATION_ERROR",
        }
    }
}
