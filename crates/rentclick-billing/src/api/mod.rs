//! HTTP JSON API over the rental services

pub mod error;
pub mod routes;
pub mod types;

pub use error::ApiError;

use crate::server::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

/// Routes mounted under `/api`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Fleet inventory
        .route(
            "/vehicles",
            get(routes::vehicles::list_vehicles).post(routes::vehicles::create_vehicle),
        )
        .route("/vehicles/bulk", post(routes::vehicles::create_vehicles_bulk))
        .route(
            "/vehicles/availability",
            get(routes::vehicles::vehicle_availability),
        )
        .route(
            "/vehicles/:vehicle_id",
            get(routes::vehicles::get_vehicle)
                .patch(routes::vehicles::update_vehicle)
                .delete(routes::vehicles::delete_vehicle),
        )
        .route(
            "/vehicles/:vehicle_id/image",
            put(routes::vehicles::upload_vehicle_image),
        )
        // Customers
        .route(
            "/customers",
            get(routes::customers::list_customers).post(routes::customers::create_customer),
        )
        .route(
            "/customers/:customer_id",
            get(routes::customers::get_customer)
                .patch(routes::customers::update_customer)
                .delete(routes::customers::delete_customer),
        )
        .route(
            "/customers/:customer_id/history",
            get(routes::customers::customer_history),
        )
        .route(
            "/customers/:customer_id/document",
            put(routes::customers::upload_document),
        )
        .route(
            "/customers/:customer_id/signature",
            put(routes::customers::upload_signature),
        )
        .route(
            "/customers/:customer_id/complete",
            post(routes::customers::complete_customer_rentals),
        )
        // Rentals
        .route("/rentals/checkout", post(routes::rentals::checkout))
        .route("/rentals/quick-checkout", post(routes::rentals::quick_checkout))
        .route("/rentals/active", get(routes::rentals::list_active))
        .route("/rentals/overdue", get(routes::rentals::list_overdue))
        .route("/rentals/complete", post(routes::rentals::complete))
        .route(
            "/rentals/complete/preview",
            post(routes::rentals::preview_completion),
        )
        .route(
            "/rentals/:rental_id",
            get(routes::rentals::get_rental).delete(routes::rentals::delete_rental),
        )
        .route(
            "/rentals/:rental_id/extend",
            post(routes::rentals::extend_rental),
        )
        .route("/dashboard", get(routes::dashboard::get_dashboard))
}

/// Uploaded files, served at the root so public URLs resolve
pub fn file_routes() -> Router<AppState> {
    Router::new().route("/files/*key", get(routes::files::get_file))
}
