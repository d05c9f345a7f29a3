//! Request and response bodies for the HTTP API

use crate::domain::customers::Customer;
use crate::domain::rentals::Rental;
use crate::domain::types::{CustomerId, Money, RentalId, VehicleId, VehicleType};
use crate::domain::views::{DashboardStats, TypeAvailability};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteCustomerQuery {
    #[serde(default)]
    pub purge_history: bool,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub customer_id: CustomerId,
    pub vehicle_ids: Vec<VehicleId>,
    /// Defaults to the time the request is handled
    pub start_time: Option<DateTime<Utc>>,
    pub planned_duration: i64,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub rentals: Vec<Rental>,
    /// Quote for the planned duration
    pub estimated_cost: Money,
}

#[derive(Debug, Deserialize)]
pub struct QuickCheckoutItem {
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub count: usize,
}

/// Walk-in checkout. With both name and phone the customer is looked up or
/// registered; otherwise an anonymous customer is created.
#[derive(Debug, Deserialize)]
pub struct QuickCheckoutBody {
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub vehicles: Vec<QuickCheckoutItem>,
    pub planned_duration: Option<i64>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct QuickCheckoutResponse {
    pub customer: Customer,
    pub rentals: Vec<Rental>,
    pub estimated_cost: Money,
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    pub rental_ids: Vec<RentalId>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendBody {
    pub additional_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub availability: Vec<TypeAvailability>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}
