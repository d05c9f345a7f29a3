use crate::domain::types::{Money, VehicleId, VehicleStatus, VehicleType};
use crate::error::{RentalError, Result};
use crate::files::FileStorage;
use crate::storage::{RentalRepository, VehicleRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub serial_number: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub hourly_rate: Money,
    pub daily_rate: Option<Money>,
    pub status: VehicleStatus,
    pub barcode: Option<String>,
    pub image_url: Option<String>,
}

impl Vehicle {
    pub fn new(
        serial_number: String,
        vehicle_type: VehicleType,
        hourly_rate: Money,
        daily_rate: Option<Money>,
    ) -> Self {
        Self {
            id: VehicleId::new(),
            serial_number,
            vehicle_type,
            hourly_rate,
            daily_rate,
            status: VehicleStatus::Available,
            barcode: None,
            image_url: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }

    /// "Electric bike #E-104"
    pub fn display_name(&self) -> String {
        format!("{} #{}", self.vehicle_type.label(), self.serial_number)
    }
}

/// Staff input for registering a vehicle
#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub serial_number: String,
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub hourly_rate: Money,
    #[serde(default)]
    pub daily_rate: Option<Money>,
    #[serde(default)]
    pub status: Option<VehicleStatus>,
    #[serde(default)]
    pub barcode: Option<String>,
}

impl NewVehicle {
    fn into_vehicle(self) -> Result<Vehicle> {
        let serial_number = self.serial_number.trim().to_string();
        if serial_number.is_empty() {
            return Err(RentalError::invalid_input("Serial number is required"));
        }
        validate_rates(self.hourly_rate, self.daily_rate)?;

        let status = self.status.unwrap_or(VehicleStatus::Available);
        if status == VehicleStatus::Rented {
            return Err(RentalError::invalid_input(
                "A new vehicle cannot start out rented",
            ));
        }

        let mut vehicle = Vehicle::new(
            serial_number,
            self.vehicle_type,
            self.hourly_rate,
            self.daily_rate,
        );
        vehicle.status = status;
        vehicle.barcode = self
            .barcode
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        Ok(vehicle)
    }
}

/// Partial edit of a vehicle; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleUpdate {
    pub serial_number: Option<String>,
    #[serde(rename = "type")]
    pub vehicle_type: Option<VehicleType>,
    pub hourly_rate: Option<Money>,
    pub daily_rate: Option<Money>,
    pub status: Option<VehicleStatus>,
    pub barcode: Option<String>,
}

fn validate_rates(hourly_rate: Money, daily_rate: Option<Money>) -> Result<()> {
    if !hourly_rate.is_positive() {
        return Err(RentalError::invalid_input("Hourly rate must be greater than 0"));
    }
    if daily_rate.is_some_and(|rate| rate.is_negative()) {
        return Err(RentalError::invalid_input("Daily rate cannot be negative"));
    }
    Ok(())
}

/// Staff-facing inventory operations. Rental-driven status changes go
/// through the lifecycle controller instead.
pub struct VehicleManager {
    vehicles: Arc<dyn VehicleRepository>,
    rentals: Arc<dyn RentalRepository>,
    files: Arc<dyn FileStorage>,
}

impl VehicleManager {
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        rentals: Arc<dyn RentalRepository>,
        files: Arc<dyn FileStorage>,
    ) -> Self {
        Self {
            vehicles,
            rentals,
            files,
        }
    }

    pub async fn list(&self) -> Result<Vec<Vehicle>> {
        self.vehicles.list_vehicles().await
    }

    pub async fn get(&self, id: &VehicleId) -> Result<Vehicle> {
        self.vehicles
            .get_vehicle(id)
            .await?
            .ok_or_else(|| RentalError::not_found("vehicle", id))
    }

    pub async fn create(&self, input: NewVehicle) -> Result<Vehicle> {
        let vehicle = input.into_vehicle()?;
        self.vehicles.create_vehicle(&vehicle).await?;
        info!(vehicle_id = %vehicle.id, serial = %vehicle.serial_number, "Registered vehicle");
        Ok(vehicle)
    }

    /// Validates every row before writing any of them.
    pub async fn create_many(&self, inputs: Vec<NewVehicle>) -> Result<Vec<Vehicle>> {
        if inputs.is_empty() {
            return Err(RentalError::invalid_input("No vehicles to add"));
        }

        let vehicles = inputs
            .into_iter()
            .enumerate()
            .map(|(row, input)| {
                input.into_vehicle().map_err(|e| match e {
                    RentalError::InvalidInput { message } => RentalError::InvalidInput {
                        message: format!("row {}: {}", row + 1, message),
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for vehicle in &vehicles {
            self.vehicles.create_vehicle(vehicle).await?;
        }

        info!(count = vehicles.len(), "Registered vehicles in bulk");
        Ok(vehicles)
    }

    pub async fn update(&self, id: &VehicleId, update: VehicleUpdate) -> Result<Vehicle> {
        let mut vehicle = self.get(id).await?;

        if let Some(serial) = update.serial_number {
            let serial = serial.trim().to_string();
            if serial.is_empty() {
                return Err(RentalError::invalid_input("Serial number is required"));
            }
            vehicle.serial_number = serial;
        }
        if let Some(vehicle_type) = update.vehicle_type {
            vehicle.vehicle_type = vehicle_type;
        }
        if let Some(rate) = update.hourly_rate {
            vehicle.hourly_rate = rate;
        }
        if update.daily_rate.is_some() {
            vehicle.daily_rate = update.daily_rate;
        }
        if let Some(barcode) = update.barcode {
            let barcode = barcode.trim().to_string();
            vehicle.barcode = (!barcode.is_empty()).then_some(barcode);
        }
        validate_rates(vehicle.hourly_rate, vehicle.daily_rate)?;

        if let Some(status) = update.status {
            if status != vehicle.status {
                self.check_staff_status_change(&vehicle, status).await?;
                vehicle.status = status;
            }
        }

        self.vehicles.update_vehicle(&vehicle).await?;
        debug!(vehicle_id = %vehicle.id, "Updated vehicle");
        Ok(vehicle)
    }

    /// Move a vehicle into or out of maintenance/disabled.
    pub async fn set_status(&self, id: &VehicleId, status: VehicleStatus) -> Result<Vehicle> {
        self.update(
            id,
            VehicleUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    async fn check_staff_status_change(&self, vehicle: &Vehicle, next: VehicleStatus) -> Result<()> {
        if next == VehicleStatus::Rented {
            return Err(RentalError::invalid_input(
                "Vehicles become rented only through checkout",
            ));
        }

        let has_active_rental = self
            .rentals
            .list_rentals_for_vehicle(&vehicle.id)
            .await?
            .iter()
            .any(|r| r.is_active());
        if has_active_rental {
            return Err(RentalError::invalid_state(
                "vehicle",
                vehicle.id,
                "vehicle has an active rental; complete it first",
            ));
        }
        Ok(())
    }

    pub async fn attach_image(&self, id: &VehicleId, file_name: &str, bytes: &[u8]) -> Result<Vehicle> {
        let mut vehicle = self.get(id).await?;
        let url = self
            .files
            .upload(&format!("vehicles/{}/{}", vehicle.id, file_name), bytes)
            .await?;
        vehicle.image_url = Some(url);
        self.vehicles.update_vehicle(&vehicle).await?;
        Ok(vehicle)
    }

    pub async fn delete(&self, id: &VehicleId) -> Result<()> {
        let vehicle = self.get(id).await?;
        let has_active_rental = self
            .rentals
            .list_rentals_for_vehicle(&vehicle.id)
            .await?
            .iter()
            .any(|r| r.is_active());
        if has_active_rental {
            return Err(RentalError::invalid_state(
                "vehicle",
                vehicle.id,
                "cannot delete a vehicle with an active rental",
            ));
        }

        self.vehicles.delete_vehicle(id).await?;
        info!(vehicle_id = %id, "Deleted vehicle");
        Ok(())
    }
}
