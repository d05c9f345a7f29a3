use crate::domain::types::{Money, VehicleId, VehicleStatus};
use crate::domain::vehicles::Vehicle;
use crate::error::{RentalError, Result};
use crate::storage::connection::DatabaseConnection;
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    /// In registration order
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>>;
    async fn get_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>>;
    async fn create_vehicle(&self, vehicle: &Vehicle) -> Result<()>;
    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<()>;
    async fn delete_vehicle(&self, id: &VehicleId) -> Result<()>;

    /// Set the status to `next` if the current status equals `expected`
    /// (unconditionally when `expected` is `None`). Returns whether the
    /// write happened.
    async fn transition_status(
        &self,
        id: &VehicleId,
        expected: Option<VehicleStatus>,
        next: VehicleStatus,
    ) -> Result<bool>;
}

pub struct SqlVehicleRepository {
    connection: Arc<DatabaseConnection>,
}

impl SqlVehicleRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn vehicle_from_row(r: &sqlx::postgres::PgRow) -> Result<Vehicle> {
        let vehicle_type: String = r.get("vehicle_type");
        let status: String = r.get("status");

        Ok(Vehicle {
            id: VehicleId::from_uuid(r.get("vehicle_id")),
            serial_number: r.get("serial_number"),
            vehicle_type: vehicle_type.parse().map_err(|e: String| RentalError::DatabaseError {
                operation: "decode_vehicle".to_string(),
                source: e.into(),
            })?,
            hourly_rate: Money::from_decimal(r.get("hourly_rate")),
            daily_rate: r
                .get::<Option<rust_decimal::Decimal>, _>("daily_rate")
                .map(Money::from_decimal),
            status: status.parse().map_err(|e: String| RentalError::DatabaseError {
                operation: "decode_vehicle".to_string(),
                source: e.into(),
            })?,
            barcode: r.get("barcode"),
            image_url: r.get("image_url"),
        })
    }
}

const VEHICLE_COLUMNS: &str = "vehicle_id, serial_number, vehicle_type, hourly_rate, daily_rate, status, barcode, image_url";

#[async_trait]
impl VehicleRepository for SqlVehicleRepository {
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM vehicles ORDER BY created_at, serial_number",
            VEHICLE_COLUMNS
        ))
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("list_vehicles", e))?;

        rows.iter().map(Self::vehicle_from_row).collect()
    }

    async fn get_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM vehicles WHERE vehicle_id = $1",
            VEHICLE_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("get_vehicle", e))?;

        row.as_ref().map(Self::vehicle_from_row).transpose()
    }

    async fn create_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicles
            (vehicle_id, serial_number, vehicle_type, hourly_rate, daily_rate, status, barcode, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(vehicle.id.as_uuid())
        .bind(&vehicle.serial_number)
        .bind(vehicle.vehicle_type.as_str())
        .bind(vehicle.hourly_rate.as_decimal())
        .bind(vehicle.daily_rate.map(|r| r.as_decimal()))
        .bind(vehicle.status.as_str())
        .bind(&vehicle.barcode)
        .bind(&vehicle.image_url)
        .execute(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("create_vehicle", e))?;

        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE vehicles
            SET serial_number = $2, vehicle_type = $3, hourly_rate = $4, daily_rate = $5,
                status = $6, barcode = $7, image_url = $8, updated_at = NOW()
            WHERE vehicle_id = $1
            "#,
        )
        .bind(vehicle.id.as_uuid())
        .bind(&vehicle.serial_number)
        .bind(vehicle.vehicle_type.as_str())
        .bind(vehicle.hourly_rate.as_decimal())
        .bind(vehicle.daily_rate.map(|r| r.as_decimal()))
        .bind(vehicle.status.as_str())
        .bind(&vehicle.barcode)
        .bind(&vehicle.image_url)
        .execute(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("update_vehicle", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::not_found("vehicle", vehicle.id));
        }
        Ok(())
    }

    async fn delete_vehicle(&self, id: &VehicleId) -> Result<()> {
        let result = sqlx::query("DELETE FROM vehicles WHERE vehicle_id = $1")
            .bind(id.as_uuid())
            .execute(self.connection.pool())
            .await
            .map_err(|e| RentalError::database("delete_vehicle", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::not_found("vehicle", id));
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: &VehicleId,
        expected: Option<VehicleStatus>,
        next: VehicleStatus,
    ) -> Result<bool> {
        let result = match expected {
            Some(expected) => sqlx::query(
                "UPDATE vehicles SET status = $2, updated_at = NOW() WHERE vehicle_id = $1 AND status = $3",
            )
            .bind(id.as_uuid())
            .bind(next.as_str())
            .bind(expected.as_str()),
            None => sqlx::query(
                "UPDATE vehicles SET status = $2, updated_at = NOW() WHERE vehicle_id = $1",
            )
            .bind(id.as_uuid())
            .bind(next.as_str()),
        }
        .execute(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("transition_vehicle_status", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish a lost compare-and-set from a missing vehicle
        match self.get_vehicle(id).await? {
            Some(_) => Ok(false),
            None => Err(RentalError::not_found("vehicle", id)),
        }
    }
}
