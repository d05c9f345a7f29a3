use crate::domain::rentals::Rental;
use crate::domain::types::{CustomerId, Money, RentalId, RentalStatus, VehicleId};
use crate::error::{RentalError, Result};
use crate::storage::connection::DatabaseConnection;
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait RentalRepository: Send + Sync {
    async fn list_rentals(&self) -> Result<Vec<Rental>>;
    async fn get_rental(&self, id: &RentalId) -> Result<Option<Rental>>;
    /// Rejects a second active rental for the same vehicle with `InvalidState`.
    async fn create_rental(&self, rental: &Rental) -> Result<()>;
    /// Store the closing fields of `rental`, but only while the stored row
    /// is still active. A rental completed in the meantime yields `InvalidState`.
    async fn complete_rental(&self, rental: &Rental) -> Result<()>;
    /// Store the new planned duration, under the same active-only guard.
    async fn extend_rental(&self, rental: &Rental) -> Result<()>;
    async fn delete_rental(&self, id: &RentalId) -> Result<()>;
    async fn list_rentals_for_customer(&self, customer_id: &CustomerId) -> Result<Vec<Rental>>;
    async fn list_rentals_for_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Rental>>;
    async fn list_active_rentals(&self) -> Result<Vec<Rental>>;
}

pub struct SqlRentalRepository {
    connection: Arc<DatabaseConnection>,
}

const RENTAL_COLUMNS: &str = "rental_id, customer_id, vehicle_id, start_date, planned_duration, status, end_date, actual_duration, total_cost";

// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl SqlRentalRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    fn rental_from_row(r: &sqlx::postgres::PgRow) -> Result<Rental> {
        let status: String = r.get("status");
        let status: RentalStatus = status.parse().map_err(|e: String| RentalError::DatabaseError {
            operation: "decode_rental".to_string(),
            source: e.into(),
        })?;

        Ok(Rental {
            id: RentalId::from_uuid(r.get("rental_id")),
            customer_id: CustomerId::from_uuid(r.get("customer_id")),
            vehicle_id: VehicleId::from_uuid(r.get("vehicle_id")),
            start_date: r.get("start_date"),
            planned_duration: r.get("planned_duration"),
            status,
            end_date: r.get("end_date"),
            actual_duration: r.get("actual_duration"),
            total_cost: r
                .get::<Option<rust_decimal::Decimal>, _>("total_cost")
                .map(Money::from_decimal),
        })
    }

    async fn fetch_where(&self, operation: &str, clause: &str, id: uuid::Uuid) -> Result<Vec<Rental>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM rentals WHERE {} = $1 ORDER BY start_date, created_at",
            RENTAL_COLUMNS, clause
        ))
        .bind(id)
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| RentalError::database(operation, e))?;

        rows.iter().map(Self::rental_from_row).collect()
    }
}

#[async_trait]
impl RentalRepository for SqlRentalRepository {
    async fn list_rentals(&self) -> Result<Vec<Rental>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM rentals ORDER BY start_date, created_at",
            RENTAL_COLUMNS
        ))
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("list_rentals", e))?;

        rows.iter().map(Self::rental_from_row).collect()
    }

    async fn get_rental(&self, id: &RentalId) -> Result<Option<Rental>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM rentals WHERE rental_id = $1",
            RENTAL_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("get_rental", e))?;

        row.as_ref().map(Self::rental_from_row).transpose()
    }

    async fn create_rental(&self, rental: &Rental) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rentals
            (rental_id, customer_id, vehicle_id, start_date, planned_duration, status,
             end_date, actual_duration, total_cost)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(rental.id.as_uuid())
        .bind(rental.customer_id.as_uuid())
        .bind(rental.vehicle_id.as_uuid())
        .bind(rental.start_date)
        .bind(rental.planned_duration)
        .bind(rental.status.as_str())
        .bind(rental.end_date)
        .bind(rental.actual_duration)
        .bind(rental.total_cost.map(|c| c.as_decimal()))
        .execute(self.connection.pool())
        .await
        .map_err(|e| {
            let duplicate_active = e
                .as_database_error()
                .and_then(|db| db.code())
                .is_some_and(|code| code == UNIQUE_VIOLATION);
            if duplicate_active {
                RentalError::invalid_state(
                    "vehicle",
                    rental.vehicle_id,
                    "vehicle already has an active rental",
                )
            } else {
                RentalError::database("create_rental", e)
            }
        })?;

        Ok(())
    }

    async fn complete_rental(&self, rental: &Rental) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE rentals
            SET status = $2, end_date = $3, actual_duration = $4, total_cost = $5,
                updated_at = NOW()
            WHERE rental_id = $1 AND status = 'active'
            "#,
        )
        .bind(rental.id.as_uuid())
        .bind(rental.status.as_str())
        .bind(rental.end_date)
        .bind(rental.actual_duration)
        .bind(rental.total_cost.map(|c| c.as_decimal()))
        .execute(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("complete_rental", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::invalid_state(
                "rental",
                rental.id,
                "rental is no longer active",
            ));
        }
        Ok(())
    }

    async fn extend_rental(&self, rental: &Rental) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE rentals
            SET planned_duration = $2, updated_at = NOW()
            WHERE rental_id = $1 AND status = 'active'
            "#,
        )
        .bind(rental.id.as_uuid())
        .bind(rental.planned_duration)
        .execute(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("extend_rental", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::invalid_state(
                "rental",
                rental.id,
                "rental is no longer active",
            ));
        }
        Ok(())
    }

    async fn delete_rental(&self, id: &RentalId) -> Result<()> {
        let result = sqlx::query("DELETE FROM rentals WHERE rental_id = $1")
            .bind(id.as_uuid())
            .execute(self.connection.pool())
            .await
            .map_err(|e| RentalError::database("delete_rental", e))?;

        if result.rows_affected() == 0 {
            return Err(RentalError::not_found("rental", id));
        }
        Ok(())
    }

    async fn list_rentals_for_customer(&self, customer_id: &CustomerId) -> Result<Vec<Rental>> {
        self.fetch_where("list_rentals_for_customer", "customer_id", customer_id.as_uuid())
            .await
    }

    async fn list_rentals_for_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Rental>> {
        self.fetch_where("list_rentals_for_vehicle", "vehicle_id", vehicle_id.as_uuid())
            .await
    }

    async fn list_active_rentals(&self) -> Result<Vec<Rental>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM rentals WHERE status = $1 ORDER BY start_date, created_at",
            RENTAL_COLUMNS
        ))
        .bind(RentalStatus::Active.as_str())
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| RentalError::database("list_active_rentals", e))?;

        rows.iter().map(Self::rental_from_row).collect()
    }
}
