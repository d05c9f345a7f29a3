use crate::domain::billing;
use crate::domain::rentals::{validate_planned_duration, Rental};
use crate::domain::types::{CustomerId, Money, RentalId, VehicleId, VehicleStatus, VehicleType};
use crate::domain::vehicles::Vehicle;
use crate::error::{RentalError, Result};
use crate::storage::{CustomerRepository, RentalRepository, Repositories, VehicleRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: CustomerId,
    pub vehicle_ids: Vec<VehicleId>,
    pub start_time: DateTime<Utc>,
    /// Minutes
    pub planned_duration: i64,
    /// Check out vehicles that are not marked available
    #[serde(default)]
    pub force: bool,
}

/// Charge for one returned vehicle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeLine {
    pub rental_id: RentalId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub vehicle_label: String,
    pub vehicle_type: VehicleType,
    pub hourly_rate: Money,
    pub start_date: DateTime<Utc>,
    pub planned_duration: i64,
    pub actual_duration: i64,
    pub overdue_minutes: i64,
    pub billable_hours: i64,
    pub cost: Money,
}

impl ChargeLine {
    fn compute(rental: &Rental, vehicle: &Vehicle, now: DateTime<Utc>) -> Result<Self> {
        let actual_duration = billing::elapsed_minutes(rental, now)?;
        Ok(Self {
            rental_id: rental.id,
            customer_id: rental.customer_id,
            vehicle_id: vehicle.id,
            vehicle_label: vehicle.display_name(),
            vehicle_type: vehicle.vehicle_type,
            hourly_rate: vehicle.hourly_rate,
            start_date: rental.start_date,
            planned_duration: rental.planned_duration,
            actual_duration,
            overdue_minutes: billing::overdue_minutes(rental, now)?,
            billable_hours: billing::billable_hours(actual_duration)?,
            cost: billing::cost(vehicle, actual_duration)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionReceipt {
    pub completed_at: DateTime<Utc>,
    pub lines: Vec<ChargeLine>,
    pub total_cost: Money,
    pub any_overdue: bool,
}

impl CompletionReceipt {
    pub fn new(completed_at: DateTime<Utc>, lines: Vec<ChargeLine>) -> Self {
        let total_cost = lines.iter().map(|l| l.cost).sum();
        let any_overdue = lines.iter().any(|l| l.overdue_minutes > 0);
        Self {
            completed_at,
            lines,
            total_cost,
            any_overdue,
        }
    }

    /// Lines grouped by customer, in first-seen order
    pub fn by_customer(&self) -> Vec<(CustomerId, Vec<ChargeLine>)> {
        let mut groups: Vec<(CustomerId, Vec<ChargeLine>)> = Vec::new();
        for line in &self.lines {
            match groups.iter_mut().find(|(id, _)| *id == line.customer_id) {
                Some((_, lines)) => lines.push(line.clone()),
                None => groups.push((line.customer_id, vec![line.clone()])),
            }
        }
        groups
    }
}

/// Rental state changes together with the paired vehicle status updates
#[async_trait]
pub trait LifecycleOperations: Send + Sync {
    async fn checkout(&self, request: CheckoutRequest) -> Result<Vec<Rental>>;

    async fn extend(&self, rental_id: &RentalId, additional_minutes: i64) -> Result<Rental>;

    async fn complete(&self, rental_ids: &[RentalId], now: DateTime<Utc>) -> Result<CompletionReceipt>;

    async fn complete_customer(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<CompletionReceipt>;

    /// Same charges `complete` would apply, without writing anything
    async fn preview_completion(
        &self,
        rental_ids: &[RentalId],
        now: DateTime<Utc>,
    ) -> Result<CompletionReceipt>;

    async fn delete_rental_record(&self, rental_id: &RentalId) -> Result<()>;
}

pub struct LifecycleController {
    vehicles: Arc<dyn VehicleRepository>,
    customers: Arc<dyn CustomerRepository>,
    rentals: Arc<dyn RentalRepository>,
}

impl LifecycleController {
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        customers: Arc<dyn CustomerRepository>,
        rentals: Arc<dyn RentalRepository>,
    ) -> Self {
        Self {
            vehicles,
            customers,
            rentals,
        }
    }

    pub fn from_repositories(repositories: &Repositories) -> Self {
        Self::new(
            repositories.vehicles.clone(),
            repositories.customers.clone(),
            repositories.rentals.clone(),
        )
    }

    async fn load_vehicle(&self, id: &VehicleId) -> Result<Vehicle> {
        self.vehicles
            .get_vehicle(id)
            .await?
            .ok_or_else(|| RentalError::not_found("vehicle", id))
    }

    async fn load_rental(&self, id: &RentalId) -> Result<Rental> {
        self.rentals
            .get_rental(id)
            .await?
            .ok_or_else(|| RentalError::not_found("rental", id))
    }

    async fn load_active_rental(&self, id: &RentalId) -> Result<Rental> {
        let rental = self.load_rental(id).await?;
        if !rental.is_active() {
            return Err(RentalError::invalid_state(
                "rental",
                rental.id,
                format!("rental is already {}", rental.status),
            ));
        }
        Ok(rental)
    }

    /// Claim one vehicle and open its rental.
    async fn checkout_one(&self, rental: Rental, force: bool) -> Result<Rental> {
        let vehicle_id = rental.vehicle_id;

        if force {
            self.rentals.create_rental(&rental).await?;
            self.vehicles
                .transition_status(&vehicle_id, None, VehicleStatus::Rented)
                .await?;
            return Ok(rental);
        }

        let claimed = self
            .vehicles
            .transition_status(&vehicle_id, Some(VehicleStatus::Available), VehicleStatus::Rented)
            .await?;
        if !claimed {
            let status = self
                .vehicles
                .get_vehicle(&vehicle_id)
                .await?
                .map(|v| v.status)
                .unwrap_or(VehicleStatus::Rented);
            return Err(RentalError::VehicleUnavailable {
                vehicle_id: vehicle_id.to_string(),
                status,
            });
        }

        if let Err(e) = self.rentals.create_rental(&rental).await {
            // Release our own claim so the vehicle does not stay rented without a rental
            if let Err(revert) = self
                .vehicles
                .transition_status(&vehicle_id, Some(VehicleStatus::Rented), VehicleStatus::Available)
                .await
            {
                warn!(vehicle_id = %vehicle_id, error = %revert, "Failed to release vehicle claim");
            }
            return Err(e);
        }

        Ok(rental)
    }

    async fn complete_one(&self, rental_id: &RentalId, now: DateTime<Utc>) -> Result<ChargeLine> {
        let mut rental = self.load_active_rental(rental_id).await?;
        let vehicle = self.load_vehicle(&rental.vehicle_id).await?;
        let line = ChargeLine::compute(&rental, &vehicle, now)?;

        rental.complete(now, line.cost)?;
        // Loses to a concurrent completion of the same rental
        self.rentals.complete_rental(&rental).await?;
        self.vehicles
            .transition_status(&vehicle.id, None, VehicleStatus::Available)
            .await?;

        debug!(
            rental_id = %rental.id,
            vehicle_id = %vehicle.id,
            minutes = line.actual_duration,
            cost = %line.cost,
            "Completed rental"
        );
        Ok(line)
    }

    async fn preview_one(&self, rental_id: &RentalId, now: DateTime<Utc>) -> Result<ChargeLine> {
        let rental = self.load_active_rental(rental_id).await?;
        let vehicle = self.load_vehicle(&rental.vehicle_id).await?;
        ChargeLine::compute(&rental, &vehicle, now)
    }
}

fn check_batch<T: std::hash::Hash + Eq + std::fmt::Display>(ids: &[T], what: &str) -> Result<()> {
    if ids.is_empty() {
        return Err(RentalError::invalid_input(format!("At least one {} is required", what)));
    }
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(RentalError::invalid_input(format!("Duplicate {} {}", what, id)));
        }
    }
    Ok(())
}

/// First error in input order, after logging how much of the batch was applied.
fn settle<T>(operation: &str, results: Vec<Result<T>>) -> Result<Vec<T>> {
    let total = results.len();
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 && failed < total {
        warn!(
            operation,
            applied = total - failed,
            failed,
            "Batch partially applied"
        );
    }
    results.into_iter().collect()
}

#[async_trait]
impl LifecycleOperations for LifecycleController {
    async fn checkout(&self, request: CheckoutRequest) -> Result<Vec<Rental>> {
        check_batch(&request.vehicle_ids, "vehicle")?;
        validate_planned_duration(request.planned_duration)?;

        let customer = self
            .customers
            .get_customer(&request.customer_id)
            .await?
            .ok_or_else(|| RentalError::not_found("customer", request.customer_id))?;

        let mut rentals = Vec::with_capacity(request.vehicle_ids.len());
        for vehicle_id in &request.vehicle_ids {
            let vehicle = self.load_vehicle(vehicle_id).await?;
            if !request.force && !vehicle.is_available() {
                return Err(RentalError::VehicleUnavailable {
                    vehicle_id: vehicle.id.to_string(),
                    status: vehicle.status,
                });
            }
            rentals.push(Rental::new(
                customer.id,
                vehicle.id,
                request.start_time,
                request.planned_duration,
            )?);
        }

        let results = join_all(
            rentals
                .into_iter()
                .map(|rental| self.checkout_one(rental, request.force)),
        )
        .await;
        let created = settle("checkout", results)?;

        info!(
            customer_id = %customer.id,
            vehicles = created.len(),
            planned_minutes = request.planned_duration,
            forced = request.force,
            "Checked out vehicles"
        );
        Ok(created)
    }

    async fn extend(&self, rental_id: &RentalId, additional_minutes: i64) -> Result<Rental> {
        let mut rental = self.load_rental(rental_id).await?;
        rental.extend(additional_minutes)?;
        self.rentals.extend_rental(&rental).await?;

        info!(
            rental_id = %rental.id,
            added = additional_minutes,
            planned_minutes = rental.planned_duration,
            "Extended rental"
        );
        Ok(rental)
    }

    async fn complete(&self, rental_ids: &[RentalId], now: DateTime<Utc>) -> Result<CompletionReceipt> {
        check_batch(rental_ids, "rental")?;

        let results = join_all(rental_ids.iter().map(|id| self.complete_one(id, now))).await;
        let lines = settle("complete", results)?;
        let receipt = CompletionReceipt::new(now, lines);

        info!(
            rentals = receipt.lines.len(),
            total = %receipt.total_cost,
            overdue = receipt.any_overdue,
            "Completed rentals"
        );
        Ok(receipt)
    }

    async fn complete_customer(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<CompletionReceipt> {
        let customer = self
            .customers
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| RentalError::not_found("customer", customer_id))?;

        let active: Vec<RentalId> = self
            .rentals
            .list_rentals_for_customer(&customer.id)
            .await?
            .into_iter()
            .filter(|r| r.is_active())
            .map(|r| r.id)
            .collect();
        if active.is_empty() {
            return Err(RentalError::invalid_state(
                "customer",
                customer.id,
                "customer has no active rentals",
            ));
        }

        self.complete(&active, now).await
    }

    async fn preview_completion(
        &self,
        rental_ids: &[RentalId],
        now: DateTime<Utc>,
    ) -> Result<CompletionReceipt> {
        check_batch(rental_ids, "rental")?;

        let results = join_all(rental_ids.iter().map(|id| self.preview_one(id, now))).await;
        let lines = results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(CompletionReceipt::new(now, lines))
    }

    async fn delete_rental_record(&self, rental_id: &RentalId) -> Result<()> {
        let rental = self.load_rental(rental_id).await?;
        if rental.is_active() {
            return Err(RentalError::invalid_state(
                "rental",
                rental.id,
                "active rentals must be completed before deletion",
            ));
        }

        self.rentals.delete_rental(&rental.id).await?;
        info!(rental_id = %rental.id, "Deleted rental record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customers::Customer;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    struct Fixture {
        repos: Repositories,
        controller: LifecycleController,
        customer: Customer,
    }

    async fn fixture() -> Fixture {
        let repos = Repositories::in_memory();
        let customer = Customer::new("Dana".to_string(), "050".to_string());
        repos.customers.create_customer(&customer).await.unwrap();
        Fixture {
            controller: LifecycleController::from_repositories(&repos),
            repos,
            customer,
        }
    }

    async fn add_vehicle(repos: &Repositories, serial: &str, rate: Money) -> Vehicle {
        let vehicle = Vehicle::new(serial.to_string(), VehicleType::StandardBike, rate, None);
        repos.vehicles.create_vehicle(&vehicle).await.unwrap();
        vehicle
    }

    fn ten_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn request(customer: &Customer, vehicles: &[&Vehicle], force: bool) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: customer.id,
            vehicle_ids: vehicles.iter().map(|v| v.id).collect(),
            start_time: ten_am(),
            planned_duration: 60,
            force,
        }
    }

    #[tokio::test]
    async fn test_checkout_validation() {
        let f = fixture().await;
        let v = add_vehicle(&f.repos, "V-1", Money::from_decimal(dec!(10))).await;

        let empty = f.controller.checkout(request(&f.customer, &[], false)).await;
        assert!(matches!(empty, Err(RentalError::InvalidInput { .. })));

        let duplicate = f.controller.checkout(request(&f.customer, &[&v, &v], false)).await;
        assert!(matches!(duplicate, Err(RentalError::InvalidInput { .. })));

        let mut negative = request(&f.customer, &[&v], false);
        negative.planned_duration = -1;
        assert!(matches!(
            f.controller.checkout(negative).await,
            Err(RentalError::InvalidInput { .. })
        ));

        let mut unbounded = request(&f.customer, &[&v], false);
        unbounded.planned_duration = i64::MAX;
        assert!(matches!(
            f.controller.checkout(unbounded).await,
            Err(RentalError::InvalidInput { .. })
        ));

        let mut unknown_customer = request(&f.customer, &[&v], false);
        unknown_customer.customer_id = CustomerId::new();
        assert!(matches!(
            f.controller.checkout(unknown_customer).await,
            Err(RentalError::NotFound { entity: "customer", .. })
        ));

        let mut unknown_vehicle = request(&f.customer, &[&v], false);
        unknown_vehicle.vehicle_ids.push(VehicleId::new());
        assert!(matches!(
            f.controller.checkout(unknown_vehicle).await,
            Err(RentalError::NotFound { entity: "vehicle", .. })
        ));

        assert!(f.repos.rentals.list_rentals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_marks_vehicles_rented() {
        let f = fixture().await;
        let a = add_vehicle(&f.repos, "A", Money::from_decimal(dec!(10))).await;
        let b = add_vehicle(&f.repos, "B", Money::from_decimal(dec!(12))).await;

        let rentals = f
            .controller
            .checkout(request(&f.customer, &[&a, &b], false))
            .await
            .unwrap();
        assert_eq!(rentals.len(), 2);
        assert!(rentals.iter().all(|r| r.is_active() && r.start_date == ten_am()));
        assert_eq!(rentals[0].vehicle_id, a.id);
        assert_eq!(rentals[1].vehicle_id, b.id);

        for vehicle in [&a, &b] {
            let stored = f.repos.vehicles.get_vehicle(&vehicle.id).await.unwrap().unwrap();
            assert_eq!(stored.status, VehicleStatus::Rented);
        }

        let again = f.controller.checkout(request(&f.customer, &[&a], false)).await;
        assert!(matches!(
            again,
            Err(RentalError::VehicleUnavailable {
                status: VehicleStatus::Rented,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_force_checkout_overrides_status() {
        let f = fixture().await;
        let v = add_vehicle(&f.repos, "M-1", Money::from_decimal(dec!(10))).await;
        f.repos
            .vehicles
            .transition_status(&v.id, None, VehicleStatus::Maintenance)
            .await
            .unwrap();

        let result = f.controller.checkout(request(&f.customer, &[&v], false)).await;
        assert!(matches!(
            result,
            Err(RentalError::VehicleUnavailable {
                status: VehicleStatus::Maintenance,
                ..
            })
        ));

        let rentals = f
            .controller
            .checkout(request(&f.customer, &[&v], true))
            .await
            .unwrap();
        assert_eq!(rentals.len(), 1);
        let stored = f.repos.vehicles.get_vehicle(&v.id).await.unwrap().unwrap();
        assert_eq!(stored.status, VehicleStatus::Rented);

        // Force never opens a second active rental on the same vehicle
        let second = f.controller.checkout(request(&f.customer, &[&v], true)).await;
        assert!(matches!(second, Err(RentalError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_complete_bills_and_releases_vehicle() {
        let f = fixture().await;
        let v = add_vehicle(&f.repos, "E-1", Money::from_decimal(dec!(15))).await;
        let rentals = f
            .controller
            .checkout(request(&f.customer, &[&v], false))
            .await
            .unwrap();
        let now = ten_am() + Duration::minutes(70);

        let preview = f.controller.preview_completion(&[rentals[0].id], now).await.unwrap();
        let stored = f.repos.rentals.get_rental(&rentals[0].id).await.unwrap().unwrap();
        assert!(stored.is_active());

        let receipt = f.controller.complete(&[rentals[0].id], now).await.unwrap();
        assert_eq!(receipt, preview);
        assert_eq!(receipt.total_cost.as_decimal(), dec!(30));
        assert!(receipt.any_overdue);

        let line = &receipt.lines[0];
        assert_eq!(line.actual_duration, 70);
        assert_eq!(line.billable_hours, 2);
        assert_eq!(line.overdue_minutes, 10);

        let stored = f.repos.rentals.get_rental(&rentals[0].id).await.unwrap().unwrap();
        assert!(stored.is_completed());
        assert_eq!(stored.actual_duration, Some(70));
        assert_eq!(stored.end_date, Some(now));
        let vehicle = f.repos.vehicles.get_vehicle(&v.id).await.unwrap().unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Available);
    }

    #[tokio::test]
    async fn test_complete_twice_keeps_first_result() {
        let f = fixture().await;
        let v = add_vehicle(&f.repos, "E-2", Money::from_decimal(dec!(10))).await;
        let rentals = f
            .controller
            .checkout(request(&f.customer, &[&v], false))
            .await
            .unwrap();

        f.controller
            .complete(&[rentals[0].id], ten_am() + Duration::minutes(30))
            .await
            .unwrap();
        let first = f.repos.rentals.get_rental(&rentals[0].id).await.unwrap().unwrap();

        let second = f
            .controller
            .complete(&[rentals[0].id], ten_am() + Duration::minutes(300))
            .await;
        assert!(matches!(second, Err(RentalError::InvalidState { .. })));
        let after = f.repos.rentals.get_rental(&rentals[0].id).await.unwrap().unwrap();
        assert_eq!(after, first);
    }

    #[tokio::test]
    async fn test_complete_batch_is_not_atomic() {
        let f = fixture().await;
        let v = add_vehicle(&f.repos, "E-3", Money::from_decimal(dec!(10))).await;
        let rentals = f
            .controller
            .checkout(request(&f.customer, &[&v], false))
            .await
            .unwrap();
        let missing = RentalId::new();

        let result = f
            .controller
            .complete(&[missing, rentals[0].id], ten_am() + Duration::minutes(10))
            .await;
        match result {
            Err(RentalError::NotFound { id, .. }) => assert_eq!(id, missing.to_string()),
            other => panic!("unexpected result: {:?}", other),
        }

        let stored = f.repos.rentals.get_rental(&rentals[0].id).await.unwrap().unwrap();
        assert!(stored.is_completed());
    }

    #[tokio::test]
    async fn test_complete_customer_closes_all_active_rentals() {
        let f = fixture().await;
        let a = add_vehicle(&f.repos, "A", Money::from_decimal(dec!(10))).await;
        let b = add_vehicle(&f.repos, "B", Money::from_decimal(dec!(20))).await;
        f.controller
            .checkout(request(&f.customer, &[&a, &b], false))
            .await
            .unwrap();

        let receipt = f
            .controller
            .complete_customer(&f.customer.id, ten_am() + Duration::minutes(61))
            .await
            .unwrap();
        assert_eq!(receipt.lines.len(), 2);
        assert_eq!(receipt.total_cost.as_decimal(), dec!(60));
        assert_eq!(receipt.by_customer().len(), 1);

        let again = f
            .controller
            .complete_customer(&f.customer.id, ten_am() + Duration::minutes(90))
            .await;
        assert!(matches!(again, Err(RentalError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_extend_and_delete_record() {
        let f = fixture().await;
        let v = add_vehicle(&f.repos, "X", Money::from_decimal(dec!(10))).await;
        let rentals = f
            .controller
            .checkout(request(&f.customer, &[&v], false))
            .await
            .unwrap();
        let id = rentals[0].id;

        assert_eq!(f.controller.extend(&id, 30).await.unwrap().planned_duration, 90);
        assert!(matches!(
            f.controller.extend(&id, 0).await,
            Err(RentalError::InvalidInput { .. })
        ));
        assert!(matches!(
            f.controller.extend(&id, i64::MAX).await,
            Err(RentalError::InvalidInput { .. })
        ));
        assert_eq!(
            f.repos.rentals.get_rental(&id).await.unwrap().unwrap().planned_duration,
            90
        );
        assert!(matches!(
            f.controller.delete_rental_record(&id).await,
            Err(RentalError::InvalidState { .. })
        ));

        f.controller
            .complete(&[id], ten_am() + Duration::minutes(45))
            .await
            .unwrap();
        assert!(matches!(
            f.controller.extend(&id, 15).await,
            Err(RentalError::InvalidState { .. })
        ));

        f.controller.delete_rental_record(&id).await.unwrap();
        assert!(matches!(
            f.controller.delete_rental_record(&id).await,
            Err(RentalError::NotFound { .. })
        ));
    }
}
