use crate::domain::customers::Customer;
use crate::domain::rentals::Rental;
use crate::domain::types::{CustomerId, RentalId, VehicleId, VehicleStatus};
use crate::domain::vehicles::Vehicle;
use crate::error::{RentalError, Result};
use crate::storage::{CustomerRepository, RentalRepository, VehicleRepository};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store backing all three repositories. Records keep
/// insertion order so listings are stable.
#[derive(Default)]
pub struct MemoryStore {
    vehicles: Arc<RwLock<Vec<Vehicle>>>,
    customers: Arc<RwLock<Vec<Customer>>>,
    rentals: Arc<RwLock<Vec<Rental>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleRepository for MemoryStore {
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        Ok(self.vehicles.read().await.clone())
    }

    async fn get_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>> {
        let vehicles = self.vehicles.read().await;
        Ok(vehicles.iter().find(|v| v.id == *id).cloned())
    }

    async fn create_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        let mut vehicles = self.vehicles.write().await;
        if vehicles.iter().any(|v| v.id == vehicle.id) {
            return Err(RentalError::invalid_state("vehicle", vehicle.id, "already exists"));
        }
        vehicles.push(vehicle.clone());
        Ok(())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        let mut vehicles = self.vehicles.write().await;
        let existing = vehicles
            .iter_mut()
            .find(|v| v.id == vehicle.id)
            .ok_or_else(|| RentalError::not_found("vehicle", vehicle.id))?;
        *existing = vehicle.clone();
        Ok(())
    }

    async fn delete_vehicle(&self, id: &VehicleId) -> Result<()> {
        let mut vehicles = self.vehicles.write().await;
        let index = vehicles
            .iter()
            .position(|v| v.id == *id)
            .ok_or_else(|| RentalError::not_found("vehicle", id))?;
        vehicles.remove(index);
        Ok(())
    }

    async fn transition_status(
        &self,
        id: &VehicleId,
        expected: Option<VehicleStatus>,
        next: VehicleStatus,
    ) -> Result<bool> {
        let mut vehicles = self.vehicles.write().await;
        let vehicle = vehicles
            .iter_mut()
            .find(|v| v.id == *id)
            .ok_or_else(|| RentalError::not_found("vehicle", id))?;

        if expected.is_some_and(|expected| vehicle.status != expected) {
            return Ok(false);
        }
        vehicle.status = next;
        Ok(true)
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn list_customers(&self) -> Result<Vec<Customer>> {
        Ok(self.customers.read().await.clone())
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers.iter().find(|c| c.id == *id).cloned())
    }

    async fn create_customer(&self, customer: &Customer) -> Result<()> {
        let mut customers = self.customers.write().await;
        if customers.iter().any(|c| c.id == customer.id) {
            return Err(RentalError::invalid_state("customer", customer.id, "already exists"));
        }
        customers.push(customer.clone());
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let mut customers = self.customers.write().await;
        let existing = customers
            .iter_mut()
            .find(|c| c.id == customer.id)
            .ok_or_else(|| RentalError::not_found("customer", customer.id))?;
        *existing = customer.clone();
        Ok(())
    }

    async fn delete_customer(&self, id: &CustomerId) -> Result<()> {
        let mut customers = self.customers.write().await;
        let index = customers
            .iter()
            .position(|c| c.id == *id)
            .ok_or_else(|| RentalError::not_found("customer", id))?;
        customers.remove(index);
        Ok(())
    }
}

#[async_trait]
impl RentalRepository for MemoryStore {
    async fn list_rentals(&self) -> Result<Vec<Rental>> {
        Ok(self.rentals.read().await.clone())
    }

    async fn get_rental(&self, id: &RentalId) -> Result<Option<Rental>> {
        let rentals = self.rentals.read().await;
        Ok(rentals.iter().find(|r| r.id == *id).cloned())
    }

    async fn create_rental(&self, rental: &Rental) -> Result<()> {
        let mut rentals = self.rentals.write().await;
        if rentals.iter().any(|r| r.id == rental.id) {
            return Err(RentalError::invalid_state("rental", rental.id, "already exists"));
        }
        let vehicle_busy = rental.is_active()
            && rentals
                .iter()
                .any(|r| r.vehicle_id == rental.vehicle_id && r.is_active());
        if vehicle_busy {
            return Err(RentalError::invalid_state(
                "vehicle",
                rental.vehicle_id,
                "vehicle already has an active rental",
            ));
        }
        rentals.push(rental.clone());
        Ok(())
    }

    async fn complete_rental(&self, rental: &Rental) -> Result<()> {
        let mut rentals = self.rentals.write().await;
        let stored = active_rental_mut(&mut rentals, &rental.id)?;
        *stored = rental.clone();
        Ok(())
    }

    async fn extend_rental(&self, rental: &Rental) -> Result<()> {
        let mut rentals = self.rentals.write().await;
        let stored = active_rental_mut(&mut rentals, &rental.id)?;
        stored.planned_duration = rental.planned_duration;
        Ok(())
    }

    async fn delete_rental(&self, id: &RentalId) -> Result<()> {
        let mut rentals = self.rentals.write().await;
        let index = rentals
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| RentalError::not_found("rental", id))?;
        rentals.remove(index);
        Ok(())
    }

    async fn list_rentals_for_customer(&self, customer_id: &CustomerId) -> Result<Vec<Rental>> {
        let rentals = self.rentals.read().await;
        Ok(rentals
            .iter()
            .filter(|r| r.customer_id == *customer_id)
            .cloned()
            .collect())
    }

    async fn list_rentals_for_vehicle(&self, vehicle_id: &VehicleId) -> Result<Vec<Rental>> {
        let rentals = self.rentals.read().await;
        Ok(rentals
            .iter()
            .filter(|r| r.vehicle_id == *vehicle_id)
            .cloned()
            .collect())
    }

    async fn list_active_rentals(&self) -> Result<Vec<Rental>> {
        let rentals = self.rentals.read().await;
        Ok(rentals.iter().filter(|r| r.is_active()).cloned().collect())
    }
}

fn active_rental_mut<'a>(rentals: &'a mut [Rental], id: &RentalId) -> Result<&'a mut Rental> {
    let stored = rentals
        .iter_mut()
        .find(|r| r.id == *id)
        .ok_or_else(|| RentalError::not_found("rental", id))?;
    if !stored.is_active() {
        return Err(RentalError::invalid_state(
            "rental",
            id,
            "rental is no longer active",
        ));
    }
    Ok(stored)
}
