//! Read-only projections over a snapshot of vehicles, customers and rentals.

use crate::domain::billing;
use crate::domain::customers::Customer;
use crate::domain::rentals::Rental;
use crate::domain::types::{CustomerId, Money, RentalId, VehicleId, VehicleStatus, VehicleType};
use crate::domain::vehicles::Vehicle;
use crate::error::{RentalError, Result};
use crate::storage::Repositories;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub vehicles: Vec<Vehicle>,
    pub customers: Vec<Customer>,
    pub rentals: Vec<Rental>,
}

impl FleetSnapshot {
    pub async fn load(repositories: &Repositories) -> Result<Self> {
        let (vehicles, customers, rentals) = tokio::try_join!(
            repositories.vehicles.list_vehicles(),
            repositories.customers.list_customers(),
            repositories.rentals.list_rentals(),
        )?;
        Ok(Self {
            vehicles,
            customers,
            rentals,
        })
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == *id)
    }

    pub fn customer(&self, id: &CustomerId) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == *id)
    }
}

/// An active rental with its time figures as of `now`
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRentalView {
    pub rental: Rental,
    pub vehicle: Option<Vehicle>,
    /// Planned return time
    pub due_at: DateTime<Utc>,
    pub elapsed_minutes: i64,
    pub remaining_minutes: i64,
    pub overdue_minutes: i64,
    pub is_overdue: bool,
    /// What completing now would charge
    pub current_cost: Option<Money>,
}

impl ActiveRentalView {
    fn build(rental: &Rental, vehicle: Option<&Vehicle>, now: DateTime<Utc>, grace: i64) -> Result<Self> {
        // Rentals booked to start later read as not yet started
        let at = now.max(rental.start_date);
        let elapsed_minutes = billing::elapsed_minutes(rental, at)?;
        Ok(Self {
            rental: rental.clone(),
            vehicle: vehicle.cloned(),
            due_at: rental.due_at()?,
            elapsed_minutes,
            remaining_minutes: billing::remaining_minutes(rental, at)?,
            overdue_minutes: billing::overdue_minutes(rental, at)?,
            is_overdue: billing::is_overdue_with_grace(rental, at, grace)?,
            current_cost: vehicle
                .map(|v| billing::cost(v, elapsed_minutes))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerRentalGroup {
    pub customer_id: CustomerId,
    pub customer: Option<Customer>,
    pub rentals: Vec<ActiveRentalView>,
    pub has_overdue: bool,
    pub current_total: Money,
}

fn group_by_customer(
    snapshot: &FleetSnapshot,
    views: Vec<ActiveRentalView>,
) -> Vec<CustomerRentalGroup> {
    let mut groups: Vec<CustomerRentalGroup> = Vec::new();
    for view in views {
        let customer_id = view.rental.customer_id;
        let index = match groups.iter().position(|g| g.customer_id == customer_id) {
            Some(index) => index,
            None => {
                groups.push(CustomerRentalGroup {
                    customer_id,
                    customer: snapshot.customer(&customer_id).cloned(),
                    rentals: Vec::new(),
                    has_overdue: false,
                    current_total: Money::zero(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[index];
        group.has_overdue |= view.is_overdue;
        if let Some(cost) = view.current_cost {
            group.current_total = group.current_total.add(cost);
        }
        group.rentals.push(view);
    }
    groups
}

fn active_views(
    snapshot: &FleetSnapshot,
    now: DateTime<Utc>,
    grace: i64,
) -> Result<Vec<ActiveRentalView>> {
    snapshot
        .rentals
        .iter()
        .filter(|r| r.is_active())
        .map(|r| ActiveRentalView::build(r, snapshot.vehicle(&r.vehicle_id), now, grace))
        .collect()
}

/// Active rentals grouped by customer, optionally narrowed by a customer search
pub fn active_rentals_by_customer(
    snapshot: &FleetSnapshot,
    now: DateTime<Utc>,
    grace: i64,
    query: Option<&str>,
) -> Result<Vec<CustomerRentalGroup>> {
    let groups = group_by_customer(snapshot, active_views(snapshot, now, grace)?);
    Ok(match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => groups
            .into_iter()
            .filter(|g| g.customer.as_ref().is_some_and(|c| c.matches_query(query)))
            .collect(),
        None => groups,
    })
}

/// Overdue rentals past the grace period, grouped by customer
pub fn overdue_rentals_by_customer(
    snapshot: &FleetSnapshot,
    now: DateTime<Utc>,
    grace: i64,
) -> Result<Vec<CustomerRentalGroup>> {
    let overdue = active_views(snapshot, now, grace)?
        .into_iter()
        .filter(|v| v.is_overdue)
        .collect();
    Ok(group_by_customer(snapshot, overdue))
}

#[derive(Debug, Clone, Serialize)]
pub struct RentalDetails {
    pub rental: Rental,
    pub customer: Option<Customer>,
    pub vehicle: Option<Vehicle>,
    /// Live figures, present while the rental is active
    pub live: Option<ActiveRentalView>,
}

pub fn rental_details(
    snapshot: &FleetSnapshot,
    rental_id: &RentalId,
    now: DateTime<Utc>,
    grace: i64,
) -> Result<RentalDetails> {
    let rental = snapshot
        .rentals
        .iter()
        .find(|r| r.id == *rental_id)
        .ok_or_else(|| RentalError::not_found("rental", rental_id))?;
    let vehicle = snapshot.vehicle(&rental.vehicle_id);

    let live = if rental.is_active() {
        Some(ActiveRentalView::build(rental, vehicle, now, grace)?)
    } else {
        None
    };

    Ok(RentalDetails {
        rental: rental.clone(),
        customer: snapshot.customer(&rental.customer_id).cloned(),
        vehicle: vehicle.cloned(),
        live,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleFilter {
    pub status: Option<VehicleStatus>,
    #[serde(rename = "type")]
    pub vehicle_type: Option<VehicleType>,
    /// Matches serial number or type label, case-insensitive
    pub q: Option<String>,
}

pub fn filter_vehicles<'a>(vehicles: &'a [Vehicle], filter: &VehicleFilter) -> Vec<&'a Vehicle> {
    let query = filter
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    vehicles
        .iter()
        .filter(|v| filter.status.map_or(true, |s| v.status == s))
        .filter(|v| filter.vehicle_type.map_or(true, |t| v.vehicle_type == t))
        .filter(|v| {
            query.as_deref().map_or(true, |q| {
                v.serial_number.to_lowercase().contains(q)
                    || v.vehicle_type.label().to_lowercase().contains(q)
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerHistory {
    pub customer: Customer,
    pub active: Vec<Rental>,
    pub completed: Vec<Rental>,
    pub total_spent: Money,
}

pub fn customer_history(snapshot: &FleetSnapshot, customer_id: &CustomerId) -> Result<CustomerHistory> {
    let customer = snapshot
        .customer(customer_id)
        .cloned()
        .ok_or_else(|| RentalError::not_found("customer", customer_id))?;

    let (active, completed): (Vec<Rental>, Vec<Rental>) = snapshot
        .rentals
        .iter()
        .filter(|r| r.customer_id == *customer_id)
        .cloned()
        .partition(|r| r.is_active());
    let total_spent = completed.iter().filter_map(|r| r.total_cost).sum();

    Ok(CustomerHistory {
        customer,
        active,
        completed,
        total_spent,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleDetails {
    pub vehicle: Vehicle,
    pub active_rental: Option<Rental>,
    pub rentals: Vec<Rental>,
    pub total_revenue: Money,
}

pub fn vehicle_details(snapshot: &FleetSnapshot, vehicle_id: &VehicleId) -> Result<VehicleDetails> {
    let vehicle = snapshot
        .vehicle(vehicle_id)
        .cloned()
        .ok_or_else(|| RentalError::not_found("vehicle", vehicle_id))?;
    let rentals: Vec<Rental> = snapshot
        .rentals
        .iter()
        .filter(|r| r.vehicle_id == *vehicle_id)
        .cloned()
        .collect();

    Ok(VehicleDetails {
        active_rental: rentals.iter().find(|r| r.is_active()).cloned(),
        total_revenue: rentals.iter().filter_map(|r| r.total_cost).sum(),
        vehicle,
        rentals,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeAvailability {
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub label: &'static str,
    pub total: usize,
    pub available: usize,
}

/// Counts for every vehicle type, including types with no vehicles
pub fn availability_by_type(vehicles: &[Vehicle]) -> Vec<TypeAvailability> {
    VehicleType::ALL
        .iter()
        .map(|t| {
            let of_type = vehicles.iter().filter(|v| v.vehicle_type == *t);
            TypeAvailability {
                vehicle_type: *t,
                label: t.label(),
                total: of_type.clone().count(),
                available: of_type.filter(|v| v.is_available()).count(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_vehicles: usize,
    pub available_vehicles: usize,
    pub rented_vehicles: usize,
    pub maintenance_vehicles: usize,
    pub disabled_vehicles: usize,
    pub total_customers: usize,
    pub active_rentals: usize,
    pub overdue_rentals: usize,
    pub completed_today: usize,
    pub revenue_today: Money,
    pub total_revenue: Money,
}

pub fn dashboard_stats(snapshot: &FleetSnapshot, now: DateTime<Utc>, grace: i64) -> Result<DashboardStats> {
    let count_status = |status: VehicleStatus| {
        snapshot
            .vehicles
            .iter()
            .filter(|v| v.status == status)
            .count()
    };
    let views = active_views(snapshot, now, grace)?;
    let today = now.date_naive();
    let completed_today: Vec<&Rental> = snapshot
        .rentals
        .iter()
        .filter(|r| r.end_date.is_some_and(|end| end.date_naive() == today))
        .collect();

    Ok(DashboardStats {
        total_vehicles: snapshot.vehicles.len(),
        available_vehicles: count_status(VehicleStatus::Available),
        rented_vehicles: count_status(VehicleStatus::Rented),
        maintenance_vehicles: count_status(VehicleStatus::Maintenance),
        disabled_vehicles: count_status(VehicleStatus::Disabled),
        total_customers: snapshot.customers.len(),
        active_rentals: views.len(),
        overdue_rentals: views.iter().filter(|v| v.is_overdue).count(),
        completed_today: completed_today.len(),
        revenue_today: completed_today.iter().filter_map(|r| r.total_cost).sum(),
        total_revenue: snapshot.rentals.iter().filter_map(|r| r.total_cost).sum(),
    })
}

/// Pick `count` vehicles per type in listing order. Available vehicles are
/// always preferred; with `force`, any remaining vehicle of the type is used.
pub fn select_vehicles_for_quick_checkout(
    vehicles: &[Vehicle],
    wanted: &[(VehicleType, usize)],
    force: bool,
) -> Result<Vec<VehicleId>> {
    if wanted.iter().all(|(_, count)| *count == 0) {
        return Err(RentalError::invalid_input("Select at least one vehicle"));
    }

    let mut picked: Vec<VehicleId> = Vec::new();
    let mut taken: HashSet<VehicleId> = HashSet::new();
    let mut requested: HashMap<VehicleType, usize> = HashMap::new();

    for (vehicle_type, count) in wanted.iter().filter(|(_, count)| *count > 0) {
        *requested.entry(*vehicle_type).or_default() += count;

        let of_type = || {
            vehicles
                .iter()
                .filter(|v| v.vehicle_type == *vehicle_type && !taken.contains(&v.id))
        };
        let mut candidates: Vec<&Vehicle> = of_type().filter(|v| v.is_available()).collect();
        if force {
            candidates.extend(of_type().filter(|v| !v.is_available()));
        }

        if candidates.len() < *count {
            let available = vehicles
                .iter()
                .filter(|v| v.vehicle_type == *vehicle_type && v.is_available())
                .count();
            return Err(RentalError::invalid_input(format!(
                "Requested {} x {} but only {} available",
                requested[vehicle_type],
                vehicle_type.label(),
                available
            )));
        }

        let chosen: Vec<VehicleId> = candidates.iter().take(*count).map(|v| v.id).collect();
        taken.extend(chosen.iter().copied());
        picked.extend(chosen);
    }

    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn ten_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn vehicle(serial: &str, vehicle_type: VehicleType, status: VehicleStatus) -> Vehicle {
        let mut v = Vehicle::new(
            serial.to_string(),
            vehicle_type,
            Money::from_decimal(dec!(10)),
            None,
        );
        v.status = status;
        v
    }

    fn snapshot() -> FleetSnapshot {
        let dana = Customer::new("Dana Levi".to_string(), "050-1111111".to_string());
        let yossi = Customer::new("Yossi Cohen".to_string(), "052-2222222".to_string());
        let bike = vehicle("B-1", VehicleType::StandardBike, VehicleStatus::Rented);
        let ebike = vehicle("E-1", VehicleType::ElectricBike, VehicleStatus::Rented);
        let scooter = vehicle("S-1", VehicleType::StandardScooter, VehicleStatus::Rented);
        let spare = vehicle("S-2", VehicleType::StandardScooter, VehicleStatus::Available);

        let late = Rental::new(dana.id, bike.id, ten_am(), 30).unwrap();
        let on_time = Rental::new(dana.id, ebike.id, ten_am(), 120).unwrap();
        let grace = Rental::new(yossi.id, scooter.id, ten_am(), 63).unwrap();
        let mut done = Rental::new(yossi.id, spare.id, ten_am() - Duration::hours(3), 60).unwrap();
        done.complete(ten_am() - Duration::hours(1), Money::from_decimal(dec!(20)))
            .unwrap();

        FleetSnapshot {
            vehicles: vec![bike, ebike, scooter, spare],
            customers: vec![dana, yossi],
            rentals: vec![late, on_time, grace, done],
        }
    }

    #[test]
    fn test_active_rentals_grouped_by_customer() {
        let snapshot = snapshot();
        let now = ten_am() + Duration::minutes(65);

        let groups = active_rentals_by_customer(&snapshot, now, 5, None).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].rentals.len(), 2);
        assert!(groups[0].has_overdue);
        // 65 minutes against 63 planned is inside the grace period
        assert!(!groups[1].has_overdue);
        assert_eq!(groups[0].current_total.as_decimal(), dec!(40));
        let due: Vec<_> = groups[0].rentals.iter().map(|r| r.due_at).collect();
        assert!(due.contains(&(ten_am() + Duration::minutes(30))));
        assert!(due.contains(&(ten_am() + Duration::minutes(120))));

        let searched = active_rentals_by_customer(&snapshot, now, 5, Some("yossi")).unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].customer.as_ref().unwrap().name, "Yossi Cohen");
    }

    #[test]
    fn test_overdue_view_applies_grace() {
        let snapshot = snapshot();
        let groups = overdue_rentals_by_customer(&snapshot, ten_am() + Duration::minutes(68), 5).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].rentals[0].overdue_minutes, 38);

        let groups = overdue_rentals_by_customer(&snapshot, ten_am() + Duration::minutes(69), 5).unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_future_start_reads_as_not_started() {
        let mut snapshot = snapshot();
        snapshot.rentals[0].start_date = ten_am() + Duration::hours(2);
        let groups = active_rentals_by_customer(&snapshot, ten_am(), 5, None).unwrap();
        assert_eq!(groups[0].rentals[0].elapsed_minutes, 0);
    }

    #[test]
    fn test_filter_vehicles() {
        let snapshot = snapshot();
        let filter = VehicleFilter {
            status: Some(VehicleStatus::Rented),
            ..Default::default()
        };
        assert_eq!(filter_vehicles(&snapshot.vehicles, &filter).len(), 3);

        let filter = VehicleFilter {
            q: Some("scoot".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_vehicles(&snapshot.vehicles, &filter).len(), 2);

        let filter = VehicleFilter {
            vehicle_type: Some(VehicleType::StandardScooter),
            q: Some("s-2".to_string()),
            ..Default::default()
        };
        let found = filter_vehicles(&snapshot.vehicles, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].serial_number, "S-2");
    }

    #[test]
    fn test_customer_history_and_stats() {
        let snapshot = snapshot();
        let yossi = snapshot.customers[1].id;

        let history = customer_history(&snapshot, &yossi).unwrap();
        assert_eq!(history.active.len(), 1);
        assert_eq!(history.completed.len(), 1);
        assert_eq!(history.total_spent.as_decimal(), dec!(20));
        assert!(customer_history(&snapshot, &CustomerId::new()).is_err());

        let stats = dashboard_stats(&snapshot, ten_am() + Duration::minutes(65), 5).unwrap();
        assert_eq!(stats.total_vehicles, 4);
        assert_eq!(stats.rented_vehicles, 3);
        assert_eq!(stats.available_vehicles, 1);
        assert_eq!(stats.active_rentals, 3);
        assert_eq!(stats.overdue_rentals, 1);
        assert_eq!(stats.completed_today, 1);
        assert_eq!(stats.revenue_today.as_decimal(), dec!(20));

        let availability = availability_by_type(&snapshot.vehicles);
        assert_eq!(availability.len(), 4);
        let scooters = &availability[2];
        assert_eq!((scooters.total, scooters.available), (2, 1));
        assert_eq!(availability[3].total, 0);
    }

    #[test]
    fn test_quick_checkout_selection() {
        let vehicles = vec![
            vehicle("B-1", VehicleType::StandardBike, VehicleStatus::Maintenance),
            vehicle("B-2", VehicleType::StandardBike, VehicleStatus::Available),
            vehicle("B-3", VehicleType::StandardBike, VehicleStatus::Available),
            vehicle("E-1", VehicleType::ElectricBike, VehicleStatus::Rented),
        ];

        let picked = select_vehicles_for_quick_checkout(
            &vehicles,
            &[(VehicleType::StandardBike, 2)],
            false,
        )
        .unwrap();
        assert_eq!(picked, vec![vehicles[1].id, vehicles[2].id]);

        let result = select_vehicles_for_quick_checkout(
            &vehicles,
            &[(VehicleType::ElectricBike, 1)],
            false,
        );
        assert!(matches!(result, Err(RentalError::InvalidInput { .. })));

        let forced = select_vehicles_for_quick_checkout(
            &vehicles,
            &[(VehicleType::StandardBike, 3), (VehicleType::ElectricBike, 1)],
            true,
        )
        .unwrap();
        assert_eq!(
            forced,
            vec![vehicles[1].id, vehicles[2].id, vehicles[0].id, vehicles[3].id]
        );

        let nothing = select_vehicles_for_quick_checkout(&vehicles, &[(VehicleType::StandardBike, 0)], false);
        assert!(nothing.is_err());
    }
}
