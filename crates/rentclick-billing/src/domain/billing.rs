//! Time and cost arithmetic over rentals. Everything here takes `now`
//! explicitly and performs no I/O.

use crate::domain::rentals::Rental;
use crate::domain::types::Money;
use crate::domain::vehicles::Vehicle;
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

const MINUTES_PER_HOUR: i64 = 60;

/// Whole minutes since the rental started, floored.
pub fn elapsed_minutes(rental: &Rental, now: DateTime<Utc>) -> Result<i64> {
    if now < rental.start_date {
        return Err(RentalError::invalid_input(format!(
            "Time {} is before rental start {}",
            now, rental.start_date
        )));
    }
    Ok((now - rental.start_date).num_minutes())
}

pub fn is_overdue(rental: &Rental, now: DateTime<Utc>) -> Result<bool> {
    is_overdue_with_grace(rental, now, 0)
}

/// Overdue only once the grace period past the planned duration has run out.
pub fn is_overdue_with_grace(rental: &Rental, now: DateTime<Utc>, grace_minutes: i64) -> Result<bool> {
    let threshold = rental
        .planned_duration
        .checked_add(grace_minutes.max(0))
        .ok_or_else(|| {
            RentalError::invalid_input(format!(
                "Grace period of {} minutes is out of range",
                grace_minutes
            ))
        })?;
    Ok(elapsed_minutes(rental, now)? > threshold)
}

pub fn overdue_minutes(rental: &Rental, now: DateTime<Utc>) -> Result<i64> {
    Ok(elapsed_minutes(rental, now)?
        .saturating_sub(rental.planned_duration)
        .max(0))
}

/// Negative once the rental runs over.
pub fn remaining_minutes(rental: &Rental, now: DateTime<Utc>) -> Result<i64> {
    Ok(rental
        .planned_duration
        .saturating_sub(elapsed_minutes(rental, now)?))
}

/// Any started hour is charged in full, with a one hour minimum.
pub fn billable_hours(minutes: i64) -> Result<i64> {
    if minutes < 0 {
        return Err(RentalError::invalid_input(format!(
            "Duration cannot be negative: {} minutes",
            minutes
        )));
    }
    let hours = minutes
        .checked_add(MINUTES_PER_HOUR - 1)
        .map(|rounded| rounded / MINUTES_PER_HOUR)
        .ok_or_else(|| {
            RentalError::invalid_input(format!("Duration out of range: {} minutes", minutes))
        })?;
    Ok(hours.max(1))
}

pub fn cost(vehicle: &Vehicle, minutes: i64) -> Result<Money> {
    let hours = billable_hours(minutes)?;
    vehicle
        .hourly_rate
        .checked_multiply(Decimal::from(hours))
        .ok_or_else(|| {
            RentalError::invalid_input(format!(
                "Charge for {} hours of vehicle {} is out of range",
                hours, vehicle.serial_number
            ))
        })
}

/// Each vehicle is charged independently over the same duration.
pub fn transaction_cost<'a, I>(vehicles: I, minutes: i64) -> Result<Money>
where
    I: IntoIterator<Item = &'a Vehicle>,
{
    vehicles.into_iter().try_fold(Money::zero(), |total, vehicle| {
        total
            .checked_add(cost(vehicle, minutes)?)
            .ok_or_else(|| RentalError::invalid_input("Transaction total is out of range"))
    })
}

/// Quote shown at checkout for the planned duration.
pub fn estimate_cost<'a, I>(vehicles: I, planned_minutes: i64) -> Result<Money>
where
    I: IntoIterator<Item = &'a Vehicle>,
{
    transaction_cost(vehicles, planned_minutes)
}

/// `H:MM`, with a leading `-` for negative durations.
pub fn format_duration(minutes: i64) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let abs = minutes.unsigned_abs();
    format!("{}{}:{:02}", sign, abs / 60, abs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CustomerId, VehicleId, VehicleType};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn rental(planned: i64) -> Rental {
        Rental::new(CustomerId::new(), VehicleId::new(), start(), planned).unwrap()
    }

    fn vehicle(rate: Decimal) -> Vehicle {
        Vehicle::new(
            "T-1".to_string(),
            VehicleType::StandardBike,
            Money::from_decimal(rate),
            None,
        )
    }

    #[test]
    fn test_elapsed_minutes_floors() {
        let r = rental(60);
        assert_eq!(elapsed_minutes(&r, start()).unwrap(), 0);
        assert_eq!(
            elapsed_minutes(&r, start() + Duration::seconds(59)).unwrap(),
            0
        );
        assert_eq!(
            elapsed_minutes(&r, start() + Duration::seconds(65 * 60 + 59)).unwrap(),
            65
        );
        assert!(matches!(
            elapsed_minutes(&r, start() - Duration::seconds(1)),
            Err(RentalError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_billable_hours() {
        assert_eq!(billable_hours(0).unwrap(), 1);
        assert_eq!(billable_hours(1).unwrap(), 1);
        assert_eq!(billable_hours(60).unwrap(), 1);
        assert_eq!(billable_hours(61).unwrap(), 2);
        assert_eq!(billable_hours(120).unwrap(), 2);
        assert!(billable_hours(-1).is_err());
    }

    #[test]
    fn test_extreme_durations_are_rejected() {
        assert!(matches!(
            billable_hours(i64::MAX),
            Err(RentalError::InvalidInput { .. })
        ));
        assert!(matches!(
            cost(&vehicle(dec!(10)), i64::MAX),
            Err(RentalError::InvalidInput { .. })
        ));

        let r = rental(60);
        assert!(matches!(
            is_overdue_with_grace(&r, start(), i64::MAX),
            Err(RentalError::InvalidInput { .. })
        ));
        assert!(!is_overdue_with_grace(&r, start(), i64::MAX - 60).unwrap());
    }

    #[test]
    fn test_huge_rate_overflow_is_rejected() {
        let fleet = [vehicle(Decimal::MAX), vehicle(Decimal::MAX)];
        assert!(matches!(
            cost(&fleet[0], 120),
            Err(RentalError::InvalidInput { .. })
        ));
        assert!(matches!(
            transaction_cost(&fleet, 60),
            Err(RentalError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_cost_rounds_up_started_hours() {
        let v = vehicle(dec!(10));
        assert_eq!(cost(&v, 75).unwrap().as_decimal(), dec!(20));
        assert_eq!(cost(&v, 0).unwrap().as_decimal(), dec!(10));

        let fleet = [vehicle(dec!(10)), vehicle(dec!(12.5))];
        assert_eq!(transaction_cost(&fleet, 90).unwrap().as_decimal(), dec!(45));
        assert_eq!(estimate_cost(&fleet, 60).unwrap().as_decimal(), dec!(22.5));
    }

    #[test]
    fn test_overdue_detection() {
        let r = rental(60);
        let now = start() + Duration::minutes(65);

        assert_eq!(elapsed_minutes(&r, now).unwrap(), 65);
        assert_eq!(overdue_minutes(&r, now).unwrap(), 5);
        assert_eq!(remaining_minutes(&r, now).unwrap(), -5);
        assert!(is_overdue(&r, now).unwrap());
        assert!(!is_overdue_with_grace(&r, now, 5).unwrap());
        assert!(is_overdue_with_grace(&r, now + Duration::minutes(1), 5).unwrap());

        let on_time = start() + Duration::minutes(60);
        assert!(!is_overdue(&r, on_time).unwrap());
        assert_eq!(overdue_minutes(&r, on_time).unwrap(), 0);
    }

    #[test]
    fn test_zero_planned_duration_is_overdue_after_first_minute() {
        let r = rental(0);
        assert!(!is_overdue(&r, start()).unwrap());
        assert!(is_overdue(&r, start() + Duration::minutes(1)).unwrap());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(5), "0:05");
        assert_eq!(format_duration(70), "1:10");
        assert_eq!(format_duration(600), "10:00");
        assert_eq!(format_duration(-5), "-0:05");
        assert_eq!(format_duration(-75), "-1:15");
    }

    proptest! {
        #[test]
        fn prop_billable_hours_covers_duration(minutes in 0i64..1_000_000) {
            let hours = billable_hours(minutes).unwrap();
            prop_assert!(hours >= 1);
            prop_assert!(hours * 60 >= minutes);
            prop_assert!(hours == 1 || (hours - 1) * 60 < minutes);
        }

        #[test]
        fn prop_overdue_never_negative(planned in 0i64..10_000, elapsed in 0i64..20_000) {
            let r = rental(planned);
            let now = start() + Duration::minutes(elapsed);
            let overdue = overdue_minutes(&r, now).unwrap();
            prop_assert!(overdue >= 0);
            prop_assert_eq!(overdue > 0, is_overdue(&r, now).unwrap());
            prop_assert_eq!(remaining_minutes(&r, now).unwrap() + elapsed, planned);
        }
    }
}
