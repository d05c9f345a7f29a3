use crate::domain::billing;
use crate::domain::types::{CustomerId, Money, RentalId, RentalStatus, VehicleId};
use crate::error::{RentalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest rental that can be planned or reached by extension: one leap year.
pub const MAX_PLANNED_DURATION_MINUTES: i64 = 366 * 24 * 60;

/// Reject durations outside `0..=MAX_PLANNED_DURATION_MINUTES`.
pub fn validate_planned_duration(minutes: i64) -> Result<()> {
    if minutes < 0 {
        return Err(RentalError::invalid_input(format!(
            "Planned duration cannot be negative: {}",
            minutes
        )));
    }
    if minutes > MAX_PLANNED_DURATION_MINUTES {
        return Err(RentalError::invalid_input(format!(
            "Planned duration of {} minutes exceeds the maximum of {}",
            minutes, MAX_PLANNED_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// One checkout of one vehicle to one customer.
///
/// `end_date`, `actual_duration` and `total_cost` are `None` while the
/// rental is active and all set once it is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub start_date: DateTime<Utc>,
    /// Minutes
    pub planned_duration: i64,
    pub status: RentalStatus,
    pub end_date: Option<DateTime<Utc>>,
    /// Whole minutes between start and end, floored
    pub actual_duration: Option<i64>,
    pub total_cost: Option<Money>,
}

impl Rental {
    pub fn new(
        customer_id: CustomerId,
        vehicle_id: VehicleId,
        start_date: DateTime<Utc>,
        planned_duration: i64,
    ) -> Result<Self> {
        validate_planned_duration(planned_duration)?;

        Ok(Self {
            id: RentalId::new(),
            customer_id,
            vehicle_id,
            start_date,
            planned_duration,
            status: RentalStatus::Active,
            end_date: None,
            actual_duration: None,
            total_cost: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Planned return time
    pub fn due_at(&self) -> Result<DateTime<Utc>> {
        chrono::Duration::try_minutes(self.planned_duration)
            .and_then(|planned| self.start_date.checked_add_signed(planned))
            .ok_or_else(|| {
                RentalError::invalid_input(format!(
                    "Planned duration of {} minutes is out of range",
                    self.planned_duration
                ))
            })
    }

    pub fn extend(&mut self, additional_minutes: i64) -> Result<()> {
        if !self.is_active() {
            return Err(RentalError::invalid_state(
                "rental",
                self.id,
                "only active rentals can be extended",
            ));
        }
        if additional_minutes <= 0 {
            return Err(RentalError::invalid_input(format!(
                "Extension must be a positive number of minutes, got {}",
                additional_minutes
            )));
        }

        let extended = self
            .planned_duration
            .checked_add(additional_minutes)
            .ok_or_else(|| {
                RentalError::invalid_input(format!(
                    "Extension of {} minutes is out of range",
                    additional_minutes
                ))
            })?;
        validate_planned_duration(extended)?;

        self.planned_duration = extended;
        Ok(())
    }

    /// Close the rental at `end_date` with the given charge.
    pub fn complete(&mut self, end_date: DateTime<Utc>, total_cost: Money) -> Result<()> {
        if !self.status.can_transition_to(RentalStatus::Completed) {
            return Err(RentalError::invalid_state(
                "rental",
                self.id,
                format!("rental is already {}", self.status),
            ));
        }
        let actual_duration = billing::elapsed_minutes(self, end_date)?;

        self.status = RentalStatus::Completed;
        self.end_date = Some(end_date);
        self.actual_duration = Some(actual_duration);
        self.total_cost = Some(total_cost);
        Ok(())
    }
}
