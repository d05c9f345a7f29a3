use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Vehicle identifier
    VehicleId
);
uuid_id!(
    /// Customer identifier
    CustomerId
);
uuid_id!(
    /// Rental identifier
    RentalId
);

/// Currency amount, kept at two decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn from_decimal(amount: Decimal) -> Self {
        Self(amount.round_dp(2))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn add(&self, other: Money) -> Self {
        Self::from_decimal(self.0 + other.0)
    }

    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Self::from_decimal)
    }

    pub fn checked_multiply(&self, factor: Decimal) -> Option<Self> {
        self.0.checked_mul(factor).map(Self::from_decimal)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::from_decimal(amount)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc.add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    #[serde(alias = "bike")]
    StandardBike,
    ElectricBike,
    #[serde(alias = "scooter")]
    StandardScooter,
    ElectricScooter,
}

impl VehicleType {
    pub const ALL: [VehicleType; 4] = [
        VehicleType::StandardBike,
        VehicleType::ElectricBike,
        VehicleType::StandardScooter,
        VehicleType::ElectricScooter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::StandardBike => "standard_bike",
            VehicleType::ElectricBike => "electric_bike",
            VehicleType::StandardScooter => "standard_scooter",
            VehicleType::ElectricScooter => "electric_scooter",
        }
    }

    /// Display label used in search and notifications
    pub fn label(&self) -> &'static str {
        match self {
            VehicleType::StandardBike => "Bike",
            VehicleType::ElectricBike => "Electric bike",
            VehicleType::StandardScooter => "Scooter",
            VehicleType::ElectricScooter => "Electric scooter",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard_bike" | "bike" => Ok(VehicleType::StandardBike),
            "electric_bike" => Ok(VehicleType::ElectricBike),
            "standard_scooter" | "scooter" => Ok(VehicleType::StandardScooter),
            "electric_scooter" => Ok(VehicleType::ElectricScooter),
            other => Err(format!("unknown vehicle type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Rented,
    Maintenance,
    Disabled,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::Rented => "rented",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::Disabled => "disabled",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, VehicleStatus::Available)
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(VehicleStatus::Available),
            "rented" => Ok(VehicleStatus::Rented),
            "maintenance" => Ok(VehicleStatus::Maintenance),
            "disabled" => Ok(VehicleStatus::Disabled),
            other => Err(format!("unknown vehicle status '{}'", other)),
        }
    }
}

/// Rental lifecycle states. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    Completed,
}

impl RentalStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RentalStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RentalStatus::Completed)
    }

    pub fn can_transition_to(&self, next: RentalStatus) -> bool {
        matches!((self, next), (RentalStatus::Active, RentalStatus::Completed))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RentalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RentalStatus::Active),
            "completed" => Ok(RentalStatus::Completed),
            other => Err(format!("unknown rental status '{}'", other)),
        }
    }
}
