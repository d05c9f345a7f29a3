pub mod billing;
pub mod customers;
pub mod lifecycle;
pub mod rentals;
pub mod types;
pub mod vehicles;
pub mod views;

pub use customers::{Customer, CustomerAttachment, CustomerManager, CustomerUpdate, NewCustomer};
pub use lifecycle::{
    ChargeLine, CheckoutRequest, CompletionReceipt, LifecycleController, LifecycleOperations,
};
pub use rentals::Rental;
pub use types::{CustomerId, Money, RentalId, RentalStatus, VehicleId, VehicleStatus, VehicleType};
pub use vehicles::{NewVehicle, Vehicle, VehicleManager, VehicleUpdate};
pub use views::FleetSnapshot;
