pub mod connection;
pub mod customers;
pub mod memory;
pub mod rentals;
pub mod vehicles;

pub use connection::DatabaseConnection;

pub use customers::{CustomerRepository, SqlCustomerRepository};

pub use memory::MemoryStore;

pub use rentals::{RentalRepository, SqlRentalRepository};

pub use vehicles::{SqlVehicleRepository, VehicleRepository};

use std::sync::Arc;

/// The three entity repositories handed to the services
#[derive(Clone)]
pub struct Repositories {
    pub vehicles: Arc<dyn VehicleRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub rentals: Arc<dyn RentalRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            vehicles: store.clone(),
            customers: store.clone(),
            rentals: store,
        }
    }

    pub fn postgres(connection: Arc<DatabaseConnection>) -> Self {
        Self {
            vehicles: Arc::new(SqlVehicleRepository::new(connection.clone())),
            customers: Arc::new(SqlCustomerRepository::new(connection.clone())),
            rentals: Arc::new(SqlRentalRepository::new(connection)),
        }
    }
}
