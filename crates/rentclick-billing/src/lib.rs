pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod files;
pub mod notifications;
pub mod server;
pub mod storage;

pub use config::RentalConfig;
pub use error::{RentalError, Result};
