//! API route handlers

pub mod customers;
pub mod dashboard;
pub mod files;
pub mod health;
pub mod rentals;
pub mod vehicles;
