//! Shared building blocks for RentClick binaries

pub mod clock;
pub mod logging;

pub use clock::{Clock, FixedClock, SystemClock};
