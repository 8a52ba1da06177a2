pub mod applications;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod verification;
