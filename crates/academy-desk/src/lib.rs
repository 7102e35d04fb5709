pub mod config;
pub mod error;
pub mod intake;
pub mod notifications;
pub mod telemetry;
