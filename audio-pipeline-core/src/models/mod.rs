pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod state;
pub mod telemetry;
pub mod validation;
