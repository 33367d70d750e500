pub mod chain;
pub mod telemetry_bridge;
