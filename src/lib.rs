pub mod civic;
pub mod config;
pub mod errors;
pub mod telemetry;
