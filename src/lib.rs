pub mod config;
pub mod dse;
pub mod error;
pub mod providers;
pub mod registry;
pub mod runner;
pub mod sidecar_protocol;
pub mod telemetry;
