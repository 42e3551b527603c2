pub mod configuration;
pub mod errors;
pub mod ga4;
pub mod routes;
pub mod startup;
pub mod telemetry;
