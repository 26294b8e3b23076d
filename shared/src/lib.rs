pub mod telemetry;
pub mod utils;

pub use telemetry::TelemetryConfig;
