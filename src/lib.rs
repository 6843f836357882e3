//! Gateway for a DSMR P1 smart meter.
//!
//! Reads the telegram stream from a serial-over-TCP bridge, relays each
//! telegram with a recomputed checksum to a single downstream consumer,
//! keeps a running daily net energy total and maps the momentary net power
//! onto a gauge served over HTTP.

pub mod api;
pub mod config;
pub mod gauge;
pub mod metering_dsmr;
pub mod models;
pub mod relay;
pub mod source;
pub mod usage;

// Re-export common types for easier access
pub use api::ApiManager;
pub use config::CONFIG;
pub use metering_dsmr::{DsmrManager, MeterReading};
pub use models::{get_meter_status, MeterStatus};
pub use relay::RelayManager;
pub use source::SourceManager;
pub use usage::DayUsage;
