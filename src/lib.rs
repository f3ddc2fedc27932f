//! Air-quality telemetry processing and time-series store.
//!
//! Raw sensor readings are normalized, scored into a 0–100 air-quality
//! index, kept in a bounded per-device history, turned into throttled
//! alerts, and fanned out to live observers. `routes` exposes all of it over
//! HTTP and WebSocket; `repository` optionally mirrors it into Postgres.
//!
//! Modules talk to each other through the re-exports below rather than
//! reaching into siblings, so `routes/*.rs` only ever import from the crate
//! root.

pub mod config;
pub mod error;
pub mod fanout;
pub mod models;
pub mod normalizer;
pub mod registry;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod scorer;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod throttler;

pub use config::Config;
pub use error::{ApiError, PersistenceError};
pub use fanout::{ChannelConnection, ConnectionId, FanoutRouter, ObserverConnection};
pub use models::{
    AlertItem, Device, DeviceStatus, HistoryResponse, LatestReading, Level, ProcessedReading,
    Reading, SettingsPatch, ThresholdSettings, UnknownLevel,
};
pub use normalizer::{normalize_timestamp, NormalizerOptions, Rejection};
pub use repository::{PgRepository, TelemetryRepository};
pub use telemetry::{Ingested, Telemetry, TelemetryConfig};
