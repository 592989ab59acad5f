//! Polling aggregator for NovaStar LED screens managed through the
//! NanoSuite (ISAAC) REST API.
//!
//! The [`aggregator::Aggregator`] facade refreshes system facts and the
//! screen listing on demand, while a background [`collector::Collector`]
//! keeps per-screen sender and receiver documents fresh for as long as
//! consumers keep asking for device snapshots. [`normalizer`] turns the
//! cached documents into flat, human-readable property maps.

pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod probe;

pub use aggregator::{Aggregator, WorkerMode};
pub use config::Config;
pub use error::{AggregatorError, ConfigError, FetchError};
pub use model::{AggregatedDevice, PropertyMap};
