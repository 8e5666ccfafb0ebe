//! NetAutomate - network automation backend
//!
//! Device, credential and jump-host inventory, a chained SSH gateway, and a
//! batch executor that fans one CLI command out to many devices.

pub mod api;
pub mod batch;
pub mod config;
pub mod device;
pub mod gateway;
pub mod inventory;
pub mod ssh;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber (`RUST_LOG`, default `info`)
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
