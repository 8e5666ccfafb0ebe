//! HTTP API
//!
//! REST surface over the inventory, gateway and batch executor.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
