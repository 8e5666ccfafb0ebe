//! REST API handlers

pub mod batch;
pub mod credentials;
pub mod gateway;
pub mod health;
pub mod inventory;
pub mod jumphosts;
