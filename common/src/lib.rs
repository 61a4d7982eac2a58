//! Shared modules for the reporting workspace.
//!
//! Configuration, the report error taxonomy, data models, the API response
//! wrapper and HTTP middleware used by both the `reporter` library and the
//! `report-service` binary.

pub mod config;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
