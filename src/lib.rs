#![forbid(unsafe_code)]

//! `wa-relay` — WhatsApp Business Cloud API relay.
//!
//! Ingests inbound webhook deliveries, tracks the 24-hour customer-service
//! messaging window per contact, and dispatches outbound template and
//! free-text messages with a layered template fallback chain.

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod graph;
pub mod http;
pub mod inbox;
pub mod models;
pub mod persistence;
pub mod window;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
