//! WhatsApp Business Cloud API (Meta Graph API) integration.

pub mod client;

pub use client::{GraphClient, SendReceipt};
