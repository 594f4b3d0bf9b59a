//! Domain model modules.

pub mod message;
pub mod template;
