//! Infrastructure layer: config loading, logging setup, and secret hygiene.

pub mod config;
pub mod error;
pub mod logging;
pub mod secrets;
