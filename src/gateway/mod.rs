//! Adapters between the synchronization core and chat backends.

pub mod http;
pub mod memory;
pub mod push;
pub mod wire;
