//! Domain layer: core entities and the two synchronized stores.

pub mod conversation;
pub mod conversation_store;
pub mod events;
pub mod message;
pub mod message_store;
pub mod page;
