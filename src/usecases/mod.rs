//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod coordinator;
pub mod error;
pub mod list_conversations;
pub mod load_messages;
pub mod notifier;
pub mod send_message;
pub mod start_chat;
pub mod subscription;
