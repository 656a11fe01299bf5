//! Use cases for sending messages.
//!
//! Content is validated before any network call: it must not be empty after
//! trimming whitespace and must fit in [`MAX_MESSAGE_CHARS`] characters. The
//! trimmed text is what reaches the gateway.

use crate::domain::{
    conversation::Conversation,
    message::{Message, SenderKind, MAX_MESSAGE_CHARS},
};

use super::{
    contracts::RemoteGateway,
    error::{SyncError, ValidationError},
};

/// Command to send a message to a known conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub conversation_id: i64,
    pub text: String,
}

/// Command to send a message straight to a user, creating the private
/// conversation on the server when needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendToUserCommand {
    pub text: String,
    pub user_id: i64,
    pub user_kind: SenderKind,
}

/// Returns the trimmed content, or why it cannot be sent.
pub fn validate_content(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }

    let len = trimmed.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_CHARS,
        });
    }

    Ok(trimmed)
}

/// Sends a message and returns the server-acknowledged copy.
///
/// # Errors
/// Returns `SyncError::Validation` without touching the gateway when the
/// content is rejected. Gateway failures are mapped to their `SyncError`
/// counterparts.
pub async fn send_message<G>(gateway: &G, command: SendMessageCommand) -> Result<Message, SyncError>
where
    G: RemoteGateway + ?Sized,
{
    let text = validate_content(&command.text)?;

    let message = gateway.send_message(command.conversation_id, text).await?;
    Ok(message)
}

/// Sends a message to a user and returns the conversation it landed in.
pub async fn send_to_user<G>(
    gateway: &G,
    command: SendToUserCommand,
) -> Result<(Conversation, Message), SyncError>
where
    G: RemoteGateway + ?Sized,
{
    let text = validate_content(&command.text)?;

    let result = gateway
        .send_to_user(text, command.user_id, command.user_kind)
        .await?;
    Ok(result)
}
