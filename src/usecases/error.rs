use thiserror::Error;

use super::contracts::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message is too long ({len} characters, maximum {max})")]
    MessageTooLong { len: usize, max: usize },
    #[error("group name cannot be empty")]
    EmptyGroupName,
}

/// Errors surfaced by the synchronization use cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no conversation is selected")]
    NoActiveConversation,
    #[error("another load of the same collection is in progress")]
    Busy,
    #[error("network error: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("invalid server data: {0}")]
    InvalidData(String),
}

impl SyncError {
    /// Whether the error belongs in the user-visible error field.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Busy | Self::NoActiveConversation)
    }
}

impl From<GatewayError> for SyncError {
    fn from(error: GatewayError) -> Self {
        map_source_error(error)
    }
}

fn map_source_error(error: GatewayError) -> SyncError {
    match error {
        GatewayError::Network(details) => SyncError::Network(details),
        GatewayError::Server { status, message } => SyncError::Server { status, message },
        GatewayError::InvalidData(details) => SyncError::InvalidData(details),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_gateway_errors_one_to_one() {
        assert_eq!(
            SyncError::from(GatewayError::Network("timeout".to_owned())),
            SyncError::Network("timeout".to_owned())
        );
        assert_eq!(
            SyncError::from(GatewayError::Server {
                status: 500,
                message: "boom".to_owned()
            }),
            SyncError::Server {
                status: 500,
                message: "boom".to_owned()
            }
        );
        assert_eq!(
            SyncError::from(GatewayError::InvalidData("chats".to_owned())),
            SyncError::InvalidData("chats".to_owned())
        );
    }

    #[test]
    fn guard_rejections_are_not_user_visible() {
        assert!(!SyncError::Busy.is_user_visible());
        assert!(!SyncError::NoActiveConversation.is_user_visible());
        assert!(SyncError::Validation(ValidationError::EmptyMessage).is_user_visible());
    }

    #[test]
    fn validation_messages_name_the_limit() {
        let error = SyncError::from(ValidationError::MessageTooLong {
            len: 1001,
            max: 1000,
        });

        assert_eq!(
            error.to_string(),
            "message is too long (1001 characters, maximum 1000)"
        );
    }
}
