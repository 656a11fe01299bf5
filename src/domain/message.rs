use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Maximum message length, counted in characters after trimming.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Kind of account that authored a message or owns a conversation seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    #[default]
    User,
    Admin,
}

impl SenderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SenderKind::User => "user",
            SenderKind::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_kind: SenderKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The account the operator is signed in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub kind: SenderKind,
    pub name: String,
}

impl Message {
    /// Whether the message was authored by `user`.
    pub fn is_own(&self, user: &CurrentUser) -> bool {
        self.sender_id == user.id && self.sender_kind == user.kind
    }

    /// Local wall-clock label, e.g. `09:41`.
    pub fn time_label(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }
}

/// A message prepared for display next to the operator's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedMessage {
    pub message: Message,
    pub time: String,
    pub is_own: bool,
}

impl FormattedMessage {
    pub fn new(message: &Message, user: &CurrentUser) -> Self {
        Self {
            message: message.clone(),
            time: message.time_label(),
            is_own: message.is_own(user),
        }
    }
}
