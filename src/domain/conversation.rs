use serde::{Deserialize, Serialize};

use super::message::Message;

/// Type of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// 1-to-1 conversation with another account.
    #[default]
    Private,
    /// Multi-participant conversation.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub kind: ConversationKind,
    /// Server-provided name. Absent for most private conversations.
    pub display_name: Option<String>,
    pub last_message: Option<Message>,
    pub unread_count: u32,
}

impl Conversation {
    pub fn new(id: i64, kind: ConversationKind) -> Self {
        Self {
            id,
            kind,
            display_name: None,
            last_message: None,
            unread_count: 0,
        }
    }

    /// Title shown in lists and headers.
    ///
    /// Private conversations are usually named `"Alice - Bob"` by the server;
    /// the operator's own name is stripped so only the counterpart remains.
    pub fn title(&self, current_user_name: Option<&str>) -> String {
        let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) else {
            return match self.kind {
                ConversationKind::Private => "Private chat".to_owned(),
                ConversationKind::Group => "Group chat".to_owned(),
            };
        };

        match (self.kind, current_user_name) {
            (ConversationKind::Private, Some(own)) if !own.is_empty() && name.contains(own) => name
                .replace(&format!("{own} - "), "")
                .replace(&format!(" - {own}"), ""),
            _ => name.to_owned(),
        }
    }

    /// Advances `last_message` if `message` is at least as recent.
    ///
    /// Returns `true` when the stored message changed.
    pub fn advance_last_message(&mut self, message: &Message) -> bool {
        let newer = match &self.last_message {
            None => true,
            Some(current) if current.id == message.id => current != message,
            Some(current) => message.created_at >= current.created_at,
        };

        if newer {
            self.last_message = Some(message.clone());
        }
        newer
    }
}
