//! JSON shapes of the chat HTTP API and their mapping into domain types.
//!
//! The server has shipped several payload generations. Messages may carry
//! `sender_id`/`sender_type` or only a legacy `user_id`, their text in
//! `content` or `message`, and may omit the conversation id altogether.
//! Conversations may use channel types (`direct`, `public`) instead of
//! `private`/`group`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::{
    domain::{
        conversation::{Conversation, ConversationKind},
        message::{Message, SenderKind},
        page::PageCursor,
    },
    usecases::contracts::{GatewayError, Participant},
};

/// `{success, data, message}` wrapper around every response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    pub fn into_data(self, status: u16) -> Result<T, GatewayError> {
        if !self.success {
            return Err(GatewayError::Server {
                status,
                message: self
                    .message
                    .unwrap_or_else(|| "request was not successful".to_owned()),
            });
        }

        self.data
            .ok_or_else(|| GatewayError::InvalidData("response has no data".to_owned()))
    }
}

/// Error bodies only need the human-readable message.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationDto {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl From<PaginationDto> for PageCursor {
    fn from(dto: PaginationDto) -> Self {
        PageCursor {
            current_page: dto.current_page.max(1),
            per_page: dto.per_page,
            total: dto.total,
            last_page: dto.last_page.max(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDto {
    pub id: i64,
    #[serde(default, alias = "channel_id")]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub sender_type: Option<SenderKind>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl MessageDto {
    /// Maps the payload, using `conversation_id` when it names no chat.
    pub fn into_message(self, conversation_id: Option<i64>) -> Result<Message, GatewayError> {
        let conversation_id = self.chat_id.or(conversation_id).ok_or_else(|| {
            GatewayError::InvalidData(format!("message {} has no conversation id", self.id))
        })?;
        let sender_id = self.sender_id.or(self.user_id).ok_or_else(|| {
            GatewayError::InvalidData(format!("message {} has no sender", self.id))
        })?;

        Ok(Message {
            id: self.id,
            conversation_id,
            sender_id,
            sender_kind: self.sender_type.unwrap_or_default(),
            content: self.content.or(self.message).unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationTypeDto {
    #[default]
    Private,
    Group,
    Direct,
    Public,
}

impl From<ConversationTypeDto> for ConversationKind {
    fn from(dto: ConversationTypeDto) -> Self {
        match dto {
            ConversationTypeDto::Private | ConversationTypeDto::Direct => ConversationKind::Private,
            ConversationTypeDto::Group | ConversationTypeDto::Public => ConversationKind::Group,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDto {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: ConversationTypeDto,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_message: Option<MessageDto>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ConversationDto {
    pub fn into_conversation(self) -> Result<Conversation, GatewayError> {
        let last_message = self
            .last_message
            .map(|dto| dto.into_message(Some(self.id)))
            .transpose()?;

        Ok(Conversation {
            id: self.id,
            kind: self.kind.into(),
            display_name: self.name,
            last_message,
            unread_count: self.unread_count,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ConversationsData {
    pub chats: Vec<ConversationDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Deserialize)]
pub struct MessagesData {
    pub messages: Vec<MessageDto>,
    pub pagination: PaginationDto,
}

/// History looked up by peer. Messages may omit their conversation id, in
/// which case the top-level `chat_id` fills it.
#[derive(Debug, Deserialize)]
pub struct UserMessagesData {
    pub messages: Vec<MessageDto>,
    pub pagination: PaginationDto,
    #[serde(default, alias = "channel_id")]
    pub chat_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserHistoryQuery {
    pub other_user_type: SenderKind,
    pub other_user_id: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct MessageData {
    pub message: MessageDto,
}

#[derive(Debug, Deserialize)]
pub struct ConversationData {
    pub chat: ConversationDto,
}

#[derive(Debug, Deserialize)]
pub struct ConversationMessageData {
    pub chat: ConversationDto,
    pub message: MessageDto,
}

#[derive(Debug, Serialize)]
pub struct SendBody<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SendToUserBody<'a> {
    pub content: &'a str,
    pub receiver_type: SenderKind,
    pub receiver_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatePrivateBody {
    pub other_user_id: i64,
    pub other_user_type: SenderKind,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupBody<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub participants: Vec<ParticipantBody>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantBody {
    pub user_id: i64,
    pub user_type: SenderKind,
}

impl From<&Participant> for ParticipantBody {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id,
            user_type: participant.user_kind,
        }
    }
}

/// Accepts RFC 3339 and the bare `YYYY-MM-DD HH:MM:SS` form (read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| D::Error::custom(format!("unsupported timestamp `{raw}`")))
}
