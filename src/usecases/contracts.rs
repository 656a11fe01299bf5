//! Collaborator interfaces consumed by the synchronization core.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    conversation::Conversation,
    message::{CurrentUser, Message, SenderKind},
    page::PageCursor,
};

use super::subscription::LiveEventSink;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Transport failure: DNS, connect, timeout, broken body.
    #[error("network failure: {0}")]
    Network(String),
    /// The server answered with a non-success status or envelope.
    #[error("server rejected request ({status}): {message}")]
    Server { status: u16, message: String },
    /// The response could not be decoded into domain types.
    #[error("unexpected response payload: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    pub cursor: PageCursor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub cursor: PageCursor,
}

/// Seat requested when creating a group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub user_id: i64,
    pub user_kind: SenderKind,
}

/// Request/response backend holding conversations and history.
///
/// Implementations adapt external payloads into the domain shapes; the core
/// never sees wire formats.
#[async_trait(?Send)]
pub trait RemoteGateway {
    async fn list_conversations(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ConversationPage, GatewayError>;

    async fn list_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError>;

    /// History of the private conversation with a user, paged like
    /// [`RemoteGateway::list_messages`]. Empty when no conversation exists yet.
    async fn list_messages_with_user(
        &self,
        user_id: i64,
        user_kind: SenderKind,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError>;

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, GatewayError>;

    /// Sends to a user directly, creating the private conversation if needed.
    async fn send_to_user(
        &self,
        content: &str,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<(Conversation, Message), GatewayError>;

    /// Returns the existing private conversation with the user, or a new one.
    async fn create_private_conversation(
        &self,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<Conversation, GatewayError>;

    async fn create_group_conversation(
        &self,
        name: &str,
        description: &str,
        participants: &[Participant],
    ) -> Result<Conversation, GatewayError>;
}

#[async_trait(?Send)]
impl<T> RemoteGateway for &T
where
    T: RemoteGateway + ?Sized,
{
    async fn list_conversations(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ConversationPage, GatewayError> {
        (**self).list_conversations(page, per_page).await
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        (**self).list_messages(conversation_id, page, per_page).await
    }

    async fn list_messages_with_user(
        &self,
        user_id: i64,
        user_kind: SenderKind,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        (**self)
            .list_messages_with_user(user_id, user_kind, page, per_page)
            .await
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, GatewayError> {
        (**self).send_message(conversation_id, content).await
    }

    async fn send_to_user(
        &self,
        content: &str,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<(Conversation, Message), GatewayError> {
        (**self).send_to_user(content, user_id, user_kind).await
    }

    async fn create_private_conversation(
        &self,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<Conversation, GatewayError> {
        (**self).create_private_conversation(user_id, user_kind).await
    }

    async fn create_group_conversation(
        &self,
        name: &str,
        description: &str,
        participants: &[Participant],
    ) -> Result<Conversation, GatewayError> {
        (**self)
            .create_group_conversation(name, description, participants)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("push transport unavailable: {0}")]
    Unavailable(String),
    #[error("subscription to conversation {0} was rejected")]
    Rejected(i64),
}

/// Live event transport. Delivers messages of one conversation into the
/// sink handed over at subscribe time until unsubscribed.
pub trait PushBroker {
    fn subscribe(
        &self,
        conversation_id: i64,
        sink: LiveEventSink,
    ) -> Result<SubscriptionHandle, PushError>;

    fn unsubscribe(&self, handle: SubscriptionHandle);
}

impl<T> PushBroker for &T
where
    T: PushBroker + ?Sized,
{
    fn subscribe(
        &self,
        conversation_id: i64,
        sink: LiveEventSink,
    ) -> Result<SubscriptionHandle, PushError> {
        (**self).subscribe(conversation_id, sink)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        (**self).unsubscribe(handle)
    }
}

pub trait IdentityProvider {
    fn current_user(&self) -> CurrentUser;
}

impl IdentityProvider for CurrentUser {
    fn current_user(&self) -> CurrentUser {
        self.clone()
    }
}
