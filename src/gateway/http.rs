use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::{
    domain::{
        conversation::Conversation,
        message::{Message, SenderKind},
    },
    infra::{config::GatewayConfig, error::AppError, secrets::redact_text},
    usecases::contracts::{
        ConversationPage, GatewayError, MessagePage, Participant, RemoteGateway,
    },
};

use super::wire::{
    ConversationData, ConversationMessageData, ConversationsData, CreateGroupBody,
    CreatePrivateBody, Envelope, ErrorBody, MessageData, MessagesData, ParticipantBody, SendBody,
    SendToUserBody, UserHistoryQuery, UserMessagesData,
};

const HTTP_REQUEST_FAILED: &str = "GATEWAY_HTTP_REQUEST_FAILED";
const HTTP_STATUS_REJECTED: &str = "GATEWAY_HTTP_STATUS_REJECTED";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// [`RemoteGateway`] speaking the chat REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(AppError::HttpClientInit)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_token: config.api_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::ACCEPT, "application/json");

        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        route: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = builder.send().await.map_err(|error| {
            tracing::warn!(
                code = HTTP_REQUEST_FAILED,
                route,
                timeout = error.is_timeout(),
                "chat API request failed"
            );
            GatewayError::Network(error.without_url().to_string())
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| GatewayError::Network(error.without_url().to_string()))?;

        decode_response(status, &body).inspect_err(|error| {
            if let GatewayError::Server { status, message } = error {
                tracing::warn!(
                    code = HTTP_STATUS_REJECTED,
                    route,
                    status,
                    message = %message,
                    "chat API rejected request"
                );
            }
        })
    }
}

/// Maps a raw response onto the envelope payload.
fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, GatewayError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|error| error.message)
            .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect());

        return Err(GatewayError::Server {
            status,
            message: redact_text(&message),
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|error| GatewayError::InvalidData(error.to_string()))?;
    envelope.into_data(status)
}

#[async_trait(?Send)]
impl RemoteGateway for HttpGateway {
    async fn list_conversations(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ConversationPage, GatewayError> {
        let builder = self
            .request(Method::GET, "/chat/conversations")
            .query(&[("page", page), ("per_page", per_page)]);
        let data: ConversationsData = self.execute("conversations", builder).await?;

        let conversations = data
            .chats
            .into_iter()
            .map(|dto| dto.into_conversation())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ConversationPage {
            conversations,
            cursor: data.pagination.into(),
        })
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        let builder = self
            .request(Method::GET, &format!("/chat/{conversation_id}/messages"))
            .query(&[("page", page), ("per_page", per_page)]);
        let data: MessagesData = self.execute("messages", builder).await?;

        let messages = data
            .messages
            .into_iter()
            .map(|dto| dto.into_message(Some(conversation_id)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessagePage {
            messages,
            cursor: data.pagination.into(),
        })
    }

    async fn list_messages_with_user(
        &self,
        user_id: i64,
        user_kind: SenderKind,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        let builder = self
            .request(Method::GET, "/chat/conversation")
            .query(&UserHistoryQuery {
                other_user_type: user_kind,
                other_user_id: user_id,
                page,
                per_page,
            });
        let data: UserMessagesData = self.execute("messages_with_user", builder).await?;

        let chat_id = data.chat_id;
        let messages = data
            .messages
            .into_iter()
            .map(|dto| dto.into_message(chat_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessagePage {
            messages,
            cursor: data.pagination.into(),
        })
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, GatewayError> {
        let builder = self
            .request(Method::POST, &format!("/chat/{conversation_id}/send"))
            .json(&SendBody { content });
        let data: MessageData = self.execute("send", builder).await?;

        data.message.into_message(Some(conversation_id))
    }

    async fn send_to_user(
        &self,
        content: &str,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<(Conversation, Message), GatewayError> {
        let builder = self.request(Method::POST, "/chat/send").json(&SendToUserBody {
            content,
            receiver_type: user_kind,
            receiver_id: user_id,
        });
        let data: ConversationMessageData = self.execute("send_to_user", builder).await?;

        let conversation = data.chat.into_conversation()?;
        let message = data.message.into_message(Some(conversation.id))?;
        Ok((conversation, message))
    }

    async fn create_private_conversation(
        &self,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<Conversation, GatewayError> {
        let builder = self
            .request(Method::POST, "/chat/create-private")
            .json(&CreatePrivateBody {
                other_user_id: user_id,
                other_user_type: user_kind,
            });
        let data: ConversationData = self.execute("create_private", builder).await?;

        data.chat.into_conversation()
    }

    async fn create_group_conversation(
        &self,
        name: &str,
        description: &str,
        participants: &[Participant],
    ) -> Result<Conversation, GatewayError> {
        let builder = self
            .request(Method::POST, "/chat/create-group")
            .json(&CreateGroupBody {
                name,
                description,
                participants: participants.iter().map(ParticipantBody::from).collect(),
            });
        let data: ConversationData = self.execute("create_group", builder).await?;

        data.chat.into_conversation()
    }
}
