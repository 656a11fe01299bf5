use crate::domain::{
    conversation::{Conversation, ConversationKind},
    message::SenderKind,
};

use super::{
    contracts::{Participant, RemoteGateway},
    error::{SyncError, ValidationError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartChatCommand {
    pub user_id: i64,
    pub user_kind: SenderKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupCommand {
    pub name: String,
    pub description: String,
    pub participants: Vec<Participant>,
}

/// Creates the private conversation with a user, or returns the existing one.
pub async fn start_chat<G>(gateway: &G, command: StartChatCommand) -> Result<Conversation, SyncError>
where
    G: RemoteGateway + ?Sized,
{
    let conversation = gateway
        .create_private_conversation(command.user_id, command.user_kind)
        .await?;

    if conversation.kind != ConversationKind::Private {
        return Err(SyncError::InvalidData(format!(
            "conversation {} returned for a private chat is a group",
            conversation.id
        )));
    }

    Ok(conversation)
}

pub async fn create_group<G>(
    gateway: &G,
    command: CreateGroupCommand,
) -> Result<Conversation, SyncError>
where
    G: RemoteGateway + ?Sized,
{
    let name = command.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyGroupName.into());
    }

    let conversation = gateway
        .create_group_conversation(name, command.description.trim(), &command.participants)
        .await?;
    Ok(conversation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_support::{GatewayCall, StubGateway},
        usecases::contracts::GatewayError,
    };

    #[tokio::test]
    async fn start_chat_forwards_user_identity() {
        let gateway = StubGateway::default();

        let conversation = start_chat(
            &gateway,
            StartChatCommand {
                user_id: 9,
                user_kind: SenderKind::Admin,
            },
        )
        .await
        .expect("start should succeed");

        assert_eq!(conversation.kind, ConversationKind::Private);
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::CreatePrivate {
                user_id: 9,
                user_kind: SenderKind::Admin
            }]
        );
    }

    #[tokio::test]
    async fn start_chat_rejects_group_payload() {
        let gateway = StubGateway::default()
            .with_created(Ok(Conversation::new(4, ConversationKind::Group)));

        let err = start_chat(
            &gateway,
            StartChatCommand {
                user_id: 9,
                user_kind: SenderKind::User,
            },
        )
        .await
        .expect_err("must fail");

        assert!(matches!(err, SyncError::InvalidData(_)));
    }

    #[tokio::test]
    async fn start_chat_maps_gateway_failure() {
        let gateway = StubGateway::default().with_created(Err(GatewayError::Server {
            status: 422,
            message: "unknown user".to_owned(),
        }));

        let err = start_chat(
            &gateway,
            StartChatCommand {
                user_id: 9,
                user_kind: SenderKind::User,
            },
        )
        .await
        .expect_err("must fail");

        assert_eq!(
            err,
            SyncError::Server {
                status: 422,
                message: "unknown user".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn create_group_requires_a_name() {
        let gateway = StubGateway::default();

        let err = create_group(
            &gateway,
            CreateGroupCommand {
                name: "  ".to_owned(),
                description: String::new(),
                participants: vec![],
            },
        )
        .await
        .expect_err("must fail");

        assert_eq!(err, SyncError::Validation(ValidationError::EmptyGroupName));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn create_group_sends_trimmed_fields_and_participants() {
        let gateway = StubGateway::default();
        let participants = vec![Participant {
            user_id: 2,
            user_kind: SenderKind::User,
        }];

        create_group(
            &gateway,
            CreateGroupCommand {
                name: " Ops ".to_owned(),
                description: " on-call ".to_owned(),
                participants: participants.clone(),
            },
        )
        .await
        .expect("create should succeed");

        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::CreateGroup {
                name: "Ops".to_owned(),
                description: "on-call".to_owned(),
                participants
            }]
        );
    }
}
