use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::oneshot;

use crate::{
    domain::{
        conversation::{Conversation, ConversationKind},
        message::{Message, SenderKind},
        page::PageCursor,
    },
    gateway::push::LocalPushBroker,
    usecases::{
        contracts::{
            ConversationPage, GatewayError, MessagePage, Participant, PushBroker, PushError,
            RemoteGateway, SubscriptionHandle,
        },
        subscription::LiveEventSink,
    },
};

pub fn live_message(id: i64, conversation_id: i64, secs: i64) -> Message {
    Message {
        id,
        conversation_id,
        sender_id: 2,
        sender_kind: SenderKind::User,
        content: format!("message {id}"),
        created_at: Utc.timestamp_opt(secs, 0).single().expect("valid timestamp"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListConversations {
        page: u32,
        per_page: u32,
    },
    ListMessages {
        conversation_id: i64,
        page: u32,
        per_page: u32,
    },
    ListMessagesWithUser {
        user_id: i64,
        user_kind: SenderKind,
        page: u32,
        per_page: u32,
    },
    SendMessage {
        conversation_id: i64,
        content: String,
    },
    SendToUser {
        content: String,
        user_id: i64,
        user_kind: SenderKind,
    },
    CreatePrivate {
        user_id: i64,
        user_kind: SenderKind,
    },
    CreateGroup {
        name: String,
        description: String,
        participants: Vec<Participant>,
    },
}

/// Scripted gateway. Unscripted calls succeed with empty pages or
/// synthesized acknowledgements; gated calls park until released.
#[derive(Default)]
pub struct StubGateway {
    conversation_pages: HashMap<u32, Result<ConversationPage, GatewayError>>,
    message_pages: HashMap<(i64, u32), Result<MessagePage, GatewayError>>,
    user_pages: HashMap<(i64, SenderKind, u32), Result<MessagePage, GatewayError>>,
    send_result: Option<Result<Message, GatewayError>>,
    send_to_user_result: Option<Result<(Conversation, Message), GatewayError>>,
    created_result: Option<Result<Conversation, GatewayError>>,
    conversation_gate: RefCell<Option<oneshot::Receiver<()>>>,
    message_gates: RefCell<HashMap<i64, oneshot::Receiver<()>>>,
    send_gate: RefCell<Option<oneshot::Receiver<()>>>,
    next_message_id: Cell<i64>,
    calls: RefCell<Vec<GatewayCall>>,
}

impl StubGateway {
    pub fn with_conversations(
        mut self,
        page: u32,
        result: Result<ConversationPage, GatewayError>,
    ) -> Self {
        self.conversation_pages.insert(page, result);
        self
    }

    pub fn with_messages(
        mut self,
        conversation_id: i64,
        page: u32,
        result: Result<MessagePage, GatewayError>,
    ) -> Self {
        self.message_pages.insert((conversation_id, page), result);
        self
    }

    pub fn with_user_messages(
        mut self,
        user_id: i64,
        user_kind: SenderKind,
        page: u32,
        result: Result<MessagePage, GatewayError>,
    ) -> Self {
        self.user_pages.insert((user_id, user_kind, page), result);
        self
    }

    pub fn with_send_result(mut self, result: Result<Message, GatewayError>) -> Self {
        self.send_result = Some(result);
        self
    }

    pub fn with_sent_to_user(
        mut self,
        result: Result<(Conversation, Message), GatewayError>,
    ) -> Self {
        self.send_to_user_result = Some(result);
        self
    }

    pub fn with_created(mut self, result: Result<Conversation, GatewayError>) -> Self {
        self.created_result = Some(result);
        self
    }

    /// Parks the next conversation list request until the sender fires.
    pub fn gate_conversations(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.conversation_gate.borrow_mut() = Some(rx);
        tx
    }

    /// Parks the next history request of `conversation_id` until the sender fires.
    pub fn gate_messages(&self, conversation_id: i64) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.message_gates.borrow_mut().insert(conversation_id, rx);
        tx
    }

    /// Parks the next send until the sender fires.
    pub fn gate_send(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.send_gate.borrow_mut() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.borrow_mut().push(call);
    }

    fn acknowledge(&self, conversation_id: i64, content: &str) -> Message {
        let id = 1000 + self.next_message_id.get();
        self.next_message_id.set(self.next_message_id.get() + 1);
        Message {
            id,
            conversation_id,
            sender_id: 1,
            sender_kind: SenderKind::User,
            content: content.to_owned(),
            created_at: Utc::now(),
        }
    }
}

async fn wait_for(gate: Option<oneshot::Receiver<()>>) {
    if let Some(gate) = gate {
        let _ = gate.await;
    }
}

#[async_trait(?Send)]
impl RemoteGateway for StubGateway {
    async fn list_conversations(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ConversationPage, GatewayError> {
        self.record(GatewayCall::ListConversations { page, per_page });
        let gate = self.conversation_gate.borrow_mut().take();
        wait_for(gate).await;

        self.conversation_pages
            .get(&page)
            .cloned()
            .unwrap_or_else(|| {
                Ok(ConversationPage {
                    conversations: Vec::new(),
                    cursor: PageCursor::first(per_page),
                })
            })
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        self.record(GatewayCall::ListMessages {
            conversation_id,
            page,
            per_page,
        });
        let gate = self.message_gates.borrow_mut().remove(&conversation_id);
        wait_for(gate).await;

        self.message_pages
            .get(&(conversation_id, page))
            .cloned()
            .unwrap_or_else(|| {
                Ok(MessagePage {
                    messages: Vec::new(),
                    cursor: PageCursor::first(per_page),
                })
            })
    }

    async fn list_messages_with_user(
        &self,
        user_id: i64,
        user_kind: SenderKind,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        self.record(GatewayCall::ListMessagesWithUser {
            user_id,
            user_kind,
            page,
            per_page,
        });

        self.user_pages
            .get(&(user_id, user_kind, page))
            .cloned()
            .unwrap_or_else(|| {
                Ok(MessagePage {
                    messages: Vec::new(),
                    cursor: PageCursor::first(per_page),
                })
            })
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, GatewayError> {
        self.record(GatewayCall::SendMessage {
            conversation_id,
            content: content.to_owned(),
        });
        let gate = self.send_gate.borrow_mut().take();
        wait_for(gate).await;

        match &self.send_result {
            Some(result) => result.clone(),
            None => Ok(self.acknowledge(conversation_id, content)),
        }
    }

    async fn send_to_user(
        &self,
        content: &str,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<(Conversation, Message), GatewayError> {
        self.record(GatewayCall::SendToUser {
            content: content.to_owned(),
            user_id,
            user_kind,
        });

        match &self.send_to_user_result {
            Some(result) => result.clone(),
            None => {
                let conversation_id = 500 + user_id;
                Ok((
                    Conversation::new(conversation_id, ConversationKind::Private),
                    self.acknowledge(conversation_id, content),
                ))
            }
        }
    }

    async fn create_private_conversation(
        &self,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<Conversation, GatewayError> {
        self.record(GatewayCall::CreatePrivate { user_id, user_kind });

        match &self.created_result {
            Some(result) => result.clone(),
            None => Ok(Conversation::new(500 + user_id, ConversationKind::Private)),
        }
    }

    async fn create_group_conversation(
        &self,
        name: &str,
        description: &str,
        participants: &[Participant],
    ) -> Result<Conversation, GatewayError> {
        self.record(GatewayCall::CreateGroup {
            name: name.to_owned(),
            description: description.to_owned(),
            participants: participants.to_vec(),
        });

        match &self.created_result {
            Some(result) => result.clone(),
            None => Ok(Conversation {
                display_name: Some(name.to_owned()),
                ..Conversation::new(900, ConversationKind::Group)
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerCall {
    Subscribe(i64),
    Unsubscribe(i64),
}

/// Local push hub that also records subscribe traffic and can refuse
/// subscriptions to chosen conversations.
#[derive(Default)]
pub struct RecordingBroker {
    hub: LocalPushBroker,
    calls: RefCell<Vec<BrokerCall>>,
    handles: RefCell<HashMap<SubscriptionHandle, i64>>,
    failing: RefCell<HashSet<i64>>,
}

impl RecordingBroker {
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.borrow().clone()
    }

    pub fn active_conversations(&self) -> Vec<i64> {
        self.hub.active_conversations()
    }

    pub fn push(&self, message: Message) -> usize {
        self.hub.publish(message)
    }

    pub fn sink_for(&self, conversation_id: i64) -> Option<LiveEventSink> {
        self.hub.sink_for(conversation_id)
    }

    pub fn fail_subscriptions_to(&self, conversation_id: i64) {
        self.failing.borrow_mut().insert(conversation_id);
    }

    pub fn allow_subscriptions_to(&self, conversation_id: i64) {
        self.failing.borrow_mut().remove(&conversation_id);
    }
}

impl PushBroker for RecordingBroker {
    fn subscribe(
        &self,
        conversation_id: i64,
        sink: LiveEventSink,
    ) -> Result<SubscriptionHandle, PushError> {
        self.calls
            .borrow_mut()
            .push(BrokerCall::Subscribe(conversation_id));
        if self.failing.borrow().contains(&conversation_id) {
            return Err(PushError::Rejected(conversation_id));
        }

        let handle = self.hub.subscribe(conversation_id, sink)?;
        self.handles.borrow_mut().insert(handle, conversation_id);
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Some(conversation_id) = self.handles.borrow_mut().remove(&handle) {
            self.calls
                .borrow_mut()
                .push(BrokerCall::Unsubscribe(conversation_id));
        }
        self.hub.unsubscribe(handle);
    }
}
