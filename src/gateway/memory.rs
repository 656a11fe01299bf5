//! Self-contained chat backend kept in process memory.
//!
//! Powers the `demo` command and lets the CLI run without a server. Paging
//! follows the HTTP API: conversation lists are ordered by latest activity
//! and history page 1 holds the newest messages.

use std::{cell::RefCell, collections::HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{
    domain::{
        conversation::{Conversation, ConversationKind},
        message::{CurrentUser, Message, SenderKind},
        page::PageCursor,
    },
    usecases::contracts::{
        ConversationPage, GatewayError, MessagePage, Participant, RemoteGateway,
    },
};

const SEED_STEP_SECS: i64 = 90;

#[derive(Debug)]
struct MemoryState {
    conversations: Vec<Conversation>,
    messages: HashMap<i64, Vec<Message>>,
    private_peers: HashMap<(i64, SenderKind), i64>,
    next_conversation_id: i64,
    next_message_id: i64,
    clock: DateTime<Utc>,
}

#[derive(Debug)]
pub struct InMemoryGateway {
    current_user: CurrentUser,
    state: RefCell<MemoryState>,
}

impl InMemoryGateway {
    pub fn new(current_user: CurrentUser) -> Self {
        Self {
            current_user,
            state: RefCell::new(MemoryState {
                conversations: Vec::new(),
                messages: HashMap::new(),
                private_peers: HashMap::new(),
                next_conversation_id: 1,
                next_message_id: 1,
                clock: Utc::now() - Duration::hours(6),
            }),
        }
    }

    /// A small fixture: two private conversations and one group with history.
    pub fn with_demo_data(current_user: CurrentUser) -> Self {
        let gateway = Self::new(current_user);
        let own = gateway.current_user.clone();

        let alice = gateway.seed_private(2, SenderKind::User, &format!("Alice - {}", own.name));
        gateway.seed_message(alice, 2, SenderKind::User, "Hi! Is the order shipped yet?");
        gateway.seed_message(alice, own.id, own.kind, "Yes, it left the warehouse this morning.");
        gateway.seed_message(alice, 2, SenderKind::User, "Great, thanks!");

        let bob = gateway.seed_private(3, SenderKind::User, &format!("{} - Bob", own.name));
        gateway.seed_message(bob, 3, SenderKind::User, "Can I change my delivery address?");

        let ops = gateway.seed_group("Support team");
        for line in ["Shift handover in 10 minutes", "Queue is clear", "Thanks all"] {
            gateway.seed_message(ops, 4, SenderKind::Admin, line);
        }

        gateway
    }

    pub fn seed_private(&self, user_id: i64, user_kind: SenderKind, name: &str) -> i64 {
        let id = self.insert_conversation(ConversationKind::Private, Some(name.to_owned()));
        self.state
            .borrow_mut()
            .private_peers
            .insert((user_id, user_kind), id);
        id
    }

    pub fn seed_group(&self, name: &str) -> i64 {
        self.insert_conversation(ConversationKind::Group, Some(name.to_owned()))
    }

    /// Stores a message as if `sender_id` had just posted it.
    ///
    /// Messages from anyone but the current user raise the unread counter.
    pub fn seed_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        sender_kind: SenderKind,
        content: &str,
    ) -> Message {
        let mut state = self.state.borrow_mut();
        state.clock += Duration::seconds(SEED_STEP_SECS);
        let created_at = state.clock;
        let own = sender_id == self.current_user.id && sender_kind == self.current_user.kind;
        state.push_message(conversation_id, sender_id, sender_kind, content, created_at, own)
    }

    fn insert_conversation(&self, kind: ConversationKind, display_name: Option<String>) -> i64 {
        let mut state = self.state.borrow_mut();
        let id = state.next_conversation_id;
        state.next_conversation_id += 1;
        state.conversations.push(Conversation {
            display_name,
            ..Conversation::new(id, kind)
        });
        id
    }

    fn now(&self) -> DateTime<Utc> {
        let mut state = self.state.borrow_mut();
        let now = Utc::now().max(state.clock + Duration::seconds(1));
        state.clock = now;
        now
    }

    fn own_message(&self, conversation_id: i64, content: &str) -> Result<Message, GatewayError> {
        let created_at = self.now();
        let mut state = self.state.borrow_mut();
        if state.find(conversation_id).is_none() {
            return Err(not_found(conversation_id));
        }

        Ok(state.push_message(
            conversation_id,
            self.current_user.id,
            self.current_user.kind,
            content,
            created_at,
            true,
        ))
    }

    fn private_with(&self, user_id: i64, user_kind: SenderKind) -> Conversation {
        let existing = self
            .state
            .borrow()
            .private_peers
            .get(&(user_id, user_kind))
            .copied();

        let id = match existing {
            Some(id) => id,
            None => {
                let name = format!("{} - {} {}", self.current_user.name, user_kind.as_str(), user_id);
                self.seed_private(user_id, user_kind, &name)
            }
        };

        self.state
            .borrow()
            .find(id)
            .cloned()
            .unwrap_or_else(|| Conversation::new(id, ConversationKind::Private))
    }

    /// Page `page` counted from the newest message, ascending within the
    /// page. Reading history clears the unread counter.
    fn history_page(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        let mut state = self.state.borrow_mut();
        if state.find(conversation_id).is_none() {
            return Err(not_found(conversation_id));
        }

        let newest_first: Vec<Message> = state
            .messages
            .get(&conversation_id)
            .map(|log| log.iter().rev().cloned().collect())
            .unwrap_or_default();
        let (start, end) = page_bounds(page, per_page, newest_first.len());
        let mut messages = newest_first[start..end].to_vec();
        messages.reverse();

        if let Some(conversation) = state
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.unread_count = 0;
        }

        Ok(MessagePage {
            messages,
            cursor: cursor(page, per_page, newest_first.len()),
        })
    }
}

impl MemoryState {
    fn find(&self, conversation_id: i64) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    fn push_message(
        &mut self,
        conversation_id: i64,
        sender_id: i64,
        sender_kind: SenderKind,
        content: &str,
        created_at: DateTime<Utc>,
        own: bool,
    ) -> Message {
        let message = Message {
            id: self.next_message_id,
            conversation_id,
            sender_id,
            sender_kind,
            content: content.to_owned(),
            created_at,
        };
        self.next_message_id += 1;

        self.messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.last_message = Some(message.clone());
            if !own {
                conversation.unread_count += 1;
            }
        }

        message
    }
}

fn not_found(conversation_id: i64) -> GatewayError {
    GatewayError::Server {
        status: 404,
        message: format!("chat {conversation_id} not found"),
    }
}

fn self_chat() -> GatewayError {
    GatewayError::Server {
        status: 422,
        message: "cannot start a chat with yourself".to_owned(),
    }
}

fn cursor(page: u32, per_page: u32, total: usize) -> PageCursor {
    let per_page = per_page.max(1);
    let total = total as u64;
    let last_page = u32::try_from(total.div_ceil(u64::from(per_page)))
        .unwrap_or(u32::MAX)
        .max(1);

    PageCursor {
        current_page: page.max(1),
        per_page,
        total,
        last_page,
    }
}

fn page_bounds(page: u32, per_page: u32, len: usize) -> (usize, usize) {
    let per_page = per_page.max(1) as usize;
    let skip = (page.max(1) as usize - 1).saturating_mul(per_page);
    let start = skip.min(len);
    (start, (start + per_page).min(len))
}

#[async_trait(?Send)]
impl RemoteGateway for InMemoryGateway {
    async fn list_conversations(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<ConversationPage, GatewayError> {
        let state = self.state.borrow();
        let mut ordered = state.conversations.clone();
        ordered.sort_by(|a, b| {
            let a_at = a.last_message.as_ref().map(|m| m.created_at);
            let b_at = b.last_message.as_ref().map(|m| m.created_at);
            b_at.cmp(&a_at).then(a.id.cmp(&b.id))
        });

        let (start, end) = page_bounds(page, per_page, ordered.len());
        Ok(ConversationPage {
            cursor: cursor(page, per_page, ordered.len()),
            conversations: ordered[start..end].to_vec(),
        })
    }

    async fn list_messages(
        &self,
        conversation_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        self.history_page(conversation_id, page, per_page)
    }

    async fn list_messages_with_user(
        &self,
        user_id: i64,
        user_kind: SenderKind,
        page: u32,
        per_page: u32,
    ) -> Result<MessagePage, GatewayError> {
        if user_id == self.current_user.id && user_kind == self.current_user.kind {
            return Err(self_chat());
        }

        let existing = self
            .state
            .borrow()
            .private_peers
            .get(&(user_id, user_kind))
            .copied();
        match existing {
            Some(conversation_id) => self.history_page(conversation_id, page, per_page),
            None => Ok(MessagePage {
                messages: Vec::new(),
                cursor: cursor(page, per_page, 0),
            }),
        }
    }

    async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<Message, GatewayError> {
        self.own_message(conversation_id, content)
    }

    async fn send_to_user(
        &self,
        content: &str,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<(Conversation, Message), GatewayError> {
        let conversation = self.private_with(user_id, user_kind);
        let message = self.own_message(conversation.id, content)?;
        let conversation = self
            .state
            .borrow()
            .find(conversation.id)
            .cloned()
            .unwrap_or(conversation);

        Ok((conversation, message))
    }

    async fn create_private_conversation(
        &self,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<Conversation, GatewayError> {
        if user_id == self.current_user.id && user_kind == self.current_user.kind {
            return Err(self_chat());
        }

        Ok(self.private_with(user_id, user_kind))
    }

    async fn create_group_conversation(
        &self,
        name: &str,
        _description: &str,
        _participants: &[Participant],
    ) -> Result<Conversation, GatewayError> {
        let id = self.seed_group(name);
        self.state
            .borrow()
            .find(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }
}
