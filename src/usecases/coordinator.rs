//! Orchestration of the conversation list, the open conversation's log, and
//! the live binding.
//!
//! Every operation is an `async fn` taking `&self`. Mutable state lives in a
//! `RefCell` that is only borrowed between awaits, so several operations may
//! be polled concurrently on one task. Each selection bumps a generation
//! counter and every session reset bumps an epoch; a response that resolves
//! after either moved on is discarded instead of applied.

use std::{cell::RefCell, sync::mpsc};

use tokio::sync::Mutex as AsyncMutex;

use crate::{
    domain::{
        conversation::{Conversation, ConversationKind},
        conversation_store::ConversationStore,
        events::{SelectionState, SyncEvent},
        message::{CurrentUser, FormattedMessage, Message, SenderKind},
        message_store::MessageStore,
        page::PageCursor,
    },
    infra::config::SyncConfig,
};

use super::{
    contracts::{IdentityProvider, Participant, PushBroker, RemoteGateway},
    error::SyncError,
    list_conversations::{list_conversations, ListConversationsQuery},
    load_messages::{load_messages, LoadMessagesQuery},
    notifier::SyncNotifier,
    send_message::{self, SendMessageCommand, SendToUserCommand},
    start_chat::{self, CreateGroupCommand, StartChatCommand},
    subscription::{LiveEnvelope, LiveEvents, SubscriptionManager, SwitchOutcome},
};

const CONVERSATIONS_LOADED: &str = "SYNC_CONVERSATIONS_LOADED";
const CONVERSATIONS_LOAD_BUSY: &str = "SYNC_CONVERSATIONS_LOAD_BUSY";
const HISTORY_LOADED: &str = "SYNC_HISTORY_LOADED";
const MESSAGE_SENT: &str = "SYNC_MESSAGE_SENT";
const CONVERSATION_CREATED: &str = "SYNC_CONVERSATION_CREATED";
const STALE_RESPONSE_DISCARDED: &str = "SYNC_STALE_RESPONSE_DISCARDED";
const OPERATION_FAILED: &str = "SYNC_OPERATION_FAILED";
const LIVE_EVENT_STALE: &str = "SYNC_LIVE_EVENT_STALE";
const LIVE_EVENT_UNKNOWN_CONVERSATION: &str = "SYNC_LIVE_EVENT_UNKNOWN_CONVERSATION";
const SESSION_RESET: &str = "SYNC_SESSION_RESET";
const OPERATION_CANCELLED: &str = "SYNC_OPERATION_CANCELLED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    generation: u64,
    epoch: u64,
}

struct CoordinatorState<B: PushBroker> {
    conversations: ConversationStore,
    messages: MessageStore,
    subscription: SubscriptionManager<B>,
    selection: SelectionState,
    generation: u64,
    epoch: u64,
    loading_conversations: bool,
    loading_older: bool,
    last_error: Option<SyncError>,
}

impl<B: PushBroker> CoordinatorState<B> {
    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            epoch: self.epoch,
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.ticket() == ticket
    }
}

/// Bookkeeping an in-flight operation must settle even if its future is
/// dropped before the response arrives.
#[derive(Debug, Clone, Copy)]
enum Pending {
    ConversationList { epoch: u64 },
    OlderHistory { ticket: Ticket },
    Selection { ticket: Ticket, conversation_id: i64 },
}

/// Settles a [`Pending`] operation on drop. After a normal completion the
/// flags are already settled and dropping it changes nothing.
struct PendingGuard<'a, B: PushBroker> {
    state: &'a RefCell<CoordinatorState<B>>,
    notifier: &'a SyncNotifier,
    pending: Pending,
}

impl<B: PushBroker> Drop for PendingGuard<'_, B> {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };

        match self.pending {
            Pending::ConversationList { epoch } => {
                if state.epoch == epoch && state.loading_conversations {
                    state.loading_conversations = false;
                    tracing::debug!(
                        code = OPERATION_CANCELLED,
                        operation = "load_conversations",
                        "conversation list load dropped before completion"
                    );
                }
            }
            Pending::OlderHistory { ticket } => {
                if state.is_current(ticket) && state.loading_older {
                    state.loading_older = false;
                    tracing::debug!(
                        code = OPERATION_CANCELLED,
                        operation = "load_older",
                        "older history load dropped before completion"
                    );
                }
            }
            Pending::Selection {
                ticket,
                conversation_id,
            } => {
                if state.is_current(ticket)
                    && state.selection == (SelectionState::Loading { conversation_id })
                {
                    let selection = SelectionState::Active { conversation_id };
                    state.selection = selection;
                    drop(state);

                    tracing::debug!(
                        code = OPERATION_CANCELLED,
                        operation = "select",
                        conversation_id,
                        "history load dropped; conversation stays open without history"
                    );
                    self.notifier.emit(SyncEvent::SelectionChanged(selection));
                }
            }
        }
    }
}

pub struct SyncCoordinator<G, B, I>
where
    B: PushBroker,
{
    gateway: G,
    identity: I,
    config: SyncConfig,
    state: RefCell<CoordinatorState<B>>,
    live_events: AsyncMutex<LiveEvents>,
    notifier: SyncNotifier,
}

impl<G, B, I> SyncCoordinator<G, B, I>
where
    G: RemoteGateway,
    B: PushBroker,
    I: IdentityProvider,
{
    pub fn new(gateway: G, broker: B, identity: I, config: SyncConfig) -> Self {
        let (subscription, live_events) = SubscriptionManager::new(broker);

        Self {
            gateway,
            identity,
            config,
            state: RefCell::new(CoordinatorState {
                conversations: ConversationStore::default(),
                messages: MessageStore::default(),
                subscription,
                selection: SelectionState::Unselected,
                generation: 0,
                epoch: 0,
                loading_conversations: false,
                loading_older: false,
                last_error: None,
            }),
            live_events: AsyncMutex::new(live_events),
            notifier: SyncNotifier::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn current_user(&self) -> CurrentUser {
        self.identity.current_user()
    }

    /// Registers a listener for change notifications.
    pub fn subscribe_events(&self) -> mpsc::Receiver<SyncEvent> {
        self.notifier.subscribe()
    }

    pub fn state(&self) -> SelectionState {
        self.state.borrow().selection
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.borrow().conversations.conversations().to_vec()
    }

    pub fn conversation(&self, conversation_id: i64) -> Option<Conversation> {
        self.state
            .borrow()
            .conversations
            .get(conversation_id)
            .cloned()
    }

    pub fn conversations_cursor(&self) -> PageCursor {
        self.state.borrow().conversations.cursor()
    }

    /// Display title of a known conversation from the operator's viewpoint.
    pub fn conversation_title(&self, conversation_id: i64) -> Option<String> {
        let user = self.identity.current_user();
        self.state
            .borrow()
            .conversations
            .get(conversation_id)
            .map(|c| c.title(Some(&user.name)))
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.messages().to_vec()
    }

    pub fn formatted_messages(&self) -> Vec<FormattedMessage> {
        let user = self.identity.current_user();
        self.state
            .borrow()
            .messages
            .messages()
            .iter()
            .map(|m| FormattedMessage::new(m, &user))
            .collect()
    }

    pub fn has_older_messages(&self) -> bool {
        self.state.borrow().messages.has_older()
    }

    pub fn total_unread(&self) -> u64 {
        self.state.borrow().conversations.total_unread()
    }

    pub fn unread_conversations(&self) -> Vec<Conversation> {
        self.state
            .borrow()
            .conversations
            .unread_conversations()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn active_subscription(&self) -> Option<i64> {
        self.state.borrow().subscription.active()
    }

    pub fn last_error(&self) -> Option<SyncError> {
        self.state.borrow().last_error.clone()
    }

    pub fn is_loading(&self) -> bool {
        let state = self.state.borrow();
        state.loading_conversations
            || state.loading_older
            || matches!(state.selection, SelectionState::Loading { .. })
    }

    /// Loads one page of the conversation list.
    ///
    /// Page 1 replaces the list; later pages are merged behind it. A call made
    /// while another list load is in flight fails with [`SyncError::Busy`].
    pub async fn load_conversations(&self, page: u32) -> Result<(), SyncError> {
        let epoch = {
            let mut state = self.state.borrow_mut();
            if state.loading_conversations {
                tracing::debug!(
                    code = CONVERSATIONS_LOAD_BUSY,
                    page,
                    "conversation list load already in flight"
                );
                return Err(SyncError::Busy);
            }
            state.loading_conversations = true;
            state.epoch
        };
        let _pending = self.guard(Pending::ConversationList { epoch });

        let query = ListConversationsQuery::page(page, self.config.conversations_per_page);
        let result = list_conversations(&self.gateway, query).await;

        let mut state = self.state.borrow_mut();
        if state.epoch != epoch {
            tracing::debug!(
                code = STALE_RESPONSE_DISCARDED,
                page,
                "discarding conversation list from a previous session"
            );
            return Ok(());
        }
        state.loading_conversations = false;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(error) => {
                drop(state);
                return Err(self.fail("load_conversations", error));
            }
        };

        let count = fetched.conversations.len();
        let total = fetched.cursor.total;
        if page <= 1 {
            state
                .conversations
                .replace_list(fetched.conversations, fetched.cursor);
        } else {
            state
                .conversations
                .append_page(fetched.conversations, fetched.cursor);
        }
        state.last_error = None;
        drop(state);

        tracing::info!(
            code = CONVERSATIONS_LOADED,
            page,
            count,
            total,
            "conversation list loaded"
        );
        self.notifier.emit(SyncEvent::ConversationsChanged);
        Ok(())
    }

    /// Opens a conversation: clears its unread counter, moves the live
    /// binding to it, and loads the newest history page.
    ///
    /// Results of a selection superseded before its history arrives are
    /// discarded and the call returns `Ok(())`.
    pub async fn select(&self, conversation_id: i64) -> Result<(), SyncError> {
        let ticket = self.begin_selection(conversation_id);
        let _pending = self.guard(Pending::Selection {
            ticket,
            conversation_id,
        });

        let query =
            LoadMessagesQuery::new(conversation_id).with_per_page(self.config.messages_per_page);
        let result = load_messages(&self.gateway, query).await;

        let mut state = self.state.borrow_mut();
        if !state.is_current(ticket) {
            tracing::debug!(
                code = STALE_RESPONSE_DISCARDED,
                conversation_id,
                generation = ticket.generation,
                "discarding history of a superseded selection"
            );
            return Ok(());
        }

        let selection = SelectionState::Active { conversation_id };
        state.selection = selection;

        match result {
            Ok(page) => {
                let count = page.messages.len();
                state
                    .messages
                    .load_page(conversation_id, page.messages, page.cursor, 1);
                let newest = state.messages.messages().last().cloned();
                if let Some(newest) = newest {
                    state.conversations.record_history_message(&newest);
                }
                state.last_error = None;
                drop(state);

                tracing::info!(
                    code = HISTORY_LOADED,
                    conversation_id,
                    page = 1,
                    count,
                    "conversation history loaded"
                );
                self.notifier.emit(SyncEvent::MessagesChanged);
                self.notifier.emit(SyncEvent::ConversationsChanged);
                self.notifier.emit(SyncEvent::SelectionChanged(selection));
                Ok(())
            }
            Err(error) => {
                drop(state);
                self.notifier.emit(SyncEvent::SelectionChanged(selection));
                Err(self.fail("select", error))
            }
        }
    }

    /// Loads the next older history page of the active conversation.
    ///
    /// Returns `Ok(false)` when there is nothing older to load or the
    /// selection changed while the page was in flight.
    pub async fn load_older(&self) -> Result<bool, SyncError> {
        let (ticket, conversation_id, page) = {
            let mut state = self.state.borrow_mut();
            let conversation_id = match state.selection {
                SelectionState::Active { conversation_id } => conversation_id,
                SelectionState::Loading { .. } => return Err(SyncError::Busy),
                SelectionState::Unselected => return Err(SyncError::NoActiveConversation),
            };
            if state.loading_older {
                return Err(SyncError::Busy);
            }
            let Some(page) = state.messages.next_older_page() else {
                return Ok(false);
            };
            state.loading_older = true;
            (state.ticket(), conversation_id, page)
        };
        let _pending = self.guard(Pending::OlderHistory { ticket });

        let query = LoadMessagesQuery::new(conversation_id)
            .with_page(page)
            .with_per_page(self.config.messages_per_page);
        let result = load_messages(&self.gateway, query).await;

        let mut state = self.state.borrow_mut();
        if !state.is_current(ticket) {
            tracing::debug!(
                code = STALE_RESPONSE_DISCARDED,
                conversation_id,
                page,
                "discarding older history of a superseded selection"
            );
            return Ok(false);
        }
        state.loading_older = false;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(error) => {
                drop(state);
                return Err(self.fail("load_older", error));
            }
        };

        let count = fetched.messages.len();
        state
            .messages
            .load_page(conversation_id, fetched.messages, fetched.cursor, page);
        state.last_error = None;
        drop(state);

        tracing::info!(
            code = HISTORY_LOADED,
            conversation_id,
            page,
            count,
            "older history loaded"
        );
        self.notifier.emit(SyncEvent::MessagesChanged);
        Ok(true)
    }

    /// Sends `content` to the selected conversation.
    ///
    /// Nothing is sent when no conversation is selected or the content fails
    /// validation. The acknowledged message is appended to the log if the
    /// conversation is still open and becomes its `last_message`.
    pub async fn send(&self, content: &str) -> Result<Message, SyncError> {
        let (epoch, conversation_id) = {
            let state = self.state.borrow();
            let Some(conversation_id) = state.selection.conversation_id() else {
                tracing::debug!("send ignored: no conversation selected");
                return Err(SyncError::NoActiveConversation);
            };
            (state.epoch, conversation_id)
        };

        let command = SendMessageCommand {
            conversation_id,
            text: content.to_owned(),
        };
        let message = match send_message::send_message(&self.gateway, command).await {
            Ok(message) => message,
            Err(error) => return Err(self.fail("send", error)),
        };

        let mut state = self.state.borrow_mut();
        if state.epoch != epoch {
            tracing::debug!(
                code = STALE_RESPONSE_DISCARDED,
                conversation_id,
                message_id = message.id,
                "discarding send acknowledgement from a previous session"
            );
            return Ok(message);
        }

        let appended = state.messages.append_sent(message.clone());
        let mut conversation = state
            .conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_else(|| Conversation::new(conversation_id, ConversationKind::Private));
        conversation.advance_last_message(&message);
        state.conversations.upsert(conversation);
        state.last_error = None;
        drop(state);

        tracing::info!(
            code = MESSAGE_SENT,
            conversation_id,
            message_id = message.id,
            "message sent"
        );
        if appended {
            self.notifier.emit(SyncEvent::MessagesChanged);
        }
        self.notifier.emit(SyncEvent::ConversationsChanged);
        Ok(message)
    }

    /// Sends `content` straight to a user. The conversation it landed in is
    /// merged into the list without being selected.
    pub async fn send_to_user(
        &self,
        content: &str,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<(Conversation, Message), SyncError> {
        let epoch = self.state.borrow().epoch;

        let command = SendToUserCommand {
            text: content.to_owned(),
            user_id,
            user_kind,
        };
        let (mut conversation, message) =
            match send_message::send_to_user(&self.gateway, command).await {
                Ok(result) => result,
                Err(error) => return Err(self.fail("send_to_user", error)),
            };
        conversation.advance_last_message(&message);

        let mut state = self.state.borrow_mut();
        if state.epoch != epoch {
            return Ok((conversation, message));
        }

        state.conversations.upsert(conversation.clone());
        let appended = state.messages.append_sent(message.clone());
        state.last_error = None;
        drop(state);

        tracing::info!(
            code = MESSAGE_SENT,
            conversation_id = conversation.id,
            message_id = message.id,
            user_id,
            "message sent to user"
        );
        if appended {
            self.notifier.emit(SyncEvent::MessagesChanged);
        }
        self.notifier.emit(SyncEvent::ConversationsChanged);
        Ok((conversation, message))
    }

    /// Creates or reuses the private conversation with a user.
    pub async fn start_chat_with(
        &self,
        user_id: i64,
        user_kind: SenderKind,
    ) -> Result<Conversation, SyncError> {
        let epoch = self.state.borrow().epoch;

        let command = StartChatCommand { user_id, user_kind };
        match start_chat::start_chat(&self.gateway, command).await {
            Ok(conversation) => Ok(self.merge_created(epoch, conversation)),
            Err(error) => Err(self.fail("start_chat_with", error)),
        }
    }

    pub async fn create_group(
        &self,
        name: &str,
        description: &str,
        participants: Vec<Participant>,
    ) -> Result<Conversation, SyncError> {
        let epoch = self.state.borrow().epoch;

        let command = CreateGroupCommand {
            name: name.to_owned(),
            description: description.to_owned(),
            participants,
        };
        match start_chat::create_group(&self.gateway, command).await {
            Ok(conversation) => Ok(self.merge_created(epoch, conversation)),
            Err(error) => Err(self.fail("create_group", error)),
        }
    }

    /// Closes the open conversation and releases the live binding.
    pub fn deselect(&self) {
        let released = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.loading_older = false;
            state.selection = SelectionState::Unselected;
            state.conversations.set_selected(None);
            state.messages.clear();
            state.subscription.clear()
        };

        self.notifier
            .emit(SyncEvent::SelectionChanged(SelectionState::Unselected));
        self.notifier.emit(SyncEvent::MessagesChanged);
        if released {
            self.notifier.emit(SyncEvent::LiveBindingChanged(None));
        }
    }

    /// Tears the session down: both stores, the live binding and the last
    /// error are cleared, and every in-flight response is discarded.
    pub fn reset(&self) {
        let released = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.epoch += 1;
            state.loading_conversations = false;
            state.loading_older = false;
            state.selection = SelectionState::Unselected;
            state.conversations.clear();
            state.messages.clear();
            state.last_error = None;
            state.subscription.clear()
        };

        tracing::info!(code = SESSION_RESET, "sync session reset");
        self.notifier
            .emit(SyncEvent::SelectionChanged(SelectionState::Unselected));
        self.notifier.emit(SyncEvent::ConversationsChanged);
        self.notifier.emit(SyncEvent::MessagesChanged);
        if released {
            self.notifier.emit(SyncEvent::LiveBindingChanged(None));
        }
    }

    /// Applies every live event already queued and returns how many belonged
    /// to the current binding.
    ///
    /// Returns 0 without draining while a task is parked in
    /// [`Self::next_live_event`].
    pub fn pump_live_events(&self) -> usize {
        let Ok(mut events) = self.live_events.try_lock() else {
            return 0;
        };

        let mut applied = 0;
        while let Some(envelope) = events.try_recv() {
            if self.apply_live(envelope).is_some() {
                applied += 1;
            }
        }
        applied
    }

    /// Waits for the next live message of the current binding and applies it.
    ///
    /// The coordinator keeps the channel's sender inside its own
    /// subscription manager, so the future stays pending until a message is
    /// applied; callers stop waiting by dropping it. The `None` arm is only
    /// reachable if that sender is gone.
    pub async fn next_live_event(&self) -> Option<Message> {
        let mut events = self.live_events.lock().await;
        loop {
            let envelope = events.recv().await?;
            if let Some(message) = self.apply_live(envelope) {
                return Some(message);
            }
        }
    }

    fn guard(&self, pending: Pending) -> PendingGuard<'_, B> {
        PendingGuard {
            state: &self.state,
            notifier: &self.notifier,
            pending,
        }
    }

    fn begin_selection(&self, conversation_id: i64) -> Ticket {
        let (ticket, selection, outcome, binding) = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.loading_older = false;

            if state.messages.conversation_id() != Some(conversation_id) {
                state.messages.open(conversation_id);
            }
            if state.selection != (SelectionState::Active { conversation_id }) {
                state.selection = SelectionState::Loading { conversation_id };
            }
            state.conversations.set_selected(Some(conversation_id));
            let outcome = state.subscription.switch_to(conversation_id);

            (
                state.ticket(),
                state.selection,
                outcome,
                state.subscription.active(),
            )
        };

        self.notifier.emit(SyncEvent::SelectionChanged(selection));
        self.notifier.emit(SyncEvent::ConversationsChanged);
        self.notifier.emit(SyncEvent::MessagesChanged);
        if outcome != SwitchOutcome::Unchanged {
            self.notifier.emit(SyncEvent::LiveBindingChanged(binding));
        }
        ticket
    }

    fn merge_created(&self, epoch: u64, conversation: Conversation) -> Conversation {
        let mut state = self.state.borrow_mut();
        if state.epoch != epoch {
            return conversation;
        }

        let conversation_id = conversation.id;
        let inserted = state.conversations.upsert(conversation.clone());
        let stored = state
            .conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or(conversation);
        state.last_error = None;
        drop(state);

        tracing::info!(
            code = CONVERSATION_CREATED,
            conversation_id,
            inserted,
            "conversation ready"
        );
        self.notifier.emit(SyncEvent::ConversationsChanged);
        stored
    }

    fn apply_live(&self, envelope: LiveEnvelope) -> Option<Message> {
        let mut state = self.state.borrow_mut();
        let Some(message) = state.subscription.accept(envelope) else {
            tracing::debug!(
                code = LIVE_EVENT_STALE,
                "dropping live event of a released binding"
            );
            return None;
        };

        let appended = state.messages.append_live(message.clone());
        let known = state.conversations.apply_incoming_message(&message);
        drop(state);

        if !known {
            tracing::debug!(
                code = LIVE_EVENT_UNKNOWN_CONVERSATION,
                conversation_id = message.conversation_id,
                message_id = message.id,
                "live event for a conversation outside the list"
            );
        }
        if appended {
            self.notifier.emit(SyncEvent::MessagesChanged);
        }
        if known {
            self.notifier.emit(SyncEvent::ConversationsChanged);
        }
        Some(message)
    }

    fn fail(&self, operation: &'static str, error: SyncError) -> SyncError {
        tracing::warn!(
            code = OPERATION_FAILED,
            operation,
            error = %error,
            "sync operation failed"
        );

        if error.is_user_visible() {
            self.state.borrow_mut().last_error = Some(error.clone());
            self.notifier.emit(SyncEvent::ErrorRaised(error.to_string()));
        }
        error
    }
}
