use std::collections::{HashMap, HashSet};

use super::{conversation::Conversation, message::Message, page::PageCursor};

const DEFAULT_CONVERSATIONS_PER_PAGE: u32 = 20;

/// Known conversations, most recent first, with their unread counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    cursor: PageCursor,
    selected: Option<i64>,
    /// Ids inserted through `upsert` that no server list has returned yet.
    locally_created: HashSet<i64>,
    /// Live message ids already counted as unread, per conversation, since it
    /// was last read.
    counted_unread: HashMap<i64, HashSet<i64>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            cursor: PageCursor::first(DEFAULT_CONVERSATIONS_PER_PAGE),
            selected: None,
            locally_created: HashSet::new(),
            counted_unread: HashMap::new(),
        }
    }
}

impl ConversationStore {
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn get(&self, conversation_id: i64) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Marks `conversation_id` as the open conversation and clears its unread
    /// counter. `None` deselects.
    pub fn set_selected(&mut self, conversation_id: Option<i64>) {
        self.selected = conversation_id;
        if let Some(id) = conversation_id {
            self.mark_read(id);
        }
    }

    /// Replaces the visible set with a freshly fetched first page.
    ///
    /// Locally created conversations the server does not know about yet stay
    /// at the front of the list.
    pub fn replace_list(&mut self, conversations: Vec<Conversation>, cursor: PageCursor) {
        let mut previous = std::mem::take(&mut self.conversations);
        let mut next: Vec<Conversation> = Vec::with_capacity(conversations.len());

        for incoming in conversations {
            if next.iter().any(|c| c.id == incoming.id) {
                continue;
            }
            self.locally_created.remove(&incoming.id);

            let merged = match previous.iter().position(|c| c.id == incoming.id) {
                Some(index) => {
                    let mut existing = previous.remove(index);
                    merge_server_fields(&mut existing, incoming);
                    existing
                }
                None => incoming,
            };
            next.push(merged);
        }

        let pending: Vec<Conversation> = previous
            .into_iter()
            .filter(|c| self.locally_created.contains(&c.id))
            .collect();
        self.locally_created
            .retain(|id| pending.iter().any(|c| c.id == *id));

        self.conversations = pending;
        self.conversations.extend(next);
        self.cursor = cursor;
        self.enforce_selected_read();
    }

    /// Merges a later page of the list, appending conversations not seen yet.
    pub fn append_page(&mut self, conversations: Vec<Conversation>, cursor: PageCursor) {
        for incoming in conversations {
            self.locally_created.remove(&incoming.id);
            match self.conversations.iter_mut().find(|c| c.id == incoming.id) {
                Some(existing) => merge_server_fields(existing, incoming),
                None => self.conversations.push(incoming),
            }
        }

        self.cursor = cursor;
        self.enforce_selected_read();
    }

    /// Inserts at the front when absent, otherwise merges in place.
    ///
    /// Returns `true` when the conversation was inserted.
    pub fn upsert(&mut self, conversation: Conversation) -> bool {
        let inserted = match self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation.id)
        {
            Some(existing) => {
                merge_server_fields(existing, conversation);
                false
            }
            None => {
                self.locally_created.insert(conversation.id);
                self.conversations.insert(0, conversation);
                true
            }
        };

        self.enforce_selected_read();
        inserted
    }

    /// Records a live message for its conversation.
    ///
    /// A redelivered message counts as unread at most once until the
    /// conversation is read. Returns `false` when the conversation is unknown.
    pub fn apply_incoming_message(&mut self, message: &Message) -> bool {
        let is_selected = self.selected == Some(message.conversation_id);
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
        else {
            return false;
        };

        let is_last = conversation
            .last_message
            .as_ref()
            .is_some_and(|last| last.id == message.id);
        conversation.advance_last_message(message);

        if is_selected {
            conversation.unread_count = 0;
        } else {
            let counted = self
                .counted_unread
                .entry(message.conversation_id)
                .or_default();
            if counted.insert(message.id) && !is_last {
                conversation.unread_count = conversation.unread_count.saturating_add(1);
            }
        }

        true
    }

    /// Advances `last_message` from loaded history, leaving unread untouched.
    pub fn record_history_message(&mut self, message: &Message) -> bool {
        self.conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
            .is_some_and(|c| c.advance_last_message(message))
    }

    pub fn mark_read(&mut self, conversation_id: i64) {
        self.counted_unread.remove(&conversation_id);
        if let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.unread_count = 0;
        }
    }

    pub fn total_unread(&self) -> u64 {
        self.conversations
            .iter()
            .map(|c| u64::from(c.unread_count))
            .sum()
    }

    pub fn unread_conversations(&self) -> Vec<&Conversation> {
        self.conversations
            .iter()
            .filter(|c| c.unread_count > 0)
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn enforce_selected_read(&mut self) {
        if let Some(id) = self.selected {
            self.mark_read(id);
        }
    }
}

fn merge_server_fields(existing: &mut Conversation, incoming: Conversation) {
    existing.kind = incoming.kind;
    if incoming.display_name.is_some() {
        existing.display_name = incoming.display_name;
    }
    if let Some(message) = incoming.last_message.as_ref() {
        existing.advance_last_message(message);
    }
    existing.unread_count = incoming.unread_count;
}
