use std::collections::HashSet;

use super::{message::Message, page::PageCursor};

/// Message log of the open conversation, ascending by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageStore {
    conversation_id: Option<i64>,
    messages: Vec<Message>,
    cursor: Option<PageCursor>,
}

impl MessageStore {
    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn cursor(&self) -> Option<PageCursor> {
        self.cursor
    }

    pub fn contains(&self, message_id: i64) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Whether the server holds messages older than the loaded ones.
    pub fn has_older(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor.has_next())
    }

    /// Page number to request for the next batch of older messages.
    pub fn next_older_page(&self) -> Option<u32> {
        self.cursor.and_then(|cursor| cursor.next_page())
    }

    /// Discards the current log and starts tracking `conversation_id`.
    pub fn open(&mut self, conversation_id: i64) {
        self.conversation_id = Some(conversation_id);
        self.messages.clear();
        self.cursor = None;
    }

    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.messages.clear();
        self.cursor = None;
    }

    /// Merges one fetched history page.
    ///
    /// Page 1 replaces the log, keeping only live messages newer than the
    /// page that arrived while it was in flight. Later pages hold older
    /// messages and are placed before the current earliest entry. Returns
    /// `false` if the page belongs to another conversation.
    pub fn load_page(
        &mut self,
        conversation_id: i64,
        messages: Vec<Message>,
        cursor: PageCursor,
        page_number: u32,
    ) -> bool {
        if self.conversation_id != Some(conversation_id) {
            return false;
        }

        let mut seen = HashSet::new();
        let mut page: Vec<Message> = messages
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id && seen.insert(m.id))
            .collect();

        if page_number <= 1 {
            let newest = page.iter().map(|m| m.created_at).max();
            let live_tail = std::mem::take(&mut self.messages)
                .into_iter()
                .filter(|m| {
                    !seen.contains(&m.id) && newest.map_or(true, |at| m.created_at >= at)
                });
            page.extend(live_tail);
            self.messages = page;
        } else {
            page.retain(|m| !self.contains(m.id));
            page.append(&mut self.messages);
            self.messages = page;
        }

        self.messages.sort_by_key(|m| m.created_at);
        self.cursor = Some(cursor);
        true
    }

    /// Inserts a pushed message in order.
    ///
    /// Returns `false` for duplicates and messages of other conversations.
    pub fn append_live(&mut self, message: Message) -> bool {
        if self.conversation_id != Some(message.conversation_id) || self.contains(message.id) {
            return false;
        }

        match self.messages.last() {
            Some(last) if message.created_at < last.created_at => {
                let index = self
                    .messages
                    .partition_point(|m| m.created_at <= message.created_at);
                self.messages.insert(index, message);
            }
            _ => self.messages.push(message),
        }

        true
    }

    /// Inserts a message acknowledged by the server after a local send.
    pub fn append_sent(&mut self, message: Message) -> bool {
        self.append_live(message)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::message::SenderKind;

    fn message(id: i64, secs: i64) -> Message {
        Message {
            id,
            conversation_id: 7,
            sender_id: 1,
            sender_kind: SenderKind::User,
            content: format!("message {id}"),
            created_at: Utc.timestamp_opt(secs, 0).single().expect("ts"),
        }
    }

    fn cursor(current_page: u32, last_page: u32) -> PageCursor {
        PageCursor {
            current_page,
            per_page: 50,
            total: 120,
            last_page,
        }
    }

    fn ids(store: &MessageStore) -> Vec<i64> {
        store.messages().iter().map(|m| m.id).collect()
    }

    fn is_sorted(store: &MessageStore) -> bool {
        store
            .messages()
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at)
    }

    fn opened() -> MessageStore {
        let mut store = MessageStore::default();
        store.open(7);
        store
    }

    #[test]
    fn default_store_tracks_nothing() {
        let store = MessageStore::default();

        assert_eq!(store.conversation_id(), None);
        assert!(store.messages().is_empty());
        assert!(!store.has_older());
    }

    #[test]
    fn first_page_replaces_log() {
        let mut store = opened();
        store.load_page(7, vec![message(1, 10), message(2, 20)], cursor(1, 3), 1);

        store.load_page(7, vec![message(5, 50), message(6, 60)], cursor(1, 3), 1);

        assert_eq!(ids(&store), vec![5, 6]);
        assert_eq!(store.next_older_page(), Some(2));
    }

    #[test]
    fn later_page_prepends_older_messages() {
        let mut store = opened();
        store.load_page(7, vec![message(5, 50), message(6, 60)], cursor(1, 2), 1);

        store.load_page(7, vec![message(3, 30), message(4, 40)], cursor(2, 2), 2);

        assert_eq!(ids(&store), vec![3, 4, 5, 6]);
        assert!(!store.has_older());
    }

    #[test]
    fn later_page_skips_messages_already_loaded() {
        let mut store = opened();
        store.load_page(7, vec![message(4, 40), message(5, 50)], cursor(1, 2), 1);

        store.load_page(7, vec![message(3, 30), message(4, 40)], cursor(2, 2), 2);

        assert_eq!(ids(&store), vec![3, 4, 5]);
    }

    #[test]
    fn page_for_other_conversation_is_rejected() {
        let mut store = opened();

        assert!(!store.load_page(8, vec![message(1, 10)], cursor(1, 1), 1));
        assert!(store.messages().is_empty());
        assert_eq!(store.cursor(), None);
    }

    #[test]
    fn first_page_keeps_newer_live_messages_received_while_loading() {
        let mut store = opened();
        store.append_live(message(9, 90));
        store.append_live(message(2, 20));

        store.load_page(7, vec![message(1, 10), message(2, 20)], cursor(1, 1), 1);

        assert_eq!(ids(&store), vec![1, 2, 9]);
    }

    #[test]
    fn append_live_adds_newer_message_at_tail() {
        let mut store = opened();
        store.load_page(7, vec![message(1, 10)], cursor(1, 1), 1);

        assert!(store.append_live(message(2, 20)));

        assert_eq!(ids(&store), vec![1, 2]);
    }

    #[test]
    fn append_live_inserts_out_of_order_message_in_sorted_position() {
        let mut store = opened();
        store.load_page(7, vec![message(1, 10), message(3, 30)], cursor(1, 1), 1);

        store.append_live(message(2, 20));

        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert!(is_sorted(&store));
    }

    #[test]
    fn append_live_places_equal_timestamp_after_existing() {
        let mut store = opened();
        store.load_page(7, vec![message(1, 10), message(3, 30)], cursor(1, 1), 1);

        store.append_live(message(2, 10));

        assert_eq!(ids(&store), vec![1, 2, 3]);
    }

    #[test]
    fn append_live_ignores_duplicate_id() {
        let mut store = opened();
        store.load_page(7, vec![message(1, 10)], cursor(1, 1), 1);

        assert!(!store.append_live(message(1, 10)));

        assert_eq!(ids(&store), vec![1]);
    }

    #[test]
    fn history_and_live_echo_keep_single_copy() {
        let mut store = opened();
        store.append_sent(message(4, 40));

        store.append_live(message(4, 40));
        store.load_page(7, vec![message(3, 30), message(4, 40)], cursor(1, 1), 1);

        assert_eq!(ids(&store), vec![3, 4]);
    }

    #[test]
    fn append_live_ignores_other_conversations() {
        let mut store = opened();
        let mut foreign = message(1, 10);
        foreign.conversation_id = 8;

        assert!(!store.append_live(foreign));
        assert!(store.messages().is_empty());
    }

    #[test]
    fn mixed_sequences_stay_sorted() {
        let mut store = opened();
        store.load_page(7, vec![message(10, 100), message(12, 120)], cursor(1, 3), 1);
        store.append_live(message(11, 110));
        store.load_page(7, vec![message(5, 50), message(8, 80)], cursor(2, 3), 2);
        store.append_live(message(6, 60));
        store.append_live(message(13, 130));
        store.load_page(7, vec![message(1, 10), message(7, 70)], cursor(3, 3), 3);

        assert!(is_sorted(&store));
        assert_eq!(ids(&store), vec![1, 5, 6, 7, 8, 10, 11, 12, 13]);
    }

    #[test]
    fn open_discards_previous_conversation() {
        let mut store = opened();
        store.load_page(7, vec![message(1, 10)], cursor(1, 1), 1);

        store.open(8);

        assert_eq!(store.conversation_id(), Some(8));
        assert!(store.messages().is_empty());
        assert_eq!(store.cursor(), None);
    }
}
