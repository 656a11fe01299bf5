use crate::domain::message::SenderKind;

use super::{
    contracts::{MessagePage, RemoteGateway},
    error::SyncError,
};

pub const DEFAULT_MESSAGES_PAGE_SIZE: u32 = 50;
const MAX_MESSAGES_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadMessagesQuery {
    pub conversation_id: i64,
    pub page: u32,
    pub per_page: u32,
}

impl LoadMessagesQuery {
    pub fn new(conversation_id: i64) -> Self {
        Self {
            conversation_id,
            page: 1,
            per_page: DEFAULT_MESSAGES_PAGE_SIZE,
        }
    }

    pub fn with_page(self, page: u32) -> Self {
        Self { page, ..self }
    }

    pub fn with_per_page(self, per_page: u32) -> Self {
        Self { per_page, ..self }
    }

    fn normalized_page(&self) -> u32 {
        self.page.max(1)
    }

    fn normalized_per_page(&self) -> u32 {
        normalize_per_page(self.per_page)
    }
}

/// History of the private conversation with a user, looked up by peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadUserHistoryQuery {
    pub user_id: i64,
    pub user_kind: SenderKind,
    pub page: u32,
    pub per_page: u32,
}

impl LoadUserHistoryQuery {
    pub fn new(user_id: i64, user_kind: SenderKind) -> Self {
        Self {
            user_id,
            user_kind,
            page: 1,
            per_page: DEFAULT_MESSAGES_PAGE_SIZE,
        }
    }

    pub fn with_page(self, page: u32) -> Self {
        Self { page, ..self }
    }

    pub fn with_per_page(self, per_page: u32) -> Self {
        Self { per_page, ..self }
    }
}

fn normalize_per_page(per_page: u32) -> u32 {
    match per_page {
        0 => DEFAULT_MESSAGES_PAGE_SIZE,
        value if value > MAX_MESSAGES_PAGE_SIZE => MAX_MESSAGES_PAGE_SIZE,
        value => value,
    }
}

fn sort_ascending(page: &mut MessagePage) -> bool {
    let sorted = page
        .messages
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at);
    if !sorted {
        page.messages.sort_by_key(|m| m.created_at);
    }
    !sorted
}

/// Fetches one page of history, oldest message first within the page.
pub async fn load_messages<G>(gateway: &G, query: LoadMessagesQuery) -> Result<MessagePage, SyncError>
where
    G: RemoteGateway + ?Sized,
{
    let mut page = gateway
        .list_messages(
            query.conversation_id,
            query.normalized_page(),
            query.normalized_per_page(),
        )
        .await?;

    if sort_ascending(&mut page) {
        tracing::debug!(
            conversation_id = query.conversation_id,
            page = query.normalized_page(),
            "history page arrived out of order; sorted"
        );
    }

    Ok(page)
}

/// Fetches one page of the history shared with a user.
///
/// An empty page means no private conversation with that user exists yet.
pub async fn load_messages_with_user<G>(
    gateway: &G,
    query: LoadUserHistoryQuery,
) -> Result<MessagePage, SyncError>
where
    G: RemoteGateway + ?Sized,
{
    let page_number = query.page.max(1);
    let mut page = gateway
        .list_messages_with_user(
            query.user_id,
            query.user_kind,
            page_number,
            normalize_per_page(query.per_page),
        )
        .await?;

    if sort_ascending(&mut page) {
        tracing::debug!(
            user_id = query.user_id,
            page = page_number,
            "user history page arrived out of order; sorted"
        );
    }

    Ok(page)
}
