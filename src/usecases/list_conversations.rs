use super::{
    contracts::{ConversationPage, RemoteGateway},
    error::SyncError,
};

pub const DEFAULT_CONVERSATIONS_PAGE_SIZE: u32 = 20;
const MAX_CONVERSATIONS_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListConversationsQuery {
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListConversationsQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_CONVERSATIONS_PAGE_SIZE,
        }
    }
}

impl ListConversationsQuery {
    pub fn page(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    fn normalized_page(&self) -> u32 {
        self.page.max(1)
    }

    fn normalized_per_page(&self) -> u32 {
        match self.per_page {
            0 => DEFAULT_CONVERSATIONS_PAGE_SIZE,
            value if value > MAX_CONVERSATIONS_PAGE_SIZE => MAX_CONVERSATIONS_PAGE_SIZE,
            value => value,
        }
    }
}

pub async fn list_conversations<G>(
    gateway: &G,
    query: ListConversationsQuery,
) -> Result<ConversationPage, SyncError>
where
    G: RemoteGateway + ?Sized,
{
    let page = gateway
        .list_conversations(query.normalized_page(), query.normalized_per_page())
        .await?;

    Ok(page)
}
