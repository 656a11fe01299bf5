use serde::{Deserialize, Serialize};

/// Pagination position of one paginated collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl PageCursor {
    pub fn first(per_page: u32) -> Self {
        Self {
            current_page: 1,
            per_page,
            total: 0,
            last_page: 1,
        }
    }

    /// Whether another page exists after `current_page`.
    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn next_page(&self) -> Option<u32> {
        self.has_next().then(|| self.current_page + 1)
    }
}
