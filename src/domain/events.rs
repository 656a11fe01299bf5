/// Selection lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Unselected,
    /// History page 1 of the conversation is in flight.
    Loading { conversation_id: i64 },
    Active { conversation_id: i64 },
}

impl SelectionState {
    pub fn conversation_id(self) -> Option<i64> {
        match self {
            Self::Unselected => None,
            Self::Loading { conversation_id } | Self::Active { conversation_id } => {
                Some(conversation_id)
            }
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Self::Unselected => "UNSELECTED",
            Self::Loading { .. } => "LOADING",
            Self::Active { .. } => "ACTIVE",
        }
    }
}

/// Change notification emitted after each state mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ConversationsChanged,
    MessagesChanged,
    SelectionChanged(SelectionState),
    /// The live binding moved to a conversation, or was dropped.
    LiveBindingChanged(Option<i64>),
    ErrorRaised(String),
}
