use std::{collections::BTreeMap, sync::Mutex};

use crate::{
    domain::message::Message,
    usecases::{
        contracts::{PushBroker, PushError, SubscriptionHandle},
        subscription::{Delivery, LiveEventSink},
    },
};

const PUSH_SUBSCRIBED: &str = "PUSH_LOCAL_SUBSCRIBED";
const PUSH_UNSUBSCRIBED: &str = "PUSH_LOCAL_UNSUBSCRIBED";
const PUSH_SINK_PRUNED: &str = "PUSH_LOCAL_SINK_PRUNED";

/// In-process push hub.
///
/// Producers call [`LocalPushBroker::publish`] from any thread; each message
/// is routed to the sinks subscribed to its conversation.
#[derive(Debug, Default)]
pub struct LocalPushBroker {
    inner: Mutex<LocalPushState>,
}

#[derive(Debug, Default)]
struct LocalPushState {
    next_handle: u64,
    subscriptions: BTreeMap<u64, LiveEventSink>,
}

impl LocalPushBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `message` to its conversation's sinks and returns how many
    /// accepted it.
    pub fn publish(&self, message: Message) -> usize {
        let Ok(mut state) = self.inner.lock() else {
            return 0;
        };

        let mut delivered = 0;
        state.subscriptions.retain(|handle, sink| {
            if sink.conversation_id() != message.conversation_id {
                return true;
            }

            match sink.deliver(message.clone()) {
                Delivery::Delivered => {
                    delivered += 1;
                    true
                }
                Delivery::Full | Delivery::Foreign => true,
                Delivery::Closed => {
                    tracing::debug!(
                        code = PUSH_SINK_PRUNED,
                        handle = *handle,
                        "pruning closed live sink"
                    );
                    false
                }
            }
        });

        delivered
    }

    /// Conversations with at least one subscription, ascending.
    pub fn active_conversations(&self) -> Vec<i64> {
        let Ok(state) = self.inner.lock() else {
            return Vec::new();
        };

        let mut ids: Vec<i64> = state
            .subscriptions
            .values()
            .map(LiveEventSink::conversation_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn sink_for(&self, conversation_id: i64) -> Option<LiveEventSink> {
        let state = self.inner.lock().ok()?;
        state
            .subscriptions
            .values()
            .find(|sink| sink.conversation_id() == conversation_id)
            .cloned()
    }
}

impl PushBroker for LocalPushBroker {
    fn subscribe(
        &self,
        conversation_id: i64,
        sink: LiveEventSink,
    ) -> Result<SubscriptionHandle, PushError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| PushError::Unavailable("local push hub lock poisoned".to_owned()))?;

        state.next_handle += 1;
        let handle = state.next_handle;
        state.subscriptions.insert(handle, sink);

        tracing::debug!(
            code = PUSH_SUBSCRIBED,
            handle,
            conversation_id,
            "local push subscription added"
        );
        Ok(SubscriptionHandle(handle))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Ok(mut state) = self.inner.lock() {
            if state.subscriptions.remove(&handle.0).is_some() {
                tracing::debug!(
                    code = PUSH_UNSUBSCRIBED,
                    handle = handle.0,
                    "local push subscription removed"
                );
            }
        }
    }
}
