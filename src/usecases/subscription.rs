//! Ownership of the single live-event binding.
//!
//! Every binding delivers into one bounded channel shared by all bindings of
//! a manager. Envelopes carry the binding number they were produced under and
//! [`SubscriptionManager::accept`] drops anything not produced by the current
//! binding, so events still queued from a previous conversation never leak
//! into the next one.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::message::Message;

use super::contracts::{PushBroker, SubscriptionHandle};

pub const DEFAULT_LIVE_EVENT_CAPACITY: usize = 256;

const SUBSCRIPTION_SWITCHED: &str = "SYNC_SUBSCRIPTION_SWITCHED";
const SUBSCRIPTION_FAILED: &str = "SYNC_SUBSCRIPTION_FAILED";
const SUBSCRIPTION_CLEARED: &str = "SYNC_SUBSCRIPTION_CLEARED";
const LIVE_EVENT_DROPPED: &str = "SYNC_LIVE_EVENT_DROPPED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEnvelope {
    binding: u64,
    message: Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The message belongs to another conversation and was not queued.
    Foreign,
    /// The binding was released; the broker should forget this sink.
    Closed,
    /// The consumer fell behind and the message was dropped.
    Full,
}

/// Producer half of a live binding, handed to the [`PushBroker`].
#[derive(Debug, Clone)]
pub struct LiveEventSink {
    conversation_id: i64,
    binding: u64,
    open: Arc<AtomicBool>,
    tx: mpsc::Sender<LiveEnvelope>,
}

impl LiveEventSink {
    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    pub fn deliver(&self, message: Message) -> Delivery {
        if !self.is_open() {
            return Delivery::Closed;
        }
        if message.conversation_id != self.conversation_id {
            return Delivery::Foreign;
        }

        match self.tx.try_send(LiveEnvelope {
            binding: self.binding,
            message,
        }) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(envelope)) => {
                tracing::warn!(
                    code = LIVE_EVENT_DROPPED,
                    conversation_id = self.conversation_id,
                    message_id = envelope.message.id,
                    "live event buffer is full; dropping event"
                );
                Delivery::Full
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Consumer half of the live channel.
#[derive(Debug)]
pub struct LiveEvents {
    rx: mpsc::Receiver<LiveEnvelope>,
}

impl LiveEvents {
    pub async fn recv(&mut self) -> Option<LiveEnvelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LiveEnvelope> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Already bound to the requested conversation.
    Unchanged,
    Switched,
    /// The broker refused the subscription; nothing is bound.
    Failed,
}

struct ActiveBinding {
    conversation_id: i64,
    binding: u64,
    handle: SubscriptionHandle,
    open: Arc<AtomicBool>,
}

pub struct SubscriptionManager<B: PushBroker> {
    broker: B,
    tx: mpsc::Sender<LiveEnvelope>,
    active: Option<ActiveBinding>,
    next_binding: u64,
}

impl<B: PushBroker> SubscriptionManager<B> {
    pub fn new(broker: B) -> (Self, LiveEvents) {
        Self::with_capacity(broker, DEFAULT_LIVE_EVENT_CAPACITY)
    }

    pub fn with_capacity(broker: B, capacity: usize) -> (Self, LiveEvents) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let manager = Self {
            broker,
            tx,
            active: None,
            next_binding: 1,
        };

        (manager, LiveEvents { rx })
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Conversation currently bound, if any.
    pub fn active(&self) -> Option<i64> {
        self.active.as_ref().map(|binding| binding.conversation_id)
    }

    /// Moves the live binding to `conversation_id`.
    ///
    /// The previous binding is released before the new subscribe is issued.
    pub fn switch_to(&mut self, conversation_id: i64) -> SwitchOutcome {
        if self.active() == Some(conversation_id) {
            return SwitchOutcome::Unchanged;
        }

        let previous = self.active();
        self.release();

        let binding = self.next_binding;
        self.next_binding += 1;
        let open = Arc::new(AtomicBool::new(true));
        let sink = LiveEventSink {
            conversation_id,
            binding,
            open: Arc::clone(&open),
            tx: self.tx.clone(),
        };

        match self.broker.subscribe(conversation_id, sink) {
            Ok(handle) => {
                self.active = Some(ActiveBinding {
                    conversation_id,
                    binding,
                    handle,
                    open,
                });
                tracing::info!(
                    code = SUBSCRIPTION_SWITCHED,
                    from = ?previous,
                    to = conversation_id,
                    "live subscription switched"
                );
                SwitchOutcome::Switched
            }
            Err(error) => {
                open.store(false, Ordering::Release);
                tracing::warn!(
                    code = SUBSCRIPTION_FAILED,
                    conversation_id,
                    error = %error,
                    "live subscription failed; continuing with history only"
                );
                SwitchOutcome::Failed
            }
        }
    }

    /// Releases the live binding without replacement.
    ///
    /// Returns `true` if a binding was active.
    pub fn clear(&mut self) -> bool {
        let Some(conversation_id) = self.active() else {
            return false;
        };

        self.release();
        tracing::info!(
            code = SUBSCRIPTION_CLEARED,
            conversation_id,
            "live subscription cleared"
        );
        true
    }

    /// Unwraps an envelope produced by the current binding.
    pub fn accept(&self, envelope: LiveEnvelope) -> Option<Message> {
        match &self.active {
            Some(active) if active.binding == envelope.binding => Some(envelope.message),
            _ => None,
        }
    }

    fn release(&mut self) {
        if let Some(binding) = self.active.take() {
            binding.open.store(false, Ordering::Release);
            self.broker.unsubscribe(binding.handle);
        }
    }
}

impl<B: PushBroker> Drop for SubscriptionManager<B> {
    fn drop(&mut self) {
        self.release();
    }
}
