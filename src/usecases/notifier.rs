use std::{cell::RefCell, sync::mpsc};

use crate::domain::events::SyncEvent;

/// Fan-out of [`SyncEvent`]s to every live subscriber.
///
/// Subscribers whose receiver was dropped are pruned on the next emit.
#[derive(Debug, Default)]
pub struct SyncNotifier {
    subscribers: RefCell<Vec<mpsc::Sender<SyncEvent>>>,
}

impl SyncNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    pub fn emit(&self, event: SyncEvent) {
        self.subscribers
            .borrow_mut()
            .retain(|sub| sub.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}
