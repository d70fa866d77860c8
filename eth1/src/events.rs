use core::{
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
};
use std::{collections::HashMap, sync::Mutex};

use futures::{
    channel::mpsc::{self, UnboundedReceiver},
    Stream, StreamExt as _,
};

/// Explicit fan-out point for one kind of event.
///
/// Every subscriber gets its own unbounded channel. Publishing clones the
/// event into each live channel and drops senders whose subscription has
/// gone away, so abandoned subscriptions cost one failed send, not a leak.
pub struct EventChannel<T> {
    senders: Mutex<HashMap<u64, mpsc::UnboundedSender<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T: Clone> EventChannel<T> {
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.senders
            .lock()
            .expect("event channel mutex is poisoned")
            .insert(id, sender);

        Subscription { id, receiver }
    }

    pub fn publish(&self, event: &T) {
        self.senders
            .lock()
            .expect("event channel mutex is poisoned")
            .retain(|_, sender| sender.unbounded_send(event.clone()).is_ok());
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.senders
            .lock()
            .expect("event channel mutex is poisoned")
            .len()
    }
}

/// Handle to a live subscription. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: u64,
    receiver: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_next_unpin(cx)
    }
}
