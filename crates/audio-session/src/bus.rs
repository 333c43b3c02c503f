use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use flume::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};

use crate::messages::SessionMsg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BusKind {
    IsActive,
    IsPlaybackActive,
    HeadsetConnected,
}

/// Subscriber bag owned by the session thread.
#[derive(Debug, Default)]
pub(crate) struct SubscriberBus {
    subscribers: HashMap<u64, Sender<bool>>,
}

impl SubscriberBus {
    /// Replays `current` to the new subscriber before it sees any transition.
    pub(crate) fn add(&mut self, subscriber_id: u64, tx: Sender<bool>, current: bool) {
        if tx.send(current).is_err() {
            return;
        }
        self.subscribers.insert(subscriber_id, tx);
    }

    pub(crate) fn remove(&mut self, subscriber_id: u64) {
        self.subscribers.remove(&subscriber_id);
    }

    pub(crate) fn publish(&mut self, value: bool) -> usize {
        let mut delivered = 0usize;
        self.subscribers.retain(|_, tx| match tx.send(value) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        delivered
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}

/// Stream of state values: the current value first, then every transition.
///
/// Dropping the subscription unsubscribes. `unsubscribe` may be called from any thread,
/// including from inside holder callbacks, and any number of times.
#[derive(Debug)]
pub struct Subscription {
    subscriber_id: u64,
    bus: BusKind,
    rx: Receiver<bool>,
    core_sender: Sender<SessionMsg>,
    closed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        subscriber_id: u64,
        bus: BusKind,
        rx: Receiver<bool>,
        core_sender: Sender<SessionMsg>,
    ) -> Self {
        Self {
            subscriber_id,
            bus,
            rx,
            core_sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn try_recv(&self) -> Result<bool, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv(&self) -> Result<bool, RecvError> {
        self.rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<bool, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub async fn recv_async(&self) -> Result<bool, RecvError> {
        self.rx.recv_async().await
    }

    /// Values delivered so far that nobody has read yet.
    pub fn drain(&self) -> Vec<bool> {
        self.rx.try_iter().collect()
    }

    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.core_sender.send(SessionMsg::Unsubscribe {
            bus: self.bus,
            subscriber_id: self.subscriber_id,
        });
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
