//! In-memory transport connecting two peers inside one process.
//!
//! Used by the demo binary and by the session tests in place of a real
//! radio link. Each peer owns an inbox; sending encodes the message and
//! publishes it on the other peer's inbox.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info};

use tapchat_shared::Message;

use crate::comm::{Communication, ConnectionEvent};
use crate::error::TransportError;

type Subscribers = Vec<mpsc::UnboundedSender<ConnectionEvent>>;

/// Fan-out of one peer's signals to its current subscribers.
#[derive(Debug, Clone, Default)]
struct Inbox {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl Inbox {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Returns how many subscribers received `event`.
    fn publish(&self, event: ConnectionEvent) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    fn listener_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    // Nothing under the lock panics, so a poisoned list is still whole.
    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// One end of a loopback link.
#[derive(Debug)]
pub struct LoopbackPeer {
    label: String,
    inbox: Inbox,
    remote_inbox: Inbox,
    connected: Arc<AtomicBool>,
    sent: AtomicUsize,
}

/// Create two connected peers.
pub fn pair(a: &str, b: &str) -> (LoopbackPeer, LoopbackPeer) {
    let a_inbox = Inbox::default();
    let b_inbox = Inbox::default();
    let connected = Arc::new(AtomicBool::new(true));

    let peer_a = LoopbackPeer {
        label: a.to_string(),
        inbox: a_inbox.clone(),
        remote_inbox: b_inbox.clone(),
        connected: connected.clone(),
        sent: AtomicUsize::new(0),
    };
    let peer_b = LoopbackPeer {
        label: b.to_string(),
        inbox: b_inbox,
        remote_inbox: a_inbox,
        connected,
        sent: AtomicUsize::new(0),
    };
    (peer_a, peer_b)
}

impl LoopbackPeer {
    /// Number of payloads this peer has successfully sent.
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on this peer's signals.
    pub fn listener_count(&self) -> usize {
        self.inbox.listener_count()
    }

    /// Deliver a raw payload to this peer as if the remote had sent it.
    /// Returns whether anyone was listening.
    pub fn inject(&self, payload: Bytes) -> bool {
        self.inbox
            .publish(ConnectionEvent::MessageReceived(payload))
            > 0
    }

    /// Drop the link from outside, as a lost radio connection would.
    /// Both ends are told.
    pub fn sever(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(peer = %self.label, "Loopback link severed");
            self.inbox.publish(ConnectionEvent::Interrupted);
            self.remote_inbox.publish(ConnectionEvent::Interrupted);
        }
    }
}

#[async_trait]
impl Communication for LoopbackPeer {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        self.inbox.subscribe()
    }

    async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError("link is down".to_string()));
        }

        let payload = Bytes::from(message.encode());
        let len = payload.len();
        if self
            .remote_inbox
            .publish(ConnectionEvent::MessageReceived(payload))
            == 0
        {
            return Err(TransportError("peer is not listening".to_string()));
        }

        self.sent.fetch_add(1, Ordering::SeqCst);
        debug!(peer = %self.label, len, "Loopback payload sent");
        Ok(())
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(peer = %self.label, "Loopback disconnect requested");
            self.remote_inbox.publish(ConnectionEvent::Interrupted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_other_peer() {
        let (a, b) = pair("a", "b");
        let mut rx = b.subscribe();

        let m = Message::outbound("Alice", "hi");
        a.send_message(&m).await.unwrap();

        match rx.recv().await.unwrap() {
            ConnectionEvent::MessageReceived(payload) => {
                assert_eq!(Message::decode(&payload).unwrap(), m);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(a.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_interrupts_remote() {
        let (a, b) = pair("a", "b");
        let mut a_rx = a.subscribe();
        let mut b_rx = b.subscribe();

        a.disconnect();
        a.disconnect();

        assert!(!a.is_connected());
        assert!(!b.is_connected());
        assert!(matches!(b_rx.recv().await, Some(ConnectionEvent::Interrupted)));
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_after_disconnect_fails() {
        let (a, b) = pair("a", "b");
        let _rx = b.subscribe();
        b.disconnect();

        let err = a.send_message(&Message::outbound("Alice", "late")).await;
        assert!(err.is_err());
        assert_eq!(a.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_send_without_listener_fails() {
        let (a, _b) = pair("a", "b");
        assert!(a.send_message(&Message::outbound("Alice", "hi")).await.is_err());
    }

    #[tokio::test]
    async fn test_burst_is_not_dropped() {
        let (a, b) = pair("a", "b");
        let mut rx = b.subscribe();

        for i in 0..500 {
            a.send_message(&Message::outbound("Alice", format!("m{i}")))
                .await
                .unwrap();
        }

        for i in 0..500 {
            match rx.recv().await {
                Some(ConnectionEvent::MessageReceived(payload)) => {
                    assert_eq!(Message::decode(&payload).unwrap().text, format!("m{i}"));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_dropped_receiver_unsubscribes() {
        let (_a, b) = pair("a", "b");
        let rx = b.subscribe();
        assert_eq!(b.listener_count(), 1);

        drop(rx);
        assert_eq!(b.listener_count(), 0);
        assert!(!b.inject(Bytes::from_static(b"x")));
    }
}
