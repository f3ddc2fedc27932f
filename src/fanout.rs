//! Selective fan-out of processed readings to live observers.
//!
//! The transport layer registers a connection handle per observer and tells
//! the router which device it is subscribed to. `broadcast` pushes a payload
//! to every open connection watching that device. Closed connections are
//! skipped but stay registered until the transport unregisters them.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// ---

pub type ConnectionId = Uuid;

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("connection closed")]
    Closed,
}

/// An observer connection as seen by the router.
///
/// `send` must not block: implementations hand the payload to a writer task
/// or buffer and return.
pub trait ObserverConnection: Send + Sync {
    fn is_open(&self) -> bool;
    fn send(&self, payload: &str) -> Result<(), FanoutError>;
}

/// Connection backed by an unbounded channel drained by a socket writer.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelConnection {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        ChannelConnection { tx }
    }
}

impl ObserverConnection for ChannelConnection {
    // ---
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, payload: &str) -> Result<(), FanoutError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| FanoutError::Closed)
    }
}

struct Subscriber {
    device_id: Option<String>,
    conn: Arc<dyn ObserverConnection>,
}

#[derive(Default)]
pub struct FanoutRouter {
    subscribers: DashMap<ConnectionId, Subscriber>,
}

impl FanoutRouter {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: Arc<dyn ObserverConnection>) -> ConnectionId {
        // ---
        let id = Uuid::new_v4();
        self.subscribers.insert(
            id,
            Subscriber {
                device_id: None,
                conn,
            },
        );
        id
    }

    /// Point a registered connection at `device_id`, replacing any previous
    /// subscription. Returns false for an unknown connection.
    pub fn subscribe(&self, id: ConnectionId, device_id: &str) -> bool {
        match self.subscribers.get_mut(&id) {
            Some(mut sub) => {
                sub.device_id = Some(device_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.subscribers.remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Best-effort delivery; returns how many connections accepted the
    /// payload.
    pub fn broadcast(&self, device_id: &str, payload: &str) -> usize {
        // ---
        let mut delivered = 0;
        for entry in self.subscribers.iter() {
            let sub = entry.value();
            if sub.device_id.as_deref() != Some(device_id) || !sub.conn.is_open() {
                continue;
            }
            match sub.conn.send(payload) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::debug!("Skipping observer {}: {}", entry.key(), e),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConnection {
        closed: AtomicBool,
        received: Mutex<Vec<String>>,
    }

    impl ObserverConnection for RecordingConnection {
        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn send(&self, payload: &str) -> Result<(), FanoutError> {
            self.received.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    fn received(conn: &RecordingConnection) -> Vec<String> {
        conn.received.lock().unwrap().clone()
    }

    #[test]
    fn test_broadcast_reaches_matching_subscribers_only() {
        // ---
        let router = FanoutRouter::new();
        let a = Arc::new(RecordingConnection::default());
        let b = Arc::new(RecordingConnection::default());
        let idle = Arc::new(RecordingConnection::default());

        let id_a = router.register(a.clone());
        let id_b = router.register(b.clone());
        router.register(idle.clone());
        router.subscribe(id_a, "d1");
        router.subscribe(id_b, "d2");

        assert_eq!(router.broadcast("d1", "p1"), 1);
        assert_eq!(received(&a), vec!["p1"]);
        assert!(received(&b).is_empty());
        assert!(received(&idle).is_empty());
    }

    #[test]
    fn test_closed_connections_are_skipped_not_removed() {
        // ---
        let router = FanoutRouter::new();
        let open = Arc::new(RecordingConnection::default());
        let closed = Arc::new(RecordingConnection::default());
        closed.closed.store(true, Ordering::SeqCst);

        let id_open = router.register(open.clone());
        let id_closed = router.register(closed.clone());
        router.subscribe(id_open, "d1");
        router.subscribe(id_closed, "d1");

        assert_eq!(router.broadcast("d1", "p"), 1);
        assert!(received(&closed).is_empty());
        assert_eq!(router.connection_count(), 2);

        router.unregister(id_closed);
        assert_eq!(router.connection_count(), 1);
    }

    #[test]
    fn test_resubscribe_moves_connection() {
        // ---
        let router = FanoutRouter::new();
        let conn = Arc::new(RecordingConnection::default());
        let id = router.register(conn.clone());

        assert!(router.subscribe(id, "d1"));
        assert!(router.subscribe(id, "d2"));
        assert_eq!(router.broadcast("d1", "old"), 0);
        assert_eq!(router.broadcast("d2", "new"), 1);
        assert_eq!(received(&conn), vec!["new"]);
        assert!(!router.subscribe(Uuid::new_v4(), "d1"));
    }

    #[test]
    fn test_channel_connection_reports_closed_receiver() {
        // ---
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = ChannelConnection::new(tx);

        assert!(conn.is_open());
        conn.send("hello").unwrap();
        assert_eq!(tokio_test::block_on(rx.recv()).as_deref(), Some("hello"));

        drop(rx);
        assert!(!conn.is_open());
        assert!(conn.send("lost").is_err());
    }
}
