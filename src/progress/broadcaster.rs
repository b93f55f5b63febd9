//! Connection registry with per-job and broadcast subscriptions.

use super::connection::{Connection, ConnectionId};
use super::event::ProgressEvent;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Arc<dyn Connection>>,
    /// job id -> subscribers; never holds an empty set
    jobs: HashMap<String, HashSet<ConnectionId>>,
    /// subscribers of the "all jobs" channel
    broadcast: HashSet<ConnectionId>,
}

impl Registry {
    fn resolve<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ConnectionId>,
    ) -> Vec<Arc<dyn Connection>> {
        ids.into_iter()
            .filter_map(|id| self.connections.get(id).cloned())
            .collect()
    }

    fn remove(&mut self, id: ConnectionId) -> bool {
        let known = self.connections.remove(&id).is_some();
        self.broadcast.remove(&id);
        self.jobs.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        known
    }
}

/// Delivers progress messages to subscribed connections.
///
/// Membership changes happen under one lock. Publishing copies the recipients
/// under the lock, serialises and sends outside it, then disconnects every
/// connection whose delivery failed.
#[derive(Default)]
pub struct ProgressBroadcaster {
    registry: Mutex<Registry>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection in the active set
    pub fn connect(&self, connection: Arc<dyn Connection>) -> ConnectionId {
        let id = connection.id();
        self.lock().connections.insert(id, connection);
        tracing::debug!("Connection {id} registered");
        id
    }

    /// Add `connection` to `job_id`'s subscribers. False if the connection isn't registered.
    pub fn subscribe(&self, connection: ConnectionId, job_id: &str) -> bool {
        let mut registry = self.lock();
        if !registry.connections.contains_key(&connection) {
            return false;
        }
        registry
            .jobs
            .entry(job_id.to_owned())
            .or_default()
            .insert(connection);
        true
    }

    pub fn unsubscribe(&self, connection: ConnectionId, job_id: &str) {
        let mut registry = self.lock();
        if let Some(members) = registry.jobs.get_mut(job_id) {
            members.remove(&connection);
            if members.is_empty() {
                registry.jobs.remove(job_id);
            }
        }
    }

    /// Join the broadcast channel. False if the connection isn't registered.
    pub fn subscribe_all(&self, connection: ConnectionId) -> bool {
        let mut registry = self.lock();
        if !registry.connections.contains_key(&connection) {
            return false;
        }
        registry.broadcast.insert(connection);
        true
    }

    pub fn unsubscribe_all(&self, connection: ConnectionId) {
        self.lock().broadcast.remove(&connection);
    }

    /// Forget a connection and all its subscriptions. Returns whether it was registered.
    pub fn disconnect(&self, connection: ConnectionId) -> bool {
        let removed = self.lock().remove(connection);
        if removed {
            tracing::debug!("Connection {connection} disconnected");
        }
        removed
    }

    /// Send `event` to the subscribers of `job_id`. Returns the number of successful deliveries.
    pub fn publish(&self, job_id: &str, event: &ProgressEvent) -> usize {
        let recipients = {
            let registry = self.lock();
            match registry.jobs.get(job_id) {
                Some(members) => registry.resolve(members),
                None => return 0,
            }
        };
        match event.to_json() {
            Ok(text) => self.deliver(&recipients, &text),
            Err(e) => {
                tracing::error!("Failed to serialise progress event for job {job_id}: {e}");
                0
            }
        }
    }

    /// Send `message` to every broadcast channel subscriber
    pub fn publish_all(&self, message: &Value) -> usize {
        let recipients = {
            let registry = self.lock();
            registry.resolve(&registry.broadcast)
        };
        if recipients.is_empty() {
            return 0;
        }
        self.deliver(&recipients, &message.to_string())
    }

    /// Send directly to one connection, disconnecting it on failure
    pub fn send_to(&self, connection: ConnectionId, text: &str) -> bool {
        let target = self.lock().connections.get(&connection).cloned();
        match target {
            Some(target) => self.deliver(&[target], text) == 1,
            None => false,
        }
    }

    fn deliver(&self, recipients: &[Arc<dyn Connection>], text: &str) -> usize {
        let mut failed = Vec::new();
        let mut delivered = 0;
        for connection in recipients {
            match connection.send(text) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!("{e}");
                    failed.push(connection.id());
                }
            }
        }
        for id in failed {
            self.disconnect(id);
        }
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn subscriber_count(&self, job_id: &str) -> usize {
        self.lock().jobs.get(job_id).map_or(0, HashSet::len)
    }

    pub fn broadcast_count(&self) -> usize {
        self.lock().broadcast.len()
    }
}

impl fmt::Debug for ProgressBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("ProgressBroadcaster")
            .field("connections", &registry.connections.len())
            .field("jobs", &registry.jobs.len())
            .field("broadcast", &registry.broadcast.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::connection::{ChannelConnection, DeliveryError};
    use crate::progress::event::ProgressEvent;
    use serde_json::json;

    struct BrokenConnection(ConnectionId);

    impl Connection for BrokenConnection {
        fn id(&self) -> ConnectionId {
            self.0
        }

        fn send(&self, _: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError {
                connection: self.0,
                reason: "socket closed".to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn test_job_and_broadcast_isolation() {
        let broadcaster = ProgressBroadcaster::new();
        let (c1, mut rx1) = ChannelConnection::new();
        let (c2, mut rx2) = ChannelConnection::new();
        let id1 = broadcaster.connect(c1);
        let id2 = broadcaster.connect(c2);
        assert!(broadcaster.subscribe(id1, "j1"));
        assert!(broadcaster.subscribe_all(id2));

        assert_eq!(broadcaster.publish("j1", &ProgressEvent::not_found("j1")), 1);
        assert_eq!(broadcaster.publish("j2", &ProgressEvent::not_found("j2")), 0);
        assert_eq!(broadcaster.publish_all(&json!({"kind": "dashboard"})), 1);

        let first = rx1.recv().await.unwrap_or_default();
        assert!(first.contains("\"job_id\":\"j1\""));
        let second = rx2.recv().await.unwrap_or_default();
        assert!(second.contains("dashboard"));

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_failed_delivery_disconnects_without_stopping_others() {
        let broadcaster = ProgressBroadcaster::new();
        let broken = broadcaster.connect(Arc::new(BrokenConnection(ConnectionId::new())));
        let (ok, mut rx) = ChannelConnection::new();
        let ok = broadcaster.connect(ok);
        broadcaster.subscribe(broken, "j1");
        broadcaster.subscribe(ok, "j1");
        broadcaster.subscribe_all(broken);

        let delivered = broadcaster.publish("j1", &ProgressEvent::not_found("j1"));
        assert_eq!(delivered, 1);
        assert!(rx.try_recv().is_ok());
        assert_eq!(broadcaster.connection_count(), 1);
        assert_eq!(broadcaster.subscriber_count("j1"), 1);
        assert_eq!(broadcaster.broadcast_count(), 0);
    }

    #[test]
    fn test_last_unsubscribe_drops_job_entry() {
        let broadcaster = ProgressBroadcaster::new();
        let (conn, _rx) = ChannelConnection::new();
        let id = broadcaster.connect(conn);
        broadcaster.subscribe(id, "j1");
        broadcaster.unsubscribe(id, "j1");
        assert_eq!(broadcaster.subscriber_count("j1"), 0);
        assert!(broadcaster.lock().jobs.is_empty());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let broadcaster = ProgressBroadcaster::new();
        let (conn, _rx) = ChannelConnection::new();
        let id = broadcaster.connect(conn);
        broadcaster.subscribe(id, "a");
        broadcaster.subscribe(id, "b");
        broadcaster.subscribe_all(id);

        assert!(broadcaster.disconnect(id));
        assert!(!broadcaster.disconnect(id));
        assert_eq!(broadcaster.connection_count(), 0);
        assert!(broadcaster.lock().jobs.is_empty());
        assert!(!broadcaster.subscribe(id, "a"));
    }

    #[test]
    fn test_dropped_receiver_is_cleaned_up() {
        let broadcaster = ProgressBroadcaster::new();
        let (conn, rx) = ChannelConnection::new();
        let id = broadcaster.connect(conn);
        broadcaster.subscribe_all(id);
        drop(rx);

        assert_eq!(broadcaster.publish_all(&json!({"status": "tick"})), 0);
        assert_eq!(broadcaster.connection_count(), 0);
        assert!(!broadcaster.send_to(id, "hello"));
    }
}
