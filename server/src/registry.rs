//! Client registry: maps application-chosen client ids to open connections.
//!
//! Registration is last-write-wins. A second `register` under an id that is
//! already taken silently replaces the earlier mapping; the replaced
//! connection stays open and keeps any other ids it registered. A single
//! connection may hold several ids, and all of them are dropped when that
//! connection closes.
//!
//! Entries hold a weak reference to the connection's outbound channel, so a
//! registration never outlives the connection task that owns the channel.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ws::{ClientHandle, ConnectionId, WeakConnectionSender};

/// Identifier a client chooses for itself in its `register` message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
struct Entry {
    connection: ConnectionId,
    sender: WeakConnectionSender,
}

#[derive(Debug, Default)]
struct Inner {
    clients: HashMap<ClientId, Entry>,
    /// Reverse index: connection -> ids currently mapped to it
    by_connection: HashMap<ConnectionId, HashSet<ClientId>>,
}

impl Inner {
    fn unlink(&mut self, connection: ConnectionId, id: &ClientId) {
        if let Some(ids) = self.by_connection.get_mut(&connection) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_connection.remove(&connection);
            }
        }
    }
}

/// Shared registry handle. Cloning is cheap; all clones see the same map.
///
/// Every operation runs under one mutex covering both the forward map and
/// the reverse index, so register, lookup and removal never interleave.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No operation can leave the maps half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Map `id` to `handle`, replacing any previous mapping.
    ///
    /// Returns the connection that previously held `id`, if it was a different one.
    pub fn register(&self, id: ClientId, handle: &ClientHandle) -> Option<ConnectionId> {
        let connection = handle.connection_id();
        let mut inner = self.lock();

        let previous = inner.clients.insert(
            id.clone(),
            Entry {
                connection,
                sender: handle.downgrade(),
            },
        );

        let replaced = match previous {
            Some(prev) if prev.connection != connection => {
                inner.unlink(prev.connection, &id);
                Some(prev.connection)
            }
            _ => None,
        };

        inner.by_connection.entry(connection).or_default().insert(id);
        replaced
    }

    /// Current handle for `id`, if one is registered and its connection is still open.
    pub fn lookup(&self, id: &str) -> Option<ClientHandle> {
        let inner = self.lock();
        let entry = inner.clients.get(id)?;
        let sender = entry.sender.upgrade()?;
        Some(ClientHandle::with_id(entry.connection, sender))
    }

    /// Remove every id mapped to `connection`. Returns the removed ids.
    ///
    /// Calling this for a connection with no registrations is a no-op.
    pub fn remove_by_handle(&self, connection: ConnectionId) -> Vec<ClientId> {
        let mut inner = self.lock();
        let Some(ids) = inner.by_connection.remove(&connection) else {
            return Vec::new();
        };

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            // Only drop the entry if it still points at this connection.
            if inner
                .clients
                .get(&id)
                .is_some_and(|entry| entry.connection == connection)
            {
                inner.clients.remove(&id);
                removed.push(id);
            }
        }
        removed
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn handle() -> (ClientHandle, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientHandle::new(tx), rx)
    }

    #[test]
    fn test_lookup_unknown_id_is_none() {
        let registry = Registry::new();
        assert!(registry.lookup("nobody").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = Registry::new();
        let (first, _rx1) = handle();
        let (second, _rx2) = handle();
        let (third, _rx3) = handle();

        assert_eq!(registry.register("A".into(), &first), None);
        assert_eq!(
            registry.register("A".into(), &second),
            Some(first.connection_id())
        );
        assert_eq!(registry.lookup("A").unwrap(), second);

        registry.register("A".into(), &third);
        assert_eq!(registry.lookup("A").unwrap(), third);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistering_same_connection_reports_no_replacement() {
        let registry = Registry::new();
        let (h, _rx) = handle();
        registry.register("A".into(), &h);
        assert_eq!(registry.register("A".into(), &h), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_by_handle_clears_all_ids_of_that_connection() {
        let registry = Registry::new();
        let (a, _rx_a) = handle();
        let (b, _rx_b) = handle();

        registry.register("A".into(), &a);
        registry.register("A-alias".into(), &a);
        registry.register("B".into(), &b);

        let mut removed = registry.remove_by_handle(a.connection_id());
        removed.sort_by(|x, y| x.0.cmp(&y.0));
        assert_eq!(removed, vec![ClientId::from("A"), ClientId::from("A-alias")]);

        assert!(registry.lookup("A").is_none());
        assert!(registry.lookup("A-alias").is_none());
        assert_eq!(registry.lookup("B").unwrap(), b);
    }

    #[test]
    fn test_remove_by_handle_is_idempotent() {
        let registry = Registry::new();
        let (a, _rx_a) = handle();
        let (never_registered, _rx_n) = handle();

        registry.register("A".into(), &a);
        assert!(registry.remove_by_handle(never_registered.connection_id()).is_empty());
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.remove_by_handle(a.connection_id()).len(), 1);
        assert!(registry.remove_by_handle(a.connection_id()).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removing_replaced_connection_keeps_new_owner() {
        let registry = Registry::new();
        let (old, _rx_old) = handle();
        let (new, _rx_new) = handle();

        registry.register("A".into(), &old);
        registry.register("A".into(), &new);

        assert!(registry.remove_by_handle(old.connection_id()).is_empty());
        assert_eq!(registry.lookup("A").unwrap(), new);
    }

    #[test]
    fn test_lookup_after_channel_dropped_is_none() {
        let registry = Registry::new();
        let (h, rx) = handle();
        registry.register("A".into(), &h);

        // Registry only holds a weak sender; dropping the last strong one closes it.
        drop(h);
        drop(rx);
        assert!(registry.lookup("A").is_none());
    }

    #[test]
    fn test_concurrent_registrations_from_many_threads() {
        let registry = Registry::new();
        let mut receivers = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let (h, rx) = handle();
            receivers.push(rx);
            handles.push(h);
        }

        std::thread::scope(|scope| {
            for (n, h) in handles.iter().enumerate() {
                let registry = registry.clone();
                scope.spawn(move || {
                    for i in 0..100 {
                        registry.register(format!("client-{n}-{i}").into(), h);
                        registry.register("shared".into(), h);
                    }
                });
            }
        });

        assert_eq!(registry.len(), 8 * 100 + 1);
        let owner = registry.lookup("shared").unwrap();
        assert!(handles.contains(&owner));

        for h in &handles {
            registry.remove_by_handle(h.connection_id());
        }
        assert!(registry.is_empty());
    }
}
