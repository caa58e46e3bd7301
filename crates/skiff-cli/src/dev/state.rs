//! Shared dev server state: the served output root and the notification
//! hub's client registry.
//!
//! The registry is guarded by a `parking_lot` lock; broadcast iterates a
//! snapshot so a disconnect racing with a broadcast never double-delivers
//! or crashes. A failed send simply removes that client.

use crate::dev::Notification;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Per-client channel capacity; notifications are rare and tiny.
const CLIENT_CHANNEL_CAPACITY: usize = 16;

/// Shared development server state.
pub struct DevState {
    /// Connected notification-channel clients
    clients: RwLock<HashMap<usize, mpsc::Sender<&'static str>>>,
    /// Next client id
    next_client_id: RwLock<usize>,
    /// Root of the served output tree
    out_dir: PathBuf,
}

impl DevState {
    /// Create state serving files from `out_dir`.
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_client_id: RwLock::new(0),
            out_dir,
        }
    }

    /// Register a client connection.
    ///
    /// Returns the opaque client id and the receiver its socket drains.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<&'static str>) {
        let id = {
            let mut next_id = self.next_client_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };

        let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        self.clients.write().insert(id, tx);

        (id, rx)
    }

    /// Remove a client connection.
    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    /// Broadcast a notification token to all current clients.
    ///
    /// Safe to call from blocking pipeline workers. Clients whose channel
    /// is gone are pruned; delivery errors are never surfaced to the
    /// caller.
    pub fn broadcast(&self, notification: Notification) {
        let clients: Vec<(usize, mpsc::Sender<&'static str>)> = self
            .clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut failed = Vec::new();
        for (id, tx) in clients {
            if tx.try_send(notification.as_str()).is_err() {
                failed.push(id);
            }
        }

        for id in failed {
            self.unregister_client(id);
        }
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// The served output root.
    pub fn out_dir(&self) -> &PathBuf {
        &self.out_dir
    }
}

/// Shared state handle for passing around the application.
pub type SharedState = Arc<DevState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_registration_assigns_unique_ids() {
        let state = DevState::new(PathBuf::from(".skiff/dev"));

        let (id1, _rx1) = state.register_client();
        let (id2, _rx2) = state.register_client();

        assert_eq!(state.client_count(), 2);
        assert_ne!(id1, id2);

        state.unregister_client(id1);
        assert_eq!(state.client_count(), 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_connected_clients() {
        let state = DevState::new(PathBuf::from(".skiff/dev"));

        let (_id1, mut rx1) = state.register_client();
        let (_id2, mut rx2) = state.register_client();

        state.broadcast(Notification::WasmRecompiled);

        assert_eq!(rx1.recv().await, Some("wasmRecompiled"));
        assert_eq!(rx2.recv().await, Some("wasmRecompiled"));
    }

    #[tokio::test]
    async fn late_client_never_sees_past_notifications() {
        let state = DevState::new(PathBuf::from(".skiff/dev"));

        state.broadcast(Notification::WasmRecompiled);

        let (_id, mut rx) = state.register_client();
        state.broadcast(Notification::EntrypointRecooked);

        // Only the notification sent after connecting arrives.
        assert_eq!(rx.recv().await, Some("entrypointRecooked"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_send_removes_client() {
        let state = DevState::new(PathBuf::from(".skiff/dev"));

        let (_id, rx) = state.register_client();
        drop(rx);

        state.broadcast(Notification::WasmRecompiled);
        assert_eq!(state.client_count(), 0);
    }
}
