use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, trace};
use uuid::Uuid;

use cheetoh_room::{Delivery, Outbox};
use cheetoh_types::events::ServerEvent;

/// What a connection's send loop receives from the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionSignal {
    Event(ServerEvent),
    /// Flush what came before, then close the socket.
    Close,
}

/// Fans server events out to live connections.
///
/// Each connection owns an unbounded channel so the room never waits on a
/// slow socket. Once a connection is closed or unregistered, nothing else
/// reaches it.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// connection id -> sender feeding that connection's send loop
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<ConnectionSignal>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's channel. Returns the receiving half.
    pub async fn register_connection(&self, id: Uuid) -> mpsc::UnboundedReceiver<ConnectionSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(id, tx);
        rx
    }

    pub async fn unregister_connection(&self, id: Uuid) {
        self.inner.connections.write().await.remove(&id);
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Send an event to a single connection.
    pub async fn send_to(&self, id: Uuid, event: ServerEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(tx) = connections.get(&id) {
            let _ = tx.send(ConnectionSignal::Event(event));
        }
    }

    /// Broadcast an event to every registered connection.
    pub async fn broadcast(&self, event: ServerEvent) {
        let connections = self.inner.connections.read().await;
        trace!("broadcasting to {} connections", connections.len());
        for tx in connections.values() {
            let _ = tx.send(ConnectionSignal::Event(event.clone()));
        }
    }

    /// Tell a connection to close and stop routing to it.
    pub async fn close(&self, id: Uuid) {
        if let Some(tx) = self.inner.connections.write().await.remove(&id) {
            debug!("closing connection {}", id);
            let _ = tx.send(ConnectionSignal::Close);
        }
    }

    /// Deliver an outbox in order.
    pub async fn deliver(&self, outbox: Outbox) {
        for delivery in outbox {
            match delivery {
                Delivery::Everyone(event) => self.broadcast(event).await,
                Delivery::To(id, event) => self.send_to(id, event).await,
                Delivery::Disconnect(id) => self.close(id).await,
            }
        }
    }
}
