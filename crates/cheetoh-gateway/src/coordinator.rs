use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use cheetoh_room::{Admission, Room, RoomError};
use cheetoh_types::events::ClientEvent;

use crate::dispatcher::{ConnectionSignal, Dispatcher};

/// Serialises every room operation with the delivery of its outbox.
///
/// The room lock is held until all resulting events are queued, so every
/// connection observes events in one global order.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    room: Mutex<Room>,
    dispatcher: Dispatcher,
}

impl Coordinator {
    pub fn new(room: Room) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                room: Mutex::new(room),
                dispatcher: Dispatcher::new(),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Pre-upgrade ban check.
    pub async fn admit(&self, address: &str) -> Admission {
        self.inner.room.lock().await.admit(address, Utc::now())
    }

    /// Register a new connection. Fails with `Rejected` if the address
    /// became banned since the upgrade check.
    pub async fn connect(
        &self,
        address: &str,
    ) -> Result<(Uuid, mpsc::UnboundedReceiver<ConnectionSignal>), RoomError> {
        let id = Uuid::new_v4();
        let mut room = self.inner.room.lock().await;
        let rx = self.inner.dispatcher.register_connection(id).await;

        match room.connect(id, address, Utc::now()) {
            Ok(outbox) => {
                self.inner.dispatcher.deliver(outbox).await;
                Ok((id, rx))
            }
            Err(e) => {
                self.inner.dispatcher.unregister_connection(id).await;
                Err(e)
            }
        }
    }

    /// Apply one client event and deliver the result.
    pub async fn handle(&self, id: Uuid, event: ClientEvent) {
        // Detached: an aborted caller must not leave an outbox half delivered.
        let this = self.clone();
        if let Err(e) = tokio::spawn(async move { this.apply(id, event).await }).await {
            warn!("event task for {} failed: {}", id, e);
        }
    }

    async fn apply(&self, id: Uuid, event: ClientEvent) {
        let mut room = self.inner.room.lock().await;
        let outbox = room.apply(id, event, Utc::now());
        if !outbox.is_empty() {
            debug!("{} produced {} deliveries", id, outbox.len());
        }
        self.inner.dispatcher.deliver(outbox).await;
    }

    /// Tear down a connection. A no-op for connections already removed by a kick.
    pub async fn disconnect(&self, id: Uuid) {
        let mut room = self.inner.room.lock().await;
        self.inner.dispatcher.unregister_connection(id).await;
        let outbox = room.disconnect(id, Utc::now());
        self.inner.dispatcher.deliver(outbox).await;
    }
}
