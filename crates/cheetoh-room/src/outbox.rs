use uuid::Uuid;

use cheetoh_types::events::ServerEvent;

/// One thing the gateway must do after a room operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Send to every live connection.
    Everyone(ServerEvent),
    /// Send to a single connection.
    To(Uuid, ServerEvent),
    /// Close a connection. Later deliveries no longer reach it.
    Disconnect(Uuid),
}

/// Ordered deliveries produced by one room operation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outbox {
    deliveries: Vec<Delivery>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast(&mut self, event: ServerEvent) {
        self.deliveries.push(Delivery::Everyone(event));
    }

    pub fn send_to(&mut self, id: Uuid, event: ServerEvent) {
        self.deliveries.push(Delivery::To(id, event));
    }

    pub fn disconnect(&mut self, id: Uuid) {
        self.deliveries.push(Delivery::Disconnect(id));
    }

    pub fn extend(&mut self, other: Outbox) {
        self.deliveries.extend(other.deliveries);
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter()
    }

    /// Events that connection `id` would receive, in order, assuming it is
    /// connected for the whole outbox.
    pub fn events_for(&self, id: Uuid) -> Vec<&ServerEvent> {
        let mut out = Vec::new();
        for delivery in &self.deliveries {
            match delivery {
                Delivery::Everyone(event) => out.push(event),
                Delivery::To(target, event) if *target == id => out.push(event),
                Delivery::Disconnect(target) if *target == id => break,
                _ => {}
            }
        }
        out
    }

    /// Events sent to everyone.
    pub fn broadcasts(&self) -> Vec<&ServerEvent> {
        self.deliveries
            .iter()
            .filter_map(|d| match d {
                Delivery::Everyone(event) => Some(event),
                _ => None,
            })
            .collect()
    }
}

impl IntoIterator for Outbox {
    type Item = Delivery;
    type IntoIter = std::vec::IntoIter<Delivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.deliveries.into_iter()
    }
}
