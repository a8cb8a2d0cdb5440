//! Fire-and-forget mutation notifications, fanned out over a tokio broadcast channel.
//! Publishing never fails the caller: a send with no subscribers is dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Topic {
    #[serde(rename = "loan.mutation")]
    LoanMutation,
    #[serde(rename = "borrower.mutation")]
    BorrowerMutation,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::LoanMutation => "loan.mutation",
            Topic::BorrowerMutation => "borrower.mutation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMutationEvent {
    pub gid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub topic: Topic,
    pub data: GroupMutationEvent,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> { self.tx.subscribe() }

    pub fn publish(&self, topic: Topic, gid: Uuid) {
        let delivered = self.tx.send(Event { topic, data: GroupMutationEvent { gid } }).unwrap_or(0);
        debug!(target: "lendgate::events", topic = topic.as_str(), %gid, delivered, "published");
    }
}

/// Publish on an optional bus; an absent bus means notifications are disabled.
pub fn publish(bus: Option<&EventBus>, topic: Topic, gid: Uuid) {
    if let Some(bus) = bus {
        bus.publish(topic, gid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(Topic::LoanMutation, Uuid::new_v4());
        publish(None, Topic::BorrowerMutation, Uuid::new_v4());
    }

    #[tokio::test]
    async fn subscribers_receive_group_id() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let gid = Uuid::new_v4();
        publish(Some(&bus), Topic::BorrowerMutation, gid);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.topic, Topic::BorrowerMutation);
        assert_eq!(ev.data.gid, gid);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["topic"], "borrower.mutation");
    }
}
