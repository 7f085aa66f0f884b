use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use poker_domain::{GameEvent, RoomId, UserId};
use tokio::sync::mpsc;
use tracing::warn;

/// Room event fan-out consumed by the engine actor.
///
/// `broadcast` reaches every connected client of the room; `send_private`
/// reaches only the sockets identified with one user (all of them, if
/// the user has several connections). Delivery is best-effort and
/// non-blocking; per recipient it preserves the engine's emission order.
pub trait RoomBroadcaster: Send + Sync {
    fn broadcast(&self, room_id: RoomId, event: &GameEvent);

    fn send_private(&self, room_id: RoomId, user_id: UserId, event: &GameEvent);
}

/// A delivery captured by the recording broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Broadcast {
        room_id: RoomId,
        event: GameEvent,
    },
    Private {
        room_id: RoomId,
        user_id: UserId,
        event: GameEvent,
    },
}

/// Test double that records every delivery in emission order.
#[derive(Debug, Default, Clone)]
pub struct RecordingBroadcaster {
    pub deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl RecordingBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast events, in order.
    #[must_use]
    pub fn broadcast_events(&self) -> Vec<GameEvent> {
        self.deliveries
            .lock()
            .map(|deliveries| {
                deliveries
                    .iter()
                    .filter_map(|d| match d {
                        Delivery::Broadcast { event, .. } => Some(event.clone()),
                        Delivery::Private { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Private events delivered to one user, in order.
    #[must_use]
    pub fn private_events_for(&self, user: UserId) -> Vec<GameEvent> {
        self.deliveries
            .lock()
            .map(|deliveries| {
                deliveries
                    .iter()
                    .filter_map(|d| match d {
                        Delivery::Private { user_id, event, .. } if *user_id == user => {
                            Some(event.clone())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl RoomBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, room_id: RoomId, event: &GameEvent) {
        if let Ok(mut deliveries) = self.deliveries.lock() {
            deliveries.push(Delivery::Broadcast {
                room_id,
                event: event.clone(),
            });
        }
    }

    fn send_private(&self, room_id: RoomId, user_id: UserId, event: &GameEvent) {
        if let Ok(mut deliveries) = self.deliveries.lock() {
            deliveries.push(Delivery::Private {
                room_id,
                user_id,
                event: event.clone(),
            });
        }
    }
}

struct Connection {
    user_id: UserId,
    sender: mpsc::UnboundedSender<GameEvent>,
}

/// Production fan-out over per-connection unbounded channels. The
/// socket layer registers one channel per connection and forwards the
/// received events to the wire; closed connections are pruned on the
/// next send.
#[derive(Default, Clone)]
pub struct ChannelBroadcaster {
    rooms: Arc<Mutex<HashMap<RoomId, Vec<Connection>>>>,
}

impl ChannelBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection for `user_id` in `room_id`. The same user may
    /// register any number of connections; each receives every event.
    pub fn register(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> mpsc::UnboundedReceiver<GameEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms
                .entry(room_id)
                .or_default()
                .push(Connection { user_id, sender });
        }
        receiver
    }

    fn deliver<F>(&self, room_id: RoomId, event: &GameEvent, matches: F)
    where
        F: Fn(&Connection) -> bool,
    {
        let Ok(mut rooms) = self.rooms.lock() else {
            warn!(%room_id, "fanout registry lock poisoned, dropping event");
            return;
        };
        if let Some(connections) = rooms.get_mut(&room_id) {
            connections
                .retain(|conn| !matches(conn) || conn.sender.send(event.clone()).is_ok());
        }
    }
}

impl RoomBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, room_id: RoomId, event: &GameEvent) {
        self.deliver(room_id, event, |_| true);
    }

    fn send_private(&self, room_id: RoomId, user_id: UserId, event: &GameEvent) {
        self.deliver(room_id, event, |conn| conn.user_id == user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(n: u32) -> GameEvent {
        GameEvent::TurnTick { time_remaining: n }
    }

    #[test]
    fn recording_broadcaster_keeps_emission_order() {
        let fanout = RecordingBroadcaster::new();
        let room = RoomId::new();
        fanout.broadcast(room, &tick(3));
        fanout.broadcast(room, &tick(2));
        fanout.broadcast(room, &tick(1));
        assert_eq!(fanout.broadcast_events(), vec![tick(3), tick(2), tick(1)]);
    }

    #[tokio::test]
    async fn private_events_reach_only_the_target_user() {
        let fanout = ChannelBroadcaster::new();
        let room = RoomId::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let mut alice_rx = fanout.register(room, alice);
        let mut bob_rx = fanout.register(room, bob);

        let hole = GameEvent::HoleCardsDealt {
            hole_cards: ["Ah".parse().expect("card"), "Kd".parse().expect("card")],
        };
        fanout.send_private(room, alice, &hole);
        fanout.broadcast(room, &tick(30));

        assert_eq!(alice_rx.recv().await, Some(hole));
        assert_eq!(alice_rx.recv().await, Some(tick(30)));
        // Bob never sees Alice's cards.
        assert_eq!(bob_rx.recv().await, Some(tick(30)));
    }

    #[tokio::test]
    async fn every_connection_of_a_user_receives_private_events() {
        let fanout = ChannelBroadcaster::new();
        let room = RoomId::new();
        let alice = UserId::new();
        let mut first = fanout.register(room, alice);
        let mut second = fanout.register(room, alice);

        fanout.send_private(room, alice, &tick(9));
        assert_eq!(first.recv().await, Some(tick(9)));
        assert_eq!(second.recv().await, Some(tick(9)));
    }

    #[test]
    fn dropped_connections_are_pruned() {
        let fanout = ChannelBroadcaster::new();
        let room = RoomId::new();
        let alice = UserId::new();
        let rx = fanout.register(room, alice);
        drop(rx);

        fanout.broadcast(room, &tick(1));
        let rooms = fanout.rooms.lock().expect("lock");
        assert!(rooms.get(&room).expect("room").is_empty());
    }
}
