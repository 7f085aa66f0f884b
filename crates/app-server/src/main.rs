use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use event_fanout::ChannelBroadcaster;
use hand_store::InMemoryHandStore;
use observability::init_tracing;
use poker_domain::{Chips, PlayerAction, RoomId, UserId};
use poker_engine::engine::SeatedPlayer;
use table_service::{RoomConfig, RoomRegistry, spawn_room_actor};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("app-server", "info");

    let room_id = RoomId::new();
    let fanout = Arc::new(ChannelBroadcaster::new());
    let store = Arc::new(InMemoryHandStore::new());
    let registry = RoomRegistry::new();

    let seats: Vec<SeatedPlayer> = ["alice", "bob", "carol"]
        .iter()
        .enumerate()
        .map(|(position, name)| SeatedPlayer {
            user_id: UserId::new(),
            username: (*name).to_string(),
            position: position as u8,
            buy_in: Chips(1500),
        })
        .collect();
    let users: Vec<UserId> = seats.iter().map(|s| s.user_id).collect();
    let mut feed = fanout.register(room_id, users[0]);

    let handle = spawn_room_actor(
        room_id,
        RoomConfig::default(),
        seats,
        store.clone(),
        fanout.clone(),
    );
    registry.insert(room_id, handle.clone());

    // Play one scripted hand: the first two seats fold, the big blind
    // takes the pot.
    handle.start_hand().await?;
    handle.act(users[0], PlayerAction::Fold).await?;
    handle.act(users[1], PlayerAction::Fold).await?;

    while let Ok(event) = feed.try_recv() {
        info!(?event, "room event");
    }
    let winners = store
        .winners
        .lock()
        .map_err(|_| anyhow::anyhow!("winner store lock poisoned"))?;
    for winner in winners.iter() {
        info!(
            user_id = %winner.user_id,
            amount = %winner.amount_won,
            rank = %winner.hand_rank,
            "hand settled"
        );
    }
    info!("app-server demo complete");
    Ok(())
}
