use std::sync::Arc;
use std::time::Duration;

use event_fanout::RecordingBroadcaster;
use hand_store::InMemoryHandStore;
use poker_domain::{ActionKind, Chips, GameEvent, PlayerAction, RoomId, UserId};
use poker_engine::engine::SeatedPlayer;
use table_service::{RoomCallError, RoomConfig, RoomHandle, RoomRegistry, spawn_room_actor};

struct Fixture {
    handle: RoomHandle,
    users: Vec<UserId>,
    store: InMemoryHandStore,
    fanout: RecordingBroadcaster,
}

fn spawn(stacks: &[u64], config: RoomConfig) -> Fixture {
    let users: Vec<UserId> = stacks.iter().map(|_| UserId::new()).collect();
    let seats = stacks
        .iter()
        .zip(&users)
        .enumerate()
        .map(|(position, (&stack, &user_id))| SeatedPlayer {
            user_id,
            username: format!("seat-{position}"),
            position: position as u8,
            buy_in: Chips(stack),
        })
        .collect();
    let store = InMemoryHandStore::new();
    let fanout = RecordingBroadcaster::new();
    let handle = spawn_room_actor(
        RoomId::new(),
        config,
        seats,
        Arc::new(store.clone()),
        Arc::new(fanout.clone()),
    );
    Fixture {
        handle,
        users,
        store,
        fanout,
    }
}

#[tokio::test]
async fn fold_out_hand_persists_records_in_order() {
    let fx = spawn(&[1500, 1500, 1500], RoomConfig::default());
    fx.handle.start_hand().await.expect("start");
    fx.handle
        .act(fx.users[0], PlayerAction::Fold)
        .await
        .expect("fold 0");
    fx.handle
        .act(fx.users[1], PlayerAction::Fold)
        .await
        .expect("fold 1");

    let hands = fx.store.hands.lock().expect("lock");
    assert_eq!(hands.len(), 1);
    assert!(hands[0].is_completed);
    assert_eq!(hands[0].record.hand_number, 1);

    let hole_cards = fx.store.hole_cards.lock().expect("lock");
    assert_eq!(hole_cards.len(), 3, "every dealt player gets a row");

    let actions = fx.store.actions.lock().expect("lock");
    let kinds: Vec<_> = actions.iter().map(|a| a.action_type).collect();
    assert_eq!(kinds, vec![ActionKind::Fold, ActionKind::Fold]);

    let winners = fx.store.winners.lock().expect("lock");
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].user_id, fx.users[2]);
    assert_eq!(winners[0].amount_won, Chips(30));
    assert_eq!(winners[0].hand_rank, "Win by fold");
}

#[tokio::test]
async fn hole_cards_go_out_privately_only() {
    let fx = spawn(&[1500, 1500, 1500], RoomConfig::default());
    fx.handle.start_hand().await.expect("start");
    // Barrier: a snapshot reply means the start was fully processed.
    let _ = fx.handle.snapshot(None).await.expect("snapshot");

    for event in fx.fanout.broadcast_events() {
        assert!(
            !matches!(event, GameEvent::HoleCardsDealt { .. }),
            "hole cards leaked into the room broadcast"
        );
    }
    for &user in &fx.users {
        let dealt = fx
            .fanout
            .private_events_for(user)
            .into_iter()
            .filter(|e| matches!(e, GameEvent::HoleCardsDealt { .. }))
            .count();
        assert_eq!(dealt, 1);
    }
}

#[tokio::test]
async fn snapshot_filters_hole_cards_to_viewer() {
    let fx = spawn(&[1500, 1500], RoomConfig::default());
    fx.handle.start_hand().await.expect("start");

    let own_view = fx.handle.snapshot(Some(fx.users[0])).await.expect("snapshot");
    for player in &own_view.players {
        assert_eq!(player.hole_cards.is_some(), player.user_id == fx.users[0]);
    }

    let observer_view = fx.handle.snapshot(None).await.expect("snapshot");
    assert!(observer_view.players.iter().all(|p| p.hole_cards.is_none()));
    assert!(observer_view.in_hand);
}

#[tokio::test]
async fn rejected_actions_bounce_privately_without_state_change() {
    let fx = spawn(&[1500, 1500, 1500], RoomConfig::default());
    fx.handle.start_hand().await.expect("start");

    let err = fx
        .handle
        .act(fx.users[1], PlayerAction::Fold)
        .await
        .expect_err("seat 1 is not to act");
    assert!(matches!(
        err,
        RoomCallError::Rejected(poker_domain::ActionError::NotYourTurn)
    ));

    let private = fx.fanout.private_events_for(fx.users[1]);
    assert!(private.iter().any(|e| matches!(
        e,
        GameEvent::GameError { kind, .. } if kind == "NotYourTurn"
    )));

    // The table is untouched: still hand 1, still seat 0 to act.
    let snapshot = fx.handle.snapshot(None).await.expect("snapshot");
    assert_eq!(snapshot.hand_number, 1);
    assert_eq!(snapshot.to_act_pos, Some(0));
}

#[tokio::test]
async fn storage_failure_poisons_the_room() {
    let fx = spawn(&[1500, 1500, 1500], RoomConfig::default());
    fx.store.set_failing(true);
    fx.handle.start_hand().await.expect("start");
    // Barrier so the failed start has been processed.
    let _ = fx.handle.snapshot(None).await.expect("snapshot");

    assert!(fx.fanout.broadcast_events().iter().any(|e| matches!(
        e,
        GameEvent::GameError { kind, .. } if kind == "StorageFailure"
    )));

    // The room refuses everything afterwards.
    let err = fx
        .handle
        .act(fx.users[0], PlayerAction::Fold)
        .await
        .expect_err("room is quiescent");
    assert!(matches!(
        err,
        RoomCallError::Rejected(poker_domain::ActionError::NotInHand)
    ));
    assert!(fx.store.hands.lock().expect("lock").is_empty());
}

#[tokio::test(start_paused = true)]
async fn s5_turn_timeout_ticks_thirty_times_then_folds() {
    let fx = spawn(&[1500, 1500, 1500], RoomConfig::default());
    fx.handle.start_hand().await.expect("start");

    // Let virtual time run until the auto-fold lands.
    let deadline = 200;
    let mut folded = false;
    for _ in 0..deadline {
        if fx.fanout.broadcast_events().iter().any(|e| {
            matches!(
                e,
                GameEvent::ActionPerformed {
                    action: ActionKind::Fold,
                    ..
                }
            )
        }) {
            folded = true;
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert!(folded, "timer expiry must synthesize a fold");

    let events = fx.fanout.broadcast_events();
    let fold_at = events
        .iter()
        .position(|e| {
            matches!(
                e,
                GameEvent::ActionPerformed {
                    action: ActionKind::Fold,
                    ..
                }
            )
        })
        .expect("fold event");

    // The folded player is the one whose turn it was.
    match &events[fold_at] {
        GameEvent::ActionPerformed { user_id, .. } => assert_eq!(*user_id, fx.users[0]),
        _ => unreachable!(),
    }

    // Exactly 30 ticks, counting down 29..=0, precede the fold.
    let ticks: Vec<u32> = events[..fold_at]
        .iter()
        .filter_map(|e| match e {
            GameEvent::TurnTick { time_remaining } => Some(*time_remaining),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, (0..30).rev().collect::<Vec<u32>>());

    // Play moved on to the next seat.
    let snapshot = fx.handle.snapshot(None).await.expect("snapshot");
    assert_eq!(snapshot.to_act_pos, Some(1));
}

#[tokio::test(start_paused = true)]
async fn next_hand_starts_after_the_inter_hand_pause() {
    let fx = spawn(&[1500, 1500, 1500], RoomConfig::default());
    fx.handle.start_hand().await.expect("start");
    fx.handle
        .act(fx.users[0], PlayerAction::Fold)
        .await
        .expect("fold 0");
    fx.handle
        .act(fx.users[1], PlayerAction::Fold)
        .await
        .expect("fold 1");

    let mut hand_number = 1;
    for _ in 0..100 {
        let snapshot = fx.handle.snapshot(None).await.expect("snapshot");
        hand_number = snapshot.hand_number;
        if hand_number >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert_eq!(hand_number, 2, "the table deals again by itself");
}

#[tokio::test]
async fn registry_hands_out_send_handles() {
    let registry = RoomRegistry::new();
    let room_id = RoomId::new();
    let fx = spawn(&[1500, 1500], RoomConfig::default());
    registry.insert(room_id, fx.handle.clone());

    let handle = registry.get(&room_id).expect("registered room");
    handle.start_hand().await.expect("start via registry");
    let snapshot = handle.snapshot(None).await.expect("snapshot");
    assert_eq!(snapshot.hand_number, 1);

    registry.remove(&room_id);
    assert!(registry.get(&room_id).is_none());
}
