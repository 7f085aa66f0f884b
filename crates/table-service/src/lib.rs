use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use event_fanout::RoomBroadcaster;
use hand_store::{
    ActionInsert, HandRecordInsert, HandStore, HandStoreError, HoleCardsInsert, WinnerInsert,
};
use poker_domain::{
    ActionError, GameEvent, PlayerAction, RoomId, UserId, snapshot::EngineSnapshot,
};
use poker_engine::engine::{
    EngineError, EngineOutput, Followup, HandEngine, HandWrite, Outbound, SeatedPlayer, TimerCmd,
};
use poker_engine::state::TableConfig;

#[derive(Debug, Clone, Copy)]
pub struct RoomConfig {
    pub table: TableConfig,
    pub queue_capacity: usize,
    pub inter_hand_pause: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            queue_capacity: 128,
            inter_hand_pause: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Error)]
pub enum RoomCallError {
    #[error("room actor closed")]
    Closed,
    #[error(transparent)]
    Rejected(#[from] ActionError),
}

#[derive(Debug)]
pub enum RoomCommand {
    StartHand,
    Act {
        user_id: UserId,
        action: PlayerAction,
        reply: oneshot::Sender<Result<(), ActionError>>,
    },
    Snapshot {
        viewer: Option<UserId>,
        reply: oneshot::Sender<EngineSnapshot>,
    },
    TimerTick {
        arming: u64,
        remaining: u32,
    },
    TimerExpired {
        arming: u64,
    },
    NextHand {
        epoch: u64,
    },
}

/// Send-handle to a room actor. Cloneable; all game state stays behind
/// the actor's queue.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    #[must_use]
    pub fn new(sender: mpsc::Sender<RoomCommand>) -> Self {
        Self { sender }
    }

    pub async fn start_hand(&self) -> Result<(), RoomCallError> {
        self.sender
            .send(RoomCommand::StartHand)
            .await
            .map_err(|_| RoomCallError::Closed)
    }

    pub async fn act(&self, user_id: UserId, action: PlayerAction) -> Result<(), RoomCallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Act {
                user_id,
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomCallError::Closed)?;
        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(rejection)) => Err(RoomCallError::Rejected(rejection)),
            Err(_) => Err(RoomCallError::Closed),
        }
    }

    /// Current room view for a (re)connecting client, hole cards
    /// filtered to the viewer.
    pub async fn snapshot(&self, viewer: Option<UserId>) -> Result<EngineSnapshot, RoomCallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot {
                viewer,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomCallError::Closed)?;
        reply_rx.await.map_err(|_| RoomCallError::Closed)
    }
}

/// Registry of live room actors keyed by room id. Lookup hands out a
/// send-handle, never the state itself.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    rooms: Arc<Mutex<HashMap<RoomId, RoomHandle>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, room_id: RoomId, handle: RoomHandle) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.insert(room_id, handle);
        }
    }

    #[must_use]
    pub fn get(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(room_id).cloned())
    }

    pub fn remove(&self, room_id: &RoomId) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.remove(room_id);
        }
    }
}

/// Spawn the owning task for one room. All mutation of the engine
/// serializes through the returned handle's queue; timer callbacks and
/// the inter-hand pause re-enter through the same queue.
pub fn spawn_room_actor(
    room_id: RoomId,
    config: RoomConfig,
    seats: Vec<SeatedPlayer>,
    store: Arc<dyn HandStore>,
    fanout: Arc<dyn RoomBroadcaster>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let engine = HandEngine::new(room_id, config.table, seats);
    let actor = RoomActor {
        room_id,
        config,
        engine,
        store,
        fanout,
        tx: tx.clone(),
        timer_arming: 0,
        timer_task: None,
        hand_epoch: 0,
    };
    tokio::spawn(actor.run(rx));
    RoomHandle::new(tx)
}

struct RoomActor {
    room_id: RoomId,
    config: RoomConfig,
    engine: HandEngine,
    store: Arc<dyn HandStore>,
    fanout: Arc<dyn RoomBroadcaster>,
    tx: mpsc::Sender<RoomCommand>,
    timer_arming: u64,
    timer_task: Option<JoinHandle<()>>,
    hand_epoch: u64,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                RoomCommand::StartHand => self.start_hand().await,
                RoomCommand::Act {
                    user_id,
                    action,
                    reply,
                } => self.act(user_id, action, reply).await,
                RoomCommand::Snapshot { viewer, reply } => {
                    let _ = reply.send(self.engine.snapshot(viewer));
                }
                RoomCommand::TimerTick { arming, remaining } => {
                    if arming == self.timer_arming {
                        self.fanout.broadcast(
                            self.room_id,
                            &GameEvent::TurnTick {
                                time_remaining: remaining,
                            },
                        );
                    }
                }
                RoomCommand::TimerExpired { arming } => {
                    if arming == self.timer_arming {
                        self.turn_timed_out().await;
                    }
                }
                RoomCommand::NextHand { epoch } => {
                    if epoch == self.hand_epoch {
                        self.start_hand().await;
                    }
                }
            }
        }
        self.disarm_timer();
        debug!(room_id = %self.room_id, "room actor stopped");
    }

    async fn start_hand(&mut self) {
        match self.engine.start_hand() {
            Ok(output) => self.process_output(output).await,
            Err(EngineError::NotEnoughPlayers | EngineError::HandInProgress) => {
                debug!(room_id = %self.room_id, "start request ignored");
            }
            Err(EngineError::Stopped) => {}
            Err(fatal) => self.fail_room(&fatal).await,
        }
    }

    async fn act(
        &mut self,
        user_id: UserId,
        action: PlayerAction,
        reply: oneshot::Sender<Result<(), ActionError>>,
    ) {
        match self.engine.submit_action(user_id, action) {
            Ok(output) => {
                // Reply once the effects have been applied, so a caller
                // that awaits the reply observes the persisted action.
                self.process_output(output).await;
                let _ = reply.send(Ok(()));
            }
            Err(EngineError::Rejected(rejection)) => {
                // Rejections go back to the submitter only; the room
                // never hears about them.
                self.fanout.send_private(
                    self.room_id,
                    user_id,
                    &GameEvent::GameError {
                        message: rejection.to_string(),
                        kind: rejection.kind().to_string(),
                    },
                );
                let _ = reply.send(Err(rejection));
            }
            Err(fatal) => {
                self.fail_room(&fatal).await;
                drop(reply);
            }
        }
    }

    async fn turn_timed_out(&mut self) {
        match self.engine.handle_timeout() {
            Ok(Some(output)) => self.process_output(output).await,
            Ok(None) => {}
            Err(fatal) => self.fail_room(&fatal).await,
        }
    }

    async fn process_output(&mut self, output: EngineOutput) {
        for write in &output.writes {
            if let Err(err) = self.apply_write(write).await {
                error!(room_id = %self.room_id, %err, "hand store write failed");
                self.storage_failed(&err).await;
                return;
            }
        }
        for outbound in output.events {
            match outbound {
                Outbound::Broadcast(event) => self.fanout.broadcast(self.room_id, &event),
                Outbound::Private(user_id, event) => {
                    self.fanout.send_private(self.room_id, user_id, &event);
                }
            }
        }
        match output.timer {
            TimerCmd::Arm { seconds } => self.arm_timer(seconds),
            TimerCmd::Disarm => self.disarm_timer(),
        }
        match output.followup {
            Followup::NextHand => self.schedule_next_hand(),
            Followup::GameOver => {
                debug!(room_id = %self.room_id, "game over, no further hands");
            }
            Followup::None => {}
        }
    }

    async fn apply_write(&self, write: &HandWrite) -> Result<(), HandStoreError> {
        match write {
            HandWrite::InsertHand {
                hand_id,
                room_id,
                hand_number,
                dealer_seat,
                sb_seat,
                bb_seat,
                street,
                pot,
            } => {
                self.store
                    .insert_hand(&HandRecordInsert {
                        hand_id: *hand_id,
                        game_id: *room_id,
                        hand_number: *hand_number,
                        dealer_seat: *dealer_seat,
                        sb_seat: *sb_seat,
                        bb_seat: *bb_seat,
                        street: *street,
                        pot: *pot,
                    })
                    .await
            }
            HandWrite::InsertHoleCards {
                hand_id,
                user_id,
                cards,
            } => {
                self.store
                    .insert_hole_cards(&HoleCardsInsert {
                        hand_id: *hand_id,
                        user_id: *user_id,
                        card_1: cards[0],
                        card_2: cards[1],
                    })
                    .await
            }
            HandWrite::InsertAction {
                hand_id,
                user_id,
                kind,
                amount,
                street,
            } => {
                self.store
                    .insert_action(&ActionInsert {
                        hand_id: *hand_id,
                        user_id: *user_id,
                        action_type: *kind,
                        amount: *amount,
                        street: *street,
                    })
                    .await
            }
            HandWrite::UpdateHand {
                hand_id,
                board,
                street,
                pot,
            } => {
                self.store
                    .update_hand_board(*hand_id, board, *street, *pot)
                    .await
            }
            HandWrite::InsertWinner {
                hand_id,
                user_id,
                amount_won,
                hand_rank_name,
            } => {
                self.store
                    .insert_winner(&WinnerInsert {
                        hand_id: *hand_id,
                        user_id: *user_id,
                        amount_won: *amount_won,
                        hand_rank: hand_rank_name.clone(),
                    })
                    .await
            }
            HandWrite::MarkHandCompleted { hand_id } => {
                self.store.mark_hand_completed(*hand_id).await
            }
        }
    }

    /// Storage is room-fatal: chip state is not rolled back, the room
    /// goes quiescent, and operators reconcile from logs.
    async fn storage_failed(&mut self, err: &HandStoreError) {
        self.engine.fault();
        self.disarm_timer();
        self.hand_epoch += 1;
        self.fanout.broadcast(
            self.room_id,
            &GameEvent::GameError {
                message: err.to_string(),
                kind: "StorageFailure".to_string(),
            },
        );
    }

    async fn fail_room(&mut self, err: &EngineError) {
        error!(room_id = %self.room_id, %err, "room engine failed");
        self.engine.fault();
        self.disarm_timer();
        self.hand_epoch += 1;
        let kind = match err {
            EngineError::DeckExhausted => "DeckExhausted",
            _ => "EngineFailure",
        };
        self.fanout.broadcast(
            self.room_id,
            &GameEvent::GameError {
                message: err.to_string(),
                kind: kind.to_string(),
            },
        );
    }

    /// Start the per-turn countdown. Each arming gets a fresh
    /// generation; ticks and the expiry carry it, so anything queued by
    /// an earlier arming is ignored once the timer is disarmed.
    fn arm_timer(&mut self, seconds: u32) {
        self.disarm_timer();
        self.timer_arming += 1;
        let arming = self.timer_arming;
        let tx = self.tx.clone();
        self.timer_task = Some(tokio::spawn(async move {
            for elapsed in 1..=seconds {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let tick = RoomCommand::TimerTick {
                    arming,
                    remaining: seconds - elapsed,
                };
                if tx.send(tick).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(RoomCommand::TimerExpired { arming }).await;
        }));
    }

    fn disarm_timer(&mut self) {
        self.timer_arming += 1;
        if let Some(task) = self.timer_task.take() {
            task.abort();
        }
    }

    fn schedule_next_hand(&mut self) {
        self.hand_epoch += 1;
        let epoch = self.hand_epoch;
        let pause = self.config.inter_hand_pause;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(pause).await;
            if tx.send(RoomCommand::NextHand { epoch }).await.is_err() {
                warn!("room closed before the scheduled hand");
            }
        });
    }
}
