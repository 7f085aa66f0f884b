use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use poker_domain::{ActionKind, Card, Chips, HandId, RoomId, SeatId, Street, UserId};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandStoreError {
    #[error("store lock poisoned")]
    LockPoisoned,
    #[error("database error: {0}")]
    Database(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandRecordInsert {
    pub hand_id: HandId,
    pub game_id: RoomId,
    pub hand_number: u64,
    pub dealer_seat: SeatId,
    pub sb_seat: SeatId,
    pub bb_seat: SeatId,
    pub street: Street,
    pub pot: Chips,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleCardsInsert {
    pub hand_id: HandId,
    pub user_id: UserId,
    pub card_1: Card,
    pub card_2: Card,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInsert {
    pub hand_id: HandId,
    pub user_id: UserId,
    pub action_type: ActionKind,
    pub amount: Chips,
    pub street: Street,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerInsert {
    pub hand_id: HandId,
    pub user_id: UserId,
    pub amount_won: Chips,
    pub hand_rank: String,
}

/// Board cards in their persisted form: space-separated two-character
/// card strings in deal order.
#[must_use]
pub fn board_to_string(board: &[Card]) -> String {
    board
        .iter()
        .map(Card::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Durable writes the room engine issues over a hand's lifetime. Calls
/// for one hand arrive in a fixed order: the hand row first, then hole
/// cards, then actions and board updates as the hand plays, then
/// winners and completion.
#[async_trait]
pub trait HandStore: Send + Sync {
    async fn insert_hand(&self, record: &HandRecordInsert) -> Result<(), HandStoreError>;

    async fn insert_hole_cards(&self, record: &HoleCardsInsert) -> Result<(), HandStoreError>;

    async fn insert_action(&self, record: &ActionInsert) -> Result<(), HandStoreError>;

    async fn update_hand_board(
        &self,
        hand_id: HandId,
        board: &[Card],
        street: Street,
        pot: Chips,
    ) -> Result<(), HandStoreError>;

    async fn insert_winner(&self, record: &WinnerInsert) -> Result<(), HandStoreError>;

    async fn mark_hand_completed(&self, hand_id: HandId) -> Result<(), HandStoreError>;
}

#[derive(Debug, Default)]
pub struct NoopHandStore;

#[async_trait]
impl HandStore for NoopHandStore {
    async fn insert_hand(&self, _record: &HandRecordInsert) -> Result<(), HandStoreError> {
        Ok(())
    }

    async fn insert_hole_cards(&self, _record: &HoleCardsInsert) -> Result<(), HandStoreError> {
        Ok(())
    }

    async fn insert_action(&self, _record: &ActionInsert) -> Result<(), HandStoreError> {
        Ok(())
    }

    async fn update_hand_board(
        &self,
        _hand_id: HandId,
        _board: &[Card],
        _street: Street,
        _pot: Chips,
    ) -> Result<(), HandStoreError> {
        Ok(())
    }

    async fn insert_winner(&self, _record: &WinnerInsert) -> Result<(), HandStoreError> {
        Ok(())
    }

    async fn mark_hand_completed(&self, _hand_id: HandId) -> Result<(), HandStoreError> {
        Ok(())
    }
}

/// A stored hand row as the in-memory store keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHand {
    pub record: HandRecordInsert,
    pub board_cards: String,
    pub current_street: Street,
    pub pot: Chips,
    pub is_completed: bool,
    pub start_time: DateTime<Utc>,
}

/// In-memory store for tests and local development. Writes are kept in
/// arrival order; `set_failing(true)` makes every write fail, to
/// exercise the room-fatal storage path.
#[derive(Debug, Default, Clone)]
pub struct InMemoryHandStore {
    pub hands: Arc<Mutex<Vec<StoredHand>>>,
    pub hole_cards: Arc<Mutex<Vec<HoleCardsInsert>>>,
    pub actions: Arc<Mutex<Vec<ActionInsert>>>,
    pub winners: Arc<Mutex<Vec<WinnerInsert>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryHandStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<(), HandStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HandStoreError::Database("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl HandStore for InMemoryHandStore {
    async fn insert_hand(&self, record: &HandRecordInsert) -> Result<(), HandStoreError> {
        self.check_failing()?;
        self.hands
            .lock()
            .map_err(|_| HandStoreError::LockPoisoned)?
            .push(StoredHand {
                record: record.clone(),
                board_cards: String::new(),
                current_street: record.street,
                pot: record.pot,
                is_completed: false,
                start_time: Utc::now(),
            });
        Ok(())
    }

    async fn insert_hole_cards(&self, record: &HoleCardsInsert) -> Result<(), HandStoreError> {
        self.check_failing()?;
        self.hole_cards
            .lock()
            .map_err(|_| HandStoreError::LockPoisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn insert_action(&self, record: &ActionInsert) -> Result<(), HandStoreError> {
        self.check_failing()?;
        self.actions
            .lock()
            .map_err(|_| HandStoreError::LockPoisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn update_hand_board(
        &self,
        hand_id: HandId,
        board: &[Card],
        street: Street,
        pot: Chips,
    ) -> Result<(), HandStoreError> {
        self.check_failing()?;
        let mut hands = self
            .hands
            .lock()
            .map_err(|_| HandStoreError::LockPoisoned)?;
        if let Some(hand) = hands.iter_mut().find(|h| h.record.hand_id == hand_id) {
            hand.board_cards = board_to_string(board);
            hand.current_street = street;
            hand.pot = pot;
        }
        Ok(())
    }

    async fn insert_winner(&self, record: &WinnerInsert) -> Result<(), HandStoreError> {
        self.check_failing()?;
        self.winners
            .lock()
            .map_err(|_| HandStoreError::LockPoisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn mark_hand_completed(&self, hand_id: HandId) -> Result<(), HandStoreError> {
        self.check_failing()?;
        let mut hands = self
            .hands
            .lock()
            .map_err(|_| HandStoreError::LockPoisoned)?;
        if let Some(hand) = hands.iter_mut().find(|h| h.record.hand_id == hand_id) {
            hand.is_completed = true;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresHandStore {
    pool: PgPool,
}

impl PostgresHandStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn chips_to_i64(chips: Chips) -> i64 {
    i64::try_from(chips.as_u64()).unwrap_or(i64::MAX)
}

#[async_trait]
impl HandStore for PostgresHandStore {
    async fn insert_hand(&self, record: &HandRecordInsert) -> Result<(), HandStoreError> {
        sqlx::query(
            r#"
            INSERT INTO hands (
                id, game_id, hand_number, dealer_seat, sb_seat, bb_seat,
                current_street, pot_size, board_cards, is_completed, start_time
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, '', FALSE, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.hand_id.0)
        .bind(record.game_id.0)
        .bind(i64::try_from(record.hand_number).unwrap_or(i64::MAX))
        .bind(i16::from(record.dealer_seat))
        .bind(i16::from(record.sb_seat))
        .bind(i16::from(record.bb_seat))
        .bind(record.street.as_str())
        .bind(chips_to_i64(record.pot))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| HandStoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn insert_hole_cards(&self, record: &HoleCardsInsert) -> Result<(), HandStoreError> {
        sqlx::query(
            r#"
            INSERT INTO hand_cards (hand_id, user_id, card_1, card_2)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (hand_id, user_id) DO NOTHING
            "#,
        )
        .bind(record.hand_id.0)
        .bind(record.user_id.0)
        .bind(record.card_1.to_string())
        .bind(record.card_2.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| HandStoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn insert_action(&self, record: &ActionInsert) -> Result<(), HandStoreError> {
        sqlx::query(
            r#"
            INSERT INTO actions (hand_id, user_id, action_type, amount, street, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.hand_id.0)
        .bind(record.user_id.0)
        .bind(record.action_type.as_str())
        .bind(chips_to_i64(record.amount))
        .bind(record.street.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| HandStoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_hand_board(
        &self,
        hand_id: HandId,
        board: &[Card],
        street: Street,
        pot: Chips,
    ) -> Result<(), HandStoreError> {
        sqlx::query(
            r#"
            UPDATE hands
            SET board_cards = $2, current_street = $3, pot_size = $4
            WHERE id = $1
            "#,
        )
        .bind(hand_id.0)
        .bind(board_to_string(board))
        .bind(street.as_str())
        .bind(chips_to_i64(pot))
        .execute(&self.pool)
        .await
        .map_err(|e| HandStoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn insert_winner(&self, record: &WinnerInsert) -> Result<(), HandStoreError> {
        sqlx::query(
            r#"
            INSERT INTO winners (hand_id, user_id, amount_won, hand_rank, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.hand_id.0)
        .bind(record.user_id.0)
        .bind(chips_to_i64(record.amount_won))
        .bind(record.hand_rank.clone())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| HandStoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_hand_completed(&self, hand_id: HandId) -> Result<(), HandStoreError> {
        sqlx::query("UPDATE hands SET is_completed = TRUE WHERE id = $1")
            .bind(hand_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| HandStoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poker_domain::Rank;
    use poker_domain::Suit;

    fn hand_record() -> HandRecordInsert {
        HandRecordInsert {
            hand_id: HandId::new(),
            game_id: RoomId::new(),
            hand_number: 1,
            dealer_seat: 0,
            sb_seat: 1,
            bb_seat: 2,
            street: Street::Preflop,
            pot: Chips(30),
        }
    }

    #[tokio::test]
    async fn in_memory_store_updates_board_and_completion() {
        let store = InMemoryHandStore::new();
        let record = hand_record();
        store.insert_hand(&record).await.expect("insert hand");

        let board = vec![
            Card::new(Rank::Two, Suit::Clubs),
            Card::new(Rank::Seven, Suit::Diamonds),
            Card::new(Rank::Nine, Suit::Hearts),
        ];
        store
            .update_hand_board(record.hand_id, &board, Street::Flop, Chips(90))
            .await
            .expect("update board");
        store
            .mark_hand_completed(record.hand_id)
            .await
            .expect("complete");

        let hands = store.hands.lock().expect("lock");
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].board_cards, "2c 7d 9h");
        assert_eq!(hands[0].current_street, Street::Flop);
        assert_eq!(hands[0].pot, Chips(90));
        assert!(hands[0].is_completed);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_database_error() {
        let store = InMemoryHandStore::new();
        store.set_failing(true);
        let err = store
            .insert_hand(&hand_record())
            .await
            .expect_err("failing store");
        assert!(matches!(err, HandStoreError::Database(_)));
        assert!(store.hands.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn actions_are_kept_in_arrival_order() {
        let store = InMemoryHandStore::new();
        let hand_id = HandId::new();
        let user_id = UserId::new();
        for (kind, amount) in [
            (ActionKind::Call, 20),
            (ActionKind::Raise, 60),
            (ActionKind::Fold, 0),
        ] {
            store
                .insert_action(&ActionInsert {
                    hand_id,
                    user_id,
                    action_type: kind,
                    amount: Chips(amount),
                    street: Street::Preflop,
                })
                .await
                .expect("insert action");
        }
        let actions = store.actions.lock().expect("lock");
        let kinds: Vec<_> = actions.iter().map(|a| a.action_type).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Call, ActionKind::Raise, ActionKind::Fold]
        );
    }
}
