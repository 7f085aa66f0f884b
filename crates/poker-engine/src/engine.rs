use thiserror::Error;
use tracing::debug;

use poker_domain::{
    ActionError, ActionKind, Card, Chips, GameEvent, GameWinner, HandId, LegalAction, MoneyError,
    PlayerAction, RoomId, SeatId, StackEntry, Street, UserId, WinnerEntry,
    snapshot::{EngineSnapshot, PlayerView},
};

use crate::deck::{Deck, DeckError};
use crate::eval::{self, HandRank};
use crate::pot::{partition_pots, split_pot};
use crate::state::{HandState, PlayerState, TableConfig};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Client-recoverable rejection; no state was mutated.
    #[error(transparent)]
    Rejected(#[from] ActionError),
    #[error("hand already in progress")]
    HandInProgress,
    #[error("not enough players to start a hand")]
    NotEnoughPlayers,
    #[error("engine is stopped")]
    Stopped,
    /// Room-fatal: the deck ran out mid-hand.
    #[error("deck exhausted")]
    DeckExhausted,
    /// Room-fatal: chip arithmetic over/underflow.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl From<DeckError> for EngineError {
    fn from(_: DeckError) -> Self {
        EngineError::DeckExhausted
    }
}

impl EngineError {
    /// True for errors that poison the room rather than bouncing back
    /// to the submitting client.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::DeckExhausted | EngineError::Money(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    InHand,
    Faulted,
    Ended,
}

/// An event bound for the fan-out layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Broadcast(GameEvent),
    Private(UserId, GameEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCmd {
    Arm { seconds: u32 },
    Disarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    /// Schedule the next hand after the inter-hand pause.
    NextHand,
    GameOver,
}

/// A durable write the room actor must issue, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandWrite {
    InsertHand {
        hand_id: HandId,
        room_id: RoomId,
        hand_number: u64,
        dealer_seat: SeatId,
        sb_seat: SeatId,
        bb_seat: SeatId,
        street: Street,
        pot: Chips,
    },
    InsertHoleCards {
        hand_id: HandId,
        user_id: UserId,
        cards: [Card; 2],
    },
    InsertAction {
        hand_id: HandId,
        user_id: UserId,
        kind: ActionKind,
        amount: Chips,
        street: Street,
    },
    UpdateHand {
        hand_id: HandId,
        board: Vec<Card>,
        street: Street,
        pot: Chips,
    },
    InsertWinner {
        hand_id: HandId,
        user_id: UserId,
        amount_won: Chips,
        hand_rank_name: String,
    },
    MarkHandCompleted {
        hand_id: HandId,
    },
}

/// Ordered effects of one engine step. The room actor performs the
/// writes first, then the fan-out, then the timer command.
#[derive(Debug)]
pub struct EngineOutput {
    pub events: Vec<Outbound>,
    pub writes: Vec<HandWrite>,
    pub timer: TimerCmd,
    pub followup: Followup,
}

impl EngineOutput {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            writes: Vec::new(),
            timer: TimerCmd::Disarm,
            followup: Followup::None,
        }
    }

    fn broadcast(&mut self, event: GameEvent) {
        self.events.push(Outbound::Broadcast(event));
    }

    fn private(&mut self, user_id: UserId, event: GameEvent) {
        self.events.push(Outbound::Private(user_id, event));
    }
}

/// A player taking a seat when the room engine is constructed.
#[derive(Debug, Clone)]
pub struct SeatedPlayer {
    pub user_id: UserId,
    pub username: String,
    pub position: SeatId,
    pub buy_in: Chips,
}

/// The authoritative per-room hand state machine. Single-threaded; the
/// room actor owns it exclusively and serializes every mutation.
#[derive(Debug)]
pub struct HandEngine {
    room_id: RoomId,
    config: TableConfig,
    players: Vec<PlayerState>,
    hand_number: u64,
    dealer_pos: Option<SeatId>,
    sb_pos: Option<SeatId>,
    bb_pos: Option<SeatId>,
    hand: Option<HandState>,
    phase: EnginePhase,
}

impl HandEngine {
    #[must_use]
    pub fn new(room_id: RoomId, config: TableConfig, seats: Vec<SeatedPlayer>) -> Self {
        let mut players: Vec<PlayerState> = seats
            .into_iter()
            .map(|s| PlayerState::new(s.user_id, s.username, s.position, s.buy_in))
            .collect();
        players.sort_unstable_by_key(|p| p.position);
        Self {
            room_id,
            config,
            players,
            hand_number: 0,
            dealer_pos: None,
            sb_pos: None,
            bb_pos: None,
            hand: None,
            phase: EnginePhase::Idle,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    #[must_use]
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }

    #[must_use]
    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    #[must_use]
    pub fn to_act_pos(&self) -> Option<SeatId> {
        self.hand.as_ref().and_then(|h| h.to_act_pos)
    }

    #[must_use]
    pub fn user_at(&self, position: SeatId) -> Option<UserId> {
        self.players
            .iter()
            .find(|p| p.position == position)
            .map(|p| p.user_id)
    }

    /// Move the room into the quiescent error state. Further actions
    /// are refused; chip state is left as-is for operator reconciliation.
    pub fn fault(&mut self) {
        self.phase = EnginePhase::Faulted;
        if let Some(hand) = self.hand.as_mut() {
            hand.to_act_pos = None;
        }
    }

    pub fn start_hand(&mut self) -> Result<EngineOutput, EngineError> {
        self.start_hand_with_deck(Deck::new_shuffled())
    }

    /// Start a hand from a caller-supplied deck. The production path is
    /// [`HandEngine::start_hand`]; scripted decks drive deterministic
    /// tests and replays.
    pub fn start_hand_with_deck(&mut self, deck: Deck) -> Result<EngineOutput, EngineError> {
        match self.phase {
            EnginePhase::Idle => {}
            EnginePhase::InHand => return Err(EngineError::HandInProgress),
            EnginePhase::Faulted | EnginePhase::Ended => return Err(EngineError::Stopped),
        }
        if self.seats().len() < self.config.min_players {
            return Err(EngineError::NotEnoughPlayers);
        }

        self.hand_number += 1;
        // Eliminated seats reset too, so no stale hole cards or
        // commitments leak into the new hand's bookkeeping.
        for player in self.players.iter_mut() {
            player.reset_for_hand();
        }

        if self.dealer_pos.is_none() {
            let first = self.seats()[0];
            self.assign_positions(first);
        }
        let dealer = self.dealer_pos.ok_or(EngineError::NotEnoughPlayers)?;
        let sb = self.sb_pos.ok_or(EngineError::NotEnoughPlayers)?;
        let bb = self.bb_pos.ok_or(EngineError::NotEnoughPlayers)?;

        self.hand = Some(HandState {
            hand_id: HandId::new(),
            street: Street::Preflop,
            board: Vec::new(),
            pot: Chips::ZERO,
            current_bet: self.config.big_blind,
            min_raise: self.config.big_blind,
            last_aggressor_pos: Some(bb),
            to_act_pos: None,
            deck,
        });
        self.phase = EnginePhase::InHand;

        let small_blind = self.config.small_blind;
        let big_blind = self.config.big_blind;
        self.commit(sb, small_blind)?;
        self.commit(bb, big_blind)?;

        // Two passes, one card each, clockwise from the dealer's left.
        let deal_order = self.rotation_from(dealer);
        for _ in 0..2 {
            for &seat in &deal_order {
                let card = self.deal_one()?;
                let player = self.player_mut(seat)?;
                if let Some(pair) = player.hole_cards.as_mut() {
                    pair[1] = card;
                } else {
                    player.hole_cards = Some([card, card]);
                }
            }
        }

        let mut out = EngineOutput::new();
        let hand = self.hand.as_ref().ok_or(EngineError::Stopped)?;
        let hand_id = hand.hand_id;
        out.writes.push(HandWrite::InsertHand {
            hand_id,
            room_id: self.room_id,
            hand_number: self.hand_number,
            dealer_seat: dealer,
            sb_seat: sb,
            bb_seat: bb,
            street: Street::Preflop,
            pot: hand.pot,
        });
        for &seat in &deal_order {
            let player = self.player(seat)?;
            if let Some(cards) = player.hole_cards {
                out.writes.push(HandWrite::InsertHoleCards {
                    hand_id,
                    user_id: player.user_id,
                    cards,
                });
            }
        }

        out.broadcast(GameEvent::HandStarted {
            hand_number: self.hand_number,
            dealer_pos: dealer,
            sb_pos: sb,
            bb_pos: bb,
            pot: hand.pot,
        });
        for &seat in &deal_order {
            let player = self.player(seat)?;
            if let Some(hole_cards) = player.hole_cards {
                out.private(player.user_id, GameEvent::HoleCardsDealt { hole_cards });
            }
        }

        debug!(
            room_id = %self.room_id,
            hand_number = self.hand_number,
            dealer,
            "hand started"
        );
        self.advance(&mut out, bb)?;
        Ok(out)
    }

    /// Validate and apply one client action, then move the hand
    /// forward. Rejections leave all state untouched.
    pub fn submit_action(
        &mut self,
        user_id: UserId,
        action: PlayerAction,
    ) -> Result<EngineOutput, EngineError> {
        if self.phase != EnginePhase::InHand {
            return Err(ActionError::NotInHand.into());
        }
        let seat = {
            let player = self
                .players
                .iter()
                .find(|p| p.user_id == user_id)
                .ok_or_else(|| ActionError::BadInput("unknown user for this room".into()))?;
            if player.folded || player.all_in || player.eliminated {
                return Err(ActionError::NotInHand.into());
            }
            player.position
        };
        if self.to_act_pos() != Some(seat) {
            return Err(ActionError::NotYourTurn.into());
        }

        let committed_amount = self.apply_action(seat, action)?;

        let mut out = EngineOutput::new();
        let hand = self.hand.as_ref().ok_or(EngineError::Stopped)?;
        out.writes.push(HandWrite::InsertAction {
            hand_id: hand.hand_id,
            user_id,
            kind: action.kind(),
            amount: committed_amount,
            street: hand.street,
        });
        out.broadcast(GameEvent::ActionPerformed {
            user_id,
            action: action.kind(),
            amount: committed_amount,
            pot: hand.pot,
            current_bet: hand.current_bet,
        });
        out.broadcast(GameEvent::PotUpdated { pot: hand.pot });

        self.advance(&mut out, seat)?;
        Ok(out)
    }

    /// Turn-timer expiry: the acting player folds as if they had
    /// submitted Fold themselves. No-op when no turn is pending.
    pub fn handle_timeout(&mut self) -> Result<Option<EngineOutput>, EngineError> {
        if self.phase != EnginePhase::InHand {
            return Ok(None);
        }
        let Some(seat) = self.to_act_pos() else {
            return Ok(None);
        };
        let user_id = self.user_at(seat).ok_or(EngineError::Stopped)?;
        debug!(room_id = %self.room_id, seat, "turn timed out, auto-folding");
        match self.submit_action(user_id, PlayerAction::Fold) {
            Ok(out) => Ok(Some(out)),
            Err(EngineError::Rejected(_)) => Ok(None),
            Err(fatal) => Err(fatal),
        }
    }

    /// The actions currently legal for a seat. Empty unless it is that
    /// seat's turn.
    #[must_use]
    pub fn legal_actions(&self, seat: SeatId) -> Vec<LegalAction> {
        let Some(hand) = self.hand.as_ref() else {
            return Vec::new();
        };
        if hand.to_act_pos != Some(seat) {
            return Vec::new();
        }
        let Ok(player) = self.player(seat) else {
            return Vec::new();
        };

        let to_call = hand.current_bet.saturating_sub(player.committed_this_street);
        let mut actions = vec![LegalAction {
            kind: ActionKind::Fold,
            min_amount: None,
            max_amount: None,
        }];
        if to_call.is_zero() {
            actions.push(LegalAction {
                kind: ActionKind::Check,
                min_amount: None,
                max_amount: None,
            });
        } else {
            let call = to_call.min(player.stack);
            actions.push(LegalAction {
                kind: ActionKind::Call,
                min_amount: Some(call),
                max_amount: Some(call),
            });
        }
        let min_raise_to = Chips(hand.current_bet.as_u64().saturating_add(hand.min_raise.as_u64()));
        let all_in_to = Chips(
            player
                .committed_this_street
                .as_u64()
                .saturating_add(player.stack.as_u64()),
        );
        if all_in_to >= min_raise_to {
            actions.push(LegalAction {
                kind: ActionKind::Raise,
                min_amount: Some(min_raise_to),
                max_amount: Some(all_in_to),
            });
        }
        if !player.stack.is_zero() {
            actions.push(LegalAction {
                kind: ActionKind::AllIn,
                min_amount: None,
                max_amount: Some(player.stack),
            });
        }
        actions
    }

    /// Public room view with hole cards filtered to the viewer.
    #[must_use]
    pub fn snapshot(&self, viewer: Option<UserId>) -> EngineSnapshot {
        let hand = self.hand.as_ref();
        let players = self
            .players
            .iter()
            .map(|p| PlayerView {
                user_id: p.user_id,
                username: p.username.clone(),
                position: p.position,
                stack: p.stack,
                committed_this_street: p.committed_this_street,
                folded: p.folded,
                all_in: p.all_in,
                eliminated: p.eliminated,
                hole_cards: p.hole_cards.filter(|_| viewer == Some(p.user_id)),
            })
            .collect();
        let legal_actions = viewer
            .and_then(|user_id| {
                self.players
                    .iter()
                    .find(|p| p.user_id == user_id)
                    .map(|p| self.legal_actions(p.position))
            })
            .unwrap_or_default();
        EngineSnapshot {
            hand_number: self.hand_number,
            in_hand: self.phase == EnginePhase::InHand,
            street: hand.map(|h| h.street),
            board: hand.map(|h| h.board.clone()).unwrap_or_default(),
            pot: hand.map(|h| h.pot).unwrap_or(Chips::ZERO),
            current_bet: hand.map(|h| h.current_bet).unwrap_or(Chips::ZERO),
            min_raise: hand.map(|h| h.min_raise).unwrap_or(self.config.big_blind),
            dealer_pos: self.dealer_pos,
            sb_pos: self.sb_pos,
            bb_pos: self.bb_pos,
            to_act_pos: hand.and_then(|h| h.to_act_pos),
            players,
            legal_actions,
        }
    }

    // ---- action application ----

    fn apply_action(&mut self, seat: SeatId, action: PlayerAction) -> Result<Chips, EngineError> {
        let (current_bet, min_raise) = {
            let hand = self.hand.as_ref().ok_or(ActionError::NotInHand)?;
            (hand.current_bet, hand.min_raise)
        };
        let (committed, stack) = {
            let player = self.player(seat)?;
            (player.committed_this_street, player.stack)
        };
        let to_call = current_bet.saturating_sub(committed);

        match action {
            PlayerAction::Fold => {
                let player = self.player_mut(seat)?;
                player.folded = true;
                player.has_acted_this_street = true;
                Ok(Chips::ZERO)
            }
            PlayerAction::Check => {
                if !to_call.is_zero() {
                    return Err(ActionError::IllegalAction(
                        "cannot check while facing a bet".into(),
                    )
                    .into());
                }
                self.player_mut(seat)?.has_acted_this_street = true;
                Ok(Chips::ZERO)
            }
            PlayerAction::Call => {
                if to_call.is_zero() {
                    return Err(ActionError::IllegalAction("nothing to call".into()).into());
                }
                // A short stack calls for whatever it has left.
                let paid = self.commit(seat, to_call)?;
                self.player_mut(seat)?.has_acted_this_street = true;
                Ok(paid)
            }
            PlayerAction::Raise { amount: raise_to } => {
                if raise_to.is_zero() {
                    return Err(
                        ActionError::BadInput("raise amount must be positive".into()).into()
                    );
                }
                let min_to = current_bet.checked_add(min_raise)?;
                if raise_to < min_to {
                    return Err(ActionError::IllegalAction(format!(
                        "raise to {raise_to} is below the minimum of {min_to}"
                    ))
                    .into());
                }
                let delta = raise_to.checked_sub(committed)?;
                if delta > stack {
                    return Err(ActionError::InsufficientChips.into());
                }
                let paid = self.commit(seat, delta)?;
                {
                    let hand = self.hand.as_mut().ok_or(ActionError::NotInHand)?;
                    hand.min_raise = raise_to.checked_sub(current_bet)?;
                    hand.current_bet = raise_to;
                    hand.last_aggressor_pos = Some(seat);
                }
                self.reopen_action(seat);
                self.player_mut(seat)?.has_acted_this_street = true;
                Ok(paid)
            }
            PlayerAction::AllIn => {
                if stack.is_zero() {
                    return Err(ActionError::NotInHand.into());
                }
                let paid = self.commit(seat, stack)?;
                let new_total = self.player(seat)?.committed_this_street;
                if new_total > current_bet {
                    let increment = new_total.checked_sub(current_bet)?;
                    {
                        let hand = self.hand.as_mut().ok_or(ActionError::NotInHand)?;
                        hand.current_bet = new_total;
                    }
                    // A short all-in raises the price to call but does
                    // not reopen action; only a full raise does.
                    if increment >= min_raise {
                        let hand = self.hand.as_mut().ok_or(ActionError::NotInHand)?;
                        hand.min_raise = increment;
                        hand.last_aggressor_pos = Some(seat);
                        self.reopen_action(seat);
                    }
                }
                self.player_mut(seat)?.has_acted_this_street = true;
                Ok(paid)
            }
        }
    }

    /// Move chips from a stack into the pot, capped at the stack.
    /// Returns the amount actually paid; a drained stack goes all-in.
    fn commit(&mut self, seat: SeatId, desired: Chips) -> Result<Chips, EngineError> {
        let paid = {
            let player = self
                .players
                .iter_mut()
                .find(|p| p.position == seat)
                .ok_or_else(|| ActionError::BadInput("unknown seat".into()))?;
            let paid = desired.min(player.stack);
            player.stack = player.stack.checked_sub(paid)?;
            player.committed_this_street = player.committed_this_street.checked_add(paid)?;
            player.committed_this_hand = player.committed_this_hand.checked_add(paid)?;
            if player.stack.is_zero() {
                player.all_in = true;
            }
            paid
        };
        let hand = self.hand.as_mut().ok_or(ActionError::NotInHand)?;
        hand.pot = hand.pot.checked_add(paid)?;
        Ok(paid)
    }

    /// After a full raise, everyone else who could still act owes a
    /// response.
    fn reopen_action(&mut self, raiser: SeatId) {
        for player in self.players.iter_mut() {
            if player.position != raiser && player.can_act() {
                player.has_acted_this_street = false;
            }
        }
    }

    // ---- hand progression ----

    fn advance(&mut self, out: &mut EngineOutput, from_seat: SeatId) -> Result<(), EngineError> {
        if self.live_count() <= 1 {
            return self.hand_complete(out);
        }
        if self.round_complete() {
            return self.next_streets(out);
        }
        let Some(next_seat) = self.next_seat(from_seat, |p| p.can_act()) else {
            // Everyone left to speak is all-in; run the board out.
            return self.next_streets(out);
        };
        self.begin_turn(out, next_seat)
    }

    fn round_complete(&self) -> bool {
        let Some(hand) = self.hand.as_ref() else {
            return false;
        };
        self.players.iter().filter(|p| p.is_live()).all(|p| {
            p.all_in
                || (p.has_acted_this_street && p.committed_this_street == hand.current_bet)
        })
    }

    fn next_streets(&mut self, out: &mut EngineOutput) -> Result<(), EngineError> {
        loop {
            let current = self
                .hand
                .as_ref()
                .ok_or(EngineError::Stopped)?
                .street;
            let Some(next) = current.next() else {
                return self.hand_complete(out);
            };

            for player in self.players.iter_mut().filter(|p| !p.eliminated) {
                player.committed_this_street = Chips::ZERO;
                player.has_acted_this_street = player.all_in;
            }
            let big_blind = self.config.big_blind;
            let dealt = {
                let hand = self.hand.as_mut().ok_or(EngineError::Stopped)?;
                hand.street = next;
                hand.current_bet = Chips::ZERO;
                hand.min_raise = big_blind;
                hand.last_aggressor_pos = None;
                hand.to_act_pos = None;
                let dealt = hand.deck.deal(next.cards_dealt())?;
                hand.board.extend_from_slice(&dealt);
                dealt
            };
            debug!(room_id = %self.room_id, street = next.as_str(), cards = ?dealt, "street advanced");

            let hand = self.hand.as_ref().ok_or(EngineError::Stopped)?;
            out.writes.push(HandWrite::UpdateHand {
                hand_id: hand.hand_id,
                board: hand.board.clone(),
                street: next,
                pot: hand.pot,
            });
            out.broadcast(GameEvent::StreetAdvanced {
                street: next,
                board: hand.board.clone(),
                pot: hand.pot,
            });

            if self.players.iter().filter(|p| p.can_act()).count() >= 2 {
                let dealer = self.dealer_pos.ok_or(EngineError::Stopped)?;
                let Some(first) = self.next_seat(dealer, |p| p.can_act()) else {
                    continue;
                };
                return self.begin_turn(out, first);
            }
            // All-in runout: keep dealing until the river, then showdown.
        }
    }

    fn begin_turn(&mut self, out: &mut EngineOutput, seat: SeatId) -> Result<(), EngineError> {
        let user_id = self.user_at(seat).ok_or(EngineError::Stopped)?;
        let (current_bet, min_raise) = {
            let hand = self.hand.as_mut().ok_or(EngineError::Stopped)?;
            hand.to_act_pos = Some(seat);
            (hand.current_bet, hand.min_raise)
        };
        let call_amount = {
            let player = self.player(seat)?;
            current_bet
                .saturating_sub(player.committed_this_street)
                .min(player.stack)
        };
        out.broadcast(GameEvent::TurnStarted {
            user_id,
            position: seat,
            time_remaining: self.config.turn_seconds,
            current_bet,
            min_raise,
            call_amount,
        });
        out.timer = TimerCmd::Arm {
            seconds: self.config.turn_seconds,
        };
        Ok(())
    }

    fn hand_complete(&mut self, out: &mut EngineOutput) -> Result<(), EngineError> {
        let (hand_id, pot, board) = {
            let hand = self.hand.as_mut().ok_or(EngineError::Stopped)?;
            hand.street = Street::Showdown;
            hand.to_act_pos = None;
            (hand.hand_id, hand.pot, hand.board.clone())
        };
        let dealer = self.dealer_pos.ok_or(EngineError::Stopped)?;

        let live: Vec<SeatId> = self
            .players
            .iter()
            .filter(|p| p.is_live())
            .map(|p| p.position)
            .collect();
        let showdown = live.len() > 1;

        // Payouts per seat, in rotation order from the dealer's left so
        // odd chips land deterministically.
        let rotation = self.rotation_from(dealer);
        let mut won: Vec<(SeatId, Chips, String)> = Vec::new();
        if let [single] = live[..] {
            let rank_name = "Win by fold".to_string();
            won.push((single, pot, rank_name));
        } else {
            let ranked: Vec<(SeatId, HandRank)> = self
                .players
                .iter()
                .filter(|p| p.is_live())
                .filter_map(|p| {
                    p.hole_cards
                        .map(|hole| (p.position, eval::evaluate(hole, &board)))
                })
                .collect();
            let contributions: Vec<(SeatId, Chips, bool)> = self
                .players
                .iter()
                .filter(|p| !p.eliminated)
                .map(|p| (p.position, p.committed_this_hand, p.folded))
                .collect();
            for pot_layer in partition_pots(&contributions) {
                let best: Vec<SeatId> = {
                    let in_layer: Vec<(SeatId, &HandRank)> = ranked
                        .iter()
                        .filter(|(seat, _)| pot_layer.eligible.contains(seat))
                        .map(|(seat, rank)| (*seat, rank))
                        .collect();
                    let Some(top) = in_layer.iter().map(|(_, rank)| *rank).max() else {
                        continue;
                    };
                    in_layer
                        .iter()
                        .filter(|(_, rank)| *rank == top)
                        .map(|(seat, _)| *seat)
                        .collect()
                };
                let ordered: Vec<SeatId> = rotation
                    .iter()
                    .copied()
                    .filter(|seat| best.contains(seat))
                    .collect();
                for (seat, share) in split_pot(pot_layer.amount, &ordered) {
                    let rank_name = ranked
                        .iter()
                        .find(|(s, _)| *s == seat)
                        .map(|(_, rank)| rank.category.name().to_string())
                        .unwrap_or_default();
                    match won.iter_mut().find(|(s, _, _)| *s == seat) {
                        Some((_, total, _)) => *total = total.checked_add(share)?,
                        None => won.push((seat, share, rank_name)),
                    }
                }
            }
        }

        // Order winner entries by rotation for stable output.
        won.sort_by_key(|(seat, _, _)| {
            rotation.iter().position(|s| s == seat).unwrap_or(usize::MAX)
        });

        let mut winner_entries = Vec::with_capacity(won.len());
        for (seat, amount, rank_name) in &won {
            let player = self
                .players
                .iter_mut()
                .find(|p| p.position == *seat)
                .ok_or(EngineError::Stopped)?;
            player.stack = player.stack.checked_add(*amount)?;
            winner_entries.push(WinnerEntry {
                user_id: player.user_id,
                amount_won: *amount,
                hand_rank_name: rank_name.clone(),
                hole_cards: if showdown { player.hole_cards } else { None },
            });
        }

        out.writes.push(HandWrite::UpdateHand {
            hand_id,
            board: board.clone(),
            street: Street::Complete,
            pot,
        });
        for entry in &winner_entries {
            out.writes.push(HandWrite::InsertWinner {
                hand_id,
                user_id: entry.user_id,
                amount_won: entry.amount_won,
                hand_rank_name: entry.hand_rank_name.clone(),
            });
        }
        out.writes.push(HandWrite::MarkHandCompleted { hand_id });
        out.broadcast(GameEvent::WinnerDetermined {
            winners: winner_entries,
            pot,
            board,
        });

        self.hand = None;
        self.rotate(out);
        Ok(())
    }

    /// End-of-hand rotation: bust players out, advance the button, and
    /// either schedule the next hand or end the game.
    fn rotate(&mut self, out: &mut EngineOutput) {
        for player in self.players.iter_mut() {
            if player.stack.is_zero() {
                player.eliminated = true;
            }
        }
        out.broadcast(GameEvent::StacksUpdated {
            players: self
                .players
                .iter()
                .map(|p| StackEntry {
                    user_id: p.user_id,
                    stack: p.stack,
                    eliminated: p.eliminated,
                })
                .collect(),
        });

        let remaining = self.seats();
        if remaining.len() < 2 {
            let winner = self
                .players
                .iter()
                .find(|p| !p.stack.is_zero())
                .map(|p| GameWinner {
                    user_id: p.user_id,
                    stack: p.stack,
                });
            out.broadcast(GameEvent::GameEnded { winner });
            out.timer = TimerCmd::Disarm;
            out.followup = Followup::GameOver;
            self.phase = EnginePhase::Ended;
            debug!(room_id = %self.room_id, "game ended");
            return;
        }

        if let Some(dealer) = self.dealer_pos
            && let Some(next_dealer) = self.next_seat(dealer, |p| !p.eliminated)
        {
            self.assign_positions(next_dealer);
        }
        if let (Some(dealer_pos), Some(sb_pos), Some(bb_pos)) =
            (self.dealer_pos, self.sb_pos, self.bb_pos)
        {
            out.broadcast(GameEvent::PositionsUpdated {
                dealer_pos,
                sb_pos,
                bb_pos,
            });
        }
        out.timer = TimerCmd::Disarm;
        out.followup = Followup::NextHand;
        self.phase = EnginePhase::Idle;
    }

    /// Place the blinds relative to a dealer seat. Heads-up the dealer
    /// posts the small blind.
    fn assign_positions(&mut self, dealer: SeatId) {
        let seats = self.seats();
        self.dealer_pos = Some(dealer);
        if seats.len() == 2 {
            self.sb_pos = Some(dealer);
            self.bb_pos = seats.iter().copied().find(|&s| s != dealer);
        } else {
            self.sb_pos = self.next_seat(dealer, |p| !p.eliminated);
            if let Some(sb) = self.sb_pos {
                self.bb_pos = self.next_seat(sb, |p| !p.eliminated);
            }
        }
    }

    // ---- seat order helpers ----

    /// Positions of non-eliminated players in clockwise (sorted) order.
    fn seats(&self) -> Vec<SeatId> {
        self.players
            .iter()
            .filter(|p| !p.eliminated)
            .map(|p| p.position)
            .collect()
    }

    /// First seat strictly clockwise of `after` whose player satisfies
    /// the predicate, wrapping around and considering `after` last.
    fn next_seat<F>(&self, after: SeatId, pred: F) -> Option<SeatId>
    where
        F: Fn(&PlayerState) -> bool,
    {
        let positions: Vec<SeatId> = self.players.iter().map(|p| p.position).collect();
        let start = positions.iter().position(|&p| p == after)?;
        (1..=positions.len()).find_map(|step| {
            let candidate = positions[(start + step) % positions.len()];
            let player = self.players.iter().find(|p| p.position == candidate)?;
            pred(player).then_some(candidate)
        })
    }

    /// Non-eliminated seats in clockwise order starting left of `start`,
    /// with `start` last when present.
    fn rotation_from(&self, start: SeatId) -> Vec<SeatId> {
        let seats = self.seats();
        let pivot = seats
            .iter()
            .position(|&s| s > start)
            .unwrap_or(0);
        let mut ordered = Vec::with_capacity(seats.len());
        ordered.extend_from_slice(&seats[pivot..]);
        ordered.extend_from_slice(&seats[..pivot]);
        ordered
    }

    fn live_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_live()).count()
    }

    fn player(&self, seat: SeatId) -> Result<&PlayerState, EngineError> {
        self.players
            .iter()
            .find(|p| p.position == seat)
            .ok_or_else(|| ActionError::BadInput("unknown seat".into()).into())
    }

    fn player_mut(&mut self, seat: SeatId) -> Result<&mut PlayerState, EngineError> {
        self.players
            .iter_mut()
            .find(|p| p.position == seat)
            .ok_or_else(|| ActionError::BadInput("unknown seat".into()).into())
    }

    fn deal_one(&mut self) -> Result<Card, EngineError> {
        let hand = self.hand.as_mut().ok_or(EngineError::Stopped)?;
        Ok(hand.deck.deal_one()?)
    }
}
