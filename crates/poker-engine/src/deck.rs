use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use thiserror::Error;

use poker_domain::{Card, card::full_deck};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeckError {
    #[error("deck exhausted")]
    Exhausted,
}

/// An ordered 52-card deck dealt from the head.
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
    head: usize,
}

impl Deck {
    /// A full deck shuffled with a cryptographically secure Fisher-Yates.
    #[must_use]
    pub fn new_shuffled() -> Self {
        Self::shuffled_with(&mut OsRng)
    }

    /// Same shuffle driven by a caller-supplied CSPRNG, so tests can
    /// seed a `ChaCha20Rng` and replay exact deals.
    #[must_use]
    pub fn shuffled_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut cards = full_deck();
        for i in (1..cards.len()).rev() {
            let j = rng.gen_range(0..=i);
            cards.swap(i, j);
        }
        Self { cards, head: 0 }
    }

    /// A deck with a fixed card order, head at the front. Used by tests
    /// that script exact hole cards and boards.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards, head: 0 }
    }

    pub fn deal(&mut self, n: usize) -> Result<Vec<Card>, DeckError> {
        if n > self.remaining() {
            return Err(DeckError::Exhausted);
        }
        let dealt = self.cards[self.head..self.head + n].to_vec();
        self.head += n;
        Ok(dealt)
    }

    pub fn deal_one(&mut self) -> Result<Card, DeckError> {
        let card = *self.cards.get(self.head).ok_or(DeckError::Exhausted)?;
        self.head += 1;
        Ok(card)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len() - self.head
    }
}
