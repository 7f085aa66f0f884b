use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use poker_domain::{Card, UserId};

/// Hand categories in ascending strength order. The discriminant is the
/// primary comparison key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum HandCategory {
    HighCard = 0,
    Pair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

impl HandCategory {
    /// Display name persisted with winner records.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            HandCategory::HighCard => "High Card",
            HandCategory::Pair => "Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
        }
    }
}

/// A ranked hand: category first, then tiebreaker values compared
/// lexicographically. The derived `Ord` implements exactly that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandRank {
    pub category: HandCategory,
    pub tiebreakers: Vec<u8>,
}

impl HandRank {
    #[must_use]
    pub fn compare(&self, other: &HandRank) -> Ordering {
        self.cmp(other)
    }
}

/// Best five-card rank over two hole cards plus the board, taking the
/// maximum across every 5-card subset.
#[must_use]
pub fn evaluate(hole: [Card; 2], board: &[Card]) -> HandRank {
    let mut cards = Vec::with_capacity(2 + board.len());
    cards.extend_from_slice(&hole);
    cards.extend_from_slice(board);
    evaluate_cards(&cards)
}

#[must_use]
pub fn evaluate_cards(cards: &[Card]) -> HandRank {
    debug_assert!(cards.len() >= 5, "evaluation needs at least five cards");
    let n = cards.len();
    let mut best: Option<HandRank> = None;
    for a in 0..n {
        for b in (a + 1)..n {
            for c in (b + 1)..n {
                for d in (c + 1)..n {
                    for e in (d + 1)..n {
                        let rank =
                            rank_five([cards[a], cards[b], cards[c], cards[d], cards[e]]);
                        if best.as_ref().is_none_or(|current| rank > *current) {
                            best = Some(rank);
                        }
                    }
                }
            }
        }
    }
    best.unwrap_or(HandRank {
        category: HandCategory::HighCard,
        tiebreakers: Vec::new(),
    })
}

/// Winners among the given ranked players: everyone tied for the maximum.
#[must_use]
pub fn find_winners(ranked: &[(UserId, HandRank)]) -> Vec<UserId> {
    let Some(best) = ranked.iter().map(|(_, rank)| rank).max() else {
        return Vec::new();
    };
    ranked
        .iter()
        .filter(|(_, rank)| rank == best)
        .map(|(user_id, _)| *user_id)
        .collect()
}

fn rank_five(cards: [Card; 5]) -> HandRank {
    let mut values: Vec<u8> = cards.iter().map(|c| c.rank.value()).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = cards.iter().all(|c| c.suit == cards[0].suit);
    let straight_high = straight_high(&values);

    if let Some(high) = straight_high {
        let category = if is_flush {
            HandCategory::StraightFlush
        } else {
            HandCategory::Straight
        };
        return HandRank {
            category,
            tiebreakers: vec![high],
        };
    }

    // (count, value) groups, highest count first, then highest value.
    let mut groups: Vec<(u8, u8)> = Vec::new();
    for &v in &values {
        match groups.iter_mut().find(|(_, gv)| *gv == v) {
            Some(group) => group.0 += 1,
            None => groups.push((1, v)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));

    match (groups[0].0, groups.get(1).map(|g| g.0)) {
        (4, _) => HandRank {
            category: HandCategory::FourOfAKind,
            tiebreakers: vec![groups[0].1, groups[1].1],
        },
        (3, Some(2)) => HandRank {
            category: HandCategory::FullHouse,
            tiebreakers: vec![groups[0].1, groups[1].1],
        },
        _ if is_flush => HandRank {
            category: HandCategory::Flush,
            tiebreakers: values,
        },
        (3, _) => HandRank {
            category: HandCategory::ThreeOfAKind,
            tiebreakers: vec![groups[0].1, groups[1].1, groups[2].1],
        },
        (2, Some(2)) => HandRank {
            category: HandCategory::TwoPair,
            tiebreakers: vec![groups[0].1, groups[1].1, groups[2].1],
        },
        (2, _) => HandRank {
            category: HandCategory::Pair,
            tiebreakers: vec![groups[0].1, groups[1].1, groups[2].1, groups[3].1],
        },
        _ => HandRank {
            category: HandCategory::HighCard,
            tiebreakers: values,
        },
    }
}

/// Top card of a straight formed by these five values (sorted
/// descending), if any. The wheel A-2-3-4-5 counts with high card 5.
fn straight_high(sorted_desc: &[u8]) -> Option<u8> {
    let distinct = {
        let mut v = sorted_desc.to_vec();
        v.dedup();
        v
    };
    if distinct.len() != 5 {
        return None;
    }
    if distinct[0] - distinct[4] == 4 {
        return Some(distinct[0]);
    }
    if distinct == [14, 5, 4, 3, 2] {
        return Some(5);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(text: &str) -> Vec<Card> {
        text.split_whitespace()
            .map(|s| s.parse().expect("card"))
            .collect()
    }

    fn hole(text: &str) -> [Card; 2] {
        let parsed = cards(text);
        [parsed[0], parsed[1]]
    }

    #[test]
    fn wheel_straight_ranks_with_high_card_five() {
        let rank = evaluate(hole("As 2d"), &cards("3c 4c 5h 9d Kc"));
        assert_eq!(rank.category, HandCategory::Straight);
        assert_eq!(rank.tiebreakers, vec![5]);
    }

    #[test]
    fn wheel_loses_to_six_high_straight() {
        let wheel = evaluate(hole("As 2d"), &cards("3c 4c 5h 9d Kc"));
        let six_high = evaluate(hole("6s 2d"), &cards("3c 4c 5h 9d Kc"));
        assert_eq!(six_high.category, HandCategory::Straight);
        assert_eq!(six_high.tiebreakers, vec![6]);
        assert!(six_high > wheel);
    }

    #[test]
    fn flush_beats_straight_and_uses_top_five_of_suit() {
        let rank = evaluate(hole("Ah 2h"), &cards("9h 7h 4h Kd Qh"));
        assert_eq!(rank.category, HandCategory::Flush);
        // Six hearts available; the best five are kept.
        assert_eq!(rank.tiebreakers, vec![14, 12, 9, 7, 4]);
    }

    #[test]
    fn full_house_ranks_trip_then_pair() {
        let rank = evaluate(hole("Ks Kd"), &cards("Kc 9h 9d 2s 3c"));
        assert_eq!(rank.category, HandCategory::FullHouse);
        assert_eq!(rank.tiebreakers, vec![13, 9]);
    }

    #[test]
    fn quads_keep_best_kicker() {
        let rank = evaluate(hole("7s 7d"), &cards("7c 7h Ad Ks 2c"));
        assert_eq!(rank.category, HandCategory::FourOfAKind);
        assert_eq!(rank.tiebreakers, vec![7, 14]);
    }

    #[test]
    fn two_pair_orders_high_low_kicker() {
        let rank = evaluate(hole("Js Td"), &cards("Jc Th 4d 8s 2c"));
        assert_eq!(rank.category, HandCategory::TwoPair);
        assert_eq!(rank.tiebreakers, vec![11, 10, 8]);
    }

    #[test]
    fn pair_carries_three_kickers() {
        let rank = evaluate(hole("9s 9d"), &cards("Ac Kh 4d 8s 2c"));
        assert_eq!(rank.category, HandCategory::Pair);
        assert_eq!(rank.tiebreakers, vec![9, 14, 13, 8]);
    }

    #[test]
    fn straight_flush_outranks_quads() {
        let sf = evaluate(hole("5h 6h"), &cards("7h 8h 9h As Ad"));
        assert_eq!(sf.category, HandCategory::StraightFlush);
        assert_eq!(sf.tiebreakers, vec![9]);
        let quads = evaluate(hole("As Ad"), &cards("Ac Ah Kd 2s 3c"));
        assert!(sf > quads);
    }

    #[test]
    fn board_plays_when_hole_cards_are_dead() {
        // Both hole cards below the board; the board's straight plays.
        let rank = evaluate(hole("2s 3d"), &cards("Th Jc Qd Ks Ah"));
        assert_eq!(rank.category, HandCategory::Straight);
        assert_eq!(rank.tiebreakers, vec![14]);
    }

    #[test]
    fn compare_is_antisymmetric_and_reflexive() {
        let samples = [
            evaluate(hole("As 2d"), &cards("3c 4c 5h 9d Kc")),
            evaluate(hole("Ah 2h"), &cards("9h 7h 4h Kd Qh")),
            evaluate(hole("Ks Kd"), &cards("Kc 9h 9d 2s 3c")),
            evaluate(hole("9s 9d"), &cards("Ac Kh 4d 8s 2c")),
        ];
        for a in &samples {
            assert_eq!(a.compare(a), Ordering::Equal);
            for b in &samples {
                assert_eq!(a.compare(b), b.compare(a).reverse());
            }
        }
    }

    #[test]
    fn find_winners_returns_all_tied_for_maximum() {
        let board = cards("Th Jc Qd Ks 2h");
        let a = UserId::new();
        let b = UserId::new();
        let c = UserId::new();
        let ranked = vec![
            (a, evaluate(hole("Ah 3s"), &board)),
            (b, evaluate(hole("Ad 4c"), &board)),
            (c, evaluate(hole("2s 3d"), &board)),
        ];
        let mut winners = find_winners(&ranked);
        winners.sort_unstable();
        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(winners, expected);
    }
}
