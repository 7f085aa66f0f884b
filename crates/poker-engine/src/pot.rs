use poker_domain::{Chips, SeatId};

/// One layer of the pot partition. `eligible` holds the non-folded
/// seats whose total commitment reaches this layer's level, in seat
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: Vec<SeatId>,
}

/// Partition the pot by distinct commitment levels.
///
/// Input is every seat dealt into the hand with its full-hand
/// commitment and folded flag. Folded commitments inflate the layers
/// that cover them but grant no eligibility. The layer amounts always
/// sum to the total committed.
#[must_use]
pub fn partition_pots(contributions: &[(SeatId, Chips, bool)]) -> Vec<SidePot> {
    let mut levels: Vec<Chips> = contributions
        .iter()
        .filter_map(|&(_, amount, _)| (!amount.is_zero()).then_some(amount))
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut prev = Chips::ZERO;
    for level in levels {
        let slice = level.saturating_sub(prev);
        let contributors = contributions
            .iter()
            .filter(|&&(_, amount, _)| amount >= level)
            .count() as u64;
        let mut eligible: Vec<SeatId> = contributions
            .iter()
            .filter(|&&(_, amount, folded)| !folded && amount >= level)
            .map(|&(seat, _, _)| seat)
            .collect();
        eligible.sort_unstable();
        pots.push(SidePot {
            amount: Chips(slice.as_u64() * contributors),
            eligible,
        });
        prev = level;
    }
    pots
}

/// Split one pot among its winners: `floor(amount / n)` each, with the
/// remainder dropped one chip at a time in the order given. Callers
/// pass winners ordered clockwise from the dealer so odd chips land on
/// the earliest seat after the button.
#[must_use]
pub fn split_pot(amount: Chips, winners: &[SeatId]) -> Vec<(SeatId, Chips)> {
    if winners.is_empty() {
        return Vec::new();
    }
    let count = winners.len() as u64;
    let base = amount.as_u64() / count;
    let remainder = amount.as_u64() % count;
    winners
        .iter()
        .copied()
        .enumerate()
        .map(|(idx, seat)| (seat, Chips(base + u64::from((idx as u64) < remainder))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_is_one_pot_for_everyone() {
        let pots = partition_pots(&[
            (0, Chips(100), false),
            (1, Chips(100), false),
            (2, Chips(100), false),
        ]);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, Chips(300));
        assert_eq!(pots[0].eligible, vec![0, 1, 2]);
    }

    #[test]
    fn short_stack_creates_main_and_side_pot() {
        // A all-in for 100, B and C continue to 500 each.
        let pots = partition_pots(&[
            (0, Chips(100), false),
            (1, Chips(500), false),
            (2, Chips(500), false),
        ]);
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, Chips(300));
        assert_eq!(pots[0].eligible, vec![0, 1, 2]);
        assert_eq!(pots[1].amount, Chips(800));
        assert_eq!(pots[1].eligible, vec![1, 2]);
        let total: u64 = pots.iter().map(|p| p.amount.as_u64()).sum();
        assert_eq!(total, 1100);
    }

    #[test]
    fn folded_chips_inflate_pots_without_eligibility() {
        let pots = partition_pots(&[
            (0, Chips(50), true),
            (1, Chips(200), false),
            (2, Chips(200), false),
        ]);
        // Level 50 covers all three; level 200 only the two callers.
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, Chips(150));
        assert_eq!(pots[0].eligible, vec![1, 2]);
        assert_eq!(pots[1].amount, Chips(300));
        assert_eq!(pots[1].eligible, vec![1, 2]);
        let total: u64 = pots.iter().map(|p| p.amount.as_u64()).sum();
        assert_eq!(total, 450);
    }

    #[test]
    fn partition_always_sums_to_total_committed() {
        let contributions = [
            (0, Chips(75), true),
            (2, Chips(340), false),
            (5, Chips(120), false),
            (7, Chips(340), false),
            (9, Chips(0), true),
        ];
        let committed: u64 = contributions.iter().map(|c| c.1.as_u64()).sum();
        let pots = partition_pots(&contributions);
        let total: u64 = pots.iter().map(|p| p.amount.as_u64()).sum();
        assert_eq!(total, committed);
        for pot in &pots {
            assert!(pot.eligible.iter().all(|s| ![0u8, 9].contains(s)));
        }
    }

    #[test]
    fn split_gives_floor_and_rotates_remainder() {
        let shares = split_pot(Chips(101), &[4, 7, 1]);
        assert_eq!(shares, vec![(4, Chips(34)), (7, Chips(34)), (1, Chips(33))]);
        let total: u64 = shares.iter().map(|s| s.1.as_u64()).sum();
        assert_eq!(total, 101);
    }

    #[test]
    fn even_split_has_no_remainder() {
        let shares = split_pot(Chips(40), &[1, 0]);
        assert_eq!(shares, vec![(1, Chips(20)), (0, Chips(20))]);
    }
}
