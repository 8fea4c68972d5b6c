use std::collections::HashSet;

use super::random::RandomSource;
use super::types::{Channel, ChannelWinner, Participant};
use super::weight::{build_weighted_pool, WeightedParticipant};

/// Output of the weighted lottery stage
#[derive(Debug, Clone, Default)]
pub struct LotteryDraw {
    /// Winners in the order they were drawn
    pub winners: Vec<ChannelWinner>,
    pub used_ids: HashSet<String>,
    /// Eligible participants never seated by any channel, in roster order
    pub missed: Vec<Participant>,
}

/// Roulette-wheel pick over ticket counts. Returns the index into `pool`.
pub fn pick_weighted<R: RandomSource + ?Sized>(
    pool: &[WeightedParticipant<'_>],
    rng: &mut R,
) -> Option<usize> {
    // u128 holds the sum of any number of u64 ticket counts
    let total: u128 = pool.iter().map(|item| u128::from(item.weight)).sum();
    if total == 0 {
        return None;
    }

    // Map [0, 1) onto a ticket number in [0, total)
    let ticket = ((rng.next_unit() * total as f64) as u128).min(total - 1);

    let mut cumulative = 0u128;
    for (index, item) in pool.iter().enumerate() {
        cumulative += u128::from(item.weight);
        if ticket < cumulative {
            return Some(index);
        }
    }
    Some(pool.len() - 1)
}

/// Draws up to `capacity` winners without replacement from participants not yet seated
pub fn run_base_lottery<R: RandomSource + ?Sized>(
    participants: &[Participant],
    capacity: usize,
    used_ids: &HashSet<String>,
    rng: &mut R,
) -> LotteryDraw {
    let mut used_ids = used_ids.clone();
    let mut winners = Vec::new();
    let mut pool = build_weighted_pool(participants.iter().filter(|p| !used_ids.contains(&p.id)));
    let mut remaining = capacity;

    while remaining > 0 && !pool.is_empty() {
        let Some(index) = pick_weighted(&pool, rng) else {
            break;
        };
        let picked = pool.remove(index);
        winners.push(ChannelWinner::from_participant(picked.participant, Channel::Lottery));
        used_ids.insert(picked.participant.id.clone());
        remaining -= 1;
    }

    let missed = participants
        .iter()
        .filter(|p| !used_ids.contains(&p.id))
        .cloned()
        .collect();

    LotteryDraw {
        winners,
        used_ids,
        missed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lottery::random::{SeededRandom, SequenceRandom};

    fn trio() -> Vec<Participant> {
        vec![
            Participant::new("a", "A"),
            Participant::new("b", "B"),
            Participant::new("c", "C"),
        ]
    }

    #[test]
    fn picks_the_interval_containing_the_draw() {
        let pool_owned = vec![
            Participant::new("a", "A"),                // 1 ticket: [0, 1)
            Participant::new("b", "B").with_misses(1), // 4 tickets: [1, 5)
            Participant::new("c", "C").with_misses(2), // 9 tickets: [5, 14)
        ];
        let pool = build_weighted_pool(&pool_owned);

        // 14 tickets in total
        let cases = [(0.0, 0), (0.07, 0), (0.08, 1), (0.35, 1), (0.36, 2), (0.99, 2)];
        for (unit, expected) in cases {
            let mut rng = SequenceRandom::new(vec![unit]);
            assert_eq!(pick_weighted(&pool, &mut rng), Some(expected), "unit {unit}");
        }
    }

    #[test]
    fn saturated_ticket_counts_share_the_odds() {
        let pool_owned = vec![
            Participant::new("a", "A").with_base_weight(u32::MAX).with_misses(u32::MAX),
            Participant::new("b", "B").with_base_weight(u32::MAX).with_misses(u32::MAX),
        ];
        let pool = build_weighted_pool(&pool_owned);

        let mut rng = SequenceRandom::new(vec![0.25]);
        assert_eq!(pick_weighted(&pool, &mut rng), Some(0));
        let mut rng = SequenceRandom::new(vec![0.75]);
        assert_eq!(pick_weighted(&pool, &mut rng), Some(1));
    }

    #[test]
    fn empty_pool_picks_nothing() {
        let mut rng = SequenceRandom::new(vec![0.5]);
        assert_eq!(pick_weighted(&[], &mut rng), None);
    }

    #[test]
    fn draws_in_order_and_removes_winners() {
        // 3 candidates, then 2, then 1
        let mut rng = SequenceRandom::new(vec![0.9, 0.0, 0.0]);
        let draw = run_base_lottery(&trio(), 3, &HashSet::new(), &mut rng);

        let ids: Vec<&str> = draw.winners.iter().map(|w| w.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(draw.missed.is_empty());
        assert!(draw.winners.iter().all(|w| w.channel == Channel::Lottery));
    }

    #[test]
    fn capacity_limits_winners_and_rest_are_missed() {
        let mut rng = SequenceRandom::new(vec![0.5]);
        let draw = run_base_lottery(&trio(), 1, &HashSet::new(), &mut rng);

        assert_eq!(draw.winners.len(), 1);
        assert_eq!(draw.winners[0].participant_id, "b");
        let missed: Vec<&str> = draw.missed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(missed, vec!["a", "c"]);
    }

    #[test]
    fn used_participants_are_neither_drawn_nor_missed() {
        let used: HashSet<String> = ["a".to_string()].into_iter().collect();
        let mut rng = SequenceRandom::new(vec![0.0]);
        let draw = run_base_lottery(&trio(), 5, &used, &mut rng);

        assert_eq!(draw.winners.len(), 2);
        assert!(draw.winners.iter().all(|w| w.participant_id != "a"));
        assert!(draw.missed.is_empty());
    }

    #[test]
    fn zero_capacity_draws_nobody() {
        let mut rng = SequenceRandom::new(vec![0.5]);
        let draw = run_base_lottery(&trio(), 0, &HashSet::new(), &mut rng);

        assert!(draw.winners.is_empty());
        assert_eq!(draw.missed.len(), 3);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn long_streak_wins_more_often() {
        let pool = vec![
            Participant::new("fresh", "Fresh"),
            Participant::new("waiting", "Waiting").with_misses(2),
        ];
        let mut rng = SeededRandom::new(42);
        let mut waiting_wins = 0;
        for _ in 0..2_000 {
            let draw = run_base_lottery(&pool, 1, &HashSet::new(), &mut rng);
            if draw.winners[0].participant_id == "waiting" {
                waiting_wins += 1;
            }
        }
        // expected share is 9 / 10
        assert!(waiting_wins > 1_700, "waiting won {waiting_wins} times");
    }
}
