use tracing::warn;

use super::types::Participant;

/// Number of lottery tickets a participant holds:
/// `base_weight * (consecutive_misses + 1)^2`
///
/// Never below 1. Saturates at `u64::MAX` instead of overflowing; pool
/// totals are summed in `u128`, so saturated holders still draw evenly
/// against each other.
pub fn ticket_count(participant: &Participant) -> u64 {
    let base = u64::from(participant.base_weight.unwrap_or(1).max(1));
    let streak = u64::from(participant.consecutive_misses) + 1;
    let tickets = base.saturating_mul(streak.saturating_mul(streak));
    if tickets == u64::MAX {
        warn!(participant = %participant.id, "ticket count saturated");
    }
    tickets
}

/// A participant paired with its ticket count for one lottery round
#[derive(Debug, Clone)]
pub struct WeightedParticipant<'a> {
    pub participant: &'a Participant,
    pub weight: u64,
}

pub fn build_weighted_pool<'a, I>(participants: I) -> Vec<WeightedParticipant<'a>>
where
    I: IntoIterator<Item = &'a Participant>,
{
    participants
        .into_iter()
        .map(|participant| WeightedParticipant {
            participant,
            weight: ticket_count(participant),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_participant_holds_one_ticket() {
        assert_eq!(ticket_count(&Participant::new("a", "A")), 1);
    }

    #[test]
    fn tickets_grow_with_square_of_streak() {
        let p = Participant::new("a", "A").with_misses(2);
        assert_eq!(ticket_count(&p), 9);

        let weighted = Participant::new("b", "B").with_base_weight(3).with_misses(3);
        assert_eq!(ticket_count(&weighted), 48);
    }

    #[test]
    fn zero_base_weight_is_treated_as_one() {
        let p = Participant::new("a", "A").with_base_weight(0).with_misses(1);
        assert_eq!(ticket_count(&p), 4);
    }

    #[test]
    fn extreme_values_saturate() {
        let p = Participant::new("a", "A")
            .with_base_weight(u32::MAX)
            .with_misses(u32::MAX);
        assert_eq!(ticket_count(&p), u64::MAX);
    }

    #[test]
    fn formula_holds_across_a_grid() {
        for base in 1..=5u32 {
            for misses in 0..=10u32 {
                let p = Participant::new("x", "X").with_base_weight(base).with_misses(misses);
                let expected = u64::from(base) * u64::from(misses + 1).pow(2);
                assert_eq!(ticket_count(&p), expected);
                assert!(ticket_count(&p) >= 1);
            }
        }
    }
}
