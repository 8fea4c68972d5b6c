use std::collections::HashSet;

use super::types::{Channel, ChannelAllocation, ChannelWinner, Participant};

/// Seats participants whose losing streak reached `threshold`, longest streak first
///
/// Takes at most `min(max_count, capacity)`. Equal streaks keep roster order.
pub fn allocate_guarantee_winners(
    participants: &[Participant],
    capacity: usize,
    used_ids: &HashSet<String>,
    threshold: u32,
    max_count: usize,
) -> ChannelAllocation {
    let mut used_ids = used_ids.clone();

    if capacity == 0 {
        return ChannelAllocation {
            winners: Vec::new(),
            used_ids,
            remaining_capacity: capacity,
        };
    }

    let mut candidates: Vec<&Participant> = participants
        .iter()
        .filter(|p| !used_ids.contains(&p.id) && p.consecutive_misses >= threshold)
        .collect();
    // sort_by is stable
    candidates.sort_by(|a, b| b.consecutive_misses.cmp(&a.consecutive_misses));

    let winners: Vec<ChannelWinner> = candidates
        .into_iter()
        .take(max_count.min(capacity))
        .map(|p| ChannelWinner::from_participant(p, Channel::Guarantee))
        .collect();

    used_ids.extend(winners.iter().map(|w| w.participant_id.clone()));

    ChannelAllocation {
        remaining_capacity: capacity.saturating_sub(winners.len()),
        winners,
        used_ids,
    }
}
