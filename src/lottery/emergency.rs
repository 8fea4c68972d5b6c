use std::collections::HashSet;

use super::types::{Channel, ChannelAllocation, ChannelWinner, EmergencyRequest, Participant};

/// Seats approved emergency requests, earliest submission first
///
/// Requests for participants missing from the pool, or already seated, are
/// skipped. Stops once `capacity` winners are seated.
pub fn allocate_emergency_winners(
    requests: &[EmergencyRequest],
    participants: &[Participant],
    capacity: usize,
    used_ids: &HashSet<String>,
) -> ChannelAllocation {
    let mut used_ids = used_ids.clone();
    let mut winners = Vec::new();

    if requests.is_empty() || capacity == 0 {
        return ChannelAllocation {
            winners,
            used_ids,
            remaining_capacity: capacity,
        };
    }

    let mut approved: Vec<&EmergencyRequest> = requests.iter().filter(|r| r.approved).collect();
    // Stable, so requests submitted at the same instant keep their queue order
    approved.sort_by_key(|r| r.submitted_at);

    for request in approved {
        if winners.len() >= capacity {
            break;
        }
        let Some(participant) = participants.iter().find(|p| p.id == request.participant_id) else {
            continue;
        };
        if used_ids.contains(&participant.id) {
            continue;
        }
        winners.push(ChannelWinner::from_participant(participant, Channel::Emergency));
        used_ids.insert(participant.id.clone());
    }

    ChannelAllocation {
        remaining_capacity: capacity.saturating_sub(winners.len()),
        winners,
        used_ids,
    }
}
